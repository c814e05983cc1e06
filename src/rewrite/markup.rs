//! HTML page handling: runtime injection and optional attribute rewriting.
//!
//! The page hook ([`transform_index_html`]) never edits the markup itself. It
//! hands back the page unchanged plus one tag descriptor carrying the
//! rendered swap controller, to be placed at the end of `<body>`. A host
//! applies descriptors with [`inject_tags`]; the built-in directory host does
//! exactly that.
//!
//! [`rewrite_markup`] is off by default. When enabled it points `<img src>`
//! at thumbnails, and inline `style` attributes and `<style>` blocks too when
//! background swapping is on. Comments and script bodies are left alone.
//! `srcset` is never touched: the controller swaps `src` only, and a
//! thumbnail candidate in `srcset` would win over the swapped `src`.

use super::css;
use super::sourcemap::{Edit, apply_edits};
use super::{Anchor, ReferenceResolver};
use crate::config::ThumbnailConfig;
use crate::runtime::render_runtime;
use maud::{PreEscaped, html};

/// Attribute marking the injected controller element.
pub const CONTROLLER_MARKER: &str = "data-lazy-thumbnails";

/// Where a tag goes in the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectTo {
    /// Before `</head>`.
    Head,
    /// Right after `<head>`.
    HeadPrepend,
    /// Before `</body>`.
    Body,
    /// Right after `<body>`.
    BodyPrepend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlTagKind {
    Script,
    Style,
}

/// A tag to insert into a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlTag {
    pub kind: HtmlTagKind,
    pub inject_to: InjectTo,
    /// Raw element content; emitted without escaping.
    pub children: String,
}

/// Result of the page hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlTransform {
    pub html: String,
    pub tags: Vec<HtmlTag>,
}

/// A page with rewritten attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupRewrite {
    pub html: String,
    pub references: usize,
}

/// Page hook: the page as is, plus the controller script for the body.
pub fn transform_index_html(html: &str, config: &ThumbnailConfig) -> HtmlTransform {
    HtmlTransform {
        html: html.to_string(),
        tags: vec![HtmlTag {
            kind: HtmlTagKind::Script,
            inject_to: InjectTo::Body,
            children: render_runtime(config),
        }],
    }
}

/// Render a tag descriptor as an element carrying [`CONTROLLER_MARKER`].
pub fn render_tag(tag: &HtmlTag) -> String {
    let markup = match tag.kind {
        HtmlTagKind::Script => html! {
            script data-lazy-thumbnails { (PreEscaped(&tag.children)) }
        },
        HtmlTagKind::Style => html! {
            style data-lazy-thumbnails { (PreEscaped(&tag.children)) }
        },
    };
    markup.into_string()
}

/// Byte offset of the first `<name` open tag in `lower`, and of the end of
/// that tag.
fn find_open_tag(lower: &str, name: &str) -> Option<(usize, usize)> {
    let needle = format!("<{name}");
    let mut from = 0;
    while let Some(pos) = lower[from..].find(&needle) {
        let start = from + pos;
        let after = start + needle.len();
        if ends_tag_name(lower, after) {
            let end = lower[after..].find('>').map(|p| after + p + 1)?;
            return Some((start, end));
        }
        from = after;
    }
    None
}

fn ends_tag_name(lower: &str, at: usize) -> bool {
    matches!(
        lower.as_bytes().get(at),
        Some(b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
    )
}

/// Byte offset of the last `</name` close tag in `lower`.
fn find_close_tag(lower: &str, name: &str) -> Option<usize> {
    let needle = format!("</{name}");
    let mut to = lower.len();
    while let Some(start) = lower[..to].rfind(&needle) {
        if ends_tag_name(lower, start + needle.len()) {
            return Some(start);
        }
        to = start;
    }
    None
}

/// Insertion offset for `target`, if the page has the anchor.
fn insertion_point(html: &str, target: InjectTo) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    match target {
        InjectTo::Body => find_close_tag(&lower, "body"),
        InjectTo::Head => find_close_tag(&lower, "head"),
        InjectTo::BodyPrepend => find_open_tag(&lower, "body").map(|(_, end)| end),
        InjectTo::HeadPrepend => find_open_tag(&lower, "head").map(|(_, end)| end),
    }
}

/// Insert `tags` into `html`, falling back to appending when a tag's anchor
/// is missing.
///
/// Returns `None` when there is nothing to insert or the page already
/// carries the controller marker.
pub fn inject_tags(html: &str, tags: &[HtmlTag]) -> Option<String> {
    if tags.is_empty() || html.contains(CONTROLLER_MARKER) {
        return None;
    }
    let mut page = html.to_string();
    for tag in tags {
        let element = render_tag(tag);
        match insertion_point(&page, tag.inject_to) {
            Some(at) => page.insert_str(at, &element),
            None => page.push_str(&element),
        }
    }
    Some(page)
}

// ============================================================================
// Attribute rewriting
// ============================================================================

/// Position of the first case-insensitive match of `needle` (ASCII) at or
/// after `from`.
fn find_ci(html: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = html.as_bytes();
    let needle = needle.as_bytes();
    (from..=hay.len().checked_sub(needle.len())?)
        .find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

struct Attribute {
    name: String,
    value: (usize, usize),
}

/// Parse the tag opening at `start` (`<name ...>`). Returns the lowercased
/// tag name, its attributes and the offset past `>`.
fn parse_tag(html: &str, start: usize) -> Option<(String, Vec<Attribute>, usize)> {
    let bytes = html.as_bytes();
    let mut i = start + 1;
    let name_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let tag = html[name_start..i].to_ascii_lowercase();

    let mut attributes = Vec::new();
    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if *bytes.get(i)? == b'>' {
            return Some((tag, attributes, i + 1));
        }
        let attr_start = i;
        while i < bytes.len()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
            && !bytes[i].is_ascii_whitespace()
        {
            i += 1;
        }
        let name = html[attr_start..i].to_ascii_lowercase();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let value = match bytes.get(i)? {
            q @ (b'"' | b'\'') => {
                let close = html[i + 1..].find(*q as char)? + i + 1;
                let value = (i + 1, close);
                i = close + 1;
                value
            }
            _ => {
                let begin = i;
                while i < bytes.len() && bytes[i] != b'>' && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                (begin, i)
            }
        };
        attributes.push(Attribute { name, value });
    }
}

/// Edit for one attribute value, with the number of references it changes.
fn rewrite_attribute(
    html: &str,
    tag: &str,
    attribute: &Attribute,
    path: &str,
    resolver: &ReferenceResolver,
    config: &ThumbnailConfig,
) -> Option<(Edit, usize)> {
    let (start, end) = attribute.value;
    let value = &html[start..end];
    let (replacement, references) = match attribute.name.as_str() {
        "src" if tag == "img" => (resolver.resolve(value, path, Anchor::Artifact)?, 1),
        "style" if !config.skip_background => {
            let rewritten =
                css::rewrite_in(value, path, Anchor::Artifact, resolver, config.background_fill)?;
            (rewritten.css, rewritten.references)
        }
        _ => return None,
    };
    Some((
        Edit {
            start,
            end,
            replacement,
        },
        references,
    ))
}

/// Point image sources of the page at `path` to thumbnails, and its inline
/// styles too unless `config.skip_background` is set. Returns `None` when
/// nothing changed.
pub fn rewrite_markup(
    html: &str,
    path: &str,
    resolver: &ReferenceResolver,
    config: &ThumbnailConfig,
) -> Option<MarkupRewrite> {
    let mut edits = Vec::new();
    let mut references = 0;
    let mut i = 0;

    while let Some(pos) = html[i..].find('<') {
        let start = i + pos;
        if html[start..].starts_with("<!--") {
            i = html[start + 4..].find("-->").map_or(html.len(), |p| start + 4 + p + 3);
            continue;
        }
        let Some((tag, attributes, tag_end)) = parse_tag(html, start) else {
            i = start + 1;
            continue;
        };
        for attribute in &attributes {
            if let Some((edit, count)) =
                rewrite_attribute(html, &tag, attribute, path, resolver, config)
            {
                edits.push(edit);
                references += count;
            }
        }
        i = tag_end;

        match tag.as_str() {
            "script" => {
                i = find_ci(html, "</script", i).unwrap_or(html.len());
            }
            "style" => {
                let close = find_ci(html, "</style", i).unwrap_or(html.len());
                if !config.skip_background
                    && let Some(rewritten) = css::rewrite_in(
                        &html[i..close],
                        path,
                        Anchor::Artifact,
                        resolver,
                        config.background_fill,
                    )
                {
                    edits.push(Edit {
                        start: i,
                        end: close,
                        replacement: rewritten.css,
                    });
                    references += rewritten.references;
                }
                i = close;
            }
            _ => {}
        }
    }

    (references > 0).then(|| MarkupRewrite {
        html: apply_edits(html, &edits),
        references,
    })
}
