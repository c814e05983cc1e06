//! Style sheet rewriting.
//!
//! A small tokenizer walks the style sheet, skipping comments and quoted
//! strings, and finds `url(...)` functions at identifier boundaries. Only the
//! URL text inside each function is replaced; quoting and whitespace stay as
//! written:
//!
//! ```text
//! .hero { background: url("../img/hero.jpg") }
//!   →   .hero { background: url("../img/thumb_hero.jpg") }
//! ```
//!
//! With `background_fill`, a `background` shorthand whose whole value is the
//! rewritten `url(...)` also gets `center / cover no-repeat`, so the thumbnail
//! covers the same box the original will.

use super::{Anchor, ReferenceResolver};

/// Suffix appended to a sole-url `background` shorthand.
pub const BACKGROUND_FILL: &str = " center / cover no-repeat";

/// A rewritten style sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct CssRewrite {
    pub css: String,
    /// Number of references that now point at thumbnails.
    pub references: usize,
}

/// One `url(...)` occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UrlToken {
    /// Byte offset of `u` in `url(`.
    pub start: usize,
    /// Byte offset just past the closing `)`.
    pub end: usize,
    /// Byte range of the URL text, without quotes.
    pub value: (usize, usize),
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b >= 0x80
}

/// Index just past the string that opens with the quote at `open`.
/// Unterminated strings run to the end of input.
fn skip_string(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            b'\n' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Parse the body of a `url(` whose opening parenthesis ends at `open_end`.
fn parse_url(bytes: &[u8], start: usize, open_end: usize) -> Option<UrlToken> {
    let mut i = open_end;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let value = match bytes.get(i)? {
        q @ (b'"' | b'\'') => {
            let close = skip_string(bytes, i);
            if close == 0 || bytes.get(close - 1) != Some(q) || close - 1 == i {
                return None;
            }
            let value = (i + 1, close - 1);
            i = close;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            value
        }
        _ => {
            let begin = i;
            while i < bytes.len()
                && bytes[i] != b')'
                && !matches!(bytes[i], b'"' | b'\'' | b'(')
            {
                i += 1;
            }
            let mut end = i;
            while end > begin && bytes[end - 1].is_ascii_whitespace() {
                end -= 1;
            }
            (begin, end)
        }
    };
    (bytes.get(i) == Some(&b')')).then_some(UrlToken {
        start,
        end: i + 1,
        value,
    })
}

/// Find every `url(...)` outside comments and strings.
pub(crate) fn find_urls(css: &str) -> Vec<UrlToken> {
    let bytes = css.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2);
            }
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'u' | b'U'
                if (i == 0 || !is_ident_byte(bytes[i - 1]))
                    && bytes.len() >= i + 4
                    && bytes[i..i + 4].eq_ignore_ascii_case(b"url(") =>
            {
                match parse_url(bytes, i, i + 4) {
                    Some(token) => {
                        i = token.end;
                        tokens.push(token);
                    }
                    None => i += 4,
                }
            }
            _ => i += 1,
        }
    }
    tokens
}

/// Whether the url at `token` is the entire value of a `background`
/// declaration.
fn is_sole_background_value(css: &str, token: &UrlToken) -> bool {
    let before = css[..token.start].trim_end();
    let Some(before) = before.strip_suffix(':') else {
        return false;
    };
    let before = before.trim_end();
    let name_start = before
        .char_indices()
        .rev()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        .map_or(0, |(p, c)| p + c.len_utf8());
    if !before[name_start..].eq_ignore_ascii_case("background") {
        return false;
    }
    let lead = before[..name_start].trim_end();
    if !(lead.is_empty() || lead.ends_with(';') || lead.ends_with('{')) {
        return false;
    }
    let after = css[token.end..].trim_start();
    after.is_empty() || after.starts_with(';') || after.starts_with('}')
}

/// Rewrite the `url(...)` references in `css`, found at bundle path `path`.
///
/// Returns `None` when no reference changed. Values containing escapes are
/// left alone rather than decoded.
pub fn rewrite_stylesheet(
    css: &str,
    path: &str,
    resolver: &ReferenceResolver,
    background_fill: bool,
) -> Option<CssRewrite> {
    rewrite_in(css, path, Anchor::Artifact, resolver, background_fill)
}

/// Shared by the style sheet pass and inline styles in markup, where the
/// anchor is the page.
pub(crate) fn rewrite_in(
    css: &str,
    path: &str,
    anchor: Anchor,
    resolver: &ReferenceResolver,
    background_fill: bool,
) -> Option<CssRewrite> {
    let mut out = String::with_capacity(css.len() + 64);
    let mut cursor = 0;
    let mut references = 0;

    for token in find_urls(css) {
        let value = &css[token.value.0..token.value.1];
        if value.contains('\\') {
            continue;
        }
        let Some(replacement) = resolver.resolve(value, path, anchor) else {
            continue;
        };
        out.push_str(&css[cursor..token.value.0]);
        out.push_str(&replacement);
        out.push_str(&css[token.value.1..token.end]);
        if background_fill && is_sole_background_value(css, &token) {
            out.push_str(BACKGROUND_FILL);
        }
        cursor = token.end;
        references += 1;
    }

    if references == 0 {
        return None;
    }
    out.push_str(&css[cursor..]);
    Some(CssRewrite { css: out, references })
}
