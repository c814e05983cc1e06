//! Script chunk rewriting.
//!
//! Chunks are parsed with tree-sitter and only `string` literal nodes are
//! considered, so image names inside identifiers, comments, regular
//! expressions or template text are never touched. Each rewritten literal
//! keeps its quote character:
//!
//! ```text
//! const hero = 'images/photo.jpg';
//!   →   const hero = 'images/thumb_photo.jpg';
//! ```
//!
//! Module specifiers (`import x from "./a.png"`) are left alone; they name
//! modules, not URLs. A chunk that does not parse cleanly is passed through
//! untouched.

use super::sourcemap::{Edit, SourceMap, apply_edits, build_map};
use super::{Anchor, ReferenceResolver};
use tree_sitter::{Node, Parser, Tree};

/// Replacement code for a chunk plus its source map.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutput {
    pub code: String,
    pub map: SourceMap,
    /// Number of literals rewritten.
    pub references: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    /// Parsed, nothing to rewrite.
    Unchanged,
    /// Not valid JavaScript; left as is.
    Unparsed,
    Rewritten(ChunkOutput),
}

fn parse(code: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_javascript::LANGUAGE.into())
        .ok()?;
    let tree = parser.parse(code, None)?;
    (!tree.root_node().has_error()).then_some(tree)
}

/// Decode the text between the quotes of a literal.
///
/// Only escapes that stand for themselves are accepted (`\/`, `\\`, `\'`,
/// `\"`). Anything else (`\n`, `\u002f`, line continuations) makes the
/// literal ineligible rather than risk changing what it means.
fn decode_literal(inner: &str) -> Option<String> {
    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                e @ ('/' | '\\' | '\'' | '"') => value.push(e),
                _ => return None,
            }
        } else {
            value.push(c);
        }
    }
    Some(value)
}

/// Write `value` back as a literal, keeping `quote` when no escaping is needed.
fn encode_literal(value: &str, quote: char) -> String {
    if value.contains([quote, '\\', '\n', '\r']) {
        serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
    } else {
        format!("{quote}{value}{quote}")
    }
}

/// `import ... from "x"` and `export ... from "x"`.
fn is_module_specifier(node: &Node) -> bool {
    node.parent()
        .is_some_and(|p| matches!(p.kind(), "import_statement" | "export_statement"))
}

fn rewrite_literal(
    node: &Node,
    code: &str,
    path: &str,
    resolver: &ReferenceResolver,
) -> Option<Edit> {
    if is_module_specifier(node) {
        return None;
    }
    let raw = &code[node.byte_range()];
    let quote = raw.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    if raw.len() < 2 || !raw.ends_with(quote) {
        return None;
    }
    let value = decode_literal(&raw[1..raw.len() - 1])?;
    let replacement = resolver.resolve(&value, path, Anchor::Root)?;

    Some(Edit {
        start: node.start_byte(),
        end: node.end_byte(),
        replacement: encode_literal(&replacement, quote),
    })
}

/// Collect literal edits with an iterative walk over the whole tree.
fn collect_edits(tree: &Tree, code: &str, path: &str, resolver: &ReferenceResolver) -> Vec<Edit> {
    let mut edits = Vec::new();
    let mut cursor = tree.walk();
    'walk: loop {
        let node = cursor.node();
        let descend = match node.kind() {
            "string" => {
                edits.extend(rewrite_literal(&node, code, path, resolver));
                false
            }
            "comment" | "regex" => false,
            _ => true,
        };
        if descend && cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }
    edits
}

/// Rewrite image string literals in the chunk at bundle path `path`.
pub fn rewrite_script(code: &str, path: &str, resolver: &ReferenceResolver) -> ScriptOutcome {
    let Some(tree) = parse(code) else {
        return ScriptOutcome::Unparsed;
    };
    let edits = collect_edits(&tree, code, path, resolver);
    if edits.is_empty() {
        return ScriptOutcome::Unchanged;
    }

    let map = build_map(code, &edits, path, Some(path));
    ScriptOutcome::Rewritten(ChunkOutput {
        code: apply_edits(code, &edits),
        map,
        references: edits.len(),
    })
}

/// Chunk-transform hook shape: `None` means "no change".
pub fn render_chunk(code: &str, path: &str, resolver: &ReferenceResolver) -> Option<ChunkOutput> {
    match rewrite_script(code, path, resolver) {
        ScriptOutcome::Rewritten(output) => Some(output),
        ScriptOutcome::Unchanged | ScriptOutcome::Unparsed => None,
    }
}
