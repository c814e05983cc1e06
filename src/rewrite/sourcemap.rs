//! Edits over a source text and the version 3 source map describing them.
//!
//! Script rewriting replaces a handful of string literals in an otherwise
//! untouched chunk. [`apply_edits`] produces the new text and [`build_map`]
//! maps every generated line start and every edit boundary back to the
//! original position, which is enough for debuggers to line up stack traces
//! and breakpoints.
//!
//! Columns are counted in UTF-16 code units, as browsers count them.
//!
//! A chunk that already had a map (from the bundler that produced it) keeps
//! it: [`compose`] shifts the generated columns of the old map through the
//! edits, so it keeps pointing at the author's sources. Edits never add or
//! remove lines, so only columns move.

use serde::Serialize;

/// Replace `source[start..end]` (byte offsets) with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

/// A version 3 source map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> String {
        // Only strings and integers; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Apply non-overlapping edits sorted by `start`.
pub fn apply_edits(source: &str, edits: &[Edit]) -> String {
    let mut out = String::with_capacity(source.len() + edits.len() * 8);
    let mut cursor = 0;
    for edit in edits {
        out.push_str(&source[cursor..edit.start]);
        out.push_str(&edit.replacement);
        cursor = edit.end;
    }
    out.push_str(&source[cursor..]);
    out
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Append `value` as a base64 VLQ.
fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq: u64 = if value < 0 {
        (value.unsigned_abs() << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Decode one base64 VLQ from the front of `text`; returns it with the rest.
fn decode_vlq(text: &str) -> Option<(i64, &str)> {
    let mut result: u64 = 0;
    let mut shift = 0;
    for (i, byte) in text.bytes().enumerate() {
        let digit = BASE64.iter().position(|&b| b == byte)? as u64;
        if shift > 60 {
            return None;
        }
        result |= (digit & 0b11111) << shift;
        shift += 5;
        if digit & 0b100000 == 0 {
            let value = (result >> 1) as i64;
            let value = if result & 1 == 1 { -value } else { value };
            return Some((value, &text[i + 1..]));
        }
    }
    None
}

/// `(generated column, original column)` pairs per line of a map built by
/// [`build_map`].
type Anchors = Vec<Vec<(i64, i64)>>;

fn line_anchors(mappings: &str) -> Option<Anchors> {
    let mut lines = Vec::new();
    let mut orig_col = 0;
    for segments in mappings.split(';') {
        let mut anchors = Vec::new();
        let mut gen_col = 0;
        for segment in segments.split(',').filter(|s| !s.is_empty()) {
            let (delta, rest) = decode_vlq(segment)?;
            gen_col += delta;
            let (_, rest) = decode_vlq(rest)?;
            let (_, rest) = decode_vlq(rest)?;
            let (delta, _) = decode_vlq(rest)?;
            orig_col += delta;
            anchors.push((gen_col, orig_col));
        }
        lines.push(anchors);
    }
    Some(lines)
}

/// Where column `col` of the pre-edit line lands after the edits.
fn shift_column(anchors: &[(i64, i64)], col: i64) -> i64 {
    anchors
        .iter()
        .rev()
        .find(|(_, orig)| *orig <= col)
        .map_or(col, |(generated, orig)| generated + (col - orig))
}

/// Re-encode the generated column of every segment; the other fields are
/// relative to the previous segment and stay byte-identical.
fn shift_mappings(mappings: &str, anchors: &Anchors) -> Option<String> {
    let mut out = String::with_capacity(mappings.len() + 16);
    for (line, segments) in mappings.split(';').enumerate() {
        if line > 0 {
            out.push(';');
        }
        let line_anchors = anchors.get(line).map_or(&[][..], Vec::as_slice);
        let (mut old_col, mut prev_col) = (0, 0);
        for (i, segment) in segments.split(',').filter(|s| !s.is_empty()).enumerate() {
            if i > 0 {
                out.push(',');
            }
            let (delta, rest) = decode_vlq(segment)?;
            old_col += delta;
            let new_col = shift_column(line_anchors, old_col);
            encode_vlq(&mut out, new_col - prev_col);
            prev_col = new_col;
            out.push_str(rest);
        }
    }
    Some(out)
}

/// Carry `existing`, the JSON map of a chunk before it was rewritten, over
/// to the rewritten chunk described by `edits`.
///
/// Returns `None` when `existing` is not a plain version 3 map (index maps
/// with `sections` included).
pub fn compose(edits: &SourceMap, existing: &str) -> Option<String> {
    let mut value: serde_json::Value = serde_json::from_str(existing).ok()?;
    if value.get("version")?.as_u64()? != 3 {
        return None;
    }
    let anchors = line_anchors(&edits.mappings)?;
    let shifted = shift_mappings(value.get("mappings")?.as_str()?, &anchors)?;
    value["mappings"] = serde_json::Value::String(shifted);
    serde_json::to_string(&value).ok()
}

/// Accumulates segments line by line, delta-encoding as it goes.
struct MappingWriter {
    mappings: String,
    line: usize,
    segments_on_line: usize,
    prev_gen_col: i64,
    prev_orig_line: i64,
    prev_orig_col: i64,
    last: Option<(usize, usize)>,
}

impl MappingWriter {
    fn new() -> Self {
        Self {
            mappings: String::new(),
            line: 0,
            segments_on_line: 0,
            prev_gen_col: 0,
            prev_orig_line: 0,
            prev_orig_col: 0,
            last: None,
        }
    }

    fn new_line(&mut self) {
        self.mappings.push(';');
        self.line += 1;
        self.segments_on_line = 0;
        self.prev_gen_col = 0;
    }

    fn segment(&mut self, gen_col: usize, orig_line: usize, orig_col: usize) {
        if self.last == Some((self.line, gen_col)) {
            return;
        }
        if self.segments_on_line > 0 {
            self.mappings.push(',');
        }
        encode_vlq(&mut self.mappings, gen_col as i64 - self.prev_gen_col);
        encode_vlq(&mut self.mappings, 0);
        encode_vlq(&mut self.mappings, orig_line as i64 - self.prev_orig_line);
        encode_vlq(&mut self.mappings, orig_col as i64 - self.prev_orig_col);
        self.prev_gen_col = gen_col as i64;
        self.prev_orig_line = orig_line as i64;
        self.prev_orig_col = orig_col as i64;
        self.segments_on_line += 1;
        self.last = Some((self.line, gen_col));
    }
}

/// Line/column cursor over one side of the mapping.
#[derive(Clone, Copy, Default)]
struct Position {
    line: usize,
    col: usize,
}

impl Position {
    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += c.len_utf16();
            }
        }
    }
}

/// Copy unchanged text, marking each generated line start.
fn copy_unchanged(
    text: &str,
    writer: &mut MappingWriter,
    generated: &mut Position,
    original: &mut Position,
) {
    for c in text.chars() {
        if c == '\n' {
            generated.line += 1;
            generated.col = 0;
            original.line += 1;
            original.col = 0;
            writer.new_line();
        } else {
            if generated.col == 0 {
                writer.segment(0, original.line, original.col);
            }
            let width = c.len_utf16();
            generated.col += width;
            original.col += width;
        }
    }
}

/// Build the map from `source` to `apply_edits(source, edits)`.
pub fn build_map(source: &str, edits: &[Edit], source_name: &str, file: Option<&str>) -> SourceMap {
    let mut writer = MappingWriter::new();
    let mut generated = Position::default();
    let mut original = Position::default();

    let mut cursor = 0;
    for edit in edits {
        copy_unchanged(&source[cursor..edit.start], &mut writer, &mut generated, &mut original);

        writer.segment(generated.col, original.line, original.col);
        let anchor = original;
        for c in edit.replacement.chars() {
            if c == '\n' {
                generated.line += 1;
                generated.col = 0;
                writer.new_line();
                writer.segment(0, anchor.line, anchor.col);
            } else {
                generated.col += c.len_utf16();
            }
        }
        original.advance(&source[edit.start..edit.end]);
        writer.segment(generated.col, original.line, original.col);
        cursor = edit.end;
    }
    copy_unchanged(&source[cursor..], &mut writer, &mut generated, &mut original);

    SourceMap {
        version: 3,
        file: file.map(str::to_string),
        sources: vec![source_name.to_string()],
        sources_content: vec![source.to_string()],
        names: Vec::new(),
        mappings: writer.mappings,
    }
}
