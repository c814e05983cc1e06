//! Placeholder substitution for the embedded controller source.
//!
//! The template names its parameters with `__LT_<NAME>__` tokens. Rendering
//! is one left-to-right pass: each token found in the template is replaced by
//! its value and the value itself is never scanned again, so a configured
//! value that happens to contain a token cannot trigger a second
//! substitution.

/// Marker every placeholder starts with.
const TOKEN_START: &str = "__LT_";
const TOKEN_END: &str = "__";

/// Replace each known placeholder in `template` with its value.
///
/// Tokens without a value are left in place; [`unresolved`] reports them.
pub fn render(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(start) = rest.find(TOKEN_START) {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let hit = values
            .iter()
            .find(|(name, _)| candidate.starts_with(*name));
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &candidate[name.len()..];
            }
            None => {
                out.push_str(TOKEN_START);
                rest = &candidate[TOKEN_START.len()..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Placeholder tokens still present in `text`.
pub fn unresolved(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(TOKEN_START) {
        let candidate = &rest[start..];
        let body = &candidate[TOKEN_START.len()..];
        let name_len = body
            .find(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'))
            .unwrap_or(body.len());
        let token = &candidate[..TOKEN_START.len() + name_len];
        if token.len() > TOKEN_START.len() + TOKEN_END.len() && token.ends_with(TOKEN_END) {
            found.push(token);
        }
        rest = &candidate[TOKEN_START.len()..];
    }
    found
}

/// A JavaScript string literal for `value`, safe inside an inline `<script>`.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}

/// A JavaScript number literal; non-finite values become `0`.
pub fn js_number(value: f64) -> String {
    if value.is_finite() {
        format!("{value}")
    } else {
        "0".to_string()
    }
}
