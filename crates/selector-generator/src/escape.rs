//! Serialization of identifiers and strings into selector text.

use cssparser::{serialize_identifier, serialize_string};

/// Escape `value` for use after `#` or `.`.
pub fn escape_identifier(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    if serialize_identifier(value, &mut escaped).is_err() {
        return value.to_string();
    }
    escaped
}

/// Double-quoted attribute value with `"` and `\` escaped.
pub fn quote_attribute_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    if serialize_string(value, &mut quoted).is_err() {
        return format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""));
    }
    quoted
}
