//! Request identity derivation.
//!
//! Every cache layer is keyed by a deterministic string derived from the
//! request: the URL alone for GET, the URL plus a canonical rendering of the
//! body for POST. Object keys are serialized in sorted order so two bodies
//! that are structurally equal produce the same identity regardless of how
//! the caller assembled them.

use serde_json::Value;
use std::fmt::Write as _;

use super::client::RequestShape;

/// Derives the cache identity of a request.
///
/// The POST body is rendered before any wire envelope is applied, so the
/// identity reflects what the caller asked for rather than transport framing.
#[must_use]
pub fn request_key(url: &str, shape: &RequestShape) -> String {
    match shape {
        RequestShape::Get => url.to_owned(),
        RequestShape::Post(body) => {
            let mut key = String::with_capacity(url.len() + 64);
            key.push_str(url);
            key.push('|');
            write_canonical(body, &mut key);
            key
        }
    }
}

/// Writes a JSON value with object keys in sorted order and no whitespace.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_escaped(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut sorted_keys: Vec<&String> = map.keys().collect();
            sorted_keys.sort_unstable();

            out.push('{');
            for (i, key) in sorted_keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
    }
}

fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
