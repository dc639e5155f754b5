//! Action fingerprinting for repetition comparison.
//!
//! Reduces an `(action, tool, arguments)` triple to a short fixed-length key.
//! Arguments are canonicalized first (object keys sorted recursively) so the
//! same argument set always yields the same key regardless of the order the
//! caller built it in.
//!
//! Hashing runs in two SHA-256 stages: the canonical arguments are digested
//! on their own, then combined with the action and tool into a second digest.
//! The second stage hashes a JSON array, so separators inside `action` or
//! `tool` cannot shift the field boundaries.
//! Both are truncated; the goal is a short, stable, low-collision key rather
//! than cryptographic strength.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::Arguments;

/// Hex characters kept from the argument digest.
const ARGS_DIGEST_LEN: usize = 12;

/// Hex characters in a finished fingerprint.
pub const FINGERPRINT_LEN: usize = 16;

/// Deterministic key for an `(action, tool, arguments)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint an action. Never fails.
    pub fn of(action: &str, tool: &str, arguments: &Arguments) -> Self {
        let args_digest = hex_digest(canonical_arguments(arguments).as_bytes(), ARGS_DIGEST_LEN);
        let raw = Value::from(vec![action, tool, args_digest.as_str()]).to_string();
        Self(hex_digest(raw.as_bytes(), FINGERPRINT_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Render arguments as compact JSON with every object's keys sorted.
///
/// Sorting is done explicitly rather than relying on `serde_json::Map`
/// ordering, which flips to insertion order when any crate in the build
/// enables `preserve_order`.
pub fn canonical_arguments(arguments: &Arguments) -> String {
    let mut out = String::new();
    write_canonical_object(arguments, &mut out);
    out
}

fn write_canonical_object(map: &Arguments, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        if let Some(value) = map.get(key) {
            write_canonical_value(value, out);
        }
    }
    out.push('}');
}

fn write_canonical_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_canonical_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_value(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 of `bytes` as lowercase hex, truncated to `len` characters.
fn hex_digest(bytes: &[u8], len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize()).chars().take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => map,
            _ => Arguments::new(),
        }
    }

    #[test]
    fn fixed_length_hex() {
        let fp = Fingerprint::of("web_search", "web_search", &args(json!({"query": "foo"})));
        assert_eq!(fp.as_str().len(), FINGERPRINT_LEN);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn deterministic() {
        let a = Fingerprint::of("tool_call", "task_manage", &args(json!({"action": "list"})));
        let b = Fingerprint::of("tool_call", "task_manage", &args(json!({"action": "list"})));
        assert_eq!(a, b);
    }

    #[test]
    fn key_order_does_not_matter() {
        let mut first = Arguments::new();
        first.insert("a".into(), json!(1));
        first.insert("b".into(), json!({"y": 2, "x": [1, {"q": 1, "p": 2}]}));

        let mut second = Arguments::new();
        second.insert("b".into(), json!({"x": [1, {"p": 2, "q": 1}], "y": 2}));
        second.insert("a".into(), json!(1));

        assert_eq!(
            Fingerprint::of("act", "tool", &first),
            Fingerprint::of("act", "tool", &second)
        );
    }

    #[test]
    fn differing_argument_value_changes_key() {
        let foo = Fingerprint::of("web_search", "", &args(json!({"query": "foo"})));
        let bar = Fingerprint::of("web_search", "", &args(json!({"query": "bar"})));
        assert_ne!(foo, bar);
    }

    #[test]
    fn action_and_tool_participate() {
        let empty = Arguments::new();
        assert_ne!(
            Fingerprint::of("read", "fs", &empty),
            Fingerprint::of("write", "fs", &empty)
        );
        assert_ne!(
            Fingerprint::of("read", "fs", &empty),
            Fingerprint::of("read", "net", &empty)
        );
    }

    #[test]
    fn separators_inside_fields_do_not_collide() {
        let empty = Arguments::new();
        assert_ne!(
            Fingerprint::of("read|fs", "net", &empty),
            Fingerprint::of("read", "fs|net", &empty)
        );
        assert_ne!(
            Fingerprint::of("cat log | grep err", "", &empty),
            Fingerprint::of("cat log ", " grep err", &empty)
        );
    }

    #[test]
    fn canonical_form_sorts_nested_keys() {
        let rendered = canonical_arguments(&args(json!({"z": {"b": 1, "a": 2}, "m": "x"})));
        assert_eq!(rendered, r#"{"m":"x","z":{"a":2,"b":1}}"#);
    }
}
