//! Boundary with the JSON text codec: indentation, replacer and reviver
//! passes. Escaping and number formatting are left to `serde_json`.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value as JsonValue;

use crate::error::CodecError;
use crate::value::Value;

/// Longest indent unit accepted.
const MAX_INDENT: usize = 10;

/// Key/value transform applied to the resolved JSON tree before printing.
///
/// Returning `None` drops an object member; inside arrays it becomes `null`.
pub type Replacer<'a> = &'a dyn Fn(&str, JsonValue) -> Option<JsonValue>;

/// Key/value transform applied bottom-up to a parsed value.
///
/// Returning `None` drops an object member. [`Value`] arrays cannot hold
/// holes, so an array element the reviver drops is kept as `null` rather
/// than deleted, and the array length never changes.
pub type Reviver<'a> = &'a dyn Fn(&str, Value) -> Option<Value>;

/// Output indentation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Space {
    /// Compact output.
    #[default]
    None,
    /// Indent with this many spaces, at most 10.
    Spaces(usize),
    /// Indent with a literal string, truncated to 10 characters.
    Indent(String),
}

impl Space {
    /// The indent unit, or `None` for compact output.
    pub fn indent(&self) -> Option<String> {
        match self {
            Space::None => None,
            Space::Spaces(0) => None,
            Space::Spaces(n) => Some(" ".repeat((*n).min(MAX_INDENT))),
            Space::Indent(s) if s.is_empty() => None,
            Space::Indent(s) => Some(s.chars().take(MAX_INDENT).collect()),
        }
    }
}

impl From<usize> for Space {
    fn from(n: usize) -> Self {
        Space::Spaces(n)
    }
}

impl From<&str> for Space {
    fn from(s: &str) -> Self {
        Space::Indent(s.to_owned())
    }
}

impl From<String> for Space {
    fn from(s: String) -> Self {
        Space::Indent(s)
    }
}

pub(crate) fn format(json: &JsonValue, space: &Space) -> Result<String, CodecError> {
    let Some(indent) = space.indent() else {
        return serde_json::to_string(json).map_err(|e| CodecError::Format(e.to_string()));
    };
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    json.serialize(&mut ser)
        .map_err(|e| CodecError::Format(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| CodecError::Format(e.to_string()))
}

pub(crate) fn decode(text: &str) -> Result<JsonValue, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::Syntax(e.to_string()))
}

/// Top-down: the transform sees a holder before its children, and recursion
/// continues into whatever it returned.
pub(crate) fn replace(replacer: Replacer<'_>, key: &str, value: JsonValue) -> Option<JsonValue> {
    let value = replacer(key, value)?;
    Some(match value {
        JsonValue::Array(items) => JsonValue::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| replace(replacer, &i.to_string(), item).unwrap_or(JsonValue::Null))
                .collect(),
        ),
        JsonValue::Object(map) => JsonValue::Object(
            map.into_iter()
                .filter_map(|(k, v)| {
                    let v = replace(replacer, &k, v)?;
                    Some((k, v))
                })
                .collect(),
        ),
        other => other,
    })
}

/// Bottom-up: children are revived before their holder. Objects are updated
/// in place so instances keep their identity and class.
pub(crate) fn revive(reviver: Reviver<'_>, key: &str, value: Value) -> Option<Value> {
    let value = match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| revive(reviver, &i.to_string(), item).unwrap_or(Value::Null))
                .collect(),
        ),
        Value::Object(obj) => {
            for (k, v) in obj.entries() {
                match revive(reviver, &k, v) {
                    Some(v) => {
                        obj.set(k, v);
                    }
                    None => {
                        obj.remove(&k);
                    }
                }
            }
            Value::Object(obj)
        }
        other => other,
    };
    reviver(key, value)
}
