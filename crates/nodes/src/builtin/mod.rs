//! Built-in node handlers.
//!
//! Each handler validates its own params at the point of use; the engine
//! knows nothing about per-type schemas.

mod code;
mod conditional;
mod http;
mod set;
mod trigger;

pub use code::CodeNode;
pub use conditional::{resolve_path, IfNode, Operator};
pub use http::HttpRequestNode;
pub use set::SetNode;
pub use trigger::TriggerNode;

use serde_json::{Map, Value};

use crate::Params;

/// A param read as text. Missing and `null` are `None`; non-string scalars
/// are rendered as JSON.
pub(crate) fn param_string(params: &Params, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A param read as an object; anything else counts as empty.
pub(crate) fn param_object(params: &Params, key: &str) -> Map<String, Value> {
    params
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Render a JSON value for a header or query string.
pub(crate) fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
