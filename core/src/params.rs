//! Query-string construction and the parameter filter helper.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Query parameters. `None` values are dropped when the query is encoded.
pub type Params = BTreeMap<String, Option<String>>;

/// Form-encode the non-null entries of `params` as `key=value` joined by `&`.
pub fn encode_query(params: &Params) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if let Some(value) = value {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}

/// Append the encoded `params` to `resource`.
///
/// Nothing is appended when every value is null. A resource that already
/// carries a query string is extended with `&`.
pub fn resource_with_query(resource: &str, params: Option<&Params>) -> String {
    let query = match params {
        Some(params) => encode_query(params),
        None => return resource.to_string(),
    };
    if query.is_empty() {
        return resource.to_string();
    }
    let separator = if resource.contains('?') { '&' } else { '?' };
    format!("{resource}{separator}{query}")
}

/// Flatten a caller's option object into request parameters.
///
/// Entries of the `filters` sub-object come first; the `allowed` top-level
/// keys are then layered on top. A missing or non-object `filters` value is
/// ignored.
pub fn extract_params(actual: &Map<String, Value>, allowed: &[&str]) -> Params {
    let mut result = Params::new();
    if let Some(Value::Object(filters)) = actual.get("filters") {
        for (key, value) in filters {
            result.insert(key.clone(), scalar(value));
        }
    }
    for key in allowed {
        if let Some(value) = actual.get(*key) {
            result.insert((*key).to_string(), scalar(value));
        }
    }
    result
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
