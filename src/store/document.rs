//! Document representation and streaming types for query results.

use std::cmp::Ordering;
use std::pin::Pin;

use futures::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::StoreError;

/// A schemaless document as exchanged with a store.
pub type Document = Map<String, JsonValue>;

/// A stream of documents from a query result.
///
/// Uses `futures::Stream` so large result sets can be consumed lazily;
/// [`QueryComposer`](crate::query::QueryComposer) collects it for list calls.
pub type DocumentStream<'a> =
    Pin<Box<dyn Stream<Item = Result<Document, StoreError>> + Send + 'a>>;

/// Serializes a typed value into a [`Document`].
///
/// # Errors
///
/// Fails if the value does not serialize to a JSON object.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!(
            "documents must serialize to an object, got {}",
            type_name(&other)
        ))),
    }
}

/// Deserializes a [`Document`] into a typed value.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(JsonValue::Object(doc))?)
}

/// Resolves a dotted field path (`"address.city"`) inside a document.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a JsonValue> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Sets a dotted field path, creating intermediate objects as needed.
pub fn set_path(doc: &mut Document, path: &str, value: JsonValue) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !entry.is_object() {
                *entry = JsonValue::Object(Map::new());
            }
            if let JsonValue::Object(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

/// Removes a dotted field path, returning the removed value.
pub fn remove_path(doc: &mut Document, path: &str) -> Option<JsonValue> {
    match path.split_once('.') {
        None => doc.remove(path),
        Some((head, rest)) => match doc.get_mut(head)? {
            JsonValue::Object(inner) => remove_path(inner, rest),
            _ => None,
        },
    }
}

/// Rank of a JSON type in the cross-type ordering.
///
/// Follows the document-database convention: missing/null sort first, then
/// numbers, strings, objects, arrays and finally booleans.
fn type_rank(value: Option<&JsonValue>) -> u8 {
    match value {
        None | Some(JsonValue::Null) => 0,
        Some(JsonValue::Number(_)) => 1,
        Some(JsonValue::String(_)) => 2,
        Some(JsonValue::Object(_)) => 3,
        Some(JsonValue::Array(_)) => 4,
        Some(JsonValue::Bool(_)) => 5,
    }
}

/// Total order over optional JSON values, used for sorting.
pub fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => compare_numbers(x, y),
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        (Some(JsonValue::Array(x)), Some(JsonValue::Array(y))) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(Some(l), Some(r));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Some(JsonValue::Object(x)), Some(JsonValue::Object(y))) => {
            sorted_key(x).cmp(&sorted_key(y))
        }
        _ => Ordering::Equal,
    }
}

/// Equality with numeric normalization (`1` equals `1.0`).
pub fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => compare_numbers(x, y).is_eq(),
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        _ => a == b,
    }
}

/// Exact for two integers; floats fall back to `f64`.
fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    match (x.as_i64(), y.as_i64(), x.as_u64(), y.as_u64()) {
        (Some(a), Some(b), _, _) => a.cmp(&b),
        (_, _, Some(a), Some(b)) => a.cmp(&b),
        // Exactly one side exceeds i64::MAX.
        (Some(_), None, _, Some(_)) => Ordering::Less,
        (None, Some(_), Some(_), _) => Ordering::Greater,
        _ => {
            let (a, b) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
    }
}

/// Key-order independent rendering of an object, for a stable comparison.
fn sorted_key(map: &Document) -> String {
    let mut entries: Vec<_> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
    entries.sort();
    entries.join(",")
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
