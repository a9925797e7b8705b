//! Field projections.

use crate::store::{get_path, remove_path, set_path, Document};

/// Restricts or reshapes the fields returned by a query.
///
/// A projection never affects filtering or sorting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Return only `fields`, plus the id unless `include_id` is false.
    Include { fields: Vec<String>, include_id: bool },
    /// Return everything except `fields`.
    Exclude(Vec<String>),
}

impl Projection {
    pub fn include<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Projection::Include {
            fields: fields.into_iter().map(Into::into).collect(),
            include_id: true,
        }
    }

    pub fn exclude<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Projection::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Drops the id from an inclusion projection.
    pub fn without_id(self) -> Self {
        match self {
            Projection::Include { fields, .. } => Projection::Include {
                fields,
                include_id: false,
            },
            other => other,
        }
    }

    /// Shapes one document. `id_field` is the collection's identifier field.
    pub fn apply(&self, mut doc: Document, id_field: &str) -> Document {
        match self {
            Projection::Include { fields, include_id } => {
                let mut shaped = Document::new();
                if *include_id {
                    if let Some(id) = doc.get(id_field) {
                        shaped.insert(id_field.to_string(), id.clone());
                    }
                }
                for field in fields {
                    if let Some(value) = get_path(&doc, field) {
                        set_path(&mut shaped, field, value.clone());
                    }
                }
                shaped
            }
            Projection::Exclude(fields) => {
                for field in fields {
                    remove_path(&mut doc, field);
                }
                doc
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_include_keeps_id_by_default() {
        let d = doc(json!({"_id": 1, "name": "lamp", "price": 3, "meta": {"a": 1, "b": 2}}));
        let shaped = Projection::include(["name", "meta.b"]).apply(d, "_id");
        assert_eq!(
            serde_json::Value::Object(shaped),
            json!({"_id": 1, "name": "lamp", "meta": {"b": 2}})
        );
    }

    #[test]
    fn test_include_without_id() {
        let d = doc(json!({"_id": 1, "name": "lamp"}));
        let shaped = Projection::include(["name"]).without_id().apply(d, "_id");
        assert_eq!(serde_json::Value::Object(shaped), json!({"name": "lamp"}));
    }

    #[test]
    fn test_exclude_removes_fields() {
        let d = doc(json!({"_id": 1, "name": "lamp", "secret": "x"}));
        let shaped = Projection::exclude(["secret"]).apply(d, "_id");
        assert_eq!(serde_json::Value::Object(shaped), json!({"_id": 1, "name": "lamp"}));
    }
}
