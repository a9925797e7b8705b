//! Multi-field sort orders.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::store::{compare_values, get_path, Document};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// One `(field, direction)` entry of a sort order.
///
/// An entry with an empty field name is *empty* and never reaches a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortField {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Ascending)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Descending)
    }

    pub fn is_empty(&self) -> bool {
        self.field.is_empty()
    }
}

/// Drops empty entries, keeping the input order.
///
/// The first remaining entry is the primary key; the rest break ties in order.
pub fn active_sort(fields: &[SortField]) -> Vec<SortField> {
    fields.iter().filter(|f| !f.is_empty()).cloned().collect()
}

/// Compares two documents under a combined sort order.
///
/// An empty order compares everything equal, so a stable sort keeps the
/// store's natural order.
pub fn compare_documents(order: &[SortField], a: &Document, b: &Document) -> Ordering {
    order.iter().fold(Ordering::Equal, |acc, key| {
        acc.then_with(|| {
            let ord = compare_values(get_path(a, &key.field), get_path(b, &key.field));
            match key.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_active_sort_drops_empty_entries_in_order() {
        let fields = vec![
            SortField::desc("a"),
            SortField::asc(""),
            SortField::asc("b"),
        ];
        assert_eq!(active_sort(&fields), vec![SortField::desc("a"), SortField::asc("b")]);
    }

    #[test]
    fn test_default_direction_is_ascending() {
        let field: SortField = serde_json::from_value(json!({"field": "name"})).unwrap();
        assert_eq!(field.direction, SortDirection::Ascending);
    }

    #[test]
    fn test_compare_documents_primary_then_tiebreak() {
        let order = vec![SortField::desc("a"), SortField::asc("b")];
        let x = doc(json!({"a": 2, "b": 9}));
        let y = doc(json!({"a": 1, "b": 0}));
        let z = doc(json!({"a": 2, "b": 1}));

        assert_eq!(compare_documents(&order, &x, &y), Ordering::Less);
        assert_eq!(compare_documents(&order, &z, &x), Ordering::Less);
        assert_eq!(compare_documents(&[], &x, &y), Ordering::Equal);
    }
}
