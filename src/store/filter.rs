//! Backend-neutral filter predicates.
//!
//! A [`Filter`] is a small predicate tree over document fields. Backends
//! either translate it into their native query language (see the MongoDB
//! backend) or evaluate it in-process with [`Filter::matches`].

use std::ops::{BitAnd, BitOr, Not};

use serde_json::Value as JsonValue;

use crate::models::GeoPoint;
use crate::store::document::{compare_values, get_path, values_equal, Document};

/// A predicate over documents.
///
/// Field names may be dotted paths into nested objects.
///
/// # Example
///
/// ```ignore
/// let filter = Filter::eq("status", "active") & Filter::gte("stock", 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Filter {
    /// Matches every document.
    #[default]
    All,
    Eq(String, JsonValue),
    Ne(String, JsonValue),
    Gt(String, JsonValue),
    Gte(String, JsonValue),
    Lt(String, JsonValue),
    Lte(String, JsonValue),
    /// Field equals any of the values.
    In(String, Vec<JsonValue>),
    /// Field presence (`true`) or absence (`false`).
    Exists(String, bool),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Field holds a [`GeoPoint`] within `max_distance_meters` of `center`.
    Near {
        field: String,
        center: GeoPoint,
        max_distance_meters: f64,
    },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Ne(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Gt(field.into(), value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Gte(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Lt(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Lte(field.into(), value.into())
    }

    pub fn is_in<V: Into<JsonValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn exists(field: impl Into<String>, present: bool) -> Self {
        Filter::Exists(field.into(), present)
    }

    pub fn near(field: impl Into<String>, center: GeoPoint, max_distance_meters: f64) -> Self {
        Filter::Near {
            field: field.into(),
            center,
            max_distance_meters,
        }
    }

    /// Conjunction, flattening nested `And`s and dropping `All`.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (l, r) => Filter::And(vec![l, r]),
        }
    }

    /// Disjunction. `All` absorbs the other side.
    pub fn or(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, _) | (_, Filter::All) => Filter::All,
            (Filter::Or(mut left), Filter::Or(right)) => {
                left.extend(right);
                Filter::Or(left)
            }
            (Filter::Or(mut left), f) => {
                left.push(f);
                Filter::Or(left)
            }
            (l, r) => Filter::Or(vec![l, r]),
        }
    }

    /// Returns true if this filter matches everything.
    pub fn is_all(&self) -> bool {
        match self {
            Filter::All => true,
            Filter::And(parts) => parts.iter().all(Filter::is_all),
            _ => false,
        }
    }

    /// The proximity constraint results can be ranked by: a top-level
    /// `Near`, or one directly inside a top-level `And`.
    pub fn proximity(&self) -> Option<(&str, &GeoPoint)> {
        fn near(filter: &Filter) -> Option<(&str, &GeoPoint)> {
            match filter {
                Filter::Near { field, center, .. } => Some((field.as_str(), center)),
                _ => None,
            }
        }
        match self {
            Filter::And(parts) => parts.iter().find_map(near),
            other => near(other),
        }
    }

    /// Evaluates the predicate against a document.
    ///
    /// Equality against an array field matches if any element is equal,
    /// and `Eq(field, null)` matches documents missing the field.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => field_equals(get_path(doc, field), value),
            Filter::Ne(field, value) => !field_equals(get_path(doc, field), value),
            Filter::Gt(field, value) => compare(doc, field, value, |o| o.is_gt()),
            Filter::Gte(field, value) => compare(doc, field, value, |o| o.is_ge()),
            Filter::Lt(field, value) => compare(doc, field, value, |o| o.is_lt()),
            Filter::Lte(field, value) => compare(doc, field, value, |o| o.is_le()),
            Filter::In(field, values) => {
                let actual = get_path(doc, field);
                values.iter().any(|v| field_equals(actual, v))
            }
            Filter::Exists(field, present) => get_path(doc, field).is_some() == *present,
            Filter::And(parts) => parts.iter().all(|f| f.matches(doc)),
            Filter::Or(parts) => parts.iter().any(|f| f.matches(doc)),
            Filter::Not(inner) => !inner.matches(doc),
            Filter::Near {
                field,
                center,
                max_distance_meters,
            } => get_path(doc, field)
                .and_then(|v| serde_json::from_value::<GeoPoint>(v.clone()).ok())
                .is_some_and(|point| point.distance_meters(center) <= *max_distance_meters),
        }
    }
}

fn field_equals(actual: Option<&JsonValue>, expected: &JsonValue) -> bool {
    match actual {
        None => expected.is_null(),
        Some(JsonValue::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

/// Ordered comparison; only values of the same JSON type are comparable.
fn compare(
    doc: &Document,
    field: &str,
    expected: &JsonValue,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    match get_path(doc, field) {
        Some(actual) if same_kind(actual, expected) => {
            accept(compare_values(Some(actual), Some(expected)))
        }
        _ => false,
    }
}

fn same_kind(a: &JsonValue, b: &JsonValue) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        self.and(rhs)
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        self.or(rhs)
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        match self {
            Filter::Not(inner) => *inner,
            other => Filter::Not(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: JsonValue) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_all_matches_everything() {
        assert!(Filter::All.matches(&doc(json!({}))));
        assert!(Filter::default().is_all());
    }

    #[test]
    fn test_eq_and_ne() {
        let d = doc(json!({"name": "lamp", "price": 10}));
        assert!(Filter::eq("name", "lamp").matches(&d));
        assert!(Filter::eq("price", 10.0).matches(&d));
        assert!(!Filter::eq("name", "desk").matches(&d));
        assert!(Filter::ne("name", "desk").matches(&d));
    }

    #[test]
    fn test_eq_null_matches_missing_field() {
        let d = doc(json!({"name": "lamp"}));
        assert!(Filter::eq("color", JsonValue::Null).matches(&d));
        assert!(!Filter::eq("name", JsonValue::Null).matches(&d));
    }

    #[test]
    fn test_eq_against_array_field() {
        let d = doc(json!({"tags": ["red", "sale"]}));
        assert!(Filter::eq("tags", "sale").matches(&d));
        assert!(!Filter::eq("tags", "blue").matches(&d));
        assert!(Filter::eq("tags", json!(["red", "sale"])).matches(&d));
    }

    #[test]
    fn test_range_requires_same_type() {
        let d = doc(json!({"price": 10, "name": "lamp"}));
        assert!(Filter::gt("price", 5).matches(&d));
        assert!(Filter::gte("price", 10).matches(&d));
        assert!(Filter::lt("price", 11).matches(&d));
        assert!(Filter::lte("price", 10).matches(&d));
        assert!(!Filter::gt("price", "5").matches(&d));
        assert!(!Filter::lt("missing", 100).matches(&d));
    }

    #[test]
    fn test_in_and_exists() {
        let d = doc(json!({"status": "open"}));
        assert!(Filter::is_in("status", ["open", "pending"]).matches(&d));
        assert!(!Filter::is_in("status", ["closed"]).matches(&d));
        assert!(Filter::exists("status", true).matches(&d));
        assert!(Filter::exists("owner", false).matches(&d));
    }

    #[test]
    fn test_and_flattens_and_drops_all() {
        let f = Filter::All & Filter::eq("a", 1);
        assert_eq!(f, Filter::eq("a", 1));

        let f = Filter::eq("a", 1) & Filter::eq("b", 2) & Filter::eq("c", 3);
        match f {
            Filter::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_or_and_not() {
        let d = doc(json!({"a": 1}));
        assert!((Filter::eq("a", 2) | Filter::eq("a", 1)).matches(&d));
        assert!(!(!Filter::eq("a", 1)).matches(&d));
        assert_eq!(!!Filter::eq("a", 1), Filter::eq("a", 1));
        assert!(!Filter::Or(vec![]).matches(&d));
    }

    #[test]
    fn test_proximity_found_at_top_level_only() {
        let center = GeoPoint::new(1.0, 2.0);
        let near = Filter::near("location", center, 500.0);
        assert_eq!(near.proximity(), Some(("location", &center)));

        let combined = Filter::eq("open", true).and(near.clone());
        assert_eq!(combined.proximity(), Some(("location", &center)));

        assert_eq!(Filter::Or(vec![near.clone(), Filter::All]).proximity(), None);
        assert_eq!(Filter::Not(Box::new(near)).proximity(), None);
        assert_eq!(Filter::eq("open", true).proximity(), None);
    }

    #[test]
    fn test_near() {
        let center = GeoPoint::new(52.5200, 13.4050);
        let close = doc(json!({"location": {"type": "Point", "coordinates": [13.4100, 52.5210]}}));
        let far = doc(json!({"location": {"type": "Point", "coordinates": [13.0645, 52.3906]}}));
        let none = doc(json!({"name": "x"}));

        let f = Filter::near("location", center, 1_000.0);
        assert!(f.matches(&close));
        assert!(!f.matches(&far));
        assert!(!f.matches(&none));
    }
}
