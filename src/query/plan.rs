//! List options and the composed query plan.

use crate::error::RepositoryError;
use crate::query::paging::Paging;
use crate::query::projection::Projection;
use crate::query::sort::{active_sort, SortField};
use crate::store::Filter;

/// Limit used by [`ListOptions::default_delivery`].
pub const DEFAULT_DELIVERY_LIMIT: u64 = 100;

/// Optional parameters for a list call.
///
/// Every field is optional; `ListOptions::default()` returns the entire
/// collection in the store's natural order.
///
/// # Example
///
/// ```ignore
/// let options = ListOptions::new()
///     .filter(Filter::eq("status", "active"))
///     .sort_by(SortField::desc("created_at"))
///     .skip(20)
///     .limit(10);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub filter: Option<Filter>,
    pub paging: Option<Paging>,
    pub sort: Vec<SortField>,
    pub projection: Option<Projection>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// First-page delivery: skip 0, take `limit`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOptions` if `limit` is zero.
    pub fn delivery(limit: u64) -> Result<Self, RepositoryError> {
        if limit == 0 {
            return Err(RepositoryError::InvalidOptions(
                "delivery limit must be positive".to_string(),
            ));
        }
        Ok(Self::new().paging(Paging::new(Some(0), Some(limit))))
    }

    /// First-page delivery with [`DEFAULT_DELIVERY_LIMIT`].
    pub fn default_delivery() -> Self {
        Self::new().paging(Paging::new(Some(0), Some(DEFAULT_DELIVERY_LIMIT)))
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn paging(mut self, paging: Paging) -> Self {
        self.paging = Some(paging);
        self
    }

    /// Sets the skip, keeping any limit.
    pub fn skip(mut self, skip: u64) -> Self {
        self.paging.get_or_insert_with(Paging::default).skip = Some(skip);
        self
    }

    /// Sets the limit, keeping any skip.
    pub fn limit(mut self, limit: u64) -> Self {
        self.paging.get_or_insert_with(Paging::default).limit = Some(limit);
        self
    }

    /// Appends a sort key after any existing ones.
    pub fn sort_by(mut self, field: SortField) -> Self {
        self.sort.push(field);
        self
    }

    pub fn sort(mut self, fields: impl IntoIterator<Item = SortField>) -> Self {
        self.sort.extend(fields);
        self
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }
}

/// A single executable query, built fresh for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// `Filter::All` when the caller supplied none.
    pub filter: Filter,
    /// Non-empty sort entries in input order; empty means natural order.
    pub sort: Vec<SortField>,
    /// `None` returns every match in one batch.
    pub paging: Option<Paging>,
    pub projection: Option<Projection>,
    /// Identifier field of the collection's documents.
    pub id_field: String,
}

impl QueryPlan {
    /// Builds a plan from caller options.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOptions` for a zero limit.
    pub fn build(options: &ListOptions, id_field: &str) -> Result<Self, RepositoryError> {
        if let Some(Paging { limit: Some(0), .. }) = options.paging {
            return Err(RepositoryError::InvalidOptions(
                "limit must be positive".to_string(),
            ));
        }

        Ok(Self {
            filter: options.filter.clone().unwrap_or_default(),
            sort: active_sort(&options.sort),
            paging: options.paging,
            projection: options.projection.clone(),
            id_field: id_field.to_string(),
        })
    }

    /// A plan matching everything with no order, paging or projection.
    pub fn all(id_field: &str) -> Self {
        Self {
            filter: Filter::All,
            sort: Vec::new(),
            paging: None,
            projection: None,
            id_field: id_field.to_string(),
        }
    }
}
