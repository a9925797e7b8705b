//! Query composition for list operations.
//!
//! A list call is described by [`ListOptions`] (filter, sort keys, paging,
//! projection). The [`QueryComposer`] turns those options into a fresh
//! [`QueryPlan`] and hands it to the store, which applies the parts in a
//! fixed order:
//!
//! 1. filter (match-all when absent)
//! 2. sort, keys combined in input order, empty keys ignored
//! 3. skip, then limit
//! 4. projection
//!
//! # Usage
//!
//! ```ignore
//! use docrepo::query::{ListOptions, SortField};
//! use docrepo::filter;
//!
//! let options = ListOptions::new()
//!     .filter(filter!(status = "active"))
//!     .sort_by(SortField::desc("created_at"))
//!     .skip(20)
//!     .limit(10);
//!
//! let products = repo.list(&options).await?;
//! ```

mod composer;
mod paging;
mod plan;
mod projection;
mod sort;

pub use composer::QueryComposer;
pub use paging::Paging;
pub use plan::{ListOptions, QueryPlan, DEFAULT_DELIVERY_LIMIT};
pub use projection::Projection;
pub use sort::{active_sort, compare_documents, SortDirection, SortField};
