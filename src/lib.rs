//! docrepo - typed repositories over a document database.
//!
//! A repository binds one collection to one serde type. It offers counts,
//! filtered/sorted/paged/projected listing, streaming, lookup by id, the
//! usual mutators with post-commit events, proximity queries and file
//! storage in a bucket named after the collection.
//!
//! Stores sit behind the [`store::DocumentStore`] and [`store::BlobStore`]
//! traits. An in-process backend is always available; the MongoDB backend
//! is enabled with the `mongodb` feature.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::prelude::*;
//!
//! let connector = Connector::in_memory("shop");
//! connector.ensure_collection("products").await?;
//!
//! let products = Repository::<Product>::open(&connector, "products").await?;
//! products.add(&product).await?;
//!
//! let cheapest = products
//!     .list(&ListOptions::new().sort_by(SortField::asc("price")).limit(5))
//!     .await?;
//! ```

pub mod cancel;
pub mod config;
pub mod context;
pub mod di;
pub mod error;
pub mod models;
pub mod query;
pub mod repositories;
pub mod store;

// Re-export FromRef at crate root for di-macros generated code
pub use di::FromRef;

pub use error::{ErrorKind, RepositoryError, StoreError};

/// The types most callers need.
pub mod prelude {
    pub use crate::cancel::{cancel_pair, CancelHandle, CancelSignal};
    pub use crate::config::ConnectionSettings;
    pub use crate::context::{Backends, Connector};
    pub use crate::error::{ErrorKind, RepositoryError};
    pub use crate::filter;
    pub use crate::models::{Entity, GeoPoint, Located};
    pub use crate::query::{ListOptions, Paging, Projection, SortDirection, SortField};
    pub use crate::repositories::{
        BlobRepository, GeoRepository, NearQuery, ReadRepository, Repository, RepositoryEvent,
    };
    pub use crate::store::{BlobId, Document, Filter, UploadOptions};
}
