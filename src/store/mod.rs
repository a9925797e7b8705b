//! Document store abstraction for backend-agnostic database access.
//!
//! This module provides a trait-based abstraction over document databases,
//! so the repository layer works the same against MongoDB or the in-memory
//! store used by tests and examples.
//!
//! # Architecture
//!
//! - [`DocumentStore`] - Named collections of schemaless [`Document`]s
//! - [`BlobStore`] / [`BlobBucket`] - Binary objects grouped into buckets
//! - [`Filter`] - Backend-neutral predicates, translated or evaluated by
//!   each backend
//! - [`CollectionHandle`] - A collection name plus the existence snapshot
//!   taken when it was opened
//!
//! # Usage
//!
//! ```ignore
//! use docrepo::store::{backends::memory::MemoryStore, DocumentStore, Filter};
//!
//! let store = MemoryStore::new();
//! store.create_collection("products").await?;
//! let lamps = store.count("products", &Filter::eq("kind", "lamp")).await?;
//! ```

mod blob;
mod collection;
mod document;
mod filter;
mod macros;
mod traits;

pub mod backends;

pub use blob::{BlobId, BlobInfo, UploadOptions};
pub use collection::CollectionHandle;
pub use document::{
    compare_values, from_document, get_path, remove_path, set_path, to_document, values_equal,
    Document, DocumentStream,
};
pub use filter::Filter;
pub use traits::{
    BlobBucket, BlobStore, DocumentStore, InsertOptions, SharedBlobStore, SharedStore,
};

#[doc(inline)]
pub use crate::filter;
