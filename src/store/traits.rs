//! Core traits for document store abstraction.
//!
//! This module defines the capability set a backend must provide:
//!
//! - [`DocumentStore`] - Named collections of schemaless documents
//! - [`BlobStore`] - Get-or-create named buckets for binary objects
//! - [`BlobBucket`] - Upload/download/rename/delete inside one bucket

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::StoreError;
use crate::query::QueryPlan;
use crate::store::blob::{BlobId, BlobInfo, UploadOptions};
use crate::store::document::{Document, DocumentStream};
use crate::store::filter::Filter;

/// Shared handle to a document store.
pub type SharedStore = Arc<dyn DocumentStore>;

/// Shared handle to a blob store.
pub type SharedBlobStore = Arc<dyn BlobStore>;

/// Write options for inserts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOptions {
    /// Skip the store's document validation rules.
    pub bypass_validation: bool,
}

/// Executes document operations against a database.
///
/// This is the core trait all document backends implement. Collections are
/// addressed by name. The repository layer only creates collections through
/// [`create_collection`](DocumentStore::create_collection); whether a write
/// to a missing collection creates it is backend-defined.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns true if the named collection exists.
    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError>;

    /// Creates the named collection if it does not exist yet.
    async fn create_collection(&self, collection: &str) -> Result<(), StoreError>;

    /// Counts documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Returns true if at least one document matches `filter`.
    async fn any(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError>;

    /// Executes a composed query plan and returns a stream of documents.
    ///
    /// Backends apply the plan's filter, then its sort, then skip and
    /// limit, and shape each document with the projection last. With no
    /// sort and a [`Filter::proximity`] constraint, matches come
    /// nearest-first.
    async fn find(
        &self,
        collection: &str,
        plan: &QueryPlan,
    ) -> Result<DocumentStream<'_>, StoreError>;

    /// Inserts one document.
    async fn insert_one(
        &self,
        collection: &str,
        doc: Document,
        options: InsertOptions,
    ) -> Result<(), StoreError>;

    /// Inserts a batch of documents.
    async fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
        options: InsertOptions,
    ) -> Result<(), StoreError>;

    /// Replaces the first document matching `filter`. Returns the number of
    /// matched documents (0 or 1).
    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<u64, StoreError>;

    /// Sets a single field on the first document matching `filter`.
    /// Returns the number of matched documents (0 or 1).
    async fn set_field(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
        value: JsonValue,
    ) -> Result<u64, StoreError>;

    /// Atomically finds and deletes the first document matching `filter`.
    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;

    /// Drops the named collection. Dropping a missing collection succeeds.
    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError>;
}

/// Provides named buckets for binary objects.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Gets or creates the named bucket. `None` if the store cannot
    /// provide one.
    async fn bucket(&self, name: &str) -> Result<Option<Arc<dyn BlobBucket>>, StoreError>;
}

/// Binary object operations within one bucket.
#[async_trait]
pub trait BlobBucket: Send + Sync {
    /// Name of this bucket.
    fn name(&self) -> &str;

    /// Stores `bytes` under `filename` and returns the generated id.
    async fn upload(
        &self,
        filename: &str,
        bytes: &[u8],
        options: UploadOptions,
    ) -> Result<BlobId, StoreError>;

    /// Reads a whole object. Fails with `NotFound` for an unknown id.
    async fn download(&self, id: &BlobId) -> Result<Vec<u8>, StoreError>;

    /// Metadata of the most recent upload under `filename`.
    async fn latest(&self, filename: &str) -> Result<Option<BlobInfo>, StoreError>;

    async fn delete(&self, id: &BlobId) -> Result<(), StoreError>;

    async fn rename(&self, id: &BlobId, new_filename: &str) -> Result<(), StoreError>;
}
