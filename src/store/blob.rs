//! Binary object identifiers and metadata.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::document::Document;

/// Store-generated identifier of an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options for an upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOptions {
    /// Arbitrary metadata stored alongside the object.
    pub metadata: Option<Document>,
    /// Chunk size in bytes, for backends that store objects in chunks.
    pub chunk_size_bytes: Option<u32>,
}

impl UploadOptions {
    pub fn with_metadata(mut self, metadata: Document) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_chunk_size(mut self, bytes: u32) -> Self {
        self.chunk_size_bytes = Some(bytes);
        self
    }
}

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobInfo {
    pub id: BlobId,
    pub filename: String,
    /// Object size in bytes.
    pub length: u64,
    pub upload_date: DateTime<Utc>,
    pub metadata: Option<Document>,
}
