//! Error types for the store boundary and the repository layer.
//!
//! Every failure a caller can see maps onto one [`ErrorKind`], whichever
//! path produced it (query composition, counts, mutations or blobs).

use thiserror::Error;

/// Broad failure classes shared by every repository operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The store could not be reached or timed out.
    StoreUnavailable,
    /// The store rejected a write (duplicate key, validation rule).
    ConstraintViolation,
    /// The addressed document or blob does not exist.
    NotFound,
    /// The caller's cancel signal fired before the operation finished.
    Cancelled,
    /// The caller supplied options that cannot be executed.
    InvalidInput,
    /// Anything else the store or the codec reported.
    Internal,
}

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore) or
/// [`BlobStore`](crate::store::BlobStore) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Backend(String),

    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

impl StoreError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable(_) => ErrorKind::StoreUnavailable,
            StoreError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Serialization(_) | StoreError::Backend(_) => ErrorKind::Internal,
            #[cfg(feature = "mongodb")]
            StoreError::Mongo(err) => crate::store::backends::mongodb::classify(err),
        }
    }
}

/// Application-level errors for repository operations.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A composed query failed inside the store. The original cause is kept
    /// as the source so [`kind`](RepositoryError::kind) stays precise.
    #[error("query on collection '{collection}' failed: {source}")]
    Query {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Id {id} matches {matches} documents in '{collection}'")]
    AmbiguousId {
        collection: String,
        id: String,
        matches: u64,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid query options: {0}")]
    InvalidOptions(String),

    #[error("Document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepositoryError {
    /// Classifies this error into the shared [`ErrorKind`] hierarchy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::Store(err) | RepositoryError::Query { source: err, .. } => err.kind(),
            RepositoryError::NotFound { .. } => ErrorKind::NotFound,
            RepositoryError::AmbiguousId { .. } => ErrorKind::Internal,
            RepositoryError::Cancelled => ErrorKind::Cancelled,
            RepositoryError::InvalidOptions(_) | RepositoryError::Config(_) => {
                ErrorKind::InvalidInput
            }
            RepositoryError::Serialization(_) | RepositoryError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the operation was interrupted by its cancel signal.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
