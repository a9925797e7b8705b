//! Named bindings to backing collections.

use std::sync::Arc;

use crate::error::StoreError;
use crate::store::traits::DocumentStore;

/// A named binding to a store collection.
///
/// Whether the collection exists is snapshotted once, when the handle is
/// opened, and is not re-checked per operation. Operations on a handle whose
/// collection did not exist short-circuit to empty or no-op results; call
/// [`refresh`](CollectionHandle::refresh) to take a new snapshot.
#[derive(Debug, Clone)]
pub struct CollectionHandle {
    name: Arc<str>,
    exists: bool,
}

impl CollectionHandle {
    /// Opens a handle, recording whether the collection exists right now.
    pub async fn open(store: &dyn DocumentStore, name: &str) -> Result<Self, StoreError> {
        let exists = store.collection_exists(name).await?;
        tracing::debug!(collection = name, exists, "Opened collection handle");
        Ok(Self {
            name: Arc::from(name),
            exists,
        })
    }

    /// Creates a handle with a known existence flag.
    pub fn new(name: &str, exists: bool) -> Self {
        Self {
            name: Arc::from(name),
            exists,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The existence snapshot taken when the handle was opened.
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Records that the collection was dropped through this handle.
    pub(crate) fn mark_dropped(&mut self) {
        self.exists = false;
    }

    /// Re-checks existence against the store and returns the new snapshot.
    pub async fn refresh(&mut self, store: &dyn DocumentStore) -> Result<bool, StoreError> {
        self.exists = store.collection_exists(&self.name).await?;
        Ok(self.exists)
    }
}
