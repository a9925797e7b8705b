//! Connector providing the dependency injection root.

use std::sync::Arc;

use crate::config::ConnectionSettings;
use crate::di::{Context, FromContext};
use crate::error::RepositoryError;
use crate::store::backends::memory::MemoryStore;
use crate::store::{SharedBlobStore, SharedStore};

/// Root context shared by every repository.
///
/// The Connector holds the document store, the blob store and the settings
/// they were resolved from. `#[derive(Context)]` generates `FromRef`
/// implementations for each field, so repositories resolve their
/// collaborators at compile time. Settings are resolved once, here.
#[derive(Context, Clone)]
pub struct Connector {
    /// Document store for all collections.
    pub store: SharedStore,
    /// Blob store; buckets are named after collections.
    pub blobs: SharedBlobStore,
    /// Settings the stores were built from.
    pub settings: Arc<ConnectionSettings>,
}

impl Connector {
    /// Creates a connector from already-built stores.
    pub fn new(store: SharedStore, blobs: SharedBlobStore, settings: ConnectionSettings) -> Self {
        Self {
            store,
            blobs,
            settings: Arc::new(settings),
        }
    }

    /// A connector backed by a fresh in-process store.
    pub fn in_memory(db_name: &str) -> Self {
        let store = MemoryStore::new();
        Self::new(
            Arc::new(store.clone()),
            Arc::new(store),
            ConnectionSettings::new(db_name),
        )
    }

    /// Connects to MongoDB with the given settings.
    #[cfg(feature = "mongodb")]
    pub async fn mongodb(settings: ConnectionSettings) -> Result<Self, RepositoryError> {
        use crate::store::backends::mongodb::MongoStore;

        let store = MongoStore::connect(&settings).await?;
        Ok(Self::new(
            Arc::new(store.clone()),
            Arc::new(store),
            settings,
        ))
    }

    /// Resolves settings with [`ConnectionSettings::load`] and connects.
    #[cfg(feature = "mongodb")]
    pub async fn from_config() -> Result<Self, RepositoryError> {
        let settings = ConnectionSettings::load()?;
        Self::mongodb(settings).await
    }

    /// Database name the connector was built for.
    pub fn db_name(&self) -> &str {
        &self.settings.db_name
    }

    /// Creates the named collection if it does not exist.
    ///
    /// Repositories opened afterwards see the collection; repositories
    /// opened before keep their snapshot until
    /// [`refresh_existence`](crate::repositories::ReadRepository::refresh_existence).
    pub async fn ensure_collection(&self, name: &str) -> Result<(), RepositoryError> {
        self.store.create_collection(name).await?;
        tracing::info!(collection = %name, "Ensured collection exists");
        Ok(())
    }
}

/// Store handles a repository resolves from a [`Connector`].
#[derive(FromContext, Clone)]
#[from_context(Context = "Connector")]
pub struct Backends {
    pub store: SharedStore,
    pub blobs: SharedBlobStore,
}
