//! Mutating repository: reads plus add, update, delete and drop.

use std::ops::Deref;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::cancel::CancelSignal;
use crate::context::{Backends, Connector};
use crate::error::RepositoryError;
use crate::models::Entity;
use crate::repositories::events::{EventHub, ListenerId, RepositoryEvent};
use crate::repositories::read::{id_filter, ReadRepository};
use crate::store::{from_document, to_document, InsertOptions};

/// Inserts skip the store's document validation rules.
const INSERT_OPTIONS: InsertOptions = InsertOptions {
    bypass_validation: true,
};

/// Read and write access to one collection of `T`.
///
/// All read operations come from the wrapped [`ReadRepository`] through
/// `Deref`. Every mutator is a no-op when the existence snapshot says the
/// collection is missing: nothing is written and no event fires. Collections
/// are created with [`Connector::ensure_collection`].
///
/// Clones share listeners and subscribers.
///
/// # Example
///
/// ```ignore
/// let products = Repository::<Product>::open(&connector, "products").await?;
/// products.add_listener(|event| {
///     tracing::info!(?event, "product changed");
///     Ok(())
/// });
///
/// products.add(&lamp).await?;
/// let stored = products.get_by_id(&lamp.id).await?;
/// ```
#[derive(Clone)]
pub struct Repository<T: Entity> {
    reader: ReadRepository<T>,
    events: Arc<EventHub<T>>,
}

impl<T: Entity> Deref for Repository<T> {
    type Target = ReadRepository<T>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl<T: Entity> Repository<T> {
    /// Opens a repository bound to `collection`.
    pub async fn open(connector: &Connector, collection: &str) -> Result<Self, RepositoryError> {
        Ok(Self::from_reader(ReadRepository::open(connector, collection).await?))
    }

    /// Opens a repository from explicit store handles.
    pub async fn from_backends(
        backends: Backends,
        collection: &str,
    ) -> Result<Self, RepositoryError> {
        Ok(Self::from_reader(
            ReadRepository::from_backends(backends, collection).await?,
        ))
    }

    fn from_reader(reader: ReadRepository<T>) -> Self {
        Self {
            reader,
            events: Arc::new(EventHub::new()),
        }
    }

    /// Binds a cancel signal to every subsequent call.
    pub fn with_cancellation(mut self, signal: CancelSignal) -> Self {
        self.reader = self.reader.with_cancellation(signal);
        self
    }

    /// Re-checks whether the collection exists and keeps the new snapshot.
    pub async fn refresh_existence(&mut self) -> Result<bool, RepositoryError> {
        self.reader.refresh_existence().await
    }

    /// Registers a synchronous listener for committed writes.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&RepositoryEvent<T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.events.remove_listener(id)
    }

    /// Subscribes to committed writes through a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryEvent<T>> {
        self.events.subscribe()
    }

    fn skipped(&self, operation: &str) {
        tracing::debug!(
            collection = %self.reader.handle.name(),
            operation,
            "Collection missing, skipping write"
        );
    }

    /// Inserts one entity and emits [`RepositoryEvent::EntityAdded`].
    ///
    /// Returns false when the collection is missing.
    pub async fn add(&self, entity: &T) -> Result<bool, RepositoryError> {
        if !self.reader.handle.exists() {
            self.skipped("add");
            return Ok(false);
        }

        let doc = to_document(entity)?;
        self.reader
            .cancel
            .guard(
                self.reader
                    .store
                    .insert_one(self.reader.handle.name(), doc, INSERT_OPTIONS),
            )
            .await?;
        tracing::debug!(collection = %self.reader.handle.name(), "Added document");

        self.events.emit(RepositoryEvent::EntityAdded(entity.clone()));
        Ok(true)
    }

    /// Inserts a batch and emits one [`RepositoryEvent::EntitiesAdded`]
    /// carrying all of it.
    ///
    /// Returns the number of inserted entities: 0 for an empty batch or a
    /// missing collection, neither of which emits an event.
    pub async fn add_many(&self, entities: &[T]) -> Result<usize, RepositoryError> {
        if !self.reader.handle.exists() {
            self.skipped("add_many");
            return Ok(0);
        }
        if entities.is_empty() {
            return Ok(0);
        }

        let docs = entities
            .iter()
            .map(to_document)
            .collect::<Result<Vec<_>, _>>()?;
        self.reader
            .cancel
            .guard(
                self.reader
                    .store
                    .insert_many(self.reader.handle.name(), docs, INSERT_OPTIONS),
            )
            .await?;
        tracing::debug!(
            collection = %self.reader.handle.name(),
            count = entities.len(),
            "Added documents"
        );

        self.events
            .emit(RepositoryEvent::EntitiesAdded(entities.to_vec()));
        Ok(entities.len())
    }

    /// Atomically removes the entity with `id` and emits
    /// [`RepositoryEvent::EntityDeleted`] carrying it.
    ///
    /// Returns the removed entity, or `None` (and no event) when nothing
    /// matched or the collection is missing.
    pub async fn delete(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        if !self.reader.handle.exists() {
            self.skipped("delete");
            return Ok(None);
        }

        let filter = id_filter::<T>(id)?;
        let removed = self
            .reader
            .cancel
            .guard(
                self.reader
                    .store
                    .find_one_and_delete(self.reader.handle.name(), &filter),
            )
            .await?;
        let Some(doc) = removed else {
            tracing::debug!(collection = %self.reader.handle.name(), ?id, "Nothing to delete");
            return Ok(None);
        };

        let entity: T = from_document(doc)?;
        tracing::debug!(collection = %self.reader.handle.name(), ?id, "Deleted document");
        self.events
            .emit(RepositoryEvent::EntityDeleted(entity.clone()));
        Ok(Some(entity))
    }

    /// Replaces the stored document with the same id as `entity`.
    pub async fn update(&self, entity: &T) -> Result<bool, RepositoryError> {
        self.update_by_id(entity.id(), entity).await
    }

    /// Replaces the document with `id` by `entity`.
    ///
    /// Returns whether a document matched. A missing id is not an error.
    pub async fn update_by_id(&self, id: &T::Id, entity: &T) -> Result<bool, RepositoryError> {
        if !self.reader.handle.exists() {
            self.skipped("update");
            return Ok(false);
        }

        let filter = id_filter::<T>(id)?;
        let doc = to_document(entity)?;
        let matched = self
            .reader
            .cancel
            .guard(
                self.reader
                    .store
                    .replace_one(self.reader.handle.name(), &filter, doc),
            )
            .await?;
        tracing::debug!(collection = %self.reader.handle.name(), ?id, matched, "Replaced document");
        Ok(matched > 0)
    }

    /// Sets a single field on the document with `id`, leaving the rest
    /// untouched. `field` may be a dotted path.
    ///
    /// Returns whether a document matched.
    ///
    /// # Errors
    ///
    /// `InvalidOptions` when `field` names the id field.
    pub async fn update_field<V>(
        &self,
        id: &T::Id,
        field: &str,
        value: V,
    ) -> Result<bool, RepositoryError>
    where
        V: Serialize + Send,
    {
        if field == T::ID_FIELD {
            return Err(RepositoryError::InvalidOptions(format!(
                "the id field '{field}' cannot be updated"
            )));
        }
        if !self.reader.handle.exists() {
            self.skipped("update_field");
            return Ok(false);
        }

        let filter = id_filter::<T>(id)?;
        let value = serde_json::to_value(value)?;
        let matched = self
            .reader
            .cancel
            .guard(
                self.reader
                    .store
                    .set_field(self.reader.handle.name(), &filter, field, value),
            )
            .await?;
        tracing::debug!(collection = %self.reader.handle.name(), ?id, field, matched, "Set field");
        Ok(matched > 0)
    }

    /// Irreversibly removes the whole collection.
    ///
    /// Returns false when the collection was already missing, so calling it
    /// twice is safe.
    pub async fn drop_collection(&mut self) -> Result<bool, RepositoryError> {
        if !self.reader.handle.exists() {
            self.skipped("drop_collection");
            return Ok(false);
        }

        self.reader
            .cancel
            .guard(self.reader.store.drop_collection(self.reader.handle.name()))
            .await?;
        self.reader.handle.mark_dropped();
        tracing::info!(collection = %self.reader.handle.name(), "Dropped collection");
        Ok(true)
    }
}
