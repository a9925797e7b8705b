//! Read capability shared by every repository.

use std::marker::PhantomData;
use std::pin::Pin;

use futures::{Stream, StreamExt, TryStreamExt};
use serde_json::Value as JsonValue;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::cancel::CancelSignal;
use crate::context::{Backends, Connector};
use crate::di::FromRef;
use crate::error::RepositoryError;
use crate::models::Entity;
use crate::query::{ListOptions, QueryComposer};
use crate::store::{
    from_document, CollectionHandle, Document, Filter, SharedBlobStore, SharedStore,
};

/// A lazily consumed sequence of typed results.
pub type EntityStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T, RepositoryError>> + Send + 'a>>;

/// Filter matching the document whose id equals `id`.
pub(crate) fn id_filter<T: Entity>(id: &T::Id) -> Result<Filter, RepositoryError> {
    Ok(Filter::Eq(
        T::ID_FIELD.to_string(),
        serde_json::to_value(id)?,
    ))
}

fn id_label(filter: &Filter) -> String {
    match filter {
        Filter::Eq(_, JsonValue::String(id)) => id.clone(),
        Filter::Eq(_, other) => other.to_string(),
        other => format!("{other:?}"),
    }
}

/// Read-only access to one collection of `T`.
///
/// Whether the collection exists is snapshotted when the repository is
/// opened. While the snapshot says it does not exist, `count` is 0,
/// `exists` is false, `list` is empty and `get_by_id` is `None`, all without
/// a store round trip. Use [`refresh_existence`](Self::refresh_existence)
/// to take a new snapshot.
///
/// Every store call is raced against the repository's [`CancelSignal`].
///
/// # Example
///
/// ```ignore
/// let products = ReadRepository::<Product>::open(&connector, "products").await?;
/// let cheap = products
///     .list(&ListOptions::new().filter(Filter::lt("price", 10)))
///     .await?;
/// ```
#[derive(Clone)]
pub struct ReadRepository<T: Entity> {
    pub(super) store: SharedStore,
    pub(super) blobs: SharedBlobStore,
    pub(super) handle: CollectionHandle,
    pub(super) cancel: CancelSignal,
    marker: PhantomData<fn() -> T>,
}

impl<T: Entity> ReadRepository<T> {
    /// Opens a repository bound to `collection`.
    pub async fn open(connector: &Connector, collection: &str) -> Result<Self, RepositoryError> {
        Self::from_backends(Backends::from_ref(connector), collection).await
    }

    /// Opens a repository from explicit store handles.
    pub async fn from_backends(
        backends: Backends,
        collection: &str,
    ) -> Result<Self, RepositoryError> {
        let handle = CollectionHandle::open(backends.store.as_ref(), collection).await?;
        Ok(Self {
            store: backends.store,
            blobs: backends.blobs,
            handle,
            cancel: CancelSignal::never(),
            marker: PhantomData,
        })
    }

    /// Binds a cancel signal to every subsequent call.
    pub fn with_cancellation(mut self, signal: CancelSignal) -> Self {
        self.cancel = signal;
        self
    }

    pub fn collection_name(&self) -> &str {
        self.handle.name()
    }

    /// The existence snapshot taken when the repository was opened.
    pub fn collection_exists(&self) -> bool {
        self.handle.exists()
    }

    /// Re-checks whether the collection exists and keeps the new snapshot.
    pub async fn refresh_existence(&mut self) -> Result<bool, RepositoryError> {
        let exists = self
            .cancel
            .guard(self.handle.refresh(self.store.as_ref()))
            .await?;
        tracing::debug!(collection = %self.handle.name(), exists, "Refreshed existence");
        Ok(exists)
    }

    /// Counts documents matching `filter`.
    pub async fn count(&self, filter: &Filter) -> Result<u64, RepositoryError> {
        if !self.handle.exists() {
            return Ok(0);
        }
        tracing::debug!(collection = %self.handle.name(), "Counting documents");
        self.cancel
            .guard(self.store.count(self.handle.name(), filter))
            .await
    }

    /// Returns true if at least one document matches `filter`.
    pub async fn exists(&self, filter: &Filter) -> Result<bool, RepositoryError> {
        if !self.handle.exists() {
            return Ok(false);
        }
        self.cancel
            .guard(self.store.any(self.handle.name(), filter))
            .await
    }

    pub(super) fn composer(&self) -> QueryComposer<'_> {
        QueryComposer::new(self.store.as_ref(), &self.handle, &self.cancel, T::ID_FIELD)
    }

    /// Lists typed documents. `ListOptions::default()` returns the whole
    /// collection.
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<T>, RepositoryError> {
        self.composer()
            .compose(options)
            .await?
            .into_iter()
            .map(|doc| from_document(doc).map_err(RepositoryError::from))
            .collect()
    }

    /// Lists raw documents, for projections that do not fit `T`.
    pub async fn list_documents(
        &self,
        options: &ListOptions,
    ) -> Result<Vec<Document>, RepositoryError> {
        self.composer().compose(options).await
    }

    /// Streams typed documents for the same composed query as [`list`](Self::list).
    ///
    /// The cancel signal covers opening the result set; dropping the stream
    /// stops consumption.
    pub async fn stream(&self, options: &ListOptions) -> Result<EntityStream<'_, T>, RepositoryError> {
        let docs = self.composer().stream(options).await?;
        let collection = self.handle.name().to_string();
        Ok(Box::pin(docs.map(move |item| {
            item.map_err(|source| RepositoryError::Query {
                collection: collection.clone(),
                source,
            })
            .and_then(|doc| from_document::<T>(doc).map_err(RepositoryError::from))
        })))
    }

    /// Fetches the single document whose id equals `id`.
    ///
    /// Returns `Ok(None)` when the collection does not exist.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing matches, `AmbiguousId` if several documents
    /// share the id.
    pub async fn get_by_id(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        if !self.handle.exists() {
            tracing::debug!(collection = %self.handle.name(), "Collection missing, no document");
            return Ok(None);
        }

        let filter = id_filter::<T>(id)?;
        let options = ListOptions::new().filter(filter.clone()).limit(2);
        let mut docs = self.composer().compose(&options).await?;
        match docs.len() {
            0 => Err(RepositoryError::NotFound {
                collection: self.handle.name().to_string(),
                id: id_label(&filter),
            }),
            1 => Ok(Some(from_document(docs.remove(0))?)),
            _ => {
                let matches = self.count(&filter).await?;
                tracing::warn!(
                    collection = %self.handle.name(),
                    id = %id_label(&filter),
                    matches,
                    "Id is not unique"
                );
                Err(RepositoryError::AmbiguousId {
                    collection: self.handle.name().to_string(),
                    id: id_label(&filter),
                    matches,
                })
            }
        }
    }

    /// Writes every document as one JSON object per line.
    ///
    /// Returns the number of documents written; a missing collection writes
    /// nothing.
    pub async fn export_json_lines<W>(&self, writer: &mut W) -> Result<u64, RepositoryError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        if !self.handle.exists() {
            return Ok(0);
        }

        let composer = self.composer();
        let mut docs = composer.stream(&ListOptions::default()).await?;
        let mut written = 0;
        while let Some(doc) = self
            .cancel
            .guard(docs.try_next())
            .await
            .map_err(|err| composer.wrap(err))?
        {
            let mut line = serde_json::to_vec(&doc)?;
            line.push(b'\n');
            self.cancel.guard(writer.write_all(&line)).await?;
            written += 1;
        }
        self.cancel.guard(writer.flush()).await?;

        tracing::info!(collection = %self.handle.name(), documents = written, "Exported collection");
        Ok(written)
    }
}
