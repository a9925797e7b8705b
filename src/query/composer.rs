//! Query composition: filter, sort, paging and projection into one plan.

use futures::TryStreamExt;

use crate::cancel::CancelSignal;
use crate::error::{RepositoryError, StoreError};
use crate::query::plan::{ListOptions, QueryPlan};
use crate::store::{CollectionHandle, Document, DocumentStore, DocumentStream};

/// Builds and executes query plans against one collection.
///
/// Composition order is fixed: start from the filter (or match-all), apply
/// the combined sort, then skip and limit, and shape results with the
/// projection last. A handle whose collection does not exist yields an empty
/// result without touching the store.
///
/// Store failures surface as [`RepositoryError::Query`], which keeps the
/// original error as its source and reports that error's kind.
pub struct QueryComposer<'a> {
    store: &'a dyn DocumentStore,
    handle: &'a CollectionHandle,
    cancel: &'a CancelSignal,
    id_field: &'a str,
}

impl<'a> QueryComposer<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        handle: &'a CollectionHandle,
        cancel: &'a CancelSignal,
        id_field: &'a str,
    ) -> Self {
        Self {
            store,
            handle,
            cancel,
            id_field,
        }
    }

    /// Translates caller options into a plan without executing it.
    pub fn plan(&self, options: &ListOptions) -> Result<QueryPlan, RepositoryError> {
        QueryPlan::build(options, self.id_field)
    }

    /// Executes the composed query and collects every resulting document.
    pub async fn compose(&self, options: &ListOptions) -> Result<Vec<Document>, RepositoryError> {
        if !self.handle.exists() {
            tracing::debug!(
                collection = self.handle.name(),
                "Collection does not exist, returning empty result"
            );
            return Ok(Vec::new());
        }
        let plan = self.plan(options)?;

        let collection = self.handle.name();
        tracing::debug!(
            collection,
            sort_keys = plan.sort.len(),
            paged = plan.paging.is_some(),
            projected = plan.projection.is_some(),
            "Executing composed query"
        );

        self.cancel
            .guard(async {
                let stream = self.store.find(collection, &plan).await?;
                let docs: Vec<Document> = stream.try_collect().await?;
                Ok::<_, StoreError>(docs)
            })
            .await
            .map_err(|err| self.wrap(err))
    }

    /// Executes the composed query and returns the documents as a stream.
    ///
    /// The cancel signal covers opening the cursor; once the stream is
    /// returned the caller controls consumption and may drop it at any time.
    pub async fn stream(&self, options: &ListOptions) -> Result<DocumentStream<'a>, RepositoryError> {
        if !self.handle.exists() {
            return Ok(Box::pin(futures::stream::empty()));
        }
        let plan = self.plan(options)?;

        let store = self.store;
        let collection = self.handle.name();
        self.cancel
            .guard(async move { store.find(collection, &plan).await })
            .await
            .map_err(|err| self.wrap(err))
    }

    /// Attaches the collection name to a store failure.
    pub(crate) fn wrap(&self, err: RepositoryError) -> RepositoryError {
        match err {
            RepositoryError::Store(source) => RepositoryError::Query {
                collection: self.handle.name().to_string(),
                source,
            },
            other => other,
        }
    }
}
