//! In-process backend.
//!
//! Keeps every collection in a `Vec<Document>` behind a lock, evaluating
//! [`Filter`]s with [`Filter::matches`] and sorting with
//! [`compare_documents`]. Insertion order is the natural order, and sorting
//! is stable, so ties keep that order.
//!
//! The store mirrors the MongoDB behaviors the repository layer relies on:
//! `_id` is generated when absent and must be unique per collection, counts
//! on a missing collection are zero and dropping a missing collection
//! succeeds. Unlike MongoDB it never creates a collection on insert.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::store::backends::memory::MemoryStore;
//!
//! let store = MemoryStore::new();
//! store.create_collection("products").await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;

use crate::error::StoreError;
use crate::models::{generate_ulid, GeoPoint};
use crate::query::{compare_documents, QueryPlan};
use crate::store::blob::{BlobId, BlobInfo, UploadOptions};
use crate::store::document::{get_path, set_path, values_equal, Document, DocumentStream};
use crate::store::filter::Filter;
use crate::store::traits::{BlobBucket, BlobStore, DocumentStore, InsertOptions};

const ID_KEY: &str = "_id";

type Collections = HashMap<String, Vec<Document>>;

/// In-memory document and blob store.
///
/// Cheap to clone; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
    buckets: Arc<Mutex<HashMap<String, Arc<MemoryBucket>>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: while offline every call fails with
    /// [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, StoreError> {
        self.check_online()?;
        self.collections
            .read()
            .map_err(|_| StoreError::Backend("collection lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, StoreError> {
        self.check_online()?;
        self.collections
            .write()
            .map_err(|_| StoreError::Backend("collection lock poisoned".to_string()))
    }
}

fn missing_collection(collection: &str) -> StoreError {
    StoreError::NotFound(format!("collection '{collection}'"))
}

/// Assigns a ULID `_id` when the document has none.
fn ensure_id(mut doc: Document) -> Document {
    if !doc.contains_key(ID_KEY) {
        doc.insert(ID_KEY.to_string(), JsonValue::String(generate_ulid()));
    }
    doc
}

fn has_id(docs: &[Document], id: &JsonValue) -> bool {
    docs.iter()
        .any(|d| d.get(ID_KEY).is_some_and(|existing| values_equal(existing, id)))
}

fn duplicate_key(collection: &str, id: &JsonValue) -> StoreError {
    StoreError::ConstraintViolation(format!(
        "duplicate key in '{collection}': {ID_KEY} = {id}"
    ))
}

/// Meters from `center` to the point stored under `field`; documents
/// without a point sort last.
fn distance_from(doc: &Document, field: &str, center: &GeoPoint) -> f64 {
    get_path(doc, field)
        .and_then(|value| serde_json::from_value::<GeoPoint>(value.clone()).ok())
        .map_or(f64::INFINITY, |point| point.distance_meters(center))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.contains_key(collection))
    }

    async fn create_collection(&self, collection: &str) -> Result<(), StoreError> {
        self.write()?.entry(collection.to_string()).or_default();
        Ok(())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let collections = self.read()?;
        let count = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn any(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .is_some_and(|docs| docs.iter().any(|d| filter.matches(d))))
    }

    async fn find(
        &self,
        collection: &str,
        plan: &QueryPlan,
    ) -> Result<DocumentStream<'_>, StoreError> {
        let collections = self.read()?;
        let Some(docs) = collections.get(collection) else {
            return Ok(Box::pin(futures::stream::empty()));
        };

        let mut matched: Vec<Document> = docs
            .iter()
            .filter(|d| plan.filter.matches(d))
            .cloned()
            .collect();
        drop(collections);

        if !plan.sort.is_empty() {
            matched.sort_by(|a, b| compare_documents(&plan.sort, a, b));
        } else if let Some((field, center)) = plan.filter.proximity() {
            matched.sort_by(|a, b| {
                distance_from(a, field, center).total_cmp(&distance_from(b, field, center))
            });
        }

        let windowed: Vec<Document> = match plan.paging {
            Some(paging) => paging.apply(matched.into_iter()).collect(),
            None => matched,
        };

        let shaped: Vec<Result<Document, StoreError>> = windowed
            .into_iter()
            .map(|doc| match &plan.projection {
                Some(projection) => Ok(projection.apply(doc, &plan.id_field)),
                None => Ok(doc),
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(shaped)))
    }

    async fn insert_one(
        &self,
        collection: &str,
        doc: Document,
        _options: InsertOptions,
    ) -> Result<(), StoreError> {
        let mut collections = self.write()?;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;

        let doc = ensure_id(doc);
        if let Some(id) = doc.get(ID_KEY) {
            if has_id(docs, id) {
                return Err(duplicate_key(collection, id));
            }
        }
        docs.push(doc);
        Ok(())
    }

    async fn insert_many(
        &self,
        collection: &str,
        batch: Vec<Document>,
        _options: InsertOptions,
    ) -> Result<(), StoreError> {
        let mut collections = self.write()?;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;

        // All-or-nothing: validate the whole batch before writing any of it.
        let batch: Vec<Document> = batch.into_iter().map(ensure_id).collect();
        for (i, doc) in batch.iter().enumerate() {
            if let Some(id) = doc.get(ID_KEY) {
                if has_id(docs, id) || has_id(&batch[..i], id) {
                    return Err(duplicate_key(collection, id));
                }
            }
        }
        docs.extend(batch);
        Ok(())
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<u64, StoreError> {
        let mut collections = self.write()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let Some(index) = docs.iter().position(|d| filter.matches(d)) else {
            return Ok(0);
        };

        let mut replacement = doc;
        if let Some(old_id) = docs[index].get(ID_KEY).cloned() {
            let changes_id = replacement
                .get(ID_KEY)
                .is_some_and(|new_id| !values_equal(new_id, &old_id));
            if changes_id {
                return Err(StoreError::ConstraintViolation(format!(
                    "replacement may not change {ID_KEY} in '{collection}'"
                )));
            }
            replacement.entry(ID_KEY).or_insert(old_id);
        }
        docs[index] = replacement;
        Ok(1)
    }

    async fn set_field(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
        value: JsonValue,
    ) -> Result<u64, StoreError> {
        if field == ID_KEY {
            return Err(StoreError::ConstraintViolation(format!(
                "{ID_KEY} is immutable"
            )));
        }
        let mut collections = self.write()?;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| filter.matches(d)))
        else {
            return Ok(0);
        };
        set_path(doc, field, value);
        Ok(1)
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.write()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };
        Ok(docs
            .iter()
            .position(|d| filter.matches(d))
            .map(|index| docs.remove(index)))
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        self.write()?.remove(collection);
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn bucket(&self, name: &str) -> Result<Option<Arc<dyn BlobBucket>>, StoreError> {
        self.check_online()?;
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| StoreError::Backend("bucket lock poisoned".to_string()))?;
        let bucket = buckets
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(bucket = name, "Created in-memory bucket");
                Arc::new(MemoryBucket::new(name))
            })
            .clone();
        Ok(Some(bucket))
    }
}

struct StoredBlob {
    info: BlobInfo,
    bytes: Vec<u8>,
}

/// A bucket of binary objects held in memory.
pub struct MemoryBucket {
    name: String,
    files: RwLock<Vec<StoredBlob>>,
}

impl MemoryBucket {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            files: RwLock::new(Vec::new()),
        }
    }

    fn files(&self) -> Result<RwLockReadGuard<'_, Vec<StoredBlob>>, StoreError> {
        self.files
            .read()
            .map_err(|_| StoreError::Backend("bucket lock poisoned".to_string()))
    }

    fn files_mut(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredBlob>>, StoreError> {
        self.files
            .write()
            .map_err(|_| StoreError::Backend("bucket lock poisoned".to_string()))
    }

    fn unknown(&self, id: &BlobId) -> StoreError {
        StoreError::NotFound(format!("file {id} in bucket '{}'", self.name))
    }
}

#[async_trait]
impl BlobBucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(
        &self,
        filename: &str,
        bytes: &[u8],
        options: UploadOptions,
    ) -> Result<BlobId, StoreError> {
        let id = BlobId::new(generate_ulid());
        let info = BlobInfo {
            id: id.clone(),
            filename: filename.to_string(),
            length: bytes.len() as u64,
            upload_date: Utc::now(),
            metadata: options.metadata,
        };
        self.files_mut()?.push(StoredBlob {
            info,
            bytes: bytes.to_vec(),
        });
        Ok(id)
    }

    async fn download(&self, id: &BlobId) -> Result<Vec<u8>, StoreError> {
        self.files()?
            .iter()
            .find(|f| &f.info.id == id)
            .map(|f| f.bytes.clone())
            .ok_or_else(|| self.unknown(id))
    }

    async fn latest(&self, filename: &str) -> Result<Option<BlobInfo>, StoreError> {
        // max_by_key keeps the last of equal maxima, so same-instant uploads
        // resolve to the most recent insertion.
        Ok(self
            .files()?
            .iter()
            .filter(|f| f.info.filename == filename)
            .max_by_key(|f| f.info.upload_date)
            .map(|f| f.info.clone()))
    }

    async fn delete(&self, id: &BlobId) -> Result<(), StoreError> {
        let mut files = self.files_mut()?;
        let index = files
            .iter()
            .position(|f| &f.info.id == id)
            .ok_or_else(|| self.unknown(id))?;
        files.remove(index);
        Ok(())
    }

    async fn rename(&self, id: &BlobId, new_filename: &str) -> Result<(), StoreError> {
        let mut files = self.files_mut()?;
        let file = files
            .iter_mut()
            .find(|f| &f.info.id == id)
            .ok_or_else(|| self.unknown(id))?;
        file.info.filename = new_filename.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::query::{ListOptions, Paging, Projection, SortField};
    use futures::TryStreamExt;
    use serde_json::json;

    fn doc(value: JsonValue) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_collection("items").await.unwrap();
        for (id, name, price) in [(1, "b", 30), (2, "a", 10), (3, "c", 20), (4, "a", 5)] {
            store
                .insert_one(
                    "items",
                    doc(json!({"_id": id, "name": name, "price": price})),
                    InsertOptions::default(),
                )
                .await
                .unwrap();
        }
        store
    }

    async fn ids(store: &MemoryStore, options: ListOptions) -> Vec<i64> {
        let plan = QueryPlan::build(&options, "_id").unwrap();
        let docs: Vec<Document> = store
            .find("items", &plan)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        docs.iter().map(|d| d["_id"].as_i64().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_natural_order_is_insertion_order() {
        let store = seeded().await;
        assert_eq!(ids(&store, ListOptions::default()).await, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_sort_is_stable_and_multi_key() {
        let store = seeded().await;
        let by_name = ListOptions::new().sort_by(SortField::asc("name"));
        assert_eq!(ids(&store, by_name).await, vec![2, 4, 1, 3]);

        let by_name_then_price = ListOptions::new()
            .sort_by(SortField::asc("name"))
            .sort_by(SortField::asc("price"));
        assert_eq!(ids(&store, by_name_then_price).await, vec![4, 2, 1, 3]);
    }

    #[tokio::test]
    async fn test_filter_sort_then_window() {
        let store = seeded().await;
        let options = ListOptions::new()
            .filter(Filter::gte("price", 10))
            .sort_by(SortField::desc("price"))
            .paging(Paging::new(Some(1), Some(1)));
        assert_eq!(ids(&store, options).await, vec![3]);
    }

    #[tokio::test]
    async fn test_proximity_orders_nearest_first_without_sort() {
        let store = MemoryStore::new();
        store.create_collection("items").await.unwrap();
        let points = [(1, 52.530, 13.405), (2, 52.521, 13.405), (3, 52.525, 13.405)];
        for (id, lat, lon) in points {
            let location = serde_json::to_value(GeoPoint::new(lat, lon)).unwrap();
            store
                .insert_one(
                    "items",
                    doc(json!({"_id": id, "location": location})),
                    InsertOptions::default(),
                )
                .await
                .unwrap();
        }

        let near = Filter::near("location", GeoPoint::new(52.520, 13.405), 5_000.0);
        assert_eq!(ids(&store, ListOptions::new().filter(near.clone())).await, vec![2, 3, 1]);

        // An explicit sort wins over distance.
        let sorted = ListOptions::new().filter(near).sort_by(SortField::desc("_id"));
        assert_eq!(ids(&store, sorted).await, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_projection_applied_last() {
        let store = seeded().await;
        let options = ListOptions::new()
            .sort_by(SortField::asc("price"))
            .limit(1)
            .project(Projection::include(["name"]));
        let plan = QueryPlan::build(&options, "_id").unwrap();
        let docs: Vec<Document> = store
            .find("items", &plan)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(JsonValue::Object(docs[0].clone()), json!({"_id": 4, "name": "a"}));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = seeded().await;
        let err = store
            .insert_one("items", doc(json!({"_id": 1})), InsertOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    #[tokio::test]
    async fn test_insert_many_is_all_or_nothing() {
        let store = seeded().await;
        let err = store
            .insert_many(
                "items",
                vec![doc(json!({"_id": 9})), doc(json!({"_id": 9}))],
                InsertOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert_eq!(store.count("items", &Filter::All).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_generated_id_when_absent() {
        let store = seeded().await;
        store
            .insert_one("items", doc(json!({"name": "z"})), InsertOptions::default())
            .await
            .unwrap();
        let plan = QueryPlan::build(&ListOptions::new().filter(Filter::eq("name", "z")), "_id")
            .unwrap();
        let docs: Vec<Document> = store
            .find("items", &plan)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(docs[0]["_id"].is_string());
    }

    #[tokio::test]
    async fn test_insert_into_missing_collection_fails() {
        let store = MemoryStore::new();
        let err = store
            .insert_one("ghost", doc(json!({"_id": 1})), InsertOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!store.collection_exists("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_keeps_id() {
        let store = seeded().await;
        let matched = store
            .replace_one("items", &Filter::eq("_id", 2), doc(json!({"name": "renamed"})))
            .await
            .unwrap();
        assert_eq!(matched, 1);
        assert_eq!(
            store
                .count("items", &(Filter::eq("_id", 2) & Filter::eq("name", "renamed")))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_set_field_and_find_one_and_delete() {
        let store = seeded().await;
        let matched = store
            .set_field("items", &Filter::eq("_id", 3), "stock.count", json!(7))
            .await
            .unwrap();
        assert_eq!(matched, 1);
        assert!(store
            .any("items", &Filter::eq("stock.count", 7))
            .await
            .unwrap());

        let removed = store
            .find_one_and_delete("items", &Filter::eq("_id", 3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(removed["name"], json!("c"));
        assert!(store
            .find_one_and_delete("items", &Filter::eq("_id", 3))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_drop_is_idempotent() {
        let store = seeded().await;
        store.drop_collection("items").await.unwrap();
        store.drop_collection("items").await.unwrap();
        assert!(!store.collection_exists("items").await.unwrap());
        assert_eq!(store.count("items", &Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_reports_unavailable() {
        let store = seeded().await;
        store.set_offline(true);
        let err = store.count("items", &Filter::All).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        store.set_offline(false);
        assert_eq!(store.count("items", &Filter::All).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_bucket_round_trip_and_latest() {
        let store = MemoryStore::new();
        let bucket = store.bucket("photos").await.unwrap().unwrap();
        let first = bucket
            .upload("a.png", b"one", UploadOptions::default())
            .await
            .unwrap();
        let second = bucket
            .upload("a.png", b"two", UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(bucket.download(&first).await.unwrap(), b"one");
        let latest = bucket.latest("a.png").await.unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.length, 3);

        bucket.rename(&second, "b.png").await.unwrap();
        assert_eq!(bucket.latest("a.png").await.unwrap().unwrap().id, first);

        bucket.delete(&first).await.unwrap();
        let err = bucket.download(&first).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(bucket.latest("a.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bucket_is_cached_by_name() {
        let store = MemoryStore::new();
        let a = store.bucket("docs").await.unwrap().unwrap();
        a.upload("x", b"1", UploadOptions::default()).await.unwrap();
        let b = store.bucket("docs").await.unwrap().unwrap();
        assert!(b.latest("x").await.unwrap().is_some());
    }
}
