//! MongoDB backend with GridFS buckets.
//!
//! Translates [`Filter`]s, sort keys and projections into BSON and runs them
//! through the official driver. Documents cross the boundary as relaxed
//! extended JSON, so ObjectIds surface as `{"$oid": "..."}` objects.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::config::ConnectionSettings;
//! use docrepo::store::backends::mongodb::MongoStore;
//!
//! let store = MongoStore::connect(&ConnectionSettings::load()?).await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::io::{AsyncReadExt, AsyncWriteExt};
use futures::StreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document as BsonDocument};
use mongodb::error::{Error as MongoError, ErrorKind as MongoErrorKind, GridFsErrorKind, WriteFailure};
use mongodb::gridfs::GridFsBucket;
use mongodb::options::{
    ClientOptions, Credential, GridFsBucketOptions, ServerAddress, Tls, TlsOptions,
};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value as JsonValue;

use crate::config::ConnectionSettings;
use crate::error::{ErrorKind, StoreError};
use crate::models::EARTH_RADIUS_METERS;
use crate::query::{Projection, QueryPlan, SortDirection, SortField};
use crate::store::blob::{BlobId, BlobInfo, UploadOptions};
use crate::store::document::{Document, DocumentStream};
use crate::store::filter::Filter;
use crate::store::traits::{BlobBucket, BlobStore, DocumentStore, InsertOptions};

const NAMESPACE_NOT_FOUND: i32 = 26;
const NAMESPACE_EXISTS: i32 = 48;
const DOCUMENT_VALIDATION_FAILURE: i32 = 121;
const DUPLICATE_KEY_CODES: [i32; 3] = [11000, 11001, 12582];

/// MongoDB document and blob store.
///
/// This type is cheap to clone - the driver client is `Arc`-based and
/// GridFS buckets are cached by name across clones.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
    buckets: Arc<Mutex<HashMap<String, Arc<MongoBucket>>>>,
    /// `collection.field` pairs known to carry a 2dsphere index.
    geo_indexes: Arc<Mutex<HashSet<String>>>,
}

impl MongoStore {
    /// Connects using resolved settings and verifies the server with a ping.
    ///
    /// A `server` holding a full `mongodb://` URL is used verbatim; otherwise
    /// host, port, credentials (authenticated against `db_name`) and TLS are
    /// assembled from the individual fields.
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self, StoreError> {
        let options = client_options(settings).await?;
        let client = Client::with_options(options)?;
        let db = client.database(&settings.db_name);

        db.run_command(doc! { "ping": 1 }).await?;
        tracing::info!(
            db = %settings.db_name,
            url = settings.is_url(),
            tls = settings.tls,
            "Connected to MongoDB"
        );

        Ok(Self {
            client,
            db,
            buckets: Arc::new(Mutex::new(HashMap::new())),
            geo_indexes: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Returns a reference to the driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Returns a reference to the database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.db.collection(name)
    }

    /// Creates the 2dsphere index `$nearSphere` needs, once per field.
    async fn ensure_geo_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let key = format!("{collection}.{field}");
        if self.geo_indexes_lock().contains(&key) {
            return Ok(());
        }

        let index = IndexModel::builder().keys(doc! { field: "2dsphere" }).build();
        self.collection(collection).create_index(index).await?;
        tracing::debug!(collection, field, "Ensured 2dsphere index");
        self.geo_indexes_lock().insert(key);
        Ok(())
    }

    fn geo_indexes_lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        match self.geo_indexes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

async fn client_options(settings: &ConnectionSettings) -> Result<ClientOptions, StoreError> {
    if settings.is_url() {
        return Ok(ClientOptions::parse(&settings.server).await?);
    }

    let mut options = ClientOptions::default();
    options.hosts = vec![ServerAddress::parse(format!(
        "{}:{}",
        settings.server, settings.port
    ))?];
    if settings.has_credentials() {
        let mut credential = Credential::default();
        credential.username = Some(settings.user.clone());
        credential.password = Some(settings.password.clone());
        credential.source = Some(settings.db_name.clone());
        options.credential = Some(credential);
    }
    if settings.tls {
        options.tls = Some(Tls::Enabled(TlsOptions::default()));
    }
    options.app_name = Some("docrepo".to_string());
    Ok(options)
}

// ----------------------------------------------------------------------------
// Error classification
// ----------------------------------------------------------------------------

/// Maps a driver error onto the shared [`ErrorKind`] hierarchy.
pub(crate) fn classify(err: &MongoError) -> ErrorKind {
    match err.kind.as_ref() {
        MongoErrorKind::Io(_)
        | MongoErrorKind::ServerSelection { .. }
        | MongoErrorKind::ConnectionPoolCleared { .. }
        | MongoErrorKind::DnsResolve { .. } => ErrorKind::StoreUnavailable,
        MongoErrorKind::Write(WriteFailure::WriteError(write)) => classify_code(write.code),
        MongoErrorKind::InsertMany(insert) => insert
            .write_errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map(|write| classify_code(write.code))
            .unwrap_or(ErrorKind::Internal),
        MongoErrorKind::Command(command) => classify_code(command.code),
        MongoErrorKind::GridFs(GridFsErrorKind::FileNotFound { .. }) => ErrorKind::NotFound,
        MongoErrorKind::InvalidArgument { .. } => ErrorKind::InvalidInput,
        _ => ErrorKind::Internal,
    }
}

fn classify_code(code: i32) -> ErrorKind {
    match code {
        c if DUPLICATE_KEY_CODES.contains(&c) => ErrorKind::ConstraintViolation,
        DOCUMENT_VALIDATION_FAILURE => ErrorKind::ConstraintViolation,
        NAMESPACE_NOT_FOUND => ErrorKind::NotFound,
        _ => ErrorKind::Internal,
    }
}

fn has_code(err: &MongoError, code: i32) -> bool {
    matches!(err.kind.as_ref(), MongoErrorKind::Command(command) if command.code == code)
}

// ----------------------------------------------------------------------------
// JSON <-> BSON
// ----------------------------------------------------------------------------

fn to_bson(value: &JsonValue) -> Result<Bson, StoreError> {
    bson::to_bson(value).map_err(|e| StoreError::Backend(format!("BSON encoding failed: {e}")))
}

fn to_bson_document(doc: &Document) -> Result<BsonDocument, StoreError> {
    bson::to_document(doc).map_err(|e| StoreError::Backend(format!("BSON encoding failed: {e}")))
}

fn from_bson_document(doc: BsonDocument) -> Result<Document, StoreError> {
    match Bson::Document(doc).into_relaxed_extjson() {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!(
            "expected a document from MongoDB, got {other}"
        ))),
    }
}

/// Translates a [`Filter`] into a MongoDB query document.
pub(crate) fn filter_to_bson(filter: &Filter) -> Result<BsonDocument, StoreError> {
    let translated = match filter {
        Filter::All => doc! {},
        Filter::Eq(field, value) => doc! { field: { "$eq": to_bson(value)? } },
        Filter::Ne(field, value) => doc! { field: { "$ne": to_bson(value)? } },
        Filter::Gt(field, value) => doc! { field: { "$gt": to_bson(value)? } },
        Filter::Gte(field, value) => doc! { field: { "$gte": to_bson(value)? } },
        Filter::Lt(field, value) => doc! { field: { "$lt": to_bson(value)? } },
        Filter::Lte(field, value) => doc! { field: { "$lte": to_bson(value)? } },
        Filter::In(field, values) => {
            let values = values.iter().map(to_bson).collect::<Result<Vec<_>, _>>()?;
            doc! { field: { "$in": values } }
        }
        Filter::Exists(field, present) => doc! { field: { "$exists": *present } },
        Filter::And(parts) if parts.is_empty() => doc! {},
        Filter::And(parts) => doc! { "$and": filter_list(parts)? },
        // MongoDB rejects an empty $or; an empty disjunction matches nothing.
        Filter::Or(parts) if parts.is_empty() => doc! { "$expr": false },
        Filter::Or(parts) => doc! { "$or": filter_list(parts)? },
        Filter::Not(inner) => doc! { "$nor": [filter_to_bson(inner)?] },
        Filter::Near {
            field,
            center,
            max_distance_meters,
        } => doc! {
            field: {
                "$geoWithin": {
                    "$centerSphere": [
                        [center.longitude, center.latitude],
                        max_distance_meters / EARTH_RADIUS_METERS,
                    ]
                }
            }
        },
    };
    Ok(translated)
}

fn filter_list(parts: &[Filter]) -> Result<Vec<BsonDocument>, StoreError> {
    parts.iter().map(filter_to_bson).collect()
}

/// Like [`filter_to_bson`], but a proximity constraint at the top level (or
/// directly under a top-level `And`) becomes `$nearSphere`, which returns
/// matches nearest-first. Counts keep `$geoWithin`, which `countDocuments`
/// accepts and which needs no index.
pub(crate) fn ranked_filter_to_bson(filter: &Filter) -> Result<BsonDocument, StoreError> {
    match filter {
        Filter::Near {
            field,
            center,
            max_distance_meters,
        } => Ok(doc! {
            field: {
                "$nearSphere": {
                    "$geometry": {
                        "type": "Point",
                        "coordinates": [center.longitude, center.latitude],
                    },
                    "$maxDistance": *max_distance_meters,
                }
            }
        }),
        Filter::And(parts) if !parts.is_empty() => {
            let parts = parts
                .iter()
                .map(|part| match part {
                    Filter::Near { .. } => ranked_filter_to_bson(part),
                    other => filter_to_bson(other),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(doc! { "$and": parts })
        }
        other => filter_to_bson(other),
    }
}

fn sort_to_bson(sort: &[SortField]) -> BsonDocument {
    let mut translated = BsonDocument::new();
    for key in sort {
        let direction = match key.direction {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        };
        translated.insert(key.field.clone(), direction);
    }
    translated
}

fn projection_to_bson(projection: &Projection, id_field: &str) -> BsonDocument {
    let mut translated = BsonDocument::new();
    match projection {
        Projection::Include { fields, include_id } => {
            for field in fields {
                translated.insert(field.clone(), 1);
            }
            if *include_id {
                translated.insert(id_field, 1);
                if id_field != "_id" {
                    translated.insert("_id", 0);
                }
            } else {
                translated.insert(id_field, 0);
            }
        }
        Projection::Exclude(fields) => {
            for field in fields {
                translated.insert(field.clone(), 0);
            }
        }
    }
    translated
}

// ----------------------------------------------------------------------------
// DocumentStore
// ----------------------------------------------------------------------------

#[async_trait]
impl DocumentStore for MongoStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError> {
        let names = self
            .db
            .list_collection_names()
            .filter(doc! { "name": collection })
            .await?;
        Ok(names.iter().any(|name| name == collection))
    }

    async fn create_collection(&self, collection: &str) -> Result<(), StoreError> {
        match self.db.create_collection(collection).await {
            Ok(()) => Ok(()),
            Err(err) if has_code(&err, NAMESPACE_EXISTS) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let filter = filter_to_bson(filter)?;
        Ok(self.collection(collection).count_documents(filter).await?)
    }

    async fn any(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError> {
        let filter = filter_to_bson(filter)?;
        let found = self
            .collection(collection)
            .find_one(filter)
            .projection(doc! { "_id": 1 })
            .await?;
        Ok(found.is_some())
    }

    async fn find(
        &self,
        collection: &str,
        plan: &QueryPlan,
    ) -> Result<DocumentStream<'_>, StoreError> {
        let filter = match plan.filter.proximity() {
            Some((field, _)) => {
                self.ensure_geo_index(collection, field).await?;
                ranked_filter_to_bson(&plan.filter)?
            }
            None => filter_to_bson(&plan.filter)?,
        };
        let coll = self.collection(collection);
        let mut find = coll.find(filter);
        if !plan.sort.is_empty() {
            find = find.sort(sort_to_bson(&plan.sort));
        }
        if let Some(paging) = plan.paging {
            if let Some(skip) = paging.skip {
                find = find.skip(skip);
            }
            if let Some(limit) = paging.limit {
                find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
            }
        }
        if let Some(projection) = &plan.projection {
            find = find.projection(projection_to_bson(projection, &plan.id_field));
        }

        let cursor = find.await?;
        Ok(Box::pin(cursor.map(|item| {
            item.map_err(StoreError::from).and_then(from_bson_document)
        })))
    }

    async fn insert_one(
        &self,
        collection: &str,
        doc: Document,
        options: InsertOptions,
    ) -> Result<(), StoreError> {
        let doc = to_bson_document(&doc)?;
        self.collection(collection)
            .insert_one(doc)
            .bypass_document_validation(options.bypass_validation)
            .await?;
        Ok(())
    }

    async fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
        options: InsertOptions,
    ) -> Result<(), StoreError> {
        let docs = docs
            .iter()
            .map(to_bson_document)
            .collect::<Result<Vec<_>, _>>()?;
        self.collection(collection)
            .insert_many(docs)
            .bypass_document_validation(options.bypass_validation)
            .await?;
        Ok(())
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<u64, StoreError> {
        let result = self
            .collection(collection)
            .replace_one(filter_to_bson(filter)?, to_bson_document(&doc)?)
            .await?;
        Ok(result.matched_count)
    }

    async fn set_field(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
        value: JsonValue,
    ) -> Result<u64, StoreError> {
        let update = doc! { "$set": { field: to_bson(&value)? } };
        let result = self
            .collection(collection)
            .update_one(filter_to_bson(filter)?, update)
            .await?;
        Ok(result.matched_count)
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        self.collection(collection)
            .find_one_and_delete(filter_to_bson(filter)?)
            .await?
            .map(from_bson_document)
            .transpose()
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        let prefix = format!("{collection}.");
        self.geo_indexes_lock().retain(|key| !key.starts_with(&prefix));
        match self.collection(collection).drop().await {
            Ok(()) => Ok(()),
            Err(err) if has_code(&err, NAMESPACE_NOT_FOUND) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

// ----------------------------------------------------------------------------
// GridFS
// ----------------------------------------------------------------------------

#[async_trait]
impl BlobStore for MongoStore {
    async fn bucket(&self, name: &str) -> Result<Option<Arc<dyn BlobBucket>>, StoreError> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| StoreError::Backend("bucket cache lock poisoned".to_string()))?;
        let bucket = buckets
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(bucket = name, "Opened GridFS bucket");
                let options = GridFsBucketOptions::builder()
                    .bucket_name(name.to_string())
                    .build();
                Arc::new(MongoBucket {
                    name: name.to_string(),
                    bucket: self.db.gridfs_bucket(options),
                    files: self.db.collection(&format!("{name}.files")),
                })
            })
            .clone();
        Ok(Some(bucket))
    }
}

/// One GridFS bucket.
pub struct MongoBucket {
    name: String,
    bucket: GridFsBucket,
    files: Collection<BsonDocument>,
}

fn blob_id_to_bson(id: &BlobId) -> Bson {
    match ObjectId::parse_str(id.as_str()) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(id.as_str().to_string()),
    }
}

fn blob_id_from_bson(id: &Bson) -> BlobId {
    match id {
        Bson::ObjectId(oid) => BlobId::new(oid.to_hex()),
        Bson::String(s) => BlobId::new(s.clone()),
        other => BlobId::new(other.to_string()),
    }
}

fn io_error(err: std::io::Error) -> StoreError {
    StoreError::Backend(format!("GridFS stream failed: {err}"))
}

fn blob_info(doc: BsonDocument) -> Result<BlobInfo, StoreError> {
    let id = doc
        .get("_id")
        .map(blob_id_from_bson)
        .ok_or_else(|| StoreError::Backend("GridFS file without _id".to_string()))?;
    let length = match doc.get("length") {
        Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
        _ => 0,
    };
    let upload_date = doc
        .get_datetime("uploadDate")
        .ok()
        .and_then(|date| DateTime::<Utc>::from_timestamp_millis(date.timestamp_millis()))
        .unwrap_or_default();
    let metadata = match doc.get_document("metadata") {
        Ok(metadata) => Some(from_bson_document(metadata.clone())?),
        Err(_) => None,
    };

    Ok(BlobInfo {
        id,
        filename: doc.get_str("filename").unwrap_or_default().to_string(),
        length,
        upload_date,
        metadata,
    })
}

#[async_trait]
impl BlobBucket for MongoBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(
        &self,
        filename: &str,
        bytes: &[u8],
        options: UploadOptions,
    ) -> Result<BlobId, StoreError> {
        let mut open = self.bucket.open_upload_stream(filename);
        if let Some(chunk_size) = options.chunk_size_bytes {
            open = open.chunk_size_bytes(chunk_size);
        }
        if let Some(metadata) = &options.metadata {
            open = open.metadata(to_bson_document(metadata)?);
        }

        let mut stream = open.await?;
        let id = blob_id_from_bson(stream.id());
        stream.write_all(bytes).await.map_err(io_error)?;
        stream.close().await.map_err(io_error)?;
        Ok(id)
    }

    async fn download(&self, id: &BlobId) -> Result<Vec<u8>, StoreError> {
        let mut stream = self.bucket.open_download_stream(blob_id_to_bson(id)).await?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.map_err(io_error)?;
        Ok(bytes)
    }

    async fn latest(&self, filename: &str) -> Result<Option<BlobInfo>, StoreError> {
        self.files
            .find_one(doc! { "filename": filename })
            .sort(doc! { "uploadDate": -1 })
            .await?
            .map(blob_info)
            .transpose()
    }

    async fn delete(&self, id: &BlobId) -> Result<(), StoreError> {
        self.bucket.delete(blob_id_to_bson(id)).await?;
        Ok(())
    }

    async fn rename(&self, id: &BlobId, new_filename: &str) -> Result<(), StoreError> {
        self.bucket.rename(blob_id_to_bson(id), new_filename).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;

    #[test]
    fn test_filter_translation() {
        let filter = Filter::eq("status", "open") & Filter::exists("owner", false);
        assert_eq!(
            filter_to_bson(&filter).unwrap(),
            doc! { "$and": [
                { "status": { "$eq": "open" } },
                { "owner": { "$exists": false } },
            ] }
        );
        assert_eq!(
            filter_to_bson(&!Filter::eq("status", "open")).unwrap(),
            doc! { "$nor": [{ "status": { "$eq": "open" } }] }
        );
        assert_eq!(filter_to_bson(&Filter::All).unwrap(), doc! {});
        assert_eq!(
            filter_to_bson(&Filter::Or(vec![])).unwrap(),
            doc! { "$expr": false }
        );
    }

    #[test]
    fn test_near_translates_to_center_sphere() {
        let filter = Filter::near("location", GeoPoint::new(10.0, 20.0), 6_378.1);
        let translated = filter_to_bson(&filter).unwrap();
        let sphere = translated
            .get_document("location")
            .and_then(|d| d.get_document("$geoWithin"))
            .and_then(|d| d.get_array("$centerSphere"))
            .unwrap();

        let center = sphere[0].as_array().unwrap();
        assert_eq!(center[0].as_f64(), Some(20.0));
        assert_eq!(center[1].as_f64(), Some(10.0));
        let radians = sphere[1].as_f64().unwrap();
        assert!((radians - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_ranked_near_uses_near_sphere_in_meters() {
        let near = Filter::near("location", GeoPoint::new(10.0, 20.0), 2_500.0);
        let filter = Filter::eq("open", true).and(near);
        let translated = ranked_filter_to_bson(&filter).unwrap();

        let parts = translated.get_array("$and").unwrap();
        assert_eq!(
            parts[0].as_document().unwrap(),
            &doc! { "open": { "$eq": true } }
        );
        let sphere = parts[1]
            .as_document()
            .and_then(|d| d.get_document("location").ok())
            .and_then(|d| d.get_document("$nearSphere").ok())
            .unwrap();
        assert_eq!(sphere.get_f64("$maxDistance").unwrap(), 2_500.0);
        let coordinates = sphere
            .get_document("$geometry")
            .and_then(|g| g.get_array("coordinates"))
            .unwrap();
        assert_eq!(coordinates[0].as_f64(), Some(20.0));
        assert_eq!(coordinates[1].as_f64(), Some(10.0));

        // Counting keeps the index-free $geoWithin form.
        let counted = filter_to_bson(&filter).unwrap();
        assert!(counted.to_string().contains("$geoWithin"));
    }

    #[test]
    fn test_sort_and_projection_translation() {
        let sort = sort_to_bson(&[SortField::asc("name"), SortField::desc("price")]);
        assert_eq!(sort, doc! { "name": 1, "price": -1 });

        let include = projection_to_bson(&Projection::include(["name"]).without_id(), "_id");
        assert_eq!(include, doc! { "name": 1, "_id": 0 });

        let exclude = projection_to_bson(&Projection::exclude(["secret"]), "_id");
        assert_eq!(exclude, doc! { "secret": 0 });
    }

    #[test]
    fn test_blob_id_round_trip() {
        let oid = ObjectId::new();
        let id = blob_id_from_bson(&Bson::ObjectId(oid));
        assert_eq!(blob_id_to_bson(&id), Bson::ObjectId(oid));
        assert_eq!(
            blob_id_to_bson(&BlobId::new("custom")),
            Bson::String("custom".to_string())
        );
    }

    #[test]
    fn test_classify_codes() {
        assert_eq!(classify_code(11000), ErrorKind::ConstraintViolation);
        assert_eq!(classify_code(121), ErrorKind::ConstraintViolation);
        assert_eq!(classify_code(26), ErrorKind::NotFound);
        assert_eq!(classify_code(2), ErrorKind::Internal);
    }
}
