//! Binary objects stored next to a repository's documents.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::models::Entity;
use crate::repositories::repository::Repository;
use crate::store::{BlobBucket, BlobId, BlobInfo, UploadOptions};

/// File storage in the bucket named after the repository's collection.
///
/// When the blob store cannot provide that bucket every operation is a
/// no-op: uploads and lookups return `None`, deletes and renames return
/// false.
#[async_trait]
pub trait BlobRepository {
    /// Stores `bytes` under `filename` and returns the generated id.
    async fn upload_file(
        &self,
        filename: &str,
        bytes: &[u8],
        options: UploadOptions,
    ) -> Result<Option<BlobId>, RepositoryError>;

    /// Reads a whole file.
    async fn download_file(&self, id: &BlobId) -> Result<Option<Vec<u8>>, RepositoryError>;

    /// Metadata of the most recent upload under `filename`.
    async fn file_info(&self, filename: &str) -> Result<Option<BlobInfo>, RepositoryError>;

    async fn delete_file(&self, id: &BlobId) -> Result<bool, RepositoryError>;

    async fn rename_file(&self, id: &BlobId, new_filename: &str) -> Result<bool, RepositoryError>;
}

impl<T: Entity> Repository<T> {
    async fn bucket(&self) -> Result<Option<Arc<dyn BlobBucket>>, RepositoryError> {
        let name = self.collection_name();
        let bucket = self.cancel.guard(self.blobs.bucket(name)).await?;
        if bucket.is_none() {
            tracing::debug!(bucket = %name, "Bucket unavailable, skipping file operation");
        }
        Ok(bucket)
    }
}

#[async_trait]
impl<T: Entity> BlobRepository for Repository<T> {
    async fn upload_file(
        &self,
        filename: &str,
        bytes: &[u8],
        options: UploadOptions,
    ) -> Result<Option<BlobId>, RepositoryError> {
        let Some(bucket) = self.bucket().await? else {
            return Ok(None);
        };
        let id = self
            .cancel
            .guard(bucket.upload(filename, bytes, options))
            .await?;
        tracing::debug!(bucket = %bucket.name(), filename, %id, size = bytes.len(), "Uploaded file");
        Ok(Some(id))
    }

    async fn download_file(&self, id: &BlobId) -> Result<Option<Vec<u8>>, RepositoryError> {
        let Some(bucket) = self.bucket().await? else {
            return Ok(None);
        };
        let bytes = self.cancel.guard(bucket.download(id)).await?;
        Ok(Some(bytes))
    }

    async fn file_info(&self, filename: &str) -> Result<Option<BlobInfo>, RepositoryError> {
        let Some(bucket) = self.bucket().await? else {
            return Ok(None);
        };
        self.cancel.guard(bucket.latest(filename)).await
    }

    async fn delete_file(&self, id: &BlobId) -> Result<bool, RepositoryError> {
        let Some(bucket) = self.bucket().await? else {
            return Ok(false);
        };
        self.cancel.guard(bucket.delete(id)).await?;
        tracing::debug!(bucket = %bucket.name(), %id, "Deleted file");
        Ok(true)
    }

    async fn rename_file(&self, id: &BlobId, new_filename: &str) -> Result<bool, RepositoryError> {
        let Some(bucket) = self.bucket().await? else {
            return Ok(false);
        };
        self.cancel.guard(bucket.rename(id, new_filename)).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionSettings;
    use crate::context::Connector;
    use crate::error::{ErrorKind, StoreError};
    use crate::store::backends::memory::MemoryStore;
    use crate::store::BlobStore;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Photo {
        #[serde(rename = "_id")]
        id: String,
    }

    impl Entity for Photo {
        type Id = String;

        fn id(&self) -> &String {
            &self.id
        }
    }

    // A blob store that never provides a bucket.
    struct NoBuckets;

    #[async_trait]
    impl BlobStore for NoBuckets {
        async fn bucket(&self, _name: &str) -> Result<Option<Arc<dyn BlobBucket>>, StoreError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_files_round_trip_in_collection_bucket() {
        let connector = Connector::in_memory("media");
        let repo = Repository::<Photo>::open(&connector, "photos").await.unwrap();

        let metadata = json!({"camera": "x100"}).as_object().cloned().unwrap();
        let id = repo
            .upload_file("cat.jpg", b"meow", UploadOptions::default().with_metadata(metadata.clone()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(repo.download_file(&id).await.unwrap(), Some(b"meow".to_vec()));
        let info = repo.file_info("cat.jpg").await.unwrap().unwrap();
        assert_eq!(info.id, id);
        assert_eq!(info.length, 4);
        assert_eq!(info.metadata, Some(metadata));

        // The bucket carries the collection's name.
        let bucket = connector.blobs.bucket("photos").await.unwrap().unwrap();
        assert!(bucket.latest("cat.jpg").await.unwrap().is_some());

        assert!(repo.rename_file(&id, "kitten.jpg").await.unwrap());
        assert!(repo.file_info("cat.jpg").await.unwrap().is_none());
        assert!(repo.delete_file(&id).await.unwrap());

        let err = repo.download_file(&id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_latest_upload_wins() {
        let connector = Connector::in_memory("media");
        let repo = Repository::<Photo>::open(&connector, "photos").await.unwrap();

        repo.upload_file("a.txt", b"v1", UploadOptions::default()).await.unwrap();
        let second = repo
            .upload_file("a.txt", b"v2", UploadOptions::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(repo.file_info("a.txt").await.unwrap().unwrap().id, second);
    }

    #[tokio::test]
    async fn test_unavailable_bucket_is_noop() {
        let store = MemoryStore::new();
        let connector = Connector::new(
            Arc::new(store),
            Arc::new(NoBuckets),
            ConnectionSettings::new("media"),
        );
        let repo = Repository::<Photo>::open(&connector, "photos").await.unwrap();
        let id = BlobId::new("anything");

        assert_eq!(
            repo.upload_file("a", b"x", UploadOptions::default()).await.unwrap(),
            None
        );
        assert_eq!(repo.download_file(&id).await.unwrap(), None);
        assert_eq!(repo.file_info("a").await.unwrap(), None);
        assert!(!repo.delete_file(&id).await.unwrap());
        assert!(!repo.rename_file(&id, "b").await.unwrap());
    }
}
