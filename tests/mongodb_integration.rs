//! Integration tests for the MongoDB backend.
//!
//! These tests require a running MongoDB instance on localhost:27017.
//! Run with: `cargo test --features integration,mongodb --test mongodb_integration`

#![cfg(all(feature = "integration", feature = "mongodb"))]

use docrepo::prelude::*;
use serde::{Deserialize, Serialize};
use serial_test::serial;

const TEST_DB: &str = "docrepo_integration";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Shop {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    rating: i64,
    location: GeoPoint,
}

impl Entity for Shop {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }
}

impl Located for Shop {}

fn shop(id: &str, rating: i64, latitude: f64, longitude: f64) -> Shop {
    Shop {
        id: id.to_string(),
        name: format!("Shop {id}"),
        rating,
        location: GeoPoint::new(latitude, longitude),
    }
}

async fn connect() -> Connector {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    Connector::mongodb(ConnectionSettings::new(TEST_DB))
        .await
        .expect("Failed to connect to test database")
}

/// Opens `collection` after dropping any leftovers from a previous run.
async fn fresh(connector: &Connector, collection: &str) -> Repository<Shop> {
    connector.ensure_collection(collection).await.unwrap();
    let mut repo = Repository::<Shop>::open(connector, collection).await.unwrap();
    repo.drop_collection().await.unwrap();
    connector.ensure_collection(collection).await.unwrap();
    repo.refresh_existence().await.unwrap();
    repo
}

// Tests share one database, so they run serially.
#[serial]
mod database_tests {
    use super::*;

    #[tokio::test]
    async fn test_connect() {
        let connector = connect().await;
        assert_eq!(connector.db_name(), TEST_DB);
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let connector = connect().await;
        let repo = fresh(&connector, "it_shops").await;

        let original = shop("a", 4, 52.52, 13.405);
        assert!(repo.add(&original).await.unwrap());
        assert_eq!(repo.get_by_id(&original.id).await.unwrap(), Some(original.clone()));

        let err = repo.add(&original).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

        assert!(repo.update_field(&original.id, "rating", 5).await.unwrap());
        let updated = repo.get_by_id(&original.id).await.unwrap().unwrap();
        assert_eq!(updated.rating, 5);

        let removed = repo.delete(&original.id).await.unwrap();
        assert_eq!(removed.map(|s| s.id), Some("a".to_string()));
        assert_eq!(repo.delete(&original.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sort_and_paging() {
        let connector = connect().await;
        let repo = fresh(&connector, "it_paged").await;

        let shops: Vec<Shop> = (0..10)
            .map(|i| shop(&format!("s{i}"), i, 52.0, 13.0))
            .collect();
        assert_eq!(repo.add_many(&shops).await.unwrap(), 10);

        let options = ListOptions::new()
            .sort_by(SortField::desc("rating"))
            .skip(2)
            .limit(3);
        let ratings: Vec<i64> = repo
            .list(&options)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.rating)
            .collect();
        assert_eq!(ratings, vec![7, 6, 5]);
        assert_eq!(repo.count(&Filter::gte("rating", 8)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_near_queries() {
        let connector = connect().await;
        let repo = fresh(&connector, "it_geo").await;

        repo.add_many(&[
            shop("near", 3, 52.5210, 13.4060),
            shop("far", 3, 48.1351, 11.5820),
        ])
        .await
        .unwrap();

        let near = NearQuery::new(52.52, 13.405, 5_000.0);
        let found = repo.list_near(&near, &ListOptions::new()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "near");

        repo.add(&shop("closer", 3, 52.5201, 13.4051)).await.unwrap();
        let ranked = repo.list_near(&near, &ListOptions::new()).await.unwrap();
        let ids: Vec<&str> = ranked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["closer", "near"]);

        let ignored = NearQuery::new(52.52, 13.405, 50_000.0);
        assert_eq!(repo.count_near(&ignored, &Filter::All).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_gridfs_files() {
        let connector = connect().await;
        let repo = fresh(&connector, "it_files").await;

        let id = repo
            .upload_file("menu.txt", b"soup", UploadOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(repo.download_file(&id).await.unwrap(), Some(b"soup".to_vec()));
        assert_eq!(repo.file_info("menu.txt").await.unwrap().unwrap().length, 4);

        assert!(repo.rename_file(&id, "menu-v2.txt").await.unwrap());
        assert!(repo.delete_file(&id).await.unwrap());
        assert!(repo.file_info("menu-v2.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drop_collection() {
        let connector = connect().await;
        let mut repo = fresh(&connector, "it_dropped").await;

        assert!(repo.drop_collection().await.unwrap());
        assert!(!repo.drop_collection().await.unwrap());
        assert!(!repo.refresh_existence().await.unwrap());
    }
}
