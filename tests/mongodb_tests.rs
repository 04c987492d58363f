//! Integration tests for the MongoDB store using the storage test harness.
//!
//! Invokes `document_store_tests!` to validate that MongoStore fully conforms
//! to the DocumentStore contract, then checks the Mongo-specific index
//! behaviour.
//!
//! # Requirements
//!
//! - Docker must be running (testcontainers launches a MongoDB container)
//! - Feature flag `mongodb_backend` must be enabled
//!
//! # Running
//!
//! ```sh
//! cargo test --features mongodb_backend --test mongodb_tests
//! ```
//!
//! # Test isolation
//!
//! All tests share a single MongoDB container (via `OnceCell`). Each test gets
//! its own database.

#![cfg(feature = "mongodb_backend")]

#[macro_use]
mod storage_harness;

use docgate::core::store::StoreHandle;
use docgate::storage::MongoStore;
use std::sync::atomic::{AtomicU64, Ordering};
use storage_harness::*;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::mongo::Mongo;
use tokio::sync::OnceCell;

// ---------------------------------------------------------------------------
// Shared test environment (single container, fresh database per test)
// ---------------------------------------------------------------------------

/// Holds the testcontainer handle (keeps it alive) and the connection URL.
struct MongoTestEnv {
    _container: ContainerAsync<Mongo>,
    connection_url: String,
}

static TEST_ENV: OnceCell<MongoTestEnv> = OnceCell::const_new();

async fn init_mongo_env() -> &'static MongoTestEnv {
    TEST_ENV
        .get_or_init(|| async {
            let container = Mongo::default()
                .start()
                .await
                .expect("Failed to start MongoDB container, is Docker running?");
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(27017).await.unwrap();
            MongoTestEnv {
                connection_url: format!("mongodb://{}:{}", host, port),
                _container: container,
            }
        })
        .await
}

/// Atomic counter to generate unique database names per test.
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

async fn fresh_store() -> StoreHandle {
    let env = init_mongo_env().await;
    let db_num = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let store = MongoStore::connect(
        &env.connection_url,
        &format!("docgate_test_{}", db_num),
        Some(4),
    )
    .await
    .expect("Failed to connect to MongoDB");
    StoreHandle::new(store)
}

document_store_tests!(fresh_store().await);

mod mongo_specific {
    use super::*;
    use docgate::core::service::CrudService;
    use docgate::models::{Location, default_registry};
    use serde_json::json;
    use uuid::Uuid;

    fn location(domain: serde_json::Value, instance: &str) -> docgate::core::service::FieldMap {
        fields(json!({
            "phone": "+15550100",
            "user": Uuid::new_v4(),
            "domain": domain,
            "instance_id": instance,
        }))
    }

    #[tokio::test]
    async fn test_partial_unique_index_ignores_missing_domain() {
        let store = fresh_store().await;
        default_registry().install(&store).await.unwrap();
        let locations: CrudService<Location> = CrudService::new(store.clone());

        locations.create(location(json!("shop.example"), "i1")).await.unwrap();
        let err = locations
            .create(location(json!("shop.example"), "i1"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        locations.create(location(json!(null), "i1")).await.unwrap();
        locations.create(location(json!(null), "i1")).await.unwrap();
        locations.create(location(json!("shop.example"), "i2")).await.unwrap();

        store.close().await.unwrap();
    }
}
