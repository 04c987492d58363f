//! Document store abstraction
//!
//! A store holds JSON documents grouped in named collections and addressed by
//! a string key. Everything above this layer (resolver, CRUD services,
//! integrity audit) talks to a [`StoreHandle`] and never to a concrete backend.

use crate::core::entity::IndexSpec;
use crate::core::error::Result;
use crate::core::query::{Filter, Query};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;

/// Lazy stream of documents produced by a query
pub type DocumentStream = BoxStream<'static, Result<Value>>;

/// Backend of the document data layer
///
/// Implementations must be safe to share between tasks. All failures to reach
/// the backend surface as `DocError::Persistence`; duplicate keys and unique
/// index violations surface as `DocError::Conflict`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name used in logs ("memory", "mongodb")
    fn backend(&self) -> &'static str;

    /// Fetch one document by key
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>>;

    /// Fetch several documents in one round trip
    ///
    /// Missing keys are simply absent from the result; order is unspecified.
    async fn get_many(&self, collection: &str, keys: &[String]) -> Result<Vec<(String, Value)>>;

    /// Run a query; documents are produced lazily
    async fn query(&self, collection: &str, query: &Query) -> Result<DocumentStream>;

    /// Count documents matching a filter
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Insert a new document; fails with a conflict if the key exists
    async fn insert(&self, collection: &str, key: &str, document: Value) -> Result<()>;

    /// Insert or replace a document
    async fn upsert(&self, collection: &str, key: &str, document: Value) -> Result<()>;

    /// Remove a document; returns whether it existed
    async fn delete(&self, collection: &str, key: &str) -> Result<bool>;

    /// Declare an index; idempotent
    async fn ensure_index(&self, collection: &str, index: &IndexSpec) -> Result<()>;

    /// Release connections held by the backend
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Shared handle to the process-wide store
#[derive(Clone)]
pub struct StoreHandle(Arc<dyn DocumentStore>);

impl StoreHandle {
    pub fn new(store: impl DocumentStore + 'static) -> Self {
        Self(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn DocumentStore>) -> Self {
        Self(store)
    }
}

impl Deref for StoreHandle {
    type Target = dyn DocumentStore;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StoreHandle").field(&self.0.backend()).finish()
    }
}
