//! In-memory document store for testing and development

use crate::core::entity::IndexSpec;
use crate::core::error::{DocError, Result};
use crate::core::query::{Filter, Query, SortDirection, compare_values, lookup_path};
use crate::core::store::{DocumentStore, DocumentStream};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Collection {
    documents: BTreeMap<String, Value>,
    indexes: Vec<IndexSpec>,
}

impl Collection {
    /// Find a unique index violated by storing `document` under `key`
    fn violated_index(&self, key: &str, document: &Value) -> Option<&'static str> {
        self.indexes
            .iter()
            .filter(|index| index.unique && index.covers(document))
            .find(|index| {
                let wanted = index.key_of(document);
                self.documents.iter().any(|(other_key, other)| {
                    other_key != key && index.covers(other) && index.key_of(other) == wanted
                })
            })
            .map(|index| index.name)
    }
}

/// In-memory document store
///
/// Useful for testing and development. Uses RwLock for thread-safe access and
/// enforces unique (and partial unique) indexes like a real backend would.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    operations: Arc<AtomicU64>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations served so far
    pub fn operation_count(&self) -> u64 {
        self.operations.load(AtomicOrdering::SeqCst)
    }

    /// Simulate an unreachable backend; every operation fails while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    fn begin(&self, operation: &str) -> Result<()> {
        self.operations.fetch_add(1, AtomicOrdering::SeqCst);
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(DocError::persistence(operation, "in-memory store is unavailable"));
        }
        Ok(())
    }

    fn read(&self, operation: &str) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.begin(operation)?;
        self.collections
            .read()
            .map_err(|e| DocError::persistence(operation, format!("failed to acquire read lock: {}", e)))
    }

    fn write(&self, operation: &str) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.begin(operation)?;
        self.collections
            .write()
            .map_err(|e| DocError::persistence(operation, format!("failed to acquire write lock: {}", e)))
    }
}

fn order_by_field(a: &Value, b: &Value, field: &str) -> Ordering {
    match (lookup_path(a, field), lookup_path(b, field)) {
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let collections = self.read("get")?;
        Ok(collections
            .get(collection)
            .and_then(|c| c.documents.get(key))
            .cloned())
    }

    async fn get_many(&self, collection: &str, keys: &[String]) -> Result<Vec<(String, Value)>> {
        let collections = self.read("get_many")?;
        let Some(collection) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        Ok(keys
            .iter()
            .filter(|key| seen.insert(key.as_str()))
            .filter_map(|key| {
                collection
                    .documents
                    .get(key)
                    .map(|doc| (key.clone(), doc.clone()))
            })
            .collect())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<DocumentStream> {
        let mut matched: Vec<Value> = {
            let collections = self.read("query")?;
            collections
                .get(collection)
                .map(|c| {
                    c.documents
                        .values()
                        .filter(|doc| query.filter.matches_document(doc))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        if let Some(sort) = query.filter.sort() {
            matched.sort_by(|a, b| {
                let ordering = order_by_field(a, b, &sort.field);
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        let window = matched
            .into_iter()
            .skip(query.skip)
            .take(query.limit.unwrap_or(usize::MAX));
        let projection = query.projection.clone();
        let documents: Vec<Result<Value>> = window
            .map(|doc| match &projection {
                Some(projection) => Ok(projection.apply(doc)),
                None => Ok(doc),
            })
            .collect();

        Ok(stream::iter(documents).boxed())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let collections = self.read("count")?;
        let count = collections
            .get(collection)
            .map(|c| {
                c.documents
                    .values()
                    .filter(|doc| filter.matches_document(doc))
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn insert(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        let mut collections = self.write("insert")?;
        let entry = collections.entry(collection.to_string()).or_default();

        if entry.documents.contains_key(key) {
            return Err(DocError::conflict(
                collection,
                format!("duplicate key '{}'", key),
            ));
        }
        if let Some(index) = entry.violated_index(key, &document) {
            return Err(DocError::conflict(
                collection,
                format!("unique index '{}' violated", index),
            ));
        }

        entry.documents.insert(key.to_string(), document);
        Ok(())
    }

    async fn upsert(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        let mut collections = self.write("upsert")?;
        let entry = collections.entry(collection.to_string()).or_default();

        if let Some(index) = entry.violated_index(key, &document) {
            return Err(DocError::conflict(
                collection,
                format!("unique index '{}' violated", index),
            ));
        }

        entry.documents.insert(key.to_string(), document);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let mut collections = self.write("delete")?;
        Ok(collections
            .get_mut(collection)
            .is_some_and(|c| c.documents.remove(key).is_some()))
    }

    async fn ensure_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
        let mut collections = self.write("ensure_index")?;
        let entry = collections.entry(collection.to_string()).or_default();
        if !entry.indexes.iter().any(|existing| existing.name == index.name) {
            entry.indexes.push(*index);
        }
        Ok(())
    }
}
