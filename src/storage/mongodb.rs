//! MongoDB storage backend using the official MongoDB async driver.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! docgate = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! Each collection of the data layer maps to one MongoDB collection. The
//! document key is written to `_id` in addition to the entity's own key field
//! (`id`, `code`, ...), and `_id` is stripped again on the way out.
//!
//! Documents travel through `serde_json::Value` and are converted to BSON, so
//! UUIDs and instants are stored as strings exactly as they serialize.

use crate::core::entity::IndexSpec;
use crate::core::error::{DocError, Result};
use crate::core::query::{Filter, Operator, Query, SortDirection};
use crate::core::store::{DocumentStore, DocumentStream};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};
use serde_json::Value;

const DUPLICATE_KEY: i32 = 11000;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn json_to_bson(value: &Value) -> Result<Bson> {
    mongodb::bson::to_bson(value).map_err(|e| DocError::persistence("encode bson", e))
}

/// Convert a JSON object into a BSON document stored under `key`
fn json_to_document(key: &str, json: Value) -> Result<Document> {
    let mut doc = match json_to_bson(&json)? {
        Bson::Document(d) => d,
        _ => {
            return Err(DocError::validation("expected a JSON object document"));
        }
    };
    doc.insert("_id", key);
    Ok(doc)
}

/// Convert a BSON document back into JSON, dropping `_id`
fn document_to_json(mut doc: Document) -> Value {
    doc.remove("_id");
    Bson::Document(doc).into_relaxed_extjson()
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Map a driver error: duplicate keys are conflicts, the rest are storage failures
fn map_error(operation: &str, collection: &str, err: mongodb::error::Error) -> DocError {
    if is_duplicate_key(&err) {
        DocError::conflict(collection, err.to_string())
    } else {
        DocError::persistence(format!("{} {}", operation, collection), err)
    }
}

fn operator_name(op: Operator) -> &'static str {
    match op {
        Operator::Eq => "$eq",
        Operator::Ne => "$ne",
        Operator::Gt => "$gt",
        Operator::Gte => "$gte",
        Operator::Lt => "$lt",
        Operator::Lte => "$lte",
        Operator::In => "$in",
        Operator::Regex => "$regex",
    }
}

/// Translate a filter into a MongoDB query document
///
/// Conditions on the same field are merged into one operator document.
fn filter_to_document(filter: &Filter) -> Result<Document> {
    let mut out = Document::new();
    for condition in filter.conditions() {
        let value = match (&condition.op, &condition.value) {
            (Operator::In, Value::Array(_)) => json_to_bson(&condition.value)?,
            (Operator::In, single) => Bson::Array(vec![json_to_bson(single)?]),
            _ => json_to_bson(&condition.value)?,
        };

        let entry = out
            .entry(condition.field.clone())
            .or_insert_with(|| Bson::Document(Document::new()));
        if let Bson::Document(ops) = entry {
            ops.insert(operator_name(condition.op), value);
        }
    }
    Ok(out)
}

fn sort_value(direction: SortDirection) -> i32 {
    match direction {
        SortDirection::Ascending => 1,
        SortDirection::Descending => -1,
    }
}

// ---------------------------------------------------------------------------
// MongoStore
// ---------------------------------------------------------------------------

/// Document store backed by a MongoDB database
///
/// # Example
///
/// ```rust,ignore
/// let store = MongoStore::connect("mongodb://localhost:27017", "shop", Some(10)).await?;
/// let handle = StoreHandle::new(store);
/// ```
#[derive(Clone, Debug)]
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Connect to MongoDB; the connection pool is bounded by `max_pool_size`
    pub async fn connect(uri: &str, database: &str, max_pool_size: Option<u32>) -> Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| DocError::persistence("parse mongodb uri", e))?;
        options.max_pool_size = max_pool_size;

        let client =
            Client::with_options(options).map_err(|e| DocError::persistence("connect", e))?;
        let database = client.database(database);
        Ok(Self { client, database })
    }

    /// Wrap an existing database handle
    pub fn from_database(client: Client, database: Database) -> Self {
        Self { client, database }
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.database.collection(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let doc = self
            .collection(collection)
            .find_one(doc! { "_id": key })
            .await
            .map_err(|e| map_error("get", collection, e))?;

        Ok(doc.map(document_to_json))
    }

    async fn get_many(&self, collection: &str, keys: &[String]) -> Result<Vec<(String, Value)>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let cursor = self
            .collection(collection)
            .find(doc! { "_id": { "$in": keys.to_vec() } })
            .await
            .map_err(|e| map_error("get_many", collection, e))?;

        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| map_error("get_many", collection, e))?;

        Ok(docs
            .into_iter()
            .filter_map(|doc| {
                let key = doc.get_str("_id").ok()?.to_string();
                Some((key, document_to_json(doc)))
            })
            .collect())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<DocumentStream> {
        let handle = self.collection(collection);
        let mut find = handle.find(filter_to_document(&query.filter)?);

        if let Some(sort) = query.filter.sort() {
            let mut order = Document::new();
            order.insert(sort.field.as_str(), sort_value(sort.direction));
            find = find.sort(order);
        }
        if query.skip > 0 {
            // the server stores skip as a signed 64-bit integer
            find = find.skip((query.skip as u64).min(i64::MAX as u64));
        }
        if let Some(limit) = query.limit {
            find = find.limit(limit as i64);
        }
        if let Some(projection) = &query.projection {
            let mut fields = Document::new();
            for field in projection.fields() {
                fields.insert(field.as_str(), 1);
            }
            find = find.projection(fields);
        }

        let cursor = find.await.map_err(|e| map_error("query", collection, e))?;
        let operation = format!("query {}", collection);
        Ok(cursor
            .map(move |doc| {
                doc.map(document_to_json)
                    .map_err(|e| DocError::persistence(operation.clone(), e))
            })
            .boxed())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        self.collection(collection)
            .count_documents(filter_to_document(filter)?)
            .await
            .map_err(|e| map_error("count", collection, e))
    }

    async fn insert(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        let doc = json_to_document(key, document)?;
        self.collection(collection)
            .insert_one(doc)
            .await
            .map_err(|e| map_error("insert", collection, e))?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        let doc = json_to_document(key, document)?;
        self.collection(collection)
            .replace_one(doc! { "_id": key }, doc)
            .upsert(true)
            .await
            .map_err(|e| map_error("upsert", collection, e))?;
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": key })
            .await
            .map_err(|e| map_error("delete", collection, e))?;
        Ok(result.deleted_count > 0)
    }

    async fn ensure_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
        let mut keys = Document::new();
        for (field, direction) in index.fields {
            keys.insert(*field, sort_value(*direction));
        }

        let options = IndexOptions::builder()
            .name(index.name.to_string())
            .unique(index.unique)
            .partial_filter_expression(
                index
                    .partial_string_field
                    .map(|field| doc! { field: { "$type": "string" } }),
            )
            .build();

        self.collection(collection)
            .create_index(IndexModel::builder().keys(keys).options(options).build())
            .await
            .map_err(|e| map_error("ensure_index", collection, e))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_translation_merges_fields() {
        let filter = Filter::new()
            .gte("quantity", 2)
            .lt("quantity", 10)
            .eq("visible", true)
            .is_in("category", vec![json!("a"), json!("b")]);

        let doc = filter_to_document(&filter).unwrap();
        let quantity = doc.get_document("quantity").unwrap();
        assert!(quantity.contains_key("$gte"));
        assert!(quantity.contains_key("$lt"));
        assert_eq!(doc.get_document("visible").unwrap(), &doc! { "$eq": true });
        assert_eq!(
            doc.get_document("category").unwrap(),
            &doc! { "$in": ["a", "b"] }
        );
    }

    #[test]
    fn test_document_conversion_uses_store_key() {
        let doc = json_to_document("USD", json!({"code": "USD", "symbol": "$"})).unwrap();
        assert_eq!(doc.get_str("_id").unwrap(), "USD");

        let back = document_to_json(doc);
        assert_eq!(back, json!({"code": "USD", "symbol": "$"}));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(json_to_document("k", json!([1, 2])).is_err());
    }
}
