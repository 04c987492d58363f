//! Reference integrity audit
//!
//! Reads tolerate dangling references, so nothing stops a product from
//! pointing at a deleted category. [`audit_references`] walks every
//! registered schema and reports such references after the fact.

use crate::core::entity::EntitySchema;
use crate::core::error::Result;
use crate::core::query::{Filter, Query, collect_path_values};
use crate::core::schema::SchemaRegistry;
use crate::core::store::StoreHandle;
use futures::TryStreamExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A stored reference whose target does not exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub collection: String,
    pub document_key: String,
    /// Dotted path of the reference field
    pub path: String,
    pub target_collection: String,
    pub target_key: String,
}

fn raw_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Scan every registered collection for references to missing documents
///
/// Embedded objects at a reference path are materialized values and are not
/// checked. Each (collection, path) pair costs one scan plus one batched
/// lookup.
pub async fn audit_references(
    store: &StoreHandle,
    registry: &SchemaRegistry,
) -> Result<Vec<DanglingReference>> {
    let mut dangling = Vec::new();

    for schema in registry.schemas() {
        if schema.references.is_empty() {
            continue;
        }
        let documents: Vec<Value> = store
            .query(schema.collection, &Query::new(Filter::new()))
            .await?
            .try_collect()
            .await?;

        for reference in schema.references {
            dangling.extend(audit_path(store, schema, &documents, reference.path, reference.target).await?);
        }
    }

    if dangling.is_empty() {
        tracing::info!(collections = registry.len(), "reference audit clean");
    }
    Ok(dangling)
}

async fn audit_path(
    store: &StoreHandle,
    schema: &EntitySchema,
    documents: &[Value],
    path: &str,
    target: &str,
) -> Result<Vec<DanglingReference>> {
    // target key -> owning document keys
    let mut owners: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for document in documents {
        let Some(document_key) = document.get(schema.key_field).and_then(raw_key) else {
            continue;
        };
        for value in collect_path_values(document, path) {
            if let Some(key) = raw_key(value) {
                owners.entry(key).or_default().insert(document_key.clone());
            }
        }
    }
    if owners.is_empty() {
        return Ok(Vec::new());
    }

    let keys: Vec<String> = owners.keys().cloned().collect();
    let found: HashSet<String> = store
        .get_many(target, &keys)
        .await?
        .into_iter()
        .map(|(key, _)| key)
        .collect();

    let mut dangling = Vec::new();
    for (target_key, documents) in owners {
        if found.contains(&target_key) {
            continue;
        }
        for document_key in documents {
            tracing::warn!(
                collection = schema.collection,
                document = %document_key,
                path,
                target,
                key = %target_key,
                "dangling reference"
            );
            dangling.push(DanglingReference {
                collection: schema.collection.to_string(),
                document_key,
                path: path.to_string(),
                target_collection: target.to_string(),
                target_key: target_key.clone(),
            });
        }
    }
    Ok(dangling)
}
