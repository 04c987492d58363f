//! Shared test harness for document store backends
//!
//! Provides `Gadget`, a document type with a unique `sku` index, plus helpers
//! for building field maps. The `document_store_tests!` macro runs the CRUD
//! service contract against any `StoreHandle` factory.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod document_store_tests;

use docgate::core::entity::{IndexSpec, Timestamps};
use docgate::core::query::SortDirection;
use docgate::core::schema::SchemaRegistry;
use docgate::core::service::FieldMap;
use docgate::core::store::StoreHandle;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

const GADGET_SKU: &[(&str, SortDirection)] = &[("sku", SortDirection::Ascending)];

/// Test document covering strings, numbers, booleans and arrays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gadget {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub maker: Option<String>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

docgate::impl_document!(Gadget,
    key: id: Uuid,
    collection: "gadgets",
    name: "gadget",
    required: ["name", "sku"],
    indexes: [IndexSpec::new("gadget_sku", GADGET_SKU).unique()],
);

docgate::impl_serializable!(Gadget);

/// Unwrap a `json!` object into a field map
pub fn fields(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub fn gadget_fields(name: &str, sku: &str, price: f64, stock: i64) -> FieldMap {
    fields(json!({
        "name": name,
        "sku": sku,
        "price": price,
        "stock": stock,
        "active": stock > 0,
        "tags": ["test"],
    }))
}

/// Register the gadget schema (and its unique index) on a store
pub async fn install_gadgets(store: &StoreHandle) {
    SchemaRegistry::new()
        .with::<Gadget>()
        .install(store)
        .await
        .expect("schema install should succeed");
}
