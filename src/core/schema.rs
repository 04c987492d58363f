//! Registry of the document schemas known to the application

use crate::core::entity::{EntitySchema, Persistable};
use crate::core::error::{DocError, Result};
use crate::core::store::StoreHandle;
use std::collections::BTreeMap;

/// Registry of all document schemas, keyed by collection
///
/// Built once at startup. [`install`](Self::install) checks that every
/// reference points at a registered collection and creates the declared
/// indexes on the store.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<&'static str, &'static EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document type
    ///
    /// Registering the same type twice is a no-op.
    pub fn register<T: Persistable>(&mut self) -> &mut Self {
        let schema = T::schema();
        self.schemas.insert(schema.collection, schema);
        self
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<T: Persistable>(mut self) -> Self {
        self.register::<T>();
        self
    }

    pub fn get(&self, collection: &str) -> Option<&'static EntitySchema> {
        self.schemas.get(collection).copied()
    }

    pub fn contains(&self, collection: &str) -> bool {
        self.schemas.contains_key(collection)
    }

    /// Registered schemas, ordered by collection name
    pub fn schemas(&self) -> impl Iterator<Item = &'static EntitySchema> + '_ {
        self.schemas.values().copied()
    }

    pub fn collections(&self) -> Vec<&'static str> {
        self.schemas.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Check that every reference targets a registered collection
    pub fn validate(&self) -> Result<()> {
        for schema in self.schemas() {
            for reference in schema.references {
                if !self.contains(reference.target) {
                    return Err(DocError::validation(format!(
                        "{}.{} references unregistered collection '{}'",
                        schema.collection, reference.path, reference.target
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate the registry and create every declared index
    pub async fn install(&self, store: &StoreHandle) -> Result<()> {
        self.validate()?;

        for schema in self.schemas() {
            for index in schema.indexes {
                store.ensure_index(schema.collection, index).await?;
                tracing::debug!(
                    collection = schema.collection,
                    index = index.name,
                    unique = index.unique,
                    "index ensured"
                );
            }
        }

        tracing::info!(collections = self.len(), "schemas installed");
        Ok(())
    }
}
