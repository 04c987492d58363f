//! Lazy references between documents
//!
//! A reference field stores the target's primary key. In memory it is either
//! still that raw key ([`Reference::Unresolved`]) or the loaded target
//! ([`Reference::Resolved`]). The [`ReferenceResolver`] is the only thing that
//! turns one into the other.
//!
//! Resolution is lenient by default: a key whose target is missing comes back
//! unchanged instead of failing the read. Owners that opt into
//! auto-dereference go through the batched lookup, which is strict.

use crate::core::entity::{Persistable, PrimaryKey, decode_document};
use crate::core::error::{DocError, Result};
use crate::core::store::StoreHandle;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A reference to another document
pub enum Reference<T: Persistable> {
    /// Raw key as stored
    Unresolved(T::Key),
    /// Loaded target document
    Resolved(Arc<T>),
}

impl<T: Persistable> Reference<T> {
    pub fn from_key(key: T::Key) -> Self {
        Reference::Unresolved(key)
    }

    pub fn from_entity(entity: T) -> Self {
        Reference::Resolved(Arc::new(entity))
    }

    /// Key of the target, whether or not it has been loaded
    pub fn key(&self) -> Option<T::Key> {
        match self {
            Reference::Unresolved(key) => Some(key.clone()),
            Reference::Resolved(entity) => entity.primary_key(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }

    pub fn entity(&self) -> Option<&Arc<T>> {
        match self {
            Reference::Resolved(entity) => Some(entity),
            Reference::Unresolved(_) => None,
        }
    }
}

impl<T: Persistable> Clone for Reference<T> {
    fn clone(&self) -> Self {
        match self {
            Reference::Unresolved(key) => Reference::Unresolved(key.clone()),
            Reference::Resolved(entity) => Reference::Resolved(Arc::clone(entity)),
        }
    }
}

impl<T: Persistable> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Unresolved(key) => f.debug_tuple("Unresolved").field(key).finish(),
            Reference::Resolved(entity) => f.debug_tuple("Resolved").field(entity).finish(),
        }
    }
}

/// References are equal when they point at the same key
impl<T: Persistable> PartialEq for Reference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

/// Stored form is always the raw key
impl<T: Persistable> Serialize for Reference<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.key() {
            Some(key) => key.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

/// Accepts a raw key, or an embedded object holding the whole target
impl<'de, T: Persistable> Deserialize<'de> for Reference<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        if raw.is_object() {
            return serde_json::from_value::<T>(raw)
                .map(Reference::from_entity)
                .map_err(D::Error::custom);
        }
        T::Key::coerce(&raw)
            .map(Reference::Unresolved)
            .ok_or_else(|| {
                D::Error::custom(format!(
                    "invalid reference to {}: {}",
                    T::schema().name,
                    raw
                ))
            })
    }
}

/// Turns raw references into loaded documents
#[derive(Clone, Debug)]
pub struct ReferenceResolver {
    store: StoreHandle,
}

impl ReferenceResolver {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Resolve a reference held by a document whose schema sets `auto_dereference`
    /// as given
    ///
    /// An already resolved reference is returned as is, without touching the
    /// store.
    pub async fn resolve<T: Persistable>(
        &self,
        auto_dereference: bool,
        reference: &Reference<T>,
    ) -> Result<Reference<T>> {
        match reference {
            Reference::Resolved(entity) => Ok(Reference::Resolved(Arc::clone(entity))),
            Reference::Unresolved(key) if auto_dereference => self.dereference(key).await,
            Reference::Unresolved(key) => self.lookup(key).await,
        }
    }

    /// Resolve using the owner type's schema flag
    pub async fn resolve_for<Owner: Persistable, T: Persistable>(
        &self,
        reference: &Reference<T>,
    ) -> Result<Reference<T>> {
        self.resolve(Owner::schema().auto_dereference, reference)
            .await
    }

    /// Resolve a raw stored value
    ///
    /// An object that decodes as the target is taken as already resolved. A
    /// value that cannot be coerced to the target's key type is malformed.
    pub async fn resolve_value<T: Persistable>(
        &self,
        auto_dereference: bool,
        raw: &Value,
    ) -> Result<Reference<T>> {
        if raw.is_object() {
            return serde_json::from_value::<T>(raw.clone())
                .map(Reference::from_entity)
                .map_err(|e| {
                    DocError::validation(format!(
                        "embedded {} does not decode: {}",
                        T::schema().name,
                        e
                    ))
                });
        }

        let key = T::Key::coerce(raw).ok_or_else(|| {
            DocError::validation(format!(
                "malformed reference to {}: {}",
                T::schema().name,
                raw
            ))
        })?;
        self.resolve(auto_dereference, &Reference::Unresolved(key))
            .await
    }

    /// Resolve many references to one collection with a single store call
    ///
    /// Missing targets stay unresolved.
    pub async fn resolve_many<T: Persistable>(
        &self,
        references: &[Reference<T>],
    ) -> Result<Vec<Reference<T>>> {
        let mut wanted: Vec<String> = references
            .iter()
            .filter_map(|reference| match reference {
                Reference::Unresolved(key) => Some(key.to_store_key()),
                Reference::Resolved(_) => None,
            })
            .collect();
        wanted.sort();
        wanted.dedup();

        let mut loaded: HashMap<String, Arc<T>> = HashMap::new();
        if !wanted.is_empty() {
            let collection = T::collection();
            for (key, document) in self.store.get_many(collection, &wanted).await? {
                loaded.insert(key, Arc::new(decode_document(collection, document)?));
            }
        }

        Ok(references
            .iter()
            .map(|reference| match reference {
                Reference::Unresolved(key) => loaded
                    .get(&key.to_store_key())
                    .map(|entity| Reference::Resolved(Arc::clone(entity)))
                    .unwrap_or_else(|| Reference::Unresolved(key.clone())),
                resolved => resolved.clone(),
            })
            .collect())
    }

    /// Strict single-element batch
    async fn dereference<T: Persistable>(&self, key: &T::Key) -> Result<Reference<T>> {
        let collection = T::collection();
        let store_key = key.to_store_key();
        let found = self
            .store
            .get_many(collection, std::slice::from_ref(&store_key))
            .await?;

        match found.into_iter().next() {
            Some((_, document)) => Ok(Reference::from_entity(decode_document(
                collection, document,
            )?)),
            None => Err(DocError::not_found(collection, store_key)),
        }
    }

    async fn lookup<T: Persistable>(&self, key: &T::Key) -> Result<Reference<T>> {
        let collection = T::collection();
        match self.store.get(collection, &key.to_store_key()).await? {
            Some(document) => Ok(Reference::from_entity(decode_document(
                collection, document,
            )?)),
            None => {
                tracing::debug!(collection, key = %key, "dangling reference left unresolved");
                Ok(Reference::Unresolved(key.clone()))
            }
        }
    }
}
