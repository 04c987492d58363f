//! Entity traits defining the core abstraction for all stored documents
//!
//! Two capabilities are kept apart on purpose:
//!
//! - [`Persistable`]: how a type is stored (collection, primary key, required
//!   fields, references, indexes, timestamps)
//! - [`Serializable`]: how a type is turned into a plain JSON structure for
//!   callers, with redacted fields removed
//!
//! Schemas are static data ([`EntitySchema`]) declared next to the type,
//! usually through [`impl_document!`](crate::impl_document).

use crate::core::error::{DocError, Result};
use crate::core::query::SortDirection;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use uuid::Uuid;

/// A type usable as a document primary key
pub trait PrimaryKey:
    Clone + Debug + Display + Eq + Hash + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Generate a fresh key, or `None` when keys are natural and must be supplied
    fn generate() -> Option<Self>;

    /// Coerce a raw stored value into this key type
    fn coerce(raw: &Value) -> Option<Self>;

    /// Canonical string form used by the store
    fn to_store_key(&self) -> String {
        self.to_string()
    }
}

impl PrimaryKey for Uuid {
    fn generate() -> Option<Self> {
        Some(Uuid::new_v4())
    }

    fn coerce(raw: &Value) -> Option<Self> {
        raw.as_str().and_then(|s| Uuid::parse_str(s).ok())
    }
}

impl PrimaryKey for String {
    fn generate() -> Option<Self> {
        None
    }

    fn coerce(raw: &Value) -> Option<Self> {
        match raw {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Read the current key out of a struct's key field
///
/// Implemented for plain keys and for `Option` keys, so both natural keys
/// (`code: String`) and store-assigned keys (`id: Option<Uuid>`) work.
pub trait KeySlot<K> {
    fn current_key(&self) -> Option<K>;
}

impl<K: PrimaryKey> KeySlot<K> for Option<K> {
    fn current_key(&self) -> Option<K> {
        self.clone()
    }
}

impl KeySlot<String> for String {
    fn current_key(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.clone())
    }
}

impl KeySlot<Uuid> for Uuid {
    fn current_key(&self) -> Option<Uuid> {
        Some(*self)
    }
}

/// Creation and modification instants of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub date_created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Timestamps {
    /// Names of the timestamp fields in stored documents
    pub const FIELDS: [&'static str; 2] = ["date_created", "last_updated"];

    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            date_created: now,
            last_updated: now,
        }
    }

    /// Re-stamp `last_updated`; never moves it backwards
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_updated {
            self.last_updated = now;
        }
    }
}

impl Default for Timestamps {
    fn default() -> Self {
        Self::now()
    }
}

/// A reference field declared in a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceField {
    /// Dotted path, fanning out over arrays (`variants.prices.currency`)
    pub path: &'static str,
    /// Collection of the referenced documents
    pub target: &'static str,
}

impl ReferenceField {
    pub const fn new(path: &'static str, target: &'static str) -> Self {
        Self { path, target }
    }
}

/// Index declared in a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub fields: &'static [(&'static str, SortDirection)],
    pub unique: bool,
    /// Only index documents where this field holds a string
    pub partial_string_field: Option<&'static str>,
}

impl IndexSpec {
    pub const fn new(name: &'static str, fields: &'static [(&'static str, SortDirection)]) -> Self {
        Self {
            name,
            fields,
            unique: false,
            partial_string_field: None,
        }
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn partial_on_string(mut self, field: &'static str) -> Self {
        self.partial_string_field = Some(field);
        self
    }

    /// Whether the index applies to a document
    pub fn covers(&self, document: &Value) -> bool {
        match self.partial_string_field {
            Some(field) => crate::core::query::lookup_path(document, field).is_some_and(Value::is_string),
            None => true,
        }
    }

    /// Values of the indexed fields, missing fields read as null
    pub fn key_of(&self, document: &Value) -> Vec<Value> {
        self.fields
            .iter()
            .map(|(field, _)| {
                crate::core::query::lookup_path(document, field)
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect()
    }
}

/// Static description of a document type
#[derive(Debug)]
pub struct EntitySchema {
    /// Singular name (e.g. "user")
    pub name: &'static str,
    /// Collection name (e.g. "users")
    pub collection: &'static str,
    /// JSON field holding the primary key
    pub key_field: &'static str,
    /// Fields that must be present and non-null
    pub required: &'static [&'static str],
    pub references: &'static [ReferenceField],
    pub indexes: &'static [IndexSpec],
    /// Resolve this type's references through the batched path
    pub auto_dereference: bool,
}

/// Storage capability of a document type
pub trait Persistable: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    type Key: PrimaryKey;

    fn schema() -> &'static EntitySchema;

    /// The primary key, `None` until the document is saved
    fn primary_key(&self) -> Option<Self::Key>;

    fn timestamps(&self) -> &Timestamps;

    fn timestamps_mut(&mut self) -> &mut Timestamps;

    fn collection() -> &'static str {
        Self::schema().collection
    }

    fn store_key(&self) -> Option<String> {
        self.primary_key().map(|key| key.to_store_key())
    }

    fn is_saved(&self) -> bool {
        self.primary_key().is_some()
    }
}

/// Conversion of an entity into a plain JSON structure
pub trait Serializable: Serialize {
    /// Fields that never leave the process (e.g. credential hashes)
    fn redacted_fields() -> &'static [&'static str] {
        &[]
    }

    /// Plain JSON object without redacted or excluded fields
    fn to_dict(&self, exclude: &[&str]) -> Result<Value> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| DocError::validation(format!("cannot serialize entity: {}", e)))?;

        if let Value::Object(object) = &mut value {
            for field in Self::redacted_fields().iter().chain(exclude.iter()) {
                object.remove(*field);
            }
        }

        Ok(value)
    }
}

/// Decode a stored document; undecodable data is a storage failure
pub(crate) fn decode_document<T: DeserializeOwned>(collection: &str, document: Value) -> Result<T> {
    serde_json::from_value(document).map_err(|e| {
        DocError::persistence(format!("decode {}", collection), e)
    })
}

/// Encode an entity into its stored form
pub(crate) fn encode_document<T: Serialize>(collection: &str, entity: &T) -> Result<Value> {
    serde_json::to_value(entity).map_err(|e| {
        DocError::persistence(format!("encode {}", collection), e)
    })
}
