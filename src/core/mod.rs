//! Core types of the document data layer

pub mod entity;
pub mod error;
pub mod query;
pub mod reference;
pub mod schema;
pub mod service;
pub mod store;

pub use entity::{
    EntitySchema, IndexSpec, Persistable, PrimaryKey, ReferenceField, Serializable, Timestamps,
};
pub use error::{AuthFailure, DocError, Result};
pub use query::{Filter, Page, Projection, Query, SortDirection, SortKey};
pub use reference::{Reference, ReferenceResolver};
pub use schema::SchemaRegistry;
pub use service::{CrudService, FieldMap, Listing};
pub use store::{DocumentStore, DocumentStream, StoreHandle};
