//! # docgate
//!
//! A document data layer with lazy references and a token-authentication gate.
//!
//! ## Features
//!
//! - **Static schemas**: document types declared with [`impl_document!`], registered in a
//!   [`SchemaRegistry`](core::schema::SchemaRegistry) that creates their indexes
//! - **Generic CRUD**: one [`CrudService<T>`](core::service::CrudService) per document type,
//!   wrapped by domain services
//! - **Lazy references**: [`Reference<T>`](core::reference::Reference) holds a key until resolved,
//!   and a missing target degrades to the key instead of failing the read
//! - **Token gate**: bcrypt credentials, JWT tokens and an axum middleware with a static allow-list
//! - **Pluggable storage**: in-memory store by default, MongoDB behind `mongodb_backend`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docgate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     docgate::server::init_tracing();
//!
//!     let config = AppConfig::load(Some("docgate.yaml"))?;
//!     ServerBuilder::new(config)
//!         .with_crud::<Product>()
//!         .with_crud::<Category>()
//!         .serve("127.0.0.1:3000")
//!         .await
//! }
//! ```

pub mod auth;
pub mod config;
pub mod core;
pub mod entities;
pub mod integrity;
pub mod models;
pub mod server;
pub mod services;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        CrudService, DocError, DocumentStore, EntitySchema, FieldMap, Filter, IndexSpec, Listing,
        Page, Persistable, PrimaryKey, Projection, Reference, ReferenceResolver, Result,
        SchemaRegistry, Serializable, SortDirection, StoreHandle, Timestamps,
    };

    // === Macros ===
    pub use crate::{impl_document, impl_serializable};

    // === Auth ===
    pub use crate::auth::{
        AuthGate, CredentialHolder, Identity, PasswordHash, PasswordHasher, TokenAuthority,
        TokenState, TokenSubject,
    };

    // === Models & services ===
    pub use crate::models::{
        Address, Category, Country, Currency, EmbeddedAttribute, Location, Person, Price, Product,
        ProductStat, ProductVariant, SubCategory, User, default_registry,
    };
    pub use crate::services::{ProductService, UserService};

    // === Storage ===
    pub use crate::storage::{InMemoryStore, init_store};
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoStore;

    // === Config & server ===
    pub use crate::config::{AppConfig, AuthConfig, StoreConfig};
    pub use crate::integrity::{DanglingReference, audit_references};
    pub use crate::server::{Application, ServerBuilder};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;
}
