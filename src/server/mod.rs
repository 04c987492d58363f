//! HTTP server: account and CRUD routes behind the authentication gate
//!
//! [`ServerBuilder`] opens the store, installs the schemas and assembles:
//! - `/health`
//! - `/register`, `/login` and `/me`
//! - CRUD routes for every type added with `with_crud`
//! - custom routes

pub mod builder;
pub mod handlers;

pub use builder::{Application, ServerBuilder};
pub use handlers::{AppState, ListParams, crud_routes};

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber
///
/// Honours `RUST_LOG`; defaults to `docgate=info,tower_http=info`. Calling it
/// twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docgate=info,tower_http=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
