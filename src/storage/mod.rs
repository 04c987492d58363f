//! Storage implementations for different backends

pub mod in_memory;
#[cfg(feature = "mongodb_backend")]
pub mod mongodb;

pub use self::in_memory::InMemoryStore;
#[cfg(feature = "mongodb_backend")]
pub use self::mongodb::MongoStore;

use crate::config::StoreConfig;
use crate::core::error::Result;
use crate::core::store::StoreHandle;

/// Open the store named by the configuration
///
/// Called once at startup; the returned handle is cloned into every service.
pub async fn init_store(config: &StoreConfig) -> Result<StoreHandle> {
    if config.is_memory() {
        tracing::info!("using in-memory document store");
        return Ok(StoreHandle::new(InMemoryStore::new()));
    }

    #[cfg(feature = "mongodb_backend")]
    {
        tracing::info!(database = %config.database, "connecting to mongodb");
        let store = MongoStore::connect(&config.uri, &config.database, config.pool_size).await?;
        Ok(StoreHandle::new(store))
    }

    #[cfg(not(feature = "mongodb_backend"))]
    {
        Err(crate::core::error::DocError::persistence(
            "init_store",
            format!(
                "no backend for '{}' (enable the mongodb_backend feature)",
                config.uri
            ),
        ))
    }
}
