//! ServerBuilder for fluent API to build HTTP servers

use super::handlers::{AppState, account_routes, crud_routes, health_routes};
use crate::auth::{AuthGate, PasswordHasher, require_auth};
use crate::config::AppConfig;
use crate::core::entity::{Persistable, Serializable};
use crate::core::schema::SchemaRegistry;
use crate::core::service::CrudService;
use crate::core::store::StoreHandle;
use crate::models::default_registry;
use crate::services::UserService;
use crate::storage::init_store;
use anyhow::{Context, Result};
use axum::Router;
use axum::middleware::from_fn_with_state;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

type RouteFactory = Box<dyn FnOnce(&StoreHandle) -> Router + Send>;

/// Builder for the HTTP application
///
/// # Example
///
/// ```ignore
/// ServerBuilder::new(AppConfig::load(Some("docgate.yaml"))?)
///     .with_crud::<Product>()
///     .with_crud::<Category>()
///     .serve("127.0.0.1:3000")
///     .await?;
/// ```
pub struct ServerBuilder {
    config: AppConfig,
    registry: SchemaRegistry,
    store: Option<StoreHandle>,
    crud: Vec<RouteFactory>,
    custom_routes: Vec<Router>,
    cors: bool,
}

impl ServerBuilder {
    /// A builder over every document type of [`crate::models`]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: default_registry(),
            store: None,
            crud: Vec::new(),
            custom_routes: Vec::new(),
            cors: false,
        }
    }

    /// Use an already initialized store instead of the configured one
    pub fn with_store(mut self, store: StoreHandle) -> Self {
        self.store = Some(store);
        self
    }

    /// Register an additional document type
    pub fn with_schema<T: Persistable>(mut self) -> Self {
        self.registry.register::<T>();
        self
    }

    /// Expose generic CRUD routes for `T` under `/{collection}`
    pub fn with_crud<T: Persistable + Serializable>(mut self) -> Self {
        self.registry.register::<T>();
        self.crud
            .push(Box::new(|store| crud_routes(CrudService::<T>::new(store.clone()))));
        self
    }

    /// Add routes that sit behind the gate like every other route
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Answer CORS preflights permissively
    pub fn with_permissive_cors(mut self) -> Self {
        self.cors = true;
        self
    }

    /// Open the store, install schemas and assemble the router
    pub async fn build(self) -> Result<Application> {
        self.config.validate().context("invalid configuration")?;

        let store = match self.store {
            Some(store) => store,
            None => init_store(&self.config.store)
                .await
                .context("failed to initialize the document store")?,
        };
        self.registry
            .install(&store)
            .await
            .context("failed to install schemas")?;

        let hasher = PasswordHasher::from_config(&self.config.auth)?;
        let gate = AuthGate::from_config(&self.config.auth)?;
        let state = AppState {
            users: UserService::new(store.clone(), hasher),
            gate: gate.clone(),
        };

        let mut router = health_routes().merge(account_routes(state.clone()));
        for factory in self.crud {
            router = router.merge(factory(&store));
        }
        for custom in self.custom_routes {
            router = router.merge(custom);
        }

        let mut router = router
            .layer(from_fn_with_state(gate, require_auth))
            .layer(TraceLayer::new_for_http());
        if self.cors {
            router = router.layer(CorsLayer::permissive());
        }

        Ok(Application {
            router,
            store,
            state,
        })
    }

    /// Build and serve with graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        self.build().await?.serve(addr).await
    }
}

/// An assembled application
#[derive(Debug, Clone)]
pub struct Application {
    pub router: Router,
    pub store: StoreHandle,
    pub state: AppState,
}

impl Application {
    /// Serve until Ctrl+C or SIGTERM, then close the store
    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.store.close().await?;
        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
