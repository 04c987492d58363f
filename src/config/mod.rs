//! Configuration loading and management
//!
//! Settings are read from YAML and then overridden by the process
//! environment, so a deployment can ship one file and inject secrets:
//!
//! ```yaml
//! store:
//!   uri: mongodb://localhost:27017
//!   database: shop
//!   pool_size: 20
//! auth:
//!   secret: change-me
//!   algorithm: HS256
//!   expires_in_hours: 24
//!   allow_list: ["/register", "/login", "/health"]
//! ```

use crate::core::error::DocError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// URI selecting the in-memory store
pub const MEMORY_URI: &str = "memory://";

/// Connection settings of the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection string; `memory://` selects the in-memory store
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Database name
    #[serde(default = "default_database")]
    pub database: String,

    /// Upper bound on pooled connections
    #[serde(default)]
    pub pool_size: Option<u32>,
}

fn default_uri() -> String {
    MEMORY_URI.to_string()
}

fn default_database() -> String {
    "docgate".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: default_database(),
            pool_size: None,
        }
    }
}

impl StoreConfig {
    pub fn is_memory(&self) -> bool {
        self.uri.starts_with(MEMORY_URI)
    }
}

/// Credential and token settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing secret
    #[serde(default)]
    pub secret: String,

    /// Signing algorithm name (HS256, HS384 or HS512)
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Token lifetime
    #[serde(default = "default_expires_in_hours")]
    pub expires_in_hours: i64,

    /// bcrypt work factor
    #[serde(default = "default_password_cost")]
    pub password_cost: u32,

    /// Exact paths reachable without a token
    #[serde(default = "default_allow_list")]
    pub allow_list: Vec<String>,
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_expires_in_hours() -> i64 {
    24
}

fn default_password_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_allow_list() -> Vec<String> {
    ["/register", "/login", "/options", "/features", "/health"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: default_algorithm(),
            expires_in_hours: default_expires_in_hours(),
            password_cost: default_password_cost(),
            allow_list: default_allow_list(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("expires_in_hours", &self.expires_in_hours)
            .field("password_cost", &self.password_cost)
            .field("allow_list", &self.allow_list)
            .finish()
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("invalid YAML configuration")?;
        Ok(config)
    }

    /// Load from an optional YAML file, apply the environment and validate
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Override settings from an arbitrary variable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup("MONGO_DB_URI") {
            self.store.uri = uri;
        }
        if let Some(database) = lookup("MONGO_DB_NAME") {
            self.store.database = database;
        }
        if let Some(size) = lookup("MONGO_POOL_SIZE") {
            self.store.pool_size = Some(
                size.parse()
                    .with_context(|| format!("MONGO_POOL_SIZE is not a number: {}", size))?,
            );
        }
        if let Some(secret) = lookup("JWT_SECRET_KEY") {
            self.auth.secret = secret;
        }
        if let Some(algorithm) = lookup("JWT_ALGORITHM") {
            self.auth.algorithm = algorithm;
        }
        if let Some(hours) = lookup("JWT_EXPIRES_IN_HOURS") {
            self.auth.expires_in_hours = hours
                .parse()
                .with_context(|| format!("JWT_EXPIRES_IN_HOURS is not a number: {}", hours))?;
        }
        if let Some(cost) = lookup("PASSWORD_HASH_COST") {
            self.auth.password_cost = cost
                .parse()
                .with_context(|| format!("PASSWORD_HASH_COST is not a number: {}", cost))?;
        }
        if let Some(paths) = lookup("AUTH_ALLOWED_PATHS") {
            self.auth.allow_list = paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<(), DocError> {
        if self.store.uri.trim().is_empty() {
            return Err(DocError::field_validation("store.uri", "must not be empty"));
        }
        if self.store.pool_size == Some(0) {
            return Err(DocError::field_validation("store.pool_size", "must be positive"));
        }
        if self.auth.secret.is_empty() {
            return Err(DocError::field_validation("auth.secret", "must not be empty"));
        }
        if !matches!(self.auth.algorithm.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(DocError::field_validation(
                "auth.algorithm",
                format!("unsupported algorithm '{}'", self.auth.algorithm),
            ));
        }
        if self.auth.expires_in_hours <= 0 {
            return Err(DocError::field_validation(
                "auth.expires_in_hours",
                "must be positive",
            ));
        }
        if !(4..=31).contains(&self.auth.password_cost) {
            return Err(DocError::field_validation(
                "auth.password_cost",
                "must be between 4 and 31",
            ));
        }
        Ok(())
    }
}
