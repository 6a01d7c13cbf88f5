//! Process configuration, read from environment variables.
//!
//! A `.env` file can seed variables the environment does not already set.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use storefront_auth::HashingCost;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where accounts and stores live.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageConfig {
    InMemory,
    Postgres { url: String, max_connections: u32 },
}

impl core::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StorageConfig::InMemory => f.write_str("InMemory"),
            StorageConfig::Postgres {
                max_connections, ..
            } => f
                .debug_struct("Postgres")
                .field("url", &"<redacted>")
                .field("max_connections", max_connections)
                .finish(),
        }
    }
}

/// Credentials for the admin account created at startup when none exists.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedAdmin {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl core::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub storage: StorageConfig,
    /// Budget for a single repository call.
    pub db_timeout: Duration,
    pub hashing: HashingCost,
    pub seed_admin: Option<SeedAdmin>,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("storage", &self.storage)
            .field("db_timeout", &self.db_timeout)
            .field("hashing", &self.hashing)
            .field("seed_admin", &self.seed_admin)
            .finish()
    }
}

impl Default for AppConfig {
    /// In-memory storage with development defaults.
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl: chrono::Duration::hours(72),
            storage: StorageConfig::InMemory,
            db_timeout: Duration::from_secs(10),
            hashing: HashingCost::default(),
            seed_admin: None,
        }
    }
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any `name -> value` source. Unset and blank
    /// variables fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                defaults.jwt_secret
            }
        };

        let ttl_hours: u32 = parse_or("TOKEN_TTL_HOURS", get("TOKEN_TTL_HOURS"), 72)?;
        if ttl_hours == 0 {
            return Err(invalid("TOKEN_TTL_HOURS", "must be at least 1"));
        }

        let storage = if parse_or("USE_PERSISTENT_STORES", get("USE_PERSISTENT_STORES"), false)? {
            StorageConfig::Postgres {
                url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 10)?,
            }
        } else {
            StorageConfig::InMemory
        };

        let timeout_secs: u64 = parse_or("DB_TIMEOUT_SECS", get("DB_TIMEOUT_SECS"), 10)?;
        if timeout_secs == 0 {
            return Err(invalid("DB_TIMEOUT_SECS", "must be at least 1"));
        }

        let cost = defaults.hashing;
        let hashing = HashingCost {
            memory_kib: parse_or("ARGON2_MEMORY_KIB", get("ARGON2_MEMORY_KIB"), cost.memory_kib)?,
            iterations: parse_or("ARGON2_ITERATIONS", get("ARGON2_ITERATIONS"), cost.iterations)?,
            parallelism: parse_or("ARGON2_PARALLELISM", get("ARGON2_PARALLELISM"), cost.parallelism)?,
        };

        let seed_admin = match (get("ADMIN_USERNAME"), get("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(SeedAdmin {
                username,
                password,
                email: get("ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
            }),
            (Some(_), None) => return Err(ConfigError::Missing("ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("ADMIN_USERNAME")),
            (None, None) => None,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            jwt_secret,
            token_ttl: chrono::Duration::hours(i64::from(ttl_hours)),
            storage,
            db_timeout: Duration::from_secs(timeout_secs),
            hashing,
            seed_admin,
        })
    }

    /// `host:port` for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(name, e.to_string())),
    }
}

/// Merge `path` into the process environment without overriding variables
/// that are already set. Returns whether the file existed.
pub fn load_env_file(path: &Path) -> Result<bool, ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(invalid(".env", e.to_string())),
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}
