//! Infrastructure layer: repositories (in-memory + Postgres), deadlines, config.

pub mod config;
pub mod repository;

pub use config::{load_env_file, AppConfig, ConfigError, SeedAdmin, StorageConfig};
pub use repository::{
    AccountRepository, Deadline, InMemoryDatabase, PostgresDatabase, RepositoryError,
    RepositoryResult, StoreRepository,
};
