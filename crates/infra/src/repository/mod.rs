//! Resource repositories for accounts and stores.
//!
//! Two backends implement the same async traits:
//! - `InMemoryDatabase` for dev/tests (one lock guards both collections)
//! - `PostgresDatabase` for persistence (multi-row writes run in a transaction)
//!
//! `Deadline` wraps either backend and bounds every call by a time budget.

pub mod deadline;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use deadline::Deadline;
pub use in_memory::InMemoryDatabase;
pub use postgres::PostgresDatabase;
pub use r#trait::{AccountRepository, RepositoryError, RepositoryResult, StoreRepository};
