use std::time::Duration;

use thiserror::Error;

use storefront_core::{
    Account, AccountId, AccountPatch, AccountRole, ListQuery, NewAccount, NewStore, Page, Store,
    StoreId,
};

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Repository operation error.
///
/// These are **infrastructure errors** as opposed to domain errors
/// (validation, identifiers).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// A record the operation depends on does not exist.
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0} already in use")]
    Conflict(&'static str),

    #[error("storage operation '{operation}' timed out after {budget:?}")]
    Timeout {
        operation: &'static str,
        budget: Duration,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Account persistence.
///
/// Implementations must enforce username uniqueness across every role at
/// the storage level, so two concurrent inserts of the same username cannot
/// both succeed.
#[async_trait::async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account with an empty ownership set.
    ///
    /// Returns `Conflict("username")` when the username is taken.
    async fn insert(&self, account: NewAccount) -> RepositoryResult<Account>;

    async fn get(&self, id: AccountId) -> RepositoryResult<Option<Account>>;

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<Account>>;

    /// Filter by case-insensitive username substring, ordered by id.
    async fn list(&self, query: &ListQuery) -> RepositoryResult<Page<Account>>;

    async fn count_by_role(&self, role: AccountRole) -> RepositoryResult<u64>;

    /// Merge `patch` into the account.
    ///
    /// Returns `NotFound("account")` if absent, `Conflict("username")` if the
    /// new username is taken.
    async fn update(&self, id: AccountId, patch: AccountPatch) -> RepositoryResult<Account>;

    /// Remove the account. Owned stores are left in place.
    async fn delete(&self, id: AccountId) -> RepositoryResult<Option<Account>>;
}

/// Store persistence, including the owner's ownership set.
#[async_trait::async_trait]
pub trait StoreRepository: Send + Sync {
    /// Insert the store and, when `append_to_owner` is set, append its id to
    /// the owner's ownership set in the same atomic unit.
    ///
    /// If the owner account does not exist nothing is persisted and
    /// `NotFound("account")` is returned.
    async fn create(&self, store: NewStore, append_to_owner: bool) -> RepositoryResult<Store>;

    async fn get(&self, id: StoreId) -> RepositoryResult<Option<Store>>;

    /// Filter by case-insensitive name substring, ordered by id.
    async fn list(&self, query: &ListQuery) -> RepositoryResult<Page<Store>>;

    async fn count_owned_by(&self, owner: AccountId) -> RepositoryResult<u64>;

    /// Remove the store id from its owner's ownership set, then delete the
    /// store, as one atomic unit. Returns `None` if the store does not exist.
    async fn delete(&self, id: StoreId) -> RepositoryResult<Option<Store>>;
}
