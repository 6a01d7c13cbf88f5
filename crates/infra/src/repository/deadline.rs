//! Per-operation time budget for repository calls.

use std::future::Future;
use std::time::Duration;

use storefront_core::{
    Account, AccountId, AccountPatch, AccountRole, ListQuery, NewAccount, NewStore, Page, Store,
    StoreId,
};

use super::r#trait::{AccountRepository, RepositoryError, RepositoryResult, StoreRepository};

/// Decorator that fails any wrapped call exceeding `budget` with
/// `RepositoryError::Timeout`. Nothing is retried.
#[derive(Debug, Clone)]
pub struct Deadline<R> {
    inner: R,
    budget: Duration,
}

impl<R> Deadline<R> {
    pub fn new(inner: R, budget: Duration) -> Self {
        Self { inner, budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    async fn run<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = RepositoryResult<T>>,
    ) -> RepositoryResult<T> {
        match tokio::time::timeout(self.budget, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, budget_ms = self.budget.as_millis() as u64, "storage operation timed out");
                Err(RepositoryError::Timeout {
                    operation,
                    budget: self.budget,
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl<R> AccountRepository for Deadline<R>
where
    R: AccountRepository,
{
    async fn insert(&self, account: NewAccount) -> RepositoryResult<Account> {
        self.run("accounts.insert", self.inner.insert(account)).await
    }

    async fn get(&self, id: AccountId) -> RepositoryResult<Option<Account>> {
        self.run("accounts.get", self.inner.get(id)).await
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<Account>> {
        self.run("accounts.find_by_username", self.inner.find_by_username(username))
            .await
    }

    async fn list(&self, query: &ListQuery) -> RepositoryResult<Page<Account>> {
        self.run("accounts.list", self.inner.list(query)).await
    }

    async fn count_by_role(&self, role: AccountRole) -> RepositoryResult<u64> {
        self.run("accounts.count_by_role", self.inner.count_by_role(role))
            .await
    }

    async fn update(&self, id: AccountId, patch: AccountPatch) -> RepositoryResult<Account> {
        self.run("accounts.update", self.inner.update(id, patch)).await
    }

    async fn delete(&self, id: AccountId) -> RepositoryResult<Option<Account>> {
        self.run("accounts.delete", AccountRepository::delete(&self.inner, id))
            .await
    }
}

#[async_trait::async_trait]
impl<R> StoreRepository for Deadline<R>
where
    R: StoreRepository,
{
    async fn create(&self, store: NewStore, append_to_owner: bool) -> RepositoryResult<Store> {
        self.run("stores.create", self.inner.create(store, append_to_owner))
            .await
    }

    async fn get(&self, id: StoreId) -> RepositoryResult<Option<Store>> {
        self.run("stores.get", StoreRepository::get(&self.inner, id)).await
    }

    async fn list(&self, query: &ListQuery) -> RepositoryResult<Page<Store>> {
        self.run("stores.list", StoreRepository::list(&self.inner, query))
            .await
    }

    async fn count_owned_by(&self, owner: AccountId) -> RepositoryResult<u64> {
        self.run("stores.count_owned_by", self.inner.count_owned_by(owner))
            .await
    }

    async fn delete(&self, id: StoreId) -> RepositoryResult<Option<Store>> {
        self.run("stores.delete", StoreRepository::delete(&self.inner, id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    /// Account repository whose reads never complete in time.
    struct Stalled;

    #[async_trait::async_trait]
    impl AccountRepository for Stalled {
        async fn insert(&self, account: NewAccount) -> RepositoryResult<Account> {
            Ok(account.into_account(AccountId::new(), Utc::now()))
        }

        async fn get(&self, _id: AccountId) -> RepositoryResult<Option<Account>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn find_by_username(&self, _username: &str) -> RepositoryResult<Option<Account>> {
            Ok(None)
        }

        async fn list(&self, query: &ListQuery) -> RepositoryResult<Page<Account>> {
            Ok(Page::new(Vec::new(), 0, query.page()))
        }

        async fn count_by_role(&self, _role: AccountRole) -> RepositoryResult<u64> {
            Ok(0)
        }

        async fn update(&self, _id: AccountId, _patch: AccountPatch) -> RepositoryResult<Account> {
            Err(RepositoryError::NotFound("account"))
        }

        async fn delete(&self, _id: AccountId) -> RepositoryResult<Option<Account>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn slow_call_fails_with_timeout() {
        let repo = Deadline::new(Stalled, Duration::from_millis(20));
        let err = repo.get(AccountId::new()).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Timeout { operation: "accounts.get", .. }
        ));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let repo = Deadline::new(Stalled, Duration::from_millis(20));
        assert_eq!(repo.count_by_role(AccountRole::Admin).await.unwrap(), 0);
    }
}
