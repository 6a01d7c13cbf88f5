use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use storefront_core::{
    Account, AccountId, AccountPatch, AccountRole, Entity, ListQuery, NewAccount, NewStore, Page,
    Store, StoreId,
};

use super::r#trait::{AccountRepository, RepositoryError, RepositoryResult, StoreRepository};

#[derive(Debug, Default)]
struct Collections {
    accounts: BTreeMap<AccountId, Account>,
    stores: BTreeMap<StoreId, Store>,
}

impl Collections {
    fn username_taken(&self, username: &str, except: Option<AccountId>) -> bool {
        self.accounts
            .values()
            .any(|a| a.username == username && Some(a.id) != except)
    }
}

/// In-memory account + store database.
///
/// Intended for tests/dev. A single lock guards both collections, so the
/// store/ownership-set pairs are always updated together.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    inner: RwLock<Collections>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, Collections>> {
        self.inner
            .read()
            .map_err(|_| RepositoryError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, Collections>> {
        self.inner
            .write()
            .map_err(|_| RepositoryError::Backend("lock poisoned".to_string()))
    }
}

/// Filter `table` (already ordered by id) and cut out the requested page.
fn page_of<T>(
    table: &BTreeMap<T::Id, T>,
    query: &ListQuery,
    search_key: impl Fn(&T) -> &str,
) -> Page<T>
where
    T: Entity + Clone,
{
    let request = query.page();
    let matched: Vec<&T> = table.values().filter(|v| query.matches(search_key(v))).collect();
    let total = matched.len() as u64;

    let items = matched
        .into_iter()
        .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
        .take(request.limit() as usize)
        .cloned()
        .collect();

    Page::new(items, total, request)
}

#[async_trait::async_trait]
impl AccountRepository for InMemoryDatabase {
    async fn insert(&self, account: NewAccount) -> RepositoryResult<Account> {
        let mut db = self.write()?;
        if db.username_taken(&account.username, None) {
            return Err(RepositoryError::Conflict("username"));
        }

        let account = account.into_account(AccountId::new(), Utc::now());
        db.accounts.insert(account.id(), account.clone());
        Ok(account)
    }

    async fn get(&self, id: AccountId) -> RepositoryResult<Option<Account>> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<Account>> {
        Ok(self
            .read()?
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn list(&self, query: &ListQuery) -> RepositoryResult<Page<Account>> {
        let db = self.read()?;
        Ok(page_of(&db.accounts, query, |a| a.username.as_str()))
    }

    async fn count_by_role(&self, role: AccountRole) -> RepositoryResult<u64> {
        let db = self.read()?;
        Ok(db.accounts.values().filter(|a| a.role == role).count() as u64)
    }

    async fn update(&self, id: AccountId, patch: AccountPatch) -> RepositoryResult<Account> {
        let mut db = self.write()?;
        if let Some(username) = &patch.username {
            if db.username_taken(username, Some(id)) {
                return Err(RepositoryError::Conflict("username"));
            }
        }

        let account = db
            .accounts
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound("account"))?;
        patch.apply_to(account);
        Ok(account.clone())
    }

    async fn delete(&self, id: AccountId) -> RepositoryResult<Option<Account>> {
        Ok(self.write()?.accounts.remove(&id))
    }
}

#[async_trait::async_trait]
impl StoreRepository for InMemoryDatabase {
    async fn create(&self, store: NewStore, append_to_owner: bool) -> RepositoryResult<Store> {
        let mut db = self.write()?;
        let Collections { accounts, stores } = &mut *db;

        let store = store.into_store(StoreId::new(), Utc::now());
        if append_to_owner {
            let owner = accounts
                .get_mut(&store.owner)
                .ok_or(RepositoryError::NotFound("account"))?;
            owner.stores.push(store.id);
        }
        stores.insert(store.id(), store.clone());
        Ok(store)
    }

    async fn get(&self, id: StoreId) -> RepositoryResult<Option<Store>> {
        Ok(self.read()?.stores.get(&id).cloned())
    }

    async fn list(&self, query: &ListQuery) -> RepositoryResult<Page<Store>> {
        let db = self.read()?;
        Ok(page_of(&db.stores, query, |s| s.name.as_str()))
    }

    async fn count_owned_by(&self, owner: AccountId) -> RepositoryResult<u64> {
        let db = self.read()?;
        Ok(db.stores.values().filter(|s| s.owner == owner).count() as u64)
    }

    async fn delete(&self, id: StoreId) -> RepositoryResult<Option<Store>> {
        let mut db = self.write()?;
        let Collections { accounts, stores } = &mut *db;

        let Some(owner) = stores.get(&id).map(|s| s.owner) else {
            return Ok(None);
        };
        // Prune before removing the store itself.
        if let Some(account) = accounts.get_mut(&owner) {
            account.stores.retain(|s| *s != id);
        }
        Ok(stores.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::PageRequest;

    fn candidate(username: &str) -> NewAccount {
        NewAccount {
            role: AccountRole::User,
            username: username.to_string(),
            email: format!("{username}@x.com"),
            full_name: username.to_uppercase(),
            password_hash: "hash".to_string(),
        }
    }

    fn store(name: &str, owner: AccountId) -> NewStore {
        NewStore {
            name: name.to_string(),
            owner,
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let db = InMemoryDatabase::new();
        db.insert(candidate("alice")).await.unwrap();

        let err = db.insert(candidate("alice")).await.unwrap_err();
        assert_eq!(err, RepositoryError::Conflict("username"));
        assert_eq!(db.count_by_role(AccountRole::User).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn renaming_onto_a_taken_username_is_a_conflict() {
        let db = InMemoryDatabase::new();
        db.insert(candidate("alice")).await.unwrap();
        let bob = db.insert(candidate("bob")).await.unwrap();

        let patch = AccountPatch {
            username: Some("alice".to_string()),
            ..Default::default()
        };
        assert_eq!(
            db.update(bob.id, patch).await.unwrap_err(),
            RepositoryError::Conflict("username")
        );

        // Keeping one's own username is not a conflict.
        let same = AccountPatch {
            username: Some("bob".to_string()),
            ..Default::default()
        };
        assert!(db.update(bob.id, same).await.is_ok());
    }

    #[tokio::test]
    async fn create_appends_to_owner_exactly_once() {
        let db = InMemoryDatabase::new();
        let alice = db.insert(candidate("alice")).await.unwrap();

        let s = db.create(store("Corner Shop", alice.id), true).await.unwrap();
        let owner = AccountRepository::get(&db, alice.id).await.unwrap().unwrap();
        assert_eq!(owner.stores, vec![s.id]);
    }

    #[tokio::test]
    async fn create_for_missing_owner_persists_nothing() {
        let db = InMemoryDatabase::new();
        let err = db.create(store("Ghost", AccountId::new()), true).await.unwrap_err();

        assert_eq!(err, RepositoryError::NotFound("account"));
        let page = StoreRepository::list(&db, &ListQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn delete_prunes_owner_and_removes_store() {
        let db = InMemoryDatabase::new();
        let alice = db.insert(candidate("alice")).await.unwrap();
        let keep = db.create(store("Keep", alice.id), true).await.unwrap();
        let gone = db.create(store("Gone", alice.id), true).await.unwrap();

        let removed = StoreRepository::delete(&db, gone.id).await.unwrap();
        assert_eq!(removed.map(|s| s.id), Some(gone.id));

        let owner = AccountRepository::get(&db, alice.id).await.unwrap().unwrap();
        assert_eq!(owner.stores, vec![keep.id]);
        assert!(StoreRepository::get(&db, gone.id).await.unwrap().is_none());
        assert!(StoreRepository::delete(&db, gone.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_and_pages_in_creation_order() {
        let db = InMemoryDatabase::new();
        let owner = AccountId::new();
        for name in ["Coffee One", "Tea", "coffee two", "COFFEE three", "Bakery"] {
            db.create(store(name, owner), false).await.unwrap();
        }

        let query = ListQuery::new(Some("coffee".to_string()), PageRequest::new(1, 2).unwrap());
        let page = StoreRepository::list(&db, &query).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.last_page, 2);
        let names: Vec<_> = page.items.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Coffee One", "coffee two"]);

        let query = ListQuery::new(Some("coffee".to_string()), PageRequest::new(2, 2).unwrap());
        let page = StoreRepository::list(&db, &query).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "COFFEE three");
    }

    #[tokio::test]
    async fn deleting_an_account_leaves_its_stores() {
        let db = InMemoryDatabase::new();
        let alice = db.insert(candidate("alice")).await.unwrap();
        db.create(store("Orphan", alice.id), true).await.unwrap();

        assert!(AccountRepository::delete(&db, alice.id).await.unwrap().is_some());
        assert_eq!(db.count_owned_by(alice.id).await.unwrap(), 1);
    }
}
