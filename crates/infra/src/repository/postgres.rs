//! Postgres-backed account + store repository.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | RepositoryError |
//! |------------|-----------------|-----------------|
//! | Database (unique violation) | `23505` | `Conflict("username")` |
//! | anything else | - | `Backend` |
//!
//! ## Ownership sets
//!
//! `accounts.store_ids` is a `UUID[]`. Creating or deleting a store and
//! editing that array always happen in one transaction; dropping the
//! transaction on an early return rolls the whole unit back.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::{Span, instrument};
use uuid::Uuid;

use storefront_core::{
    Account, AccountId, AccountPatch, AccountRole, ListQuery, NewAccount, NewStore, Page, Store,
    StoreId,
};

use super::r#trait::{AccountRepository, RepositoryError, RepositoryResult, StoreRepository};

/// Idempotent schema, applied statement by statement on startup.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id UUID PRIMARY KEY,
        role TEXT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        full_name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        store_ids UUID[] NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stores (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        owner_id UUID NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_accounts_role ON accounts (role)",
    "CREATE INDEX IF NOT EXISTS idx_stores_owner ON stores (owner_id)",
];

const ACCOUNT_COLUMNS: &str =
    "id, role, username, email, full_name, password_hash, store_ids, created_at";
const STORE_COLUMNS: &str = "id, name, owner_id, created_at";

#[derive(Debug, Clone)]
pub struct PostgresDatabase {
    pool: Arc<PgPool>,
}

impl PostgresDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `url`.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they are missing.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> RepositoryResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    #[instrument(skip(self, account), fields(username = %account.username), err)]
    pub async fn insert_account(&self, account: NewAccount) -> RepositoryResult<Account> {
        let account = account.into_account(AccountId::new(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO accounts (id, role, username, email, full_name, password_hash, store_ids, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, '{}', $7)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.role.as_str())
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.full_name)
        .bind(&account.password_hash)
        .bind(account.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;

        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    pub async fn get_account(&self, id: AccountId) -> RepositoryResult<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_account", e))?;

        row.map(|r| decode::<AccountRow>(&r).map(Account::from))
            .transpose()
    }

    #[instrument(skip(self), err)]
    pub async fn find_account_by_username(
        &self,
        username: &str,
    ) -> RepositoryResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_account_by_username", e))?;

        row.map(|r| decode::<AccountRow>(&r).map(Account::from))
            .transpose()
    }

    #[instrument(skip(self), fields(search = ?query.search()), err)]
    pub async fn list_accounts(&self, query: &ListQuery) -> RepositoryResult<Page<Account>> {
        let pattern = query.search().map(like_pattern);
        let request = query.page();

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total FROM accounts
            WHERE ($1::TEXT IS NULL OR username ILIKE $1 ESCAPE '\')
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&*self.pool)
        .await
        .and_then(|row| row.try_get("total"))
        .map_err(|e| map_sqlx_error("count_accounts", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS} FROM accounts
            WHERE ($1::TEXT IS NULL OR username ILIKE $1 ESCAPE '\')
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(pattern.as_deref())
        .bind(i64::from(request.limit()))
        .bind(offset(request.offset()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?;

        let items = rows
            .iter()
            .map(|r| decode::<AccountRow>(r).map(Account::from))
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok(Page::new(items, total.max(0) as u64, request))
    }

    #[instrument(skip(self), err)]
    pub async fn count_accounts_by_role(&self, role: AccountRole) -> RepositoryResult<u64> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM accounts WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&*self.pool)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_accounts_by_role", e))?;
        Ok(total.max(0) as u64)
    }

    #[instrument(skip(self, patch), fields(account_id = %id), err)]
    pub async fn update_account(
        &self,
        id: AccountId,
        patch: AccountPatch,
    ) -> RepositoryResult<Account> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE accounts SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                full_name = COALESCE($4, full_name),
                password_hash = COALESCE($5, password_hash)
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(patch.username.as_deref())
        .bind(patch.email.as_deref())
        .bind(patch.full_name.as_deref())
        .bind(patch.password_hash.as_deref())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_account", e))?;

        match row {
            Some(r) => decode::<AccountRow>(&r).map(Account::from),
            None => Err(RepositoryError::NotFound("account")),
        }
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    pub async fn delete_account(&self, id: AccountId) -> RepositoryResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "DELETE FROM accounts WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_account", e))?;

        row.map(|r| decode::<AccountRow>(&r).map(Account::from))
            .transpose()
    }

    /// Insert the store and, if asked, append it to the owner's set.
    #[instrument(skip(self, store), fields(owner_id = %store.owner, store_id), err)]
    pub async fn create_store(
        &self,
        store: NewStore,
        append_to_owner: bool,
    ) -> RepositoryResult<Store> {
        let store = store.into_store(StoreId::new(), Utc::now());
        Span::current().record("store_id", tracing::field::display(store.id));

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("INSERT INTO stores (id, name, owner_id, created_at) VALUES ($1, $2, $3, $4)")
            .bind(store.id.as_uuid())
            .bind(&store.name)
            .bind(store.owner.as_uuid())
            .bind(store.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_store", e))?;

        if append_to_owner {
            let updated = sqlx::query(
                "UPDATE accounts SET store_ids = array_append(store_ids, $1) WHERE id = $2",
            )
            .bind(store.id.as_uuid())
            .bind(store.owner.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("append_store_id", e))?;

            if updated.rows_affected() == 0 {
                // `tx` is dropped here, rolling back the store insert.
                return Err(RepositoryError::NotFound("account"));
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(store)
    }

    #[instrument(skip(self), fields(store_id = %id), err)]
    pub async fn get_store(&self, id: StoreId) -> RepositoryResult<Option<Store>> {
        let row = sqlx::query(&format!("SELECT {STORE_COLUMNS} FROM stores WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_store", e))?;

        row.map(|r| decode::<StoreRow>(&r).map(Store::from))
            .transpose()
    }

    #[instrument(skip(self), fields(search = ?query.search()), err)]
    pub async fn list_stores(&self, query: &ListQuery) -> RepositoryResult<Page<Store>> {
        let pattern = query.search().map(like_pattern);
        let request = query.page();

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total FROM stores
            WHERE ($1::TEXT IS NULL OR name ILIKE $1 ESCAPE '\')
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&*self.pool)
        .await
        .and_then(|row| row.try_get("total"))
        .map_err(|e| map_sqlx_error("count_stores", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {STORE_COLUMNS} FROM stores
            WHERE ($1::TEXT IS NULL OR name ILIKE $1 ESCAPE '\')
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(pattern.as_deref())
        .bind(i64::from(request.limit()))
        .bind(offset(request.offset()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stores", e))?;

        let items = rows
            .iter()
            .map(|r| decode::<StoreRow>(r).map(Store::from))
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok(Page::new(items, total.max(0) as u64, request))
    }

    #[instrument(skip(self), fields(owner_id = %owner), err)]
    pub async fn count_stores_owned_by(&self, owner: AccountId) -> RepositoryResult<u64> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM stores WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_stores_owned_by", e))?;
        Ok(total.max(0) as u64)
    }

    /// Prune the store id from its owner's set, then delete the store.
    #[instrument(skip(self), fields(store_id = %id), err)]
    pub async fn delete_store(&self, id: StoreId) -> RepositoryResult<Option<Store>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let owner: Option<Uuid> = sqlx::query("SELECT owner_id FROM stores WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .and_then(|row| row.map(|r| r.try_get("owner_id")).transpose())
            .map_err(|e| map_sqlx_error("lock_store", e))?;

        let Some(owner) = owner else {
            return Ok(None);
        };

        sqlx::query("UPDATE accounts SET store_ids = array_remove(store_ids, $1) WHERE id = $2")
            .bind(id.as_uuid())
            .bind(owner)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("prune_store_id", e))?;

        let row = sqlx::query(&format!(
            "DELETE FROM stores WHERE id = $1 RETURNING {STORE_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_store", e))?;

        let store = row
            .map(|r| decode::<StoreRow>(&r).map(Store::from))
            .transpose()?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(store)
    }
}

#[async_trait::async_trait]
impl AccountRepository for PostgresDatabase {
    async fn insert(&self, account: NewAccount) -> RepositoryResult<Account> {
        self.insert_account(account).await
    }

    async fn get(&self, id: AccountId) -> RepositoryResult<Option<Account>> {
        self.get_account(id).await
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<Account>> {
        self.find_account_by_username(username).await
    }

    async fn list(&self, query: &ListQuery) -> RepositoryResult<Page<Account>> {
        self.list_accounts(query).await
    }

    async fn count_by_role(&self, role: AccountRole) -> RepositoryResult<u64> {
        self.count_accounts_by_role(role).await
    }

    async fn update(&self, id: AccountId, patch: AccountPatch) -> RepositoryResult<Account> {
        self.update_account(id, patch).await
    }

    async fn delete(&self, id: AccountId) -> RepositoryResult<Option<Account>> {
        self.delete_account(id).await
    }
}

#[async_trait::async_trait]
impl StoreRepository for PostgresDatabase {
    async fn create(&self, store: NewStore, append_to_owner: bool) -> RepositoryResult<Store> {
        self.create_store(store, append_to_owner).await
    }

    async fn get(&self, id: StoreId) -> RepositoryResult<Option<Store>> {
        self.get_store(id).await
    }

    async fn list(&self, query: &ListQuery) -> RepositoryResult<Page<Store>> {
        self.list_stores(query).await
    }

    async fn count_owned_by(&self, owner: AccountId) -> RepositoryResult<u64> {
        self.count_stores_owned_by(owner).await
    }

    async fn delete(&self, id: StoreId) -> RepositoryResult<Option<Store>> {
        self.delete_store(id).await
    }
}

/// Turn a literal search term into an `ILIKE` pattern (escape char `\`).
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn offset(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

fn decode<'r, T: FromRow<'r, PgRow>>(row: &'r PgRow) -> RepositoryResult<T> {
    T::from_row(row).map_err(|e| map_sqlx_error("decode_row", e))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> RepositoryError {
    if is_unique_violation(&err) {
        return RepositoryError::Conflict("username");
    }
    RepositoryError::Backend(format!("{operation}: {err}"))
}

// SQLx row types

#[derive(Debug)]
struct AccountRow {
    id: Uuid,
    role: AccountRole,
    username: String,
    email: String,
    full_name: String,
    password_hash: String,
    store_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for AccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(AccountRow {
            id: row.try_get("id")?,
            role: role.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            full_name: row.try_get("full_name")?,
            password_hash: row.try_get("password_hash")?,
            store_ids: row.try_get("store_ids")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId::from_uuid(row.id),
            role: row.role,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            password_hash: row.password_hash,
            stores: row.store_ids.into_iter().map(StoreId::from_uuid).collect(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
struct StoreRow {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for StoreRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoreRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            owner_id: row.try_get("owner_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Store {
            id: StoreId::from_uuid(row.id),
            name: row.name,
            owner: AccountId::from_uuid(row.owner_id),
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("shop"), "%shop%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn offset_saturates() {
        assert_eq!(offset(20), 20);
        assert_eq!(offset(u64::MAX), i64::MAX);
    }
}
