//! Account and store lifecycles on top of the repositories.
//!
//! Every operation takes the caller's [`Claim`] and runs it through the
//! authorization policy before touching storage. Denials come back as the
//! same `NotFound` the caller would see for a missing resource.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::OnceCell;

use storefront_auth::{
    authorize, Action, Claim, Hs256Tokens, JwtValidator, PasswordHashing, Subject, Target,
    TokenIssuer,
};
use storefront_core::{
    Account, AccountId, AccountPatch, AccountRole, ListQuery, NewAccount, NewStore, Page, Store,
    StoreId,
};
use storefront_infra::{
    AccountRepository, AppConfig, Deadline, InMemoryDatabase, PostgresDatabase, RepositoryError,
    SeedAdmin, StorageConfig, StoreRepository,
};

use crate::app::dto::{AccountInput, UpdateAccountRequest};
use crate::app::errors::{ApiError, ApiResult};

const USER_NOT_FOUND: &str = "User not found";
const STORE_NOT_FOUND: &str = "Store not found";
const DECOY_PASSWORD: &str = "storefront-decoy";

pub struct AppServices {
    accounts: Arc<dyn AccountRepository>,
    stores: Arc<dyn StoreRepository>,
    tokens: Arc<Hs256Tokens>,
    hasher: PasswordHashing,
    /// Hash checked against on unknown usernames so both login failures cost the same.
    decoy_hash: OnceCell<String>,
}

/// Wire repositories for the configured backend.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let tokens = Arc::new(Hs256Tokens::new(config.jwt_secret.as_bytes(), config.token_ttl));
    let hasher = PasswordHashing::new(config.hashing)?;

    let services = match &config.storage {
        StorageConfig::InMemory => {
            tracing::info!("using in-memory storage");
            let db = Arc::new(Deadline::new(InMemoryDatabase::new(), config.db_timeout));
            AppServices::new(db.clone(), db, tokens, hasher)
        }
        StorageConfig::Postgres {
            url,
            max_connections,
        } => {
            tracing::info!(max_connections, "using postgres storage");
            let pg = PostgresDatabase::connect(url, *max_connections, config.db_timeout).await?;
            pg.migrate().await?;
            let db = Arc::new(Deadline::new(pg, config.db_timeout));
            AppServices::new(db.clone(), db, tokens, hasher)
        }
    };

    services.decoy_hash().await?;
    if let Some(seed) = &config.seed_admin {
        services.seed_admin(seed).await?;
    }
    Ok(services)
}

impl AppServices {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        stores: Arc<dyn StoreRepository>,
        tokens: Arc<Hs256Tokens>,
        hasher: PasswordHashing,
    ) -> Self {
        Self {
            accounts,
            stores,
            tokens,
            hasher,
            decoy_hash: OnceCell::new(),
        }
    }

    /// The validator the claim middleware uses.
    pub fn jwt_validator(&self) -> Arc<dyn JwtValidator> {
        self.tokens.clone()
    }

    // -------------------------
    // Auth
    // -------------------------

    /// Self-service registration; always creates a `user`.
    pub async fn register(&self, input: AccountInput) -> ApiResult<AccountId> {
        let account = self
            .insert_account(AccountInput {
                role: AccountRole::User,
                ..input
            })
            .await?;
        tracing::info!(account_id = %account.id, "account registered");
        Ok(account.id)
    }

    /// Exchange credentials for a signed token.
    ///
    /// An unknown username and a wrong password fail identically.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<String> {
        let Some(account) = self.accounts.find_by_username(username).await? else {
            let decoy = self.decoy_hash().await?;
            self.verify_password(password, decoy).await?;
            return Err(ApiError::InvalidCredentials);
        };

        if !self.verify_password(password, &account.password_hash).await? {
            return Err(ApiError::InvalidCredentials);
        }

        let token = self
            .tokens
            .issue(&account, Utc::now())
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        tracing::info!(account_id = %account.id, role = %account.role, "login succeeded");
        Ok(token)
    }

    // -------------------------
    // Accounts
    // -------------------------

    pub async fn create_account(&self, claim: Claim, input: AccountInput) -> ApiResult<AccountId> {
        let claim = require_authenticated(claim)?;
        permit(claim, Target::Account(None), Action::Create, "Not found")?;

        let account = self.insert_account(input).await?;
        tracing::info!(account_id = %account.id, role = %account.role, "account created by admin");
        Ok(account.id)
    }

    pub async fn list_accounts(&self, claim: Claim, query: &ListQuery) -> ApiResult<Page<Account>> {
        let claim = require_authenticated(claim)?;
        permit(claim, Target::Account(None), Action::ReadMany, "Not found")?;
        Ok(self.accounts.list(query).await?)
    }

    pub async fn get_account(&self, claim: Claim, raw_id: &str) -> ApiResult<Account> {
        let claim = require_authenticated(claim)?;
        let id = raw_id.parse::<AccountId>().ok();
        permit(claim, Target::Account(id), Action::ReadOne, USER_NOT_FOUND)?;

        let id = id.ok_or_else(|| ApiError::bad_request(format!("invalid user id '{raw_id}'")))?;
        self.accounts
            .get(id)
            .await?
            .ok_or(ApiError::NotFound(USER_NOT_FOUND))
    }

    /// Partial merge of the supplied fields. Role and ownership set are
    /// not reachable from here.
    pub async fn update_account(
        &self,
        claim: Claim,
        raw_id: &str,
        request: UpdateAccountRequest,
    ) -> ApiResult<Account> {
        let claim = require_authenticated(claim)?;
        let id = raw_id.parse::<AccountId>().ok();
        permit(claim, Target::Account(id), Action::Update, USER_NOT_FOUND)?;
        let id = id.ok_or(ApiError::NotFound(USER_NOT_FOUND))?;

        let request = request.validate()?;
        let password_hash = match request.password {
            Some(password) => Some(self.hash_password(password).await?),
            None => None,
        };
        let patch = AccountPatch {
            username: request.username,
            email: request.email,
            full_name: request.full_name,
            password_hash,
        };

        if patch.is_empty() {
            return self
                .accounts
                .get(id)
                .await?
                .ok_or(ApiError::NotFound(USER_NOT_FOUND));
        }

        match self.accounts.update(id, patch).await {
            Ok(account) => {
                tracing::info!(account_id = %id, "account updated");
                Ok(account)
            }
            Err(RepositoryError::NotFound(_)) => Err(ApiError::NotFound(USER_NOT_FOUND)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the account. Its stores stay behind, owned by the deleted id.
    pub async fn delete_account(&self, claim: Claim, raw_id: &str) -> ApiResult<()> {
        let claim = require_authenticated(claim)?;
        let id = raw_id.parse::<AccountId>().ok();
        permit(claim, Target::Account(id), Action::Delete, USER_NOT_FOUND)?;
        let id = id.ok_or(ApiError::NotFound(USER_NOT_FOUND))?;

        if self.accounts.delete(id).await?.is_none() {
            return Err(ApiError::NotFound(USER_NOT_FOUND));
        }

        let orphaned = self.stores.count_owned_by(id).await?;
        if orphaned > 0 {
            tracing::warn!(account_id = %id, orphaned_stores = orphaned, "account deleted with stores left behind");
        } else {
            tracing::info!(account_id = %id, "account deleted");
        }
        Ok(())
    }

    /// Create the admin from configuration if no admin exists yet.
    pub async fn seed_admin(&self, seed: &SeedAdmin) -> ApiResult<Option<AccountId>> {
        if self.accounts.count_by_role(AccountRole::Admin).await? > 0 {
            tracing::debug!("admin already present; skipping seed");
            return Ok(None);
        }

        let input = AccountInput {
            username: seed.username.clone(),
            password: seed.password.clone(),
            email: seed.email.clone(),
            full_name: seed.username.clone(),
            role: AccountRole::Admin,
        };
        match self.insert_account(input).await {
            Ok(account) => {
                tracing::info!(account_id = %account.id, username = %account.username, "seeded admin account");
                Ok(Some(account.id))
            }
            Err(ApiError::Conflict(_)) => {
                tracing::warn!(username = %seed.username, "seed admin username already taken; skipping");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // -------------------------
    // Stores
    // -------------------------

    /// Create a store owned by the caller. A user's ownership set gains the
    /// new id in the same atomic unit.
    pub async fn create_store(&self, claim: Claim, name: String) -> ApiResult<StoreId> {
        let claim = require_authenticated(claim)?;
        permit(claim, Target::Store(None), Action::Create, "Not found")?;

        let (owner, append_to_owner) = match claim {
            Claim::User(id) => (id, true),
            Claim::Admin(id) => (id, false),
            Claim::Anonymous => return Err(ApiError::MissingToken),
        };

        match self.stores.create(NewStore { name, owner }, append_to_owner).await {
            Ok(store) => {
                tracing::info!(store_id = %store.id, owner_id = %owner, "store created");
                Ok(store.id)
            }
            Err(RepositoryError::NotFound(_)) => Err(ApiError::NotFound(USER_NOT_FOUND)),
            Err(e) => Err(e.into()),
        }
    }

    /// Public listing.
    pub async fn list_stores(&self, claim: Claim, query: &ListQuery) -> ApiResult<Page<Store>> {
        permit(claim, Target::Store(None), Action::ReadMany, "Not found")?;
        Ok(self.stores.list(query).await?)
    }

    pub async fn get_store(&self, claim: Claim, raw_id: &str) -> ApiResult<Store> {
        let id = raw_id
            .parse::<StoreId>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        permit(claim, Target::Store(Some(id)), Action::ReadOne, STORE_NOT_FOUND)?;

        self.stores
            .get(id)
            .await?
            .ok_or(ApiError::NotFound(STORE_NOT_FOUND))
    }

    /// Delete a store the caller owns (or any store, for admins).
    ///
    /// Non-owners get exactly the response for a store that does not exist.
    pub async fn delete_store(&self, claim: Claim, raw_id: &str) -> ApiResult<()> {
        let claim = require_authenticated(claim)?;
        let id = raw_id.parse::<StoreId>().ok();

        let owned = match claim {
            Claim::User(me) => self
                .accounts
                .get(me)
                .await?
                .map(|a| a.stores)
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let subject = Subject::with_owned_stores(claim, &owned);
        authorize(&subject, Target::Store(id), Action::Delete)
            .map_err(|e| deny(e, STORE_NOT_FOUND))?;

        let id = id.ok_or(ApiError::NotFound(STORE_NOT_FOUND))?;
        match self.stores.delete(id).await? {
            Some(store) => {
                tracing::info!(store_id = %id, owner_id = %store.owner, "store deleted");
                Ok(())
            }
            None => Err(ApiError::NotFound(STORE_NOT_FOUND)),
        }
    }

    // -------------------------
    // Helpers
    // -------------------------

    async fn insert_account(&self, input: AccountInput) -> ApiResult<Account> {
        let password_hash = self.hash_password(input.password).await?;
        let account = NewAccount {
            role: input.role,
            username: input.username,
            email: input.email,
            full_name: input.full_name,
            password_hash,
        };
        Ok(self.accounts.insert(account).await?)
    }

    async fn hash_password(&self, password: String) -> ApiResult<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    async fn decoy_hash(&self) -> ApiResult<&str> {
        self.decoy_hash
            .get_or_try_init(|| self.hash_password(DECOY_PASSWORD.to_string()))
            .await
            .map(String::as_str)
    }

    async fn verify_password(&self, password: &str, phc: &str) -> ApiResult<bool> {
        let hasher = self.hasher.clone();
        let (password, phc) = (password.to_string(), phc.to_string());
        tokio::task::spawn_blocking(move || hasher.verify(&password, &phc))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}

/// Authenticated operations turn an anonymous caller away before the policy runs.
fn require_authenticated(claim: Claim) -> ApiResult<Claim> {
    if claim.is_authenticated() {
        Ok(claim)
    } else {
        Err(ApiError::MissingToken)
    }
}

fn permit(claim: Claim, target: Target, action: Action, not_found: &'static str) -> ApiResult<()> {
    authorize(&Subject::new(claim), target, action).map_err(|e| deny(e, not_found))
}

fn deny(err: storefront_auth::AuthzError, not_found: &'static str) -> ApiError {
    tracing::debug!(error = %err, "request denied");
    ApiError::NotFound(not_found)
}
