//! Account model (users and admins share one identity namespace).

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, DomainError, Entity, StoreId};

/// Role of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    #[default]
    User,
    Admin,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::User => "user",
            AccountRole::Admin => "admin",
        }
    }
}

impl core::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(AccountRole::User),
            "admin" => Ok(AccountRole::Admin),
            other => Err(DomainError::invalid_parameter(format!(
                "role must be one of: user, admin (got '{other}')"
            ))),
        }
    }
}

/// A persisted account.
///
/// # Invariants
/// - `username` is unique across all accounts (enforced by storage).
/// - `password_hash` is a PHC string; it never leaves the process in a
///   response and is redacted from `Debug` output.
/// - `stores` only ever lists stores this account created, each at most once.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub role: AccountRole,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub stores: Vec<StoreId>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == AccountRole::Admin
    }

    /// Whether `store_id` is in this account's ownership set.
    pub fn owns(&self, store_id: StoreId) -> bool {
        self.stores.contains(&store_id)
    }
}

impl core::fmt::Debug for Account {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("password_hash", &"<redacted>")
            .field("stores", &self.stores)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> AccountId {
        self.id
    }
}

/// A validated account candidate whose secret has already been hashed.
#[derive(Clone)]
pub struct NewAccount {
    pub role: AccountRole,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
}

impl NewAccount {
    /// Materialize the candidate with a fresh identity and an empty ownership set.
    pub fn into_account(self, id: AccountId, created_at: DateTime<Utc>) -> Account {
        Account {
            id,
            role: self.role,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            password_hash: self.password_hash,
            stores: Vec::new(),
            created_at,
        }
    }
}

/// Partial update of an account. `None` leaves the field untouched.
///
/// Role and ownership set are not patchable.
#[derive(Clone, Default)]
pub struct AccountPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.full_name.is_none()
            && self.password_hash.is_none()
    }

    pub fn apply_to(&self, account: &mut Account) {
        if let Some(v) = &self.username {
            account.username = v.clone();
        }
        if let Some(v) = &self.email {
            account.email = v.clone();
        }
        if let Some(v) = &self.full_name {
            account.full_name = v.clone();
        }
        if let Some(v) = &self.password_hash {
            account.password_hash = v.clone();
        }
    }
}
