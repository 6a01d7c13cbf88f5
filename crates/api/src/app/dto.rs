use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{
    Account, AccountId, AccountRole, DomainResult, FieldErrors, ListQuery, Page, PageRequest,
    Store, StoreId,
};

// -------------------------
// Response envelope
// -------------------------

/// Uniform JSON wrapper for every response. Absent fields are omitted.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize = serde_json::Value> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl<T: Serialize> Envelope<T> {
    fn empty(success: bool) -> Self {
        Self {
            success,
            message: None,
            data: None,
            error: None,
            total: None,
            page: None,
            last_page: None,
            limit: None,
        }
    }

    pub fn data(data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::empty(true)
        }
    }

    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            message: Some(message.into()),
            data: Some(data),
            ..Self::empty(true)
        }
    }
}

impl Envelope {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::empty(true)
        }
    }

    pub fn failure(message: impl Into<String>, error: Option<serde_json::Value>) -> Self {
        Self {
            message: Some(message.into()),
            error,
            ..Self::empty(false)
        }
    }
}

impl<T: Serialize> Envelope<Vec<T>> {
    pub fn page(page: Page<T>) -> Self {
        Self {
            total: Some(page.total),
            page: Some(page.page),
            last_page: Some(page.last_page),
            limit: Some(page.limit),
            ..Self::data(page.items)
        }
    }
}

// -------------------------
// Request DTOs
// -------------------------

/// Query string for list endpoints: `?s=<term>&page=<n>&limit=<n>`.
///
/// Numbers arrive as strings so parse failures get the envelope treatment.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub s: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListParams {
    pub fn into_query(self) -> DomainResult<ListQuery> {
        let page = PageRequest::parse(self.page.as_deref(), self.limit.as_deref())?;
        Ok(ListQuery::new(self.s, page))
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Body for `POST /api/auth/register` and `POST /api/users`.
///
/// `role` is only honoured on the admin route.
#[derive(Deserialize)]
pub struct AccountRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

/// A validated account candidate; the password is still plaintext.
pub struct AccountInput {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
    pub role: AccountRole,
}

impl AccountRequest {
    pub fn validate(self) -> Result<AccountInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .require("username", self.username.as_deref())
            .require("password", self.password.as_deref())
            .require("email", self.email.as_deref())
            .require("full_name", self.full_name.as_deref());

        let role = match self.role.as_deref().map(str::parse::<AccountRole>) {
            None => AccountRole::User,
            Some(Ok(role)) => role,
            Some(Err(_)) => {
                errors.add("role", "must be 'user' or 'admin'");
                AccountRole::User
            }
        };
        errors.into_result()?;

        Ok(AccountInput {
            username: self.username.unwrap_or_default().trim().to_string(),
            password: self.password.unwrap_or_default(),
            email: self.email.unwrap_or_default().trim().to_string(),
            full_name: self.full_name.unwrap_or_default().trim().to_string(),
            role,
        })
    }
}

/// Body for `PATCH /api/users/:userId`. Every field is optional.
#[derive(Default, Deserialize)]
pub struct UpdateAccountRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

impl UpdateAccountRequest {
    pub fn validate(self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .non_blank("username", self.username.as_deref())
            .non_blank("password", self.password.as_deref())
            .non_blank("email", self.email.as_deref())
            .non_blank("full_name", self.full_name.as_deref());
        errors.into_result()?;

        let trim = |v: Option<String>| v.map(|s| s.trim().to_string());
        Ok(Self {
            username: trim(self.username),
            password: self.password,
            email: trim(self.email),
            full_name: trim(self.full_name),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: Option<String>,
}

impl CreateStoreRequest {
    pub fn validate(self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", self.name.as_deref());
        errors.into_result()?;
        Ok(self.name.unwrap_or_default().trim().to_string())
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CreatedId<I: Serialize> {
    pub id: I,
}

/// Outbound account. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: AccountId,
    pub role: AccountRole,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub stores: Vec<StoreId>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            role: a.role,
            username: a.username,
            email: a.email,
            full_name: a.full_name,
            stores: a.stores,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StoreView {
    pub id: StoreId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

impl StoreView {
    /// View with the owner id included only when `show_owner` is set.
    pub fn new(store: Store, show_owner: bool) -> Self {
        Self {
            id: store.id,
            name: store.name,
            owner: show_owner.then_some(store.owner),
            created_at: store.created_at,
        }
    }
}
