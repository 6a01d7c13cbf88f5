//! `storefront-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the account and store models, request validation and
//! pagination arithmetic.

pub mod account;
pub mod entity;
pub mod error;
pub mod id;
pub mod pagination;
pub mod store;
pub mod validation;

pub use account::{Account, AccountPatch, AccountRole, NewAccount};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, StoreId};
pub use pagination::{ListQuery, Page, PageRequest};
pub use store::{NewStore, Store};
pub use validation::FieldErrors;
