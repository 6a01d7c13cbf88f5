//! `storefront-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it turns
//! bearer tokens into [`Claim`]s, issues tokens for authenticated accounts,
//! hashes secrets, and decides who may act on which resource.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod token;

pub use authorize::{authorize, Action, AuthzError, Subject, Target};
pub use claims::{validate_claims, Claim, JwtClaims, TokenValidationError};
pub use password::{HashingCost, PasswordError, PasswordHashing};
pub use token::{Hs256Tokens, JwtValidator, TokenError, TokenIssuer};
