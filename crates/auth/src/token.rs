//! HS256 bearer tokens: issuing for authenticated accounts and verifying
//! inbound tokens into [`Claim`]s.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use storefront_core::{Account, AccountRole};

use crate::claims::{validate_claims, Claim, JwtClaims, TokenValidationError};

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, malformed JWT, wrong algorithm, missing `exp`.
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Verifies a bearer token and yields the caller's claim.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claim, TokenError>;
}

/// Issues a signed, time-limited token for an authenticated account.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, account: &Account, now: DateTime<Utc>) -> Result<String, TokenError>;
}

/// Symmetric HS256 implementation of both token traits.
pub struct Hs256Tokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Hs256Tokens {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }
}

impl JwtValidator for Hs256Tokens {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claim, TokenError> {
        let data = decode::<JwtClaims>(token, &self.decoding, &Self::validation())
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        Ok(validate_claims(&data.claims, now)?)
    }
}

impl TokenIssuer for Hs256Tokens {
    fn issue(&self, account: &Account, now: DateTime<Utc>) -> Result<String, TokenError> {
        let (user_id, admin_id) = match account.role {
            AccountRole::User => (Some(account.id), None),
            AccountRole::Admin => (None, Some(account.id)),
        };
        let claims = JwtClaims {
            user_id,
            admin_id,
            username: Some(account.username.clone()),
            iat: Some(now),
            exp: now + self.ttl,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::{AccountId, NewAccount};

    fn account(role: AccountRole) -> Account {
        NewAccount {
            role,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            full_name: "Alice A".to_string(),
            password_hash: "hash".to_string(),
        }
        .into_account(AccountId::new(), Utc::now())
    }

    fn tokens(secret: &str) -> Hs256Tokens {
        Hs256Tokens::new(secret.as_bytes(), Duration::hours(72))
    }

    #[test]
    fn issued_user_token_validates_to_user_claim() {
        let t = tokens("s3cret");
        let acc = account(AccountRole::User);
        let now = Utc::now();

        let token = t.issue(&acc, now).unwrap();
        assert_eq!(t.validate(&token, now).unwrap(), Claim::User(acc.id));
    }

    #[test]
    fn issued_admin_token_validates_to_admin_claim() {
        let t = tokens("s3cret");
        let acc = account(AccountRole::Admin);
        let now = Utc::now();

        let token = t.issue(&acc, now).unwrap();
        assert_eq!(t.validate(&token, now).unwrap(), Claim::Admin(acc.id));
    }

    #[test]
    fn token_expires_after_ttl() {
        let t = tokens("s3cret");
        let now = Utc::now();
        let token = t.issue(&account(AccountRole::User), now).unwrap();

        let after = now + Duration::hours(72) + Duration::seconds(1);
        assert!(matches!(
            t.validate(&token, after),
            Err(TokenError::Claims(TokenValidationError::Expired))
        ));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let now = Utc::now();
        let token = tokens("other").issue(&account(AccountRole::User), now).unwrap();
        assert!(matches!(
            tokens("s3cret").validate(&token, now),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            tokens("s3cret").validate("not.a.jwt", Utc::now()),
            Err(TokenError::Invalid(_))
        ));
    }
}
