use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::AccountId;

/// JWT claims model (wire form).
///
/// Exactly one of `user_id` / `admin_id` must be present once a token has
/// been decoded and its signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<AccountId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<AccountId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Issued-at (seconds since epoch on the wire). Optional; tokens that
    /// carry it must not be used before it.
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<DateTime<Utc>>,

    /// Expiration (seconds since epoch on the wire).
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
}

/// Verified identity of the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Claim {
    Admin(AccountId),
    User(AccountId),
    #[default]
    Anonymous,
}

impl Claim {
    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            Claim::Admin(id) | Claim::User(id) => Some(*id),
            Claim::Anonymous => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Claim::Admin(_))
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Claim::Anonymous)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("token asserts both a user and an admin identity")]
    AmbiguousIdentity,

    #[error("token asserts no identity")]
    MissingIdentity,
}

/// Deterministically validate decoded claims and reduce them to a [`Claim`].
///
/// Note: this validates the *claims* only. Signature verification happens in
/// [`crate::token`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<Claim, TokenValidationError> {
    if let Some(iat) = claims.iat {
        if claims.exp <= iat {
            return Err(TokenValidationError::InvalidTimeWindow);
        }
        if now < iat {
            return Err(TokenValidationError::NotYetValid);
        }
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }

    match (claims.admin_id, claims.user_id) {
        (Some(_), Some(_)) => Err(TokenValidationError::AmbiguousIdentity),
        (Some(id), None) => Ok(Claim::Admin(id)),
        (None, Some(id)) => Ok(Claim::User(id)),
        (None, None) => Err(TokenValidationError::MissingIdentity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(user: Option<AccountId>, admin: Option<AccountId>) -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            user_id: user,
            admin_id: admin,
            username: Some("alice".to_string()),
            iat: Some(now - Duration::minutes(1)),
            exp: now + Duration::hours(1),
        }
    }

    #[test]
    fn user_claims_reduce_to_user() {
        let id = AccountId::new();
        let claim = validate_claims(&claims(Some(id), None), Utc::now()).unwrap();
        assert_eq!(claim, Claim::User(id));
        assert!(!claim.is_admin());
    }

    #[test]
    fn admin_claims_reduce_to_admin() {
        let id = AccountId::new();
        let claim = validate_claims(&claims(None, Some(id)), Utc::now()).unwrap();
        assert_eq!(claim, Claim::Admin(id));
    }

    #[test]
    fn both_or_neither_identity_is_rejected() {
        let both = claims(Some(AccountId::new()), Some(AccountId::new()));
        assert_eq!(
            validate_claims(&both, Utc::now()),
            Err(TokenValidationError::AmbiguousIdentity)
        );
        assert_eq!(
            validate_claims(&claims(None, None), Utc::now()),
            Err(TokenValidationError::MissingIdentity)
        );
    }

    #[test]
    fn expiry_is_checked_against_supplied_clock() {
        let c = claims(Some(AccountId::new()), None);
        let later = c.exp + Duration::seconds(1);
        assert_eq!(validate_claims(&c, later), Err(TokenValidationError::Expired));

        let earlier = c.iat.unwrap() - Duration::seconds(1);
        assert_eq!(validate_claims(&c, earlier), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn tokens_without_iat_are_bounded_by_exp_only() {
        let id = AccountId::new();
        let json = serde_json::json!({ "user_id": id, "exp": (Utc::now() + Duration::hours(1)).timestamp() });
        let c: JwtClaims = serde_json::from_value(json).unwrap();
        assert_eq!(c.iat, None);
        assert_eq!(validate_claims(&c, Utc::now()), Ok(Claim::User(id)));

        let later = c.exp + Duration::seconds(1);
        assert_eq!(validate_claims(&c, later), Err(TokenValidationError::Expired));
    }

    #[test]
    fn wire_form_uses_epoch_seconds_and_omits_absent_ids() {
        let c = claims(Some(AccountId::new()), None);
        let json = serde_json::to_value(&c).unwrap();
        assert!(json["exp"].is_i64());
        assert!(json.get("admin_id").is_none());
    }
}
