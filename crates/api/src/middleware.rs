use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};

use storefront_auth::{Claim, JwtValidator};

use crate::app::errors::ApiError;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// What the `Authorization` header amounted to.
///
/// Public routes read it through [`Caller::claim`], where an unusable token
/// counts as no token at all. Routes that need an identity use
/// [`Caller::authenticated`], which surfaces the rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Verified(Claim),
    Anonymous,
    Rejected(TokenRejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// Header present but not `Bearer <token>`.
    Malformed,
    /// Bad signature, undecodable, or outside its validity window.
    Invalid,
}

impl Caller {
    pub fn claim(&self) -> Claim {
        match self {
            Caller::Verified(claim) => *claim,
            Caller::Anonymous | Caller::Rejected(_) => Claim::Anonymous,
        }
    }

    pub fn authenticated(&self) -> Result<Claim, ApiError> {
        match self {
            Caller::Verified(claim) => Ok(*claim),
            Caller::Anonymous | Caller::Rejected(TokenRejection::Malformed) => {
                Err(ApiError::MissingToken)
            }
            Caller::Rejected(TokenRejection::Invalid) => Err(ApiError::InvalidToken),
        }
    }
}

/// Resolve the bearer token into a [`Caller`] and attach it to the request.
///
/// Never rejects by itself; handlers decide whether they need an identity.
pub async fn claims_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let caller = resolve(&state, req.headers(), Utc::now());
    req.extensions_mut().insert(caller);
    next.run(req).await
}

fn resolve(state: &AuthState, headers: &HeaderMap, now: DateTime<Utc>) -> Caller {
    match extract_bearer(headers) {
        Err(_) => Caller::Rejected(TokenRejection::Malformed),
        Ok(None) => Caller::Anonymous,
        Ok(Some(token)) => match state.jwt.validate(token, now) {
            Ok(claim) => Caller::Verified(claim),
            Err(e) => {
                tracing::debug!(error = %e, "rejected bearer token");
                Caller::Rejected(TokenRejection::Invalid)
            }
        },
    }
}

/// One structured log line per request.
pub async fn trace_requests(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = std::time::Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header.to_str().map_err(|_| ApiError::MissingToken)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::MissingToken)?
        .trim();
    if token.is_empty() {
        return Err(ApiError::MissingToken);
    }

    Ok(Some(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use storefront_auth::{Hs256Tokens, TokenIssuer};
    use storefront_core::{Account, AccountId, AccountRole, NewAccount};

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn absent_header_is_anonymous() {
        assert!(matches!(extract_bearer(&HeaderMap::new()), Ok(None)));
    }

    #[test]
    fn non_bearer_header_is_malformed() {
        assert!(matches!(extract_bearer(&headers("Basic abc")), Err(ApiError::MissingToken)));
        assert!(matches!(extract_bearer(&headers("Bearer   ")), Err(ApiError::MissingToken)));
    }

    fn state() -> AuthState {
        AuthState {
            jwt: Arc::new(Hs256Tokens::new(b"s3cret", chrono::Duration::hours(1))),
        }
    }

    fn account() -> Account {
        NewAccount {
            role: AccountRole::User,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            full_name: "Alice".to_string(),
            password_hash: "hash".to_string(),
        }
        .into_account(AccountId::new(), Utc::now())
    }

    #[test]
    fn stale_token_is_anonymous_for_public_reads_only() {
        let alice = account();
        let issued = Utc::now() - chrono::Duration::hours(8);
        let token = Hs256Tokens::new(b"s3cret", chrono::Duration::hours(1))
            .issue(&alice, issued)
            .unwrap();

        let caller = resolve(&state(), &headers(&format!("Bearer {token}")), Utc::now());
        assert_eq!(caller, Caller::Rejected(TokenRejection::Invalid));
        assert_eq!(caller.claim(), Claim::Anonymous);
        assert!(matches!(caller.authenticated(), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn malformed_header_needs_a_token_only_when_authenticating() {
        let caller = resolve(&state(), &headers("Basic abc"), Utc::now());
        assert_eq!(caller.claim(), Claim::Anonymous);
        assert!(matches!(caller.authenticated(), Err(ApiError::MissingToken)));

        let caller = resolve(&state(), &HeaderMap::new(), Utc::now());
        assert_eq!(caller, Caller::Anonymous);
        assert!(matches!(caller.authenticated(), Err(ApiError::MissingToken)));
    }

    #[test]
    fn valid_token_is_verified() {
        let alice = account();
        let token = Hs256Tokens::new(b"s3cret", chrono::Duration::hours(1))
            .issue(&alice, Utc::now())
            .unwrap();

        let caller = resolve(&state(), &headers(&format!("Bearer {token}")), Utc::now());
        assert_eq!(caller, Caller::Verified(Claim::User(alice.id)));
        assert_eq!(caller.authenticated().unwrap(), Claim::User(alice.id));
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert!(matches!(extract_bearer(&headers("Bearer abc.def")), Ok(Some("abc.def"))));
    }
}
