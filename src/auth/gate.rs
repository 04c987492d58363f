//! # Authentication gate
//!
//! Request middleware that lets allow-listed paths through untouched and
//! requires a valid `Authorization: Bearer <token>` everywhere else.
//!
//! On success the decoded claims are inserted into the request extensions as
//! an [`Identity`], which handlers extract like any other axum extractor. On
//! failure the gate answers 401 itself and the handler never runs.

use crate::auth::token::{TokenAuthority, TokenClaims, TokenState};
use crate::config::AuthConfig;
use crate::core::error::{AuthFailure, DocError, Result};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Authenticated caller, as decoded from the token
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    /// Primary key of the subject
    pub id: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// Claim attributes carried by the token
    pub claims: Map<String, Value>,
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            expires_at: claims.expires_at(),
            id: claims.id,
            claims: claims.extra,
        }
    }
}

/// Extracts the identity that the gate injected into extensions.
///
/// Returns 401 if no identity is present (gate not installed or path allow-listed).
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = DocError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| DocError::auth(AuthFailure::MissingToken))
    }
}

/// Token check shared by every request
#[derive(Debug, Clone)]
pub struct AuthGate {
    authority: Arc<TokenAuthority>,
    allow_list: Arc<HashSet<String>>,
}

impl AuthGate {
    pub fn new<I, S>(authority: TokenAuthority, allow_list: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authority: Arc::new(authority),
            allow_list: Arc::new(allow_list.into_iter().map(Into::into).collect()),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Ok(Self::new(
            TokenAuthority::from_config(config)?,
            config.allow_list.iter().cloned(),
        ))
    }

    pub fn authority(&self) -> &TokenAuthority {
        &self.authority
    }

    /// Exact path match against the allow-list
    pub fn is_allowed(&self, path: &str) -> bool {
        self.allow_list.contains(path)
    }

    /// Validate the bearer token carried by `headers`
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity> {
        let token = bearer_token(headers).ok_or_else(|| DocError::auth(AuthFailure::MissingToken))?;
        match self.authority.validate(token) {
            TokenState::Valid(claims) => Ok(Identity::from(claims)),
            TokenState::Expired => Err(DocError::auth(AuthFailure::Expired)),
            TokenState::Invalid => Err(DocError::auth(AuthFailure::InvalidToken)),
        }
    }
}

/// The token of an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware enforcing the gate
///
/// Install with `axum::middleware::from_fn_with_state(gate, require_auth)`.
pub async fn require_auth(State(gate): State<AuthGate>, mut request: Request, next: Next) -> Response {
    if gate.is_allowed(request.uri().path()) {
        return next.run(request).await;
    }

    match gate.authenticate(request.headers()) {
        Ok(identity) => {
            tracing::debug!(subject = %identity.id, "request authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(path = %request.uri().path(), error = %err, "request rejected by auth gate");
            err.into_response()
        }
    }
}
