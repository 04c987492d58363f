//! Signed, expiring auth tokens
//!
//! Tokens are JWTs in compact form carrying the subject's claim attributes,
//! its primary key as `id`, and an absolute `exp` in seconds since the epoch.
//! They are never persisted.

use crate::config::AuthConfig;
use crate::core::entity::{Persistable, PrimaryKey};
use crate::core::error::{DocError, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Payload of an auth token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Primary key of the subject, as a string
    pub id: String,
    /// Expiry instant, seconds since the epoch
    pub exp: i64,
    /// Claim attributes of the subject
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// A document tokens can be issued for
pub trait TokenSubject: Persistable {
    /// Attributes copied into the token payload next to `id` and `exp`
    fn token_claims(&self) -> Map<String, Value> {
        Map::new()
    }
}

/// Outcome of validating a token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenState {
    Valid(TokenClaims),
    /// Signature verifies but the expiry has passed
    Expired,
    /// Bad signature, wrong algorithm or malformed payload
    Invalid,
}

/// Issues and validates tokens with one secret and algorithm
#[derive(Clone)]
pub struct TokenAuthority {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("algorithm", &self.algorithm)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority {
    /// Build an authority for an HMAC algorithm
    pub fn new(secret: &[u8], algorithm: Algorithm, lifetime: Duration) -> Result<Self> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(DocError::field_validation(
                "algorithm",
                format!("{:?} is not an HMAC algorithm", algorithm),
            ));
        }
        if secret.is_empty() {
            return Err(DocError::field_validation("secret", "secret must not be empty"));
        }
        if lifetime <= Duration::zero() {
            return Err(DocError::field_validation(
                "expires_in_hours",
                "token lifetime must be positive",
            ));
        }

        Ok(Self {
            algorithm,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let algorithm = Algorithm::from_str(&config.algorithm).map_err(|_| {
            DocError::field_validation(
                "algorithm",
                format!("unknown algorithm '{}'", config.algorithm),
            )
        })?;
        Self::new(
            config.secret.as_bytes(),
            algorithm,
            Duration::hours(config.expires_in_hours),
        )
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for a saved subject
    pub fn issue<T: TokenSubject>(&self, subject: &T) -> Result<String> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a token as if the current instant were `now`
    pub fn issue_at<T: TokenSubject>(&self, subject: &T, now: DateTime<Utc>) -> Result<String> {
        let key = subject
            .primary_key()
            .ok_or_else(|| DocError::validation("cannot issue token for unsaved entity"))?;

        let claims = TokenClaims {
            id: key.to_store_key(),
            exp: (now + self.lifetime).timestamp(),
            extra: subject.token_claims(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| DocError::validation(format!("cannot sign token: {}", e)))
    }

    pub fn validate(&self, token: &str) -> TokenState {
        self.validate_at(token, Utc::now())
    }

    /// Validate against an explicit instant; valid only while `now < exp`
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> TokenState {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        match decode::<TokenClaims>(token, &self.decoding, &validation) {
            Ok(data) if now.timestamp() < data.claims.exp => TokenState::Valid(data.claims),
            Ok(_) => TokenState::Expired,
            Err(e) => {
                tracing::debug!(error = %e, "token rejected");
                TokenState::Invalid
            }
        }
    }
}
