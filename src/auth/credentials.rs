//! Password credentials
//!
//! Plaintext never reaches the store: only salted bcrypt hashes are kept, and
//! a [`PasswordHash`] refuses to deserialize from anything that is not one.

use crate::config::AuthConfig;
use crate::core::entity::Persistable;
use crate::core::error::{DocError, Result};
use crate::core::service::CrudService;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

const BCRYPT_PREFIXES: [&str; 4] = ["$2a$", "$2b$", "$2x$", "$2y$"];
const BCRYPT_LEN: usize = 60;

/// A salted bcrypt hash
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap an existing bcrypt hash
    pub fn parse(hash: impl Into<String>) -> Result<Self> {
        let hash = hash.into();
        if hash.len() == BCRYPT_LEN && BCRYPT_PREFIXES.iter().any(|p| hash.starts_with(p)) {
            Ok(Self(hash))
        } else {
            Err(DocError::field_validation(
                "password",
                "expected a bcrypt hash",
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check a plaintext against this hash
    pub fn verify(&self, plaintext: &[u8]) -> Result<bool> {
        bcrypt::verify(plaintext, &self.0).map_err(|e| DocError::persistence("verify password", e))
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

impl<'de> Deserialize<'de> for PasswordHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PasswordHash::parse(raw).map_err(|_| D::Error::custom("password must be a bcrypt hash"))
    }
}

/// A plaintext password as handed in by a caller, possibly absent
#[derive(Clone, Copy)]
pub struct Plaintext<'a>(Option<&'a [u8]>);

impl<'a> Plaintext<'a> {
    /// The bytes, or a validation error when empty or absent
    pub fn require(self) -> Result<&'a [u8]> {
        match self.0 {
            Some(bytes) if !bytes.is_empty() => Ok(bytes),
            _ => Err(DocError::field_validation(
                "password",
                "password must be a non-empty string or bytes value",
            )),
        }
    }
}

impl fmt::Debug for Plaintext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Plaintext(<redacted>)")
    }
}

impl<'a> From<&'a str> for Plaintext<'a> {
    fn from(value: &'a str) -> Self {
        Plaintext(Some(value.as_bytes()))
    }
}

impl<'a> From<&'a String> for Plaintext<'a> {
    fn from(value: &'a String) -> Self {
        Plaintext(Some(value.as_bytes()))
    }
}

impl<'a> From<&'a [u8]> for Plaintext<'a> {
    fn from(value: &'a [u8]) -> Self {
        Plaintext(Some(value))
    }
}

impl<'a> From<&'a Vec<u8>> for Plaintext<'a> {
    fn from(value: &'a Vec<u8>) -> Self {
        Plaintext(Some(value.as_slice()))
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Plaintext<'a> {
    fn from(value: &'a [u8; N]) -> Self {
        Plaintext(Some(value.as_slice()))
    }
}

impl<'a> From<Option<&'a str>> for Plaintext<'a> {
    fn from(value: Option<&'a str>) -> Self {
        Plaintext(value.map(str::as_bytes))
    }
}

/// Hashes passwords with a fixed bcrypt cost
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self> {
        if !(4..=31).contains(&cost) {
            return Err(DocError::field_validation(
                "password_cost",
                format!("bcrypt cost must be between 4 and 31, got {}", cost),
            ));
        }
        Ok(Self { cost })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::new(config.password_cost)
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext with a fresh salt
    pub fn hash<'a>(&self, plaintext: impl Into<Plaintext<'a>>) -> Result<PasswordHash> {
        let bytes = plaintext.into().require()?;
        let hashed =
            bcrypt::hash(bytes, self.cost).map_err(|e| DocError::persistence("hash password", e))?;
        Ok(PasswordHash(hashed))
    }
}

/// A document that carries a password credential
pub trait CredentialHolder: Persistable {
    fn credential(&self) -> Option<&PasswordHash>;

    fn set_credential(&mut self, hash: PasswordHash);

    /// Verify a plaintext; a holder without a stored hash never matches
    fn check_password<'a>(&self, plaintext: impl Into<Plaintext<'a>>) -> Result<bool> {
        let bytes = plaintext.into().require()?;
        match self.credential() {
            Some(hash) => hash.verify(bytes),
            None => Ok(false),
        }
    }
}

impl<T: CredentialHolder> CrudService<T> {
    /// Hash and store a new password, re-stamping `last_updated`
    pub async fn set_password<'a>(
        &self,
        hasher: &PasswordHasher,
        entity: &mut T,
        plaintext: impl Into<Plaintext<'a>>,
    ) -> Result<()> {
        let hash = hasher.hash(plaintext)?;
        entity.set_credential(hash);
        self.save(entity).await?;
        tracing::debug!(collection = T::collection(), "password updated");
        Ok(())
    }
}
