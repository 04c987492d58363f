use crate::auth::{AuthGate, CredentialHolder, PasswordHasher, Plaintext};
use crate::core::error::{AuthFailure, DocError, Result};
use crate::core::query::Filter;
use crate::core::service::{CrudService, FieldMap};
use crate::core::store::StoreHandle;
use crate::models::User;
use serde_json::Value;
use std::ops::Deref;

/// Account operations: registration, login and password changes
#[derive(Debug, Clone)]
pub struct UserService {
    crud: CrudService<User>,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(store: StoreHandle, hasher: PasswordHasher) -> Self {
        Self {
            crud: CrudService::new(store),
            hasher,
        }
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Create an account from a field map carrying a plaintext `password`
    ///
    /// The plaintext is hashed before anything touches the store and never
    /// persisted. An email that is already registered is a conflict.
    pub async fn register(&self, mut fields: FieldMap) -> Result<User> {
        let password = fields.remove("password");
        let plaintext = match &password {
            Some(Value::String(plaintext)) => Plaintext::from(plaintext),
            Some(Value::Null) | None => Plaintext::from(None),
            Some(_) => {
                return Err(DocError::field_validation(
                    "password",
                    "password must be a string",
                ));
            }
        };
        let hash = self.hasher.hash(plaintext)?;

        if let Some(email) = fields.get("email").filter(|email| !email.is_null())
            && self
                .crud
                .exists(Filter::new().eq("email", email.clone()))
                .await?
        {
            return Err(DocError::conflict(
                "users",
                format!("email {} is already registered", email),
            ));
        }

        fields.insert("password".into(), Value::String(hash.as_str().to_string()));
        let user = self.crud.create(fields).await?;
        tracing::info!(user = ?user.id, "user registered");
        Ok(user)
    }

    /// Look up an account by email and check its password
    pub async fn login<'a>(
        &self,
        email: &str,
        password: impl Into<Plaintext<'a>>,
    ) -> Result<User> {
        let password = password.into();
        password.require()?;

        let user = self
            .crud
            .find_one(Filter::new().eq("email", email))
            .await?
            .ok_or_else(|| DocError::field_validation("email", "Invalid email"))?;

        if !user.check_password(password)? {
            tracing::debug!(user = ?user.id, "password mismatch");
            return Err(DocError::auth(AuthFailure::BadCredentials));
        }
        Ok(user)
    }

    /// Replace the password of a stored account
    pub async fn set_password<'a>(
        &self,
        user: &mut User,
        plaintext: impl Into<Plaintext<'a>>,
    ) -> Result<()> {
        self.crud.set_password(&self.hasher, user, plaintext).await
    }

    /// Log in and issue a token in one step
    pub async fn authenticate<'a>(
        &self,
        gate: &AuthGate,
        email: &str,
        password: impl Into<Plaintext<'a>>,
    ) -> Result<(User, String)> {
        let user = self.login(email, password).await?;
        let token = gate.authority().issue(&user)?;
        Ok((user, token))
    }
}

impl Deref for UserService {
    type Target = CrudService<User>;

    fn deref(&self) -> &Self::Target {
        &self.crud
    }
}
