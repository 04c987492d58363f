//! Credentials, tokens and the request authentication gate

pub mod credentials;
pub mod gate;
pub mod token;

pub use credentials::{CredentialHolder, PasswordHash, PasswordHasher, Plaintext};
pub use gate::{AuthGate, Identity, bearer_token, require_auth};
pub use token::{TokenAuthority, TokenClaims, TokenState, TokenSubject};
