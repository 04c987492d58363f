use crate::auth::{CredentialHolder, PasswordHash, TokenSubject};
use crate::core::entity::{IndexSpec, Timestamps};
use crate::core::query::SortDirection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

const USER_LOOKUP: &[(&str, SortDirection)] = &[
    ("email", SortDirection::Ascending),
    ("first_name", SortDirection::Ascending),
    ("last_name", SortDirection::Ascending),
    ("date_created", SortDirection::Descending),
];

/// An account holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<PasswordHash>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

crate::impl_document!(User,
    key: id: Uuid,
    collection: "users",
    name: "user",
    required: ["email"],
    indexes: [IndexSpec::new("user_lookup", USER_LOOKUP)],
);

crate::impl_serializable!(User, redact: ["password"]);

impl CredentialHolder for User {
    fn credential(&self) -> Option<&PasswordHash> {
        self.password.as_ref()
    }

    fn set_credential(&mut self, hash: PasswordHash) {
        self.password = Some(hash);
    }
}

impl TokenSubject for User {
    fn token_claims(&self) -> Map<String, Value> {
        let mut claims = Map::new();
        claims.insert("first_name".into(), self.first_name.clone().into());
        claims.insert("last_name".into(), self.last_name.clone().into());
        claims
    }
}
