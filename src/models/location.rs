use crate::core::entity::{IndexSpec, Timestamps};
use crate::core::error::Result;
use crate::core::query::SortDirection;
use crate::core::reference::Reference;
use crate::core::service::CrudService;
use crate::models::catalog::{Country, referencing};
use crate::models::product::Product;
use crate::models::user::User;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const LOCATION_LOOKUP: &[(&str, SortDirection)] = &[
    ("domain", SortDirection::Ascending),
    ("email", SortDirection::Ascending),
    ("instance_id", SortDirection::Ascending),
    ("phone", SortDirection::Ascending),
    ("date_created", SortDirection::Descending),
];

const DOMAIN_INSTANCE: &[(&str, SortDirection)] = &[
    ("domain", SortDirection::Ascending),
    ("instance_id", SortDirection::Ascending),
];

/// Postal address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    #[serde(default)]
    pub street_line_2: Option<String>,
    pub state: String,
    pub country: String,
}

/// Contact person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// A shop or pickup location owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Storefront domain; unique per instance when set
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub country: Option<Reference<Country>>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub street_line_2: Option<String>,
    #[serde(default)]
    pub post_code: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub contact: Option<Person>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub user: Reference<User>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

crate::impl_document!(Location,
    key: id: Uuid,
    collection: "locations",
    name: "location",
    required: ["phone", "user"],
    references: ["country" => "countries", "user" => "users"],
    indexes: [
        IndexSpec::new("location_lookup", LOCATION_LOOKUP),
        IndexSpec::new("domain_instance", DOMAIN_INSTANCE)
            .unique()
            .partial_on_string("domain"),
    ],
);

crate::impl_serializable!(Location);

impl Location {
    /// Postal address, when street, state and country are all known
    pub fn address(&self) -> Option<Address> {
        Some(Address {
            street: self.street.clone()?,
            street_line_2: self.street_line_2.clone(),
            state: self.state.clone()?,
            country: self.country.as_ref()?.key()?,
        })
    }

    /// Number of products stocked at this location
    pub async fn product_count(&self, products: &CrudService<Product>) -> Result<u64> {
        products
            .list(referencing("location", self)?, None, None)
            .count()
            .await
    }
}
