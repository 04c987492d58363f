use crate::core::entity::Timestamps;
use crate::core::reference::Reference;
use crate::models::catalog::{Category, Currency, SubCategory, default_true};
use crate::models::location::Location;
use crate::models::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

fn default_quantity() -> i64 {
    1
}

/// Monetary amount in one currency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub value: f64,
    #[serde(default)]
    pub cost_value: Option<f64>,
    #[serde(default)]
    pub selling_value: Option<f64>,
    #[serde(default)]
    pub discount_value: Option<f64>,
    pub currency: Reference<Currency>,
    #[serde(default)]
    pub mrsp_value: Option<f64>,
    #[serde(default)]
    pub profit_margin: Option<f64>,
}

impl Price {
    pub fn new(value: f64, currency: impl Into<String>) -> Self {
        Self {
            value,
            cost_value: None,
            selling_value: None,
            discount_value: None,
            currency: Reference::from_key(currency.into()),
            mrsp_value: None,
            profit_margin: None,
        }
    }

    pub fn currency_code(&self) -> Option<String> {
        self.currency.key()
    }
}

/// Sales counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductStat {
    #[serde(default)]
    pub units_sold: i64,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub first_sale_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sale_date: Option<DateTime<Utc>>,
}

/// Attribute copied into a product, e.g. colour or size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedAttribute {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    pub category: Reference<Category>,
    #[serde(default)]
    pub sub_category: Option<Reference<SubCategory>>,
    #[serde(default)]
    pub values: Vec<Value>,
    pub instance_id: String,
    #[serde(default = "Utc::now")]
    pub date_created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

/// One sellable variation of a product, identified by its SKU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub sku: String,
    #[serde(default)]
    pub prices: Vec<Price>,
    pub quantity: i64,
    #[serde(default)]
    pub attributes: Vec<Value>,
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default)]
    pub default_currency: Option<Reference<Currency>>,
}

impl ProductVariant {
    /// The price quoted in the default currency, if any
    pub fn price(&self) -> Option<&Price> {
        let currency = self.default_currency.as_ref()?.key()?;
        self.prices
            .iter()
            .find(|price| price.currency_code().as_deref() == Some(currency.as_str()))
    }
}

impl PartialEq for ProductVariant {
    fn eq(&self, other: &Self) -> bool {
        self.sku == other.sku
    }
}

impl Eq for ProductVariant {}

impl PartialEq<str> for ProductVariant {
    fn eq(&self, sku: &str) -> bool {
        self.sku == sku
    }
}

impl Hash for ProductVariant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sku.hash(state);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub category: Option<Reference<Category>>,
    #[serde(default)]
    pub sub_category: Option<Reference<SubCategory>>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub discount_price: Option<Price>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub location: Option<Reference<Location>>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub unlimited_stock: bool,
    pub user: Reference<User>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<EmbeddedAttribute>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default)]
    pub options: Vec<Value>,
    #[serde(default)]
    pub stats: Option<ProductStat>,
    #[serde(default)]
    pub allow_modification: Option<bool>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub has_variations: bool,
    #[serde(default)]
    pub supplier: Map<String, Value>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

crate::impl_document!(Product,
    key: id: Uuid,
    collection: "products",
    name: "product",
    required: ["name", "user"],
    references: [
        "category" => "categories",
        "sub_category" => "sub_categories",
        "location" => "locations",
        "user" => "users",
        "price.currency" => "currencies",
        "discount_price.currency" => "currencies",
        "variants.default_currency" => "currencies",
        "variants.prices.currency" => "currencies",
        "attributes.category" => "categories",
        "attributes.sub_category" => "sub_categories",
    ],
);

crate::impl_serializable!(Product);

impl Product {
    /// Variant with the given SKU
    pub fn variant(&self, sku: &str) -> Option<&ProductVariant> {
        self.variants.iter().find(|variant| *variant == sku)
    }

    /// Whether `quantity` units can be taken from stock
    pub fn in_stock(&self, quantity: i64) -> bool {
        self.unlimited_stock || self.quantity >= quantity
    }
}
