use crate::core::entity::{Persistable, Timestamps};
use crate::core::error::{DocError, Result};
use crate::core::query::Filter;
use crate::core::reference::Reference;
use crate::core::service::{CrudService, Listing};
use crate::models::product::Product;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(crate) fn default_true() -> bool {
    true
}

/// Filter on a reference field pointing at `owner`
pub(crate) fn referencing<T: Persistable>(field: &str, owner: &T) -> Result<Filter> {
    let key = owner.store_key().ok_or_else(|| {
        DocError::validation(format!("{} has not been saved", T::schema().name))
    })?;
    Ok(Filter::new().eq(field, key))
}

/// A currency, keyed by its ISO code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

crate::impl_document!(Currency,
    key: code: String,
    collection: "currencies",
    name: "currency",
);

/// A country, keyed by its ISO code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub phone_code: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub requires_post_code: bool,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

crate::impl_document!(Country,
    key: code: String,
    collection: "countries",
    name: "country",
    required: ["name"],
);

/// Product category of one shop instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub instance_id: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub eligible: bool,
    #[serde(default)]
    pub relevance: Option<i64>,
    #[serde(default)]
    pub commission: Option<f64>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

crate::impl_document!(Category,
    key: id: Uuid,
    collection: "categories",
    name: "category",
    required: ["code", "name", "instance_id"],
);

impl Category {
    /// Sub-categories pointing at this category
    pub fn sub_categories(&self, service: &CrudService<SubCategory>) -> Result<Listing<SubCategory>> {
        Ok(service.list(referencing("category", self)?, None, None))
    }

    /// Number of products filed under this category
    pub async fn product_count(&self, products: &CrudService<Product>) -> Result<u64> {
        products
            .list(referencing("category", self)?, None, None)
            .count()
            .await
    }
}

/// Second-level category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubCategory {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: Reference<Category>,
    pub instance_id: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub category_code: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub eligible: bool,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

crate::impl_document!(SubCategory,
    key: id: Uuid,
    collection: "sub_categories",
    name: "sub_category",
    required: ["code", "name", "category", "instance_id"],
    references: ["category" => "categories"],
);

crate::impl_serializable!(Currency, Country, Category, SubCategory);
