//! Document types of the shop backend

pub mod catalog;
pub mod location;
pub mod product;
pub mod user;

pub use catalog::{Category, Country, Currency, SubCategory};
pub use location::{Address, Location, Person};
pub use product::{EmbeddedAttribute, Price, Product, ProductStat, ProductVariant};
pub use user::User;

use crate::core::schema::SchemaRegistry;

/// Registry holding every document type declared here
pub fn default_registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with::<User>()
        .with::<Currency>()
        .with::<Country>()
        .with::<Category>()
        .with::<SubCategory>()
        .with::<Location>()
        .with::<Product>()
}
