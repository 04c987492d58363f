use crate::core::error::Result;
use crate::core::service::{CrudService, FieldMap};
use crate::core::store::StoreHandle;
use crate::models::Product;
use std::ops::Deref;

/// Product catalogue operations
#[derive(Debug, Clone)]
pub struct ProductService {
    crud: CrudService<Product>,
}

impl ProductService {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            crud: CrudService::new(store),
        }
    }

    /// List a new product
    pub async fn register(&self, fields: FieldMap) -> Result<Product> {
        self.crud.create(fields).await
    }
}

impl Deref for ProductService {
    type Target = CrudService<Product>;

    fn deref(&self) -> &Self::Target {
        &self.crud
    }
}
