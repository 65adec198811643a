//! Read access to the product catalog, plus product creation for seeding and admin tooling.

use std::fmt::Debug;

use crate::{
    db_types::{NewProduct, Product},
    traits::{CatalogApiError, CatalogManagement},
};

pub struct CatalogApi<B> {
    db: B,
}

impl<B: Debug> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi ({:?})", self.db)
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetches one product by id. If no product exists, `None` is returned.
    pub async fn product(&self, product_id: i64) -> Result<Option<Product>, CatalogApiError> {
        self.db.fetch_product(product_id).await
    }

    /// The full catalog, sorted by name.
    pub async fn products(&self) -> Result<Vec<Product>, CatalogApiError> {
        self.db.fetch_products().await
    }

    /// Adds a product to the catalog.
    pub async fn add_product(&self, product: NewProduct) -> Result<Product, CatalogApiError> {
        self.db.insert_product(product).await
    }
}
