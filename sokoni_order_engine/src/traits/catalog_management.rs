use thiserror::Error;

use crate::db_types::{NewProduct, Product};

#[derive(Debug, Clone, Error)]
pub enum CatalogApiError {
    #[error("The requested product (id {0}) does not exist")]
    ProductNotFound(i64),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for CatalogApiError {
    fn from(e: sqlx::Error) -> Self {
        CatalogApiError::DatabaseError(e.to_string())
    }
}

/// Access to the product catalog.
///
/// Order lines snapshot the catalog price at purchase time, so the catalog itself stays small:
/// a name, the current price, a stock count and an optional category per product.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    /// Adds a product to the catalog.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogApiError>;

    /// Fetches a product by id. If no product exists, `None` is returned.
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, CatalogApiError>;

    /// Fetches the whole catalog, alphabetically by name.
    async fn fetch_products(&self) -> Result<Vec<Product>, CatalogApiError>;
}
