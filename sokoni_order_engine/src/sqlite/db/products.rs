use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    traits::CatalogApiError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, CatalogApiError> {
    let row: Product =
        sqlx::query_as("INSERT INTO products (name, price, stock, category) VALUES ($1, $2, $3, $4) RETURNING *")
            .bind(product.name)
            .bind(product.price.value())
            .bind(product.stock)
            .bind(product.category)
            .fetch_one(conn)
            .await?;
    debug!("📝️ Product {} ({}) added to the catalog with id {}", row.name, row.price, row.id);
    Ok(row)
}

pub async fn fetch_product_by_id(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn fetch_all_products(conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    let products = sqlx::query_as("SELECT * FROM products ORDER BY name ASC").fetch_all(conn).await?;
    Ok(products)
}
