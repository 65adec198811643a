use log::debug;
use sok_common::Cents;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Availability, OrderItem},
    traits::OrderManagementError,
};

/// Inserts a line item. The price is the caller's snapshot of the catalog price; it never changes
/// after this call.
pub async fn insert_item(
    order_id: i64,
    product_id: i64,
    quantity: i64,
    price_at_purchase: Cents,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, OrderManagementError> {
    let item: OrderItem = sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(price_at_purchase.value())
    .fetch_one(conn)
    .await?;
    debug!("📝️ Item {} ({quantity} x product {product_id}) added to order #{order_id}", item.id);
    Ok(item)
}

/// The line items of an order, in the order they were added.
pub async fn fetch_items_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items =
        sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await?;
    Ok(items)
}

/// Fetches one line item, scoped to its order so that an item id from another order misses.
pub async fn fetch_item(order_id: i64, item_id: i64, conn: &mut SqliteConnection) -> Result<Option<OrderItem>, sqlx::Error> {
    let item = sqlx::query_as("SELECT * FROM order_items WHERE id = $1 AND order_id = $2")
        .bind(item_id)
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(item)
}

/// Returns the line for the given product on the order, if one exists.
pub async fn fetch_item_by_product(
    order_id: i64,
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderItem>, sqlx::Error> {
    let item = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 AND product_id = $2")
        .bind(order_id)
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(item)
}

pub(crate) async fn update_item_quantity(
    order_id: i64,
    item_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, OrderManagementError> {
    let item: Option<OrderItem> = sqlx::query_as(
        "UPDATE order_items SET quantity = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND order_id = $3 RETURNING *",
    )
    .bind(quantity)
    .bind(item_id)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    item.ok_or(OrderManagementError::OrderItemNotFound { order_id, item_id })
}

/// Writes the outcome of a fulfillment review onto one line item.
pub(crate) async fn update_item_review(
    order_id: i64,
    item_id: i64,
    fulfilled_quantity: i64,
    availability: Availability,
    admin_note: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, OrderManagementError> {
    let item: Option<OrderItem> = sqlx::query_as(
        r#"
            UPDATE order_items SET
                fulfilled_quantity = $1,
                availability = $2,
                admin_note = COALESCE($3, admin_note),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4 AND order_id = $5
            RETURNING *;
        "#,
    )
    .bind(fulfilled_quantity)
    .bind(availability.to_string())
    .bind(admin_note)
    .bind(item_id)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    item.ok_or(OrderManagementError::OrderItemNotFound { order_id, item_id })
}

pub(crate) async fn delete_item(item_id: i64, conn: &mut SqliteConnection) -> Result<(), OrderManagementError> {
    sqlx::query("DELETE FROM order_items WHERE id = $1").bind(item_id).execute(conn).await?;
    Ok(())
}
