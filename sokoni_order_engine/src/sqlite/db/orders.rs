use log::{debug, trace};
use sok_common::Cents;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Order, OrderStatus},
    order_objects::OrderQueryFilter,
    traits::OrderManagementError,
};

/// Inserts a new order row using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// All three total columns start out equal; `final_total` and `total` diverge from
/// `original_total` as amendments come in.
pub async fn insert_order(
    customer_id: i64,
    original_total: Cents,
    shipping_address: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderManagementError> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                customer_id,
                status,
                original_total,
                final_total,
                total,
                shipping_address
            ) VALUES ($1, $2, $3, $3, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(customer_id)
    .bind(OrderStatus::Created.to_string())
    .bind(original_total.value())
    .bind(shipping_address)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order #{} inserted for customer {customer_id}", order.id);
    Ok(order)
}

/// Returns the order with the given id, or `None`.
pub async fn fetch_order_by_id(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are newest first, with the id breaking ties, the same ordering the customer
/// and rider listings use.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(customer_id) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(customer_id);
    }
    if let Some(rider_id) = query.rider_id {
        where_clause.push("rider_id = ");
        where_clause.push_bind_unseparated(rider_id);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(fulfillment) = query.fulfillment_status {
        where_clause.push("fulfillment_status = ");
        where_clause.push_bind_unseparated(fulfillment.to_string());
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

/// All orders placed by the given customer, newest first. The id breaks ties, since `created_at`
/// only has second resolution.
pub async fn fetch_orders_for_customer(customer_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(customer_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// All orders currently assigned to the given rider, newest first.
pub async fn fetch_orders_for_rider(rider_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE rider_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(rider_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Writes the mutable columns of `order` back to the database, guarded by the version counter.
///
/// The row is only written if its stored version still equals `order.version`, i.e. nobody else
/// has saved the order since this copy was read. On success the stored version is bumped and the
/// fresh row is returned. A guard miss returns [`OrderManagementError::StaleOrderVersion`].
///
/// `customer_id`, `original_total` and `created_at` are deliberately not part of the column list.
pub(crate) async fn save_order_changes(order: &Order, conn: &mut SqliteConnection) -> Result<Order, OrderManagementError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                final_total = $2,
                total = $3,
                review_delta = $4,
                fulfillment_status = $5,
                rider_id = $6,
                shipping_address = $7,
                payment_info = $8,
                version = version + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $9 AND version = $10
            RETURNING *;
        "#,
    )
    .bind(order.status.to_string())
    .bind(order.final_total.value())
    .bind(order.total.value())
    .bind(order.review_delta.value())
    .bind(order.fulfillment_status.to_string())
    .bind(order.rider_id)
    .bind(order.shipping_address.as_deref())
    .bind(order.payment_info.as_deref())
    .bind(order.id)
    .bind(order.version)
    .fetch_optional(conn)
    .await?;
    trace!("📝️ Result of save_order_changes: {updated:?}");
    updated.ok_or(OrderManagementError::StaleOrderVersion(order.id))
}
