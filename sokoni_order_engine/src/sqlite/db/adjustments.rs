use log::debug;
use sok_common::Cents;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Adjustment, NewAdjustment},
    traits::OrderManagementError,
};

/// Appends an entry to the order's adjustment ledger. There is deliberately no update or delete
/// counterpart in this module.
pub async fn insert_adjustment(
    order_id: i64,
    adjustment: NewAdjustment,
    conn: &mut SqliteConnection,
) -> Result<Adjustment, OrderManagementError> {
    let row: Adjustment = sqlx::query_as(
        r#"
            INSERT INTO order_adjustments (order_id, kind, amount, note, admin_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(adjustment.kind.to_string())
    .bind(adjustment.amount.value())
    .bind(adjustment.note)
    .bind(adjustment.admin_id)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Adjustment {} ({}, {}) appended to order #{order_id}", row.id, row.kind, row.amount);
    Ok(row)
}

/// The adjustment ledger of an order, oldest entry first.
pub async fn fetch_adjustments_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Adjustment>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM order_adjustments WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// The signed sum of the order's ledger. Used to keep `review_delta` reconciled after every write.
pub async fn ledger_total_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Cents, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM order_adjustments WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(conn)
        .await?;
    Ok(Cents::from(total))
}
