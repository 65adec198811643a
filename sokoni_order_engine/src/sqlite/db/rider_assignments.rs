use log::debug;
use sqlx::SqliteConnection;

use crate::traits::OrderManagementError;

/// Records that a rider was assigned to an order. Re-assigning the same pair is a no-op, so the
/// assignment history stays free of duplicates no matter how often an admin re-submits.
pub async fn idempotent_insert(
    order_id: i64,
    rider_id: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, OrderManagementError> {
    let result = sqlx::query("INSERT OR IGNORE INTO rider_assignments (order_id, rider_id) VALUES ($1, $2)")
        .bind(order_id)
        .bind(rider_id)
        .execute(conn)
        .await?;
    let inserted = result.rows_affected() > 0;
    if inserted {
        debug!("📝️ Rider {rider_id} assigned to order #{order_id}");
    }
    Ok(inserted)
}
