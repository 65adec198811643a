use thiserror::Error;

use crate::{
    db_types::{Adjustment, Order, OrderItem},
    order_objects::{FullOrder, OrderQueryFilter},
};

#[derive(Debug, Clone, Error)]
pub enum OrderQueryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
    #[error("The requested order (id {0}) does not exist")]
    OrderNotFound(i64),
}

impl From<sqlx::Error> for OrderQueryError {
    fn from(e: sqlx::Error) -> Self {
        OrderQueryError::DatabaseError(e.to_string())
    }
}

/// The `OrderQuery` trait defines read-only access to orders and their amendment history.
///
/// The [`super::OrderManagement`] trait handles the actual machinery of changing orders.
/// `OrderQuery` provides the projections the storefront reads: single orders, full aggregates
/// (order plus items plus adjustments) and filtered lists.
#[allow(async_fn_in_trait)]
pub trait OrderQuery {
    /// Fetches the order with the given id. If no order exists, `None` is returned.
    async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, OrderQueryError>;

    /// Fetches the order together with its line items and adjustment ledger.
    async fn fetch_full_order(&self, order_id: i64) -> Result<Option<FullOrder>, OrderQueryError>;

    /// Fetches the line items of an order, in the order they were added.
    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderQueryError>;

    /// Fetches the adjustment ledger of an order, oldest entry first.
    async fn fetch_adjustments(&self, order_id: i64) -> Result<Vec<Adjustment>, OrderQueryError>;

    /// Fetches orders matching the criteria in the [`OrderQueryFilter`].
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderQueryError>;

    /// All orders placed by the given customer, newest first.
    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderQueryError>;

    /// All orders currently assigned to the given rider, newest first.
    async fn fetch_orders_for_rider(&self, rider_id: i64) -> Result<Vec<Order>, OrderQueryError>;
}
