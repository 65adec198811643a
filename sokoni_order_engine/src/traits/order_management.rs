use thiserror::Error;

use crate::{
    db_types::{NewOrder, OrderStatus, PaymentResult},
    order_objects::{FulfillmentReview, FullOrder, OrderChanged},
    traits::{OrderQuery, OrderQueryError},
};

/// This trait defines the highest level of behaviour for backends supporting the Sokoni order
/// engine.
///
/// This behaviour includes:
/// * Storing new orders together with their line items.
/// * The amendment flow: adding, re-quantifying and removing items, and fulfillment reviews.
/// * Status transitions, rider assignment and payment webhook processing.
///
/// Every mutating method runs inside a single database transaction, recomputes the order total
/// from its line items before committing, and bumps the order's version counter. Writes are
/// guarded by that counter: saving against a version that has moved on since the read fails with
/// [`OrderManagementError::StaleOrderVersion`] instead of silently clobbering the other change.
///
/// Terminal orders (completed or cancelled) are locked. Every method here except [`Self::insert_order`]
/// returns [`OrderManagementError::OrderLocked`] when pointed at one.
///
/// Permission checks do **not** happen at this level. Backends enforce state invariants; who is
/// allowed to request a change is decided upstream, in [`crate::OrderFlowApi`].
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone + OrderQuery {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Takes a new order, and in a single atomic transaction:
    /// * validates that every line has a positive quantity and refers to an existing product,
    /// * snapshots the current catalog price into each line,
    /// * stores the order with `original_total`, `final_total` and `total` all equal to the sum
    ///   over the lines of quantity times price.
    ///
    /// Returns the stored aggregate.
    async fn insert_order(&self, order: NewOrder) -> Result<FullOrder, OrderManagementError>;

    /// Applies a status change, a rider (re)assignment, or both to the order in one guarded
    /// write, and returns the before and after states.
    ///
    /// The assignee, when given, must hold the rider role, otherwise
    /// [`OrderManagementError::NotARider`] is returned. Unlike [`Self::assign_rider`], setting a
    /// rider here does not touch the status. An update that changes nothing returns
    /// [`OrderManagementError::OrderModificationNoOp`].
    async fn update_order(
        &self,
        order_id: i64,
        new_status: Option<OrderStatus>,
        rider_id: Option<i64>,
    ) -> Result<OrderChanged, OrderManagementError>;

    /// Moves the order into `new_status` and returns the before and after states.
    ///
    /// Moving an order into the status it already has is a no-op and returns
    /// [`OrderManagementError::OrderModificationNoOp`].
    async fn update_order_status(&self, order_id: i64, new_status: OrderStatus) -> Result<OrderChanged, OrderManagementError> {
        self.update_order(order_id, Some(new_status), None).await
    }

    /// Assigns a rider to the order and moves it to `shipped`.
    ///
    /// The assignee must hold the rider role, otherwise [`OrderManagementError::NotARider`] is
    /// returned. Assignments are recorded in a dedicated table; re-assigning the same rider to
    /// the same order leaves that record untouched.
    async fn assign_rider(&self, order_id: i64, rider_id: i64) -> Result<OrderChanged, OrderManagementError>;

    /// Adds a product to the order at its current catalog price.
    ///
    /// If the order already has a line for this product, its quantity is incremented instead of
    /// creating a second line. Either way an `add_item` ledger entry for `+ price * quantity` is
    /// appended and the totals are recomputed.
    async fn add_order_item(
        &self,
        order_id: i64,
        product_id: i64,
        quantity: i64,
        note: Option<String>,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError>;

    /// Changes the quantity of an existing line item.
    ///
    /// Appends a `manual` ledger entry for `(new - old) * price_at_purchase` and recomputes the
    /// totals. Setting the quantity it already has is a no-op and returns
    /// [`OrderManagementError::OrderModificationNoOp`].
    async fn update_item_quantity(
        &self,
        order_id: i64,
        item_id: i64,
        new_quantity: i64,
        note: Option<String>,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError>;

    /// Removes a line item from the order.
    ///
    /// Appends a `remove_item` ledger entry for `- quantity * price_at_purchase` and recomputes
    /// the totals.
    async fn remove_order_item(
        &self,
        order_id: i64,
        item_id: i64,
        note: Option<String>,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError>;

    /// Applies a fulfillment review to the order.
    ///
    /// For each line named in the review: availability defaults to available when omitted;
    /// missing lines get a fulfilled quantity of zero; available lines get the supplied quantity
    /// capped at the ordered quantity. Lines the review does not mention are left untouched.
    /// The order's fulfillment status becomes `reviewed`, the totals are recomputed, and the
    /// difference is tracked in the order's `review_delta`. No ledger entry is appended.
    async fn apply_fulfillment_review(
        &self,
        order_id: i64,
        review: FulfillmentReview,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError>;

    /// Records the outcome of a payment provider callback.
    ///
    /// `PAID` moves the order to `paid`, `FAILED` to `cancelled`. The raw provider payload is
    /// stored verbatim on the order for audit. The provider acts with its own authority, so no
    /// user-level permission checks apply; the terminal lock still does.
    async fn process_payment_update(
        &self,
        order_id: i64,
        result: PaymentResult,
        payload: &str,
    ) -> Result<OrderChanged, OrderManagementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderManagementError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderManagementError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested order (id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("Order {0} is locked and cannot be modified")]
    OrderLocked(i64),
    #[error("The requested order change would result in a no-op.")]
    OrderModificationNoOp,
    #[error("The requested order change is forbidden.")]
    OrderModificationForbidden,
    #[error("Order {0} was changed by another request while this one was in flight. Fetch it again and retry.")]
    StaleOrderVersion(i64),
    #[error("Order {order_id} has no item with id {item_id}")]
    OrderItemNotFound { order_id: i64, item_id: i64 },
    #[error("The requested product (id {0}) does not exist")]
    ProductNotFound(i64),
    #[error("The requested user (id {0}) does not exist")]
    UserNotFound(i64),
    #[error("User {0} does not hold the rider role")]
    NotARider(i64),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    QueryError(#[from] OrderQueryError),
}

impl From<sqlx::Error> for OrderManagementError {
    fn from(e: sqlx::Error) -> Self {
        OrderManagementError::DatabaseError(e.to_string())
    }
}
