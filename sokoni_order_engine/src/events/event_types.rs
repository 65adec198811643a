use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatus};

/// Fired when a payment provider confirms payment and the order moves to `paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Fired when an order reaches `cancelled`, whether through a customer, an admin, or a failed
/// payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatus,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

/// Fired on every order mutation. Carries the fresh order state so subscribers can push it to
/// connected clients without a read-back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderChangedEvent {
    pub order: Order,
}

impl OrderChangedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Fired whenever cached order lists should be dropped. `customer_id` narrows the invalidation
/// to one customer's lists; `None` means every cached list is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderListsStaleEvent {
    pub customer_id: Option<i64>,
}

impl OrderListsStaleEvent {
    pub fn new(customer_id: Option<i64>) -> Self {
        Self { customer_id }
    }
}
