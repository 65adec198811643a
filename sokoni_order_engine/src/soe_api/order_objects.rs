use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Adjustment, Availability, FulfillmentStatus, Order, OrderItem, OrderStatus},
    traits::OrderQueryError,
};

/// The full order aggregate: the order header, its line items, and the append-only adjustment
/// ledger. This is what `GET /api/orders/{id}` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub adjustments: Vec<Adjustment>,
}

impl FullOrder {
    pub fn new(order: Order, items: Vec<OrderItem>, adjustments: Vec<Adjustment>) -> Self {
        Self { order, items, adjustments }
    }
}

/// The before and after states of an order mutation. Handy for event payloads and audit logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderChanged {
    pub old_order: Order,
    pub new_order: Order,
}

impl OrderChanged {
    pub fn new(old_order: Order, new_order: Order) -> Self {
        Self { old_order, new_order }
    }
}

/// One line of a fulfillment review. Lines not mentioned in a review are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReview {
    pub item_id: i64,
    /// How many units were actually picked. Capped at the ordered quantity. Defaults to the
    /// ordered quantity when omitted.
    pub fulfilled_quantity: Option<i64>,
    /// Defaults to `available` when omitted. Missing lines always fulfil zero units.
    pub availability: Option<Availability>,
    pub admin_note: Option<String>,
}

impl ItemReview {
    pub fn new(item_id: i64) -> Self {
        Self { item_id, fulfilled_quantity: None, availability: None, admin_note: None }
    }

    pub fn fulfilled(mut self, quantity: i64) -> Self {
        self.fulfilled_quantity = Some(quantity);
        self
    }

    pub fn missing(mut self) -> Self {
        self.availability = Some(Availability::Missing);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.admin_note = Some(note.into());
        self
    }
}

/// A staff member's stock-check of an order, line by line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FulfillmentReview {
    pub items: Vec<ItemReview>,
}

impl FulfillmentReview {
    pub fn with_item(mut self, item: ItemReview) -> Self {
        self.items.push(item);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub customer_id: Option<i64>,
    pub rider_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatus>>,
    pub fulfillment_status: Option<FulfillmentStatus>,
}

impl OrderQueryFilter {
    pub fn with_customer_id(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_rider_id(mut self, rider_id: i64) -> Self {
        self.rider_id = Some(rider_id);
        self
    }

    pub fn since<T>(mut self, since: T) -> Result<Self, OrderQueryError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = since.try_into().map_err(|e| OrderQueryError::QueryError(e.to_string()))?;
        self.since = Some(dt);
        Ok(self)
    }

    pub fn until<T>(mut self, until: T) -> Result<Self, OrderQueryError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = until.try_into().map_err(|e| OrderQueryError::QueryError(e.to_string()))?;
        self.until = Some(dt);
        Ok(self)
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_fulfillment_status(mut self, status: FulfillmentStatus) -> Self {
        self.fulfillment_status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none() &&
            self.rider_id.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.status.is_none() &&
            self.fulfillment_status.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(customer_id) = &self.customer_id {
            write!(f, "customer_id: {customer_id}. ")?;
        }
        if let Some(rider_id) = &self.rider_id {
            write!(f, "rider_id: {rider_id}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        if let Some(fulfillment) = &self.fulfillment_status {
            write!(f, "fulfillment: {fulfillment}. ")?;
        }
        Ok(())
    }
}
