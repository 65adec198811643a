use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderStatus, PaymentResult, Role, Roles},
    events::{EventProducers, OrderAnnulledEvent, OrderChangedEvent, OrderListsStaleEvent, OrderPaidEvent},
    order_objects::{FulfillmentReview, FullOrder, OrderChanged, OrderQueryFilter},
    permissions::{may_set_status, OrderRelation},
    traits::{OrderManagement, OrderManagementError},
};

/// `OrderFlowApi` is the primary API for driving orders through their lifecycle. It decides who
/// may do what, hands the actual state changes to the backend, and emits events after every
/// successful mutation.
///
/// Permission rules live in two places. Role-only rules (admin-only amendment routes, for
/// example) are enforced by the server's ACL middleware before a request ever reaches this API.
/// Rules that depend on the caller's relationship to a specific order are enforced here, against
/// the table in [`crate::permissions`], because only this layer has the order in hand.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement
{
    /// Submit a new order on behalf of a customer.
    ///
    /// The order must carry at least one line item with a positive quantity, and every product
    /// must exist. Prices are snapshotted at this moment; later catalog changes do not affect the
    /// order. The stored aggregate is returned.
    pub async fn process_new_order(&self, order: NewOrder) -> Result<FullOrder, OrderManagementError> {
        let full = self.db.insert_order(order).await?;
        self.call_order_lists_stale_hook(Some(full.order.customer_id)).await;
        debug!(
            "🔄️📦️ Order #{} for customer {} recorded. {} items, total {}",
            full.order.id,
            full.order.customer_id,
            full.items.len(),
            full.order.original_total
        );
        Ok(full)
    }

    /// Changes the status of an order, and optionally (re)assigns a rider, on behalf of the
    /// given user.
    ///
    /// Who may move an order to which status is decided by the permission table:
    ///
    /// | Caller   | Relationship required | Allowed targets               |
    /// |----------|-----------------------|-------------------------------|
    /// | admin    | none                  | any status                    |
    /// | rider    | assigned to the order | `shipped`, `completed`, `paid`|
    /// | customer | owns the order        | `cancelled`                   |
    ///
    /// Setting `rider_id` is an admin-only extra and does not force a status change; use
    /// [`Self::assign_rider`] for the dispatch flow that does. A request that names neither a
    /// status nor a rider is rejected outright.
    ///
    /// Terminal orders reject every change with [`OrderManagementError::OrderLocked`], no matter
    /// who asks.
    pub async fn update_order(
        &self,
        user_id: i64,
        roles: &Roles,
        order_id: i64,
        new_status: Option<OrderStatus>,
        rider_id: Option<i64>,
    ) -> Result<OrderChanged, OrderManagementError> {
        if new_status.is_none() && rider_id.is_none() {
            return Err(OrderManagementError::InvalidRequest("Nothing to update".to_string()));
        }
        if rider_id.is_some() && !roles.contains(Role::Admin) {
            info!("🔄️ User {user_id} may not assign riders");
            return Err(OrderManagementError::OrderModificationForbidden);
        }
        let order = self.fetch_order(order_id).await?;
        if let Some(target) = new_status {
            let relation = OrderRelation::between(user_id, &order);
            if !may_set_status(roles, relation, target) {
                info!("🔄️ User {user_id} may not move order #{order_id} to {target}");
                return Err(OrderManagementError::OrderModificationForbidden);
            }
        }
        let changed = self.db.update_order(order_id, new_status, rider_id).await?;
        self.dispatch_status_events(&changed).await;
        debug!("🔄️ Order #{order_id} updated on behalf of user {user_id}");
        Ok(changed)
    }

    /// Assigns a rider to an order and moves it to `shipped` in one step. This is the dispatch
    /// flow; role enforcement (admin only) happens at the server boundary.
    pub async fn assign_rider(&self, order_id: i64, rider_id: i64) -> Result<OrderChanged, OrderManagementError> {
        let changed = self.db.assign_rider(order_id, rider_id).await?;
        self.dispatch_status_events(&changed).await;
        debug!("🔄️ Order #{order_id} dispatched with rider {rider_id}");
        Ok(changed)
    }

    /// Marks an order as completed. Allowed for admins and for the rider assigned to the order;
    /// nobody else, regardless of the permission table.
    pub async fn complete_order(&self, user_id: i64, roles: &Roles, order_id: i64) -> Result<OrderChanged, OrderManagementError> {
        let order = self.fetch_order(order_id).await?;
        let relation = OrderRelation::between(user_id, &order);
        if !(roles.contains(Role::Admin) || relation.is_assigned_rider) {
            info!("🔄️ User {user_id} may not complete order #{order_id}");
            return Err(OrderManagementError::OrderModificationForbidden);
        }
        let changed = self.db.update_order_status(order_id, OrderStatus::Completed).await?;
        self.dispatch_status_events(&changed).await;
        info!("🔄️ Order #{order_id} completed by user {user_id}");
        Ok(changed)
    }

    /// Adds a product to an order during fulfillment, appending an `add_item` entry to the
    /// adjustment ledger and recomputing the totals.
    pub async fn add_item(
        &self,
        order_id: i64,
        product_id: i64,
        quantity: i64,
        note: Option<String>,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError> {
        let full = self.db.add_order_item(order_id, product_id, quantity, note, admin_id).await?;
        self.call_order_changed_hook(&full.order).await;
        self.call_order_lists_stale_hook(Some(full.order.customer_id)).await;
        Ok(full)
    }

    /// Changes the quantity of a line item, appending a `manual` ledger entry for the difference.
    pub async fn update_item_quantity(
        &self,
        order_id: i64,
        item_id: i64,
        new_quantity: i64,
        note: Option<String>,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError> {
        let full = self.db.update_item_quantity(order_id, item_id, new_quantity, note, admin_id).await?;
        self.call_order_changed_hook(&full.order).await;
        self.call_order_lists_stale_hook(Some(full.order.customer_id)).await;
        Ok(full)
    }

    /// Removes a line item, appending a `remove_item` ledger entry for the full line value.
    pub async fn remove_item(
        &self,
        order_id: i64,
        item_id: i64,
        note: Option<String>,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError> {
        let full = self.db.remove_order_item(order_id, item_id, note, admin_id).await?;
        self.call_order_changed_hook(&full.order).await;
        self.call_order_lists_stale_hook(Some(full.order.customer_id)).await;
        Ok(full)
    }

    /// Applies a fulfillment review: per-item availability and fulfilled quantities. The review
    /// moves the total without touching the adjustment ledger; the movement is accounted for in
    /// the order's `review_delta`.
    pub async fn review_fulfillment(
        &self,
        order_id: i64,
        review: FulfillmentReview,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError> {
        let full = self.db.apply_fulfillment_review(order_id, review, admin_id).await?;
        self.call_order_changed_hook(&full.order).await;
        self.call_order_lists_stale_hook(Some(full.order.customer_id)).await;
        Ok(full)
    }

    /// Records the outcome of a payment provider callback against an order.
    ///
    /// `PAID` moves the order to `paid` and `FAILED` cancels it. The raw callback body is stored
    /// on the order verbatim for audit. The provider is a trusted server-to-server caller, so the
    /// user permission table is not consulted; the terminal-order lock still applies.
    pub async fn process_payment_update(
        &self,
        order_id: i64,
        result: PaymentResult,
        payload: &str,
    ) -> Result<OrderChanged, OrderManagementError> {
        let changed = self.db.process_payment_update(order_id, result, payload).await?;
        self.dispatch_status_events(&changed).await;
        info!("🔄️💰️ Payment update for order #{order_id} processed: {result}");
        Ok(changed)
    }

    /// Fetches the order together with its items and adjustment ledger.
    pub async fn full_order(&self, order_id: i64) -> Result<Option<FullOrder>, OrderManagementError> {
        let full = self.db.fetch_full_order(order_id).await?;
        Ok(full)
    }

    /// Fetches orders according to the criteria in the filter.
    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderManagementError> {
        let orders = self.db.search_orders(query).await?;
        Ok(orders)
    }

    /// All orders placed by the given customer, newest first.
    pub async fn orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderManagementError> {
        let orders = self.db.fetch_orders_for_customer(customer_id).await?;
        Ok(orders)
    }

    /// All orders assigned to the given rider, newest first.
    pub async fn orders_for_rider(&self, rider_id: i64) -> Result<Vec<Order>, OrderManagementError> {
        let orders = self.db.fetch_orders_for_rider(rider_id).await?;
        Ok(orders)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Order, OrderManagementError> {
        self.db.fetch_order_by_id(order_id).await?.ok_or(OrderManagementError::OrderNotFound(order_id))
    }

    /// Fires the hooks appropriate to a status transition: the generic order-changed event, the
    /// paid or annulled event when applicable, and the list staleness signal.
    async fn dispatch_status_events(&self, changed: &OrderChanged) {
        self.call_order_changed_hook(&changed.new_order).await;
        if changed.old_order.status != changed.new_order.status {
            match changed.new_order.status {
                OrderStatus::Paid => self.call_order_paid_hook(&changed.new_order).await,
                OrderStatus::Cancelled => self.call_order_annulled_hook(&changed.new_order).await,
                _ => {},
            }
        }
        self.call_order_lists_stale_hook(Some(changed.new_order.customer_id)).await;
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️📬️ Notifying order paid hook subscribers");
            let event = OrderPaidEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_annulled_producer {
            debug!("🔄️📬️ Notifying order annulled hook subscribers");
            let event = OrderAnnulledEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_changed_hook(&self, order: &Order) {
        for emitter in &self.producers.order_changed_producer {
            debug!("🔄️📬️ Notifying order changed hook subscribers");
            let event = OrderChangedEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_lists_stale_hook(&self, customer_id: Option<i64>) {
        for emitter in &self.producers.order_lists_stale_producer {
            debug!("🔄️📬️ Notifying order list staleness subscribers");
            let event = OrderListsStaleEvent::new(customer_id);
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
