//! `SqliteDatabase` is a concrete implementation of a Sokoni order engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module.
use std::fmt::Debug;

use log::*;
use sok_common::Cents;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{adjustments, db_url, new_pool, order_items, orders, products, rider_assignments, users};
use crate::{
    db_types::{
        Adjustment,
        AdjustmentKind,
        Availability,
        FulfillmentStatus,
        NewAdjustment,
        MAX_ITEM_QUANTITY,
        NewOrder,
        NewProduct,
        NewUser,
        Order,
        OrderItem,
        OrderStatus,
        PaymentResult,
        Product,
        Roles,
        User,
    },
    helpers::calculate_order_total,
    order_objects::{FulfillmentReview, FullOrder, OrderChanged, OrderQueryFilter},
    traits::{
        AuthApiError,
        AuthManagement,
        CatalogApiError,
        CatalogManagement,
        OrderManagement,
        OrderManagementError,
        OrderQuery,
        OrderQueryError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

/// Fetches the order and rejects locked (terminal) orders before any mutation starts.
async fn fetch_unlocked_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Order, OrderManagementError> {
    let order = orders::fetch_order_by_id(order_id, conn).await?.ok_or(OrderManagementError::OrderNotFound(order_id))?;
    if order.is_locked() {
        return Err(OrderManagementError::OrderLocked(order_id));
    }
    Ok(order)
}

/// Recomputes the order totals from the line items, reconciles `review_delta` against the
/// adjustment ledger, and writes the order back under its version guard.
///
/// `review_delta` is defined as whatever part of `final_total - original_total` the ledger does
/// not explain. Reviews are the only operations that change the total without a ledger entry,
/// so the difference is exactly the review-driven correction.
async fn recompute_and_save(mut order: Order, conn: &mut SqliteConnection) -> Result<Order, OrderManagementError> {
    let items = order_items::fetch_items_for_order(order.id, conn).await?;
    let total = calculate_order_total(&items);
    let ledger = adjustments::ledger_total_for_order(order.id, conn).await?;
    order.final_total = total;
    order.total = total;
    order.review_delta = total - order.original_total - ledger;
    orders::save_order_changes(&order, conn).await
}

async fn load_full_order(order: Order, conn: &mut SqliteConnection) -> Result<FullOrder, OrderManagementError> {
    let items = order_items::fetch_items_for_order(order.id, conn).await?;
    let ledger = adjustments::fetch_adjustments_for_order(order.id, conn).await?;
    Ok(FullOrder::new(order, items, ledger))
}

impl OrderManagement for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<FullOrder, OrderManagementError> {
        if order.items.is_empty() {
            return Err(OrderManagementError::InvalidRequest("An order must contain at least one item".to_string()));
        }
        if let Some(bad) = order.items.iter().find(|i| !(1..=MAX_ITEM_QUANTITY).contains(&i.quantity)) {
            return Err(OrderManagementError::InvalidRequest(format!(
                "Quantity for product {} must be between 1 and {MAX_ITEM_QUANTITY}",
                bad.product_id
            )));
        }
        let mut tx = self.pool.begin().await?;
        users::fetch_user_by_id(order.customer_id, &mut tx)
            .await?
            .ok_or(OrderManagementError::UserNotFound(order.customer_id))?;
        let mut lines = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let product = products::fetch_product_by_id(item.product_id, &mut tx)
                .await?
                .ok_or(OrderManagementError::ProductNotFound(item.product_id))?;
            lines.push((product, item.quantity));
        }
        let original_total = lines.iter().map(|(p, q)| p.price * *q).sum::<Cents>();
        let row = orders::insert_order(order.customer_id, original_total, order.shipping_address, &mut tx).await?;
        for (product, quantity) in lines {
            order_items::insert_item(row.id, product.id, quantity, product.price, &mut tx).await?;
        }
        let full = load_full_order(row, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order #{} saved for customer {} with {} items. Total: {}",
            full.order.id,
            full.order.customer_id,
            full.items.len(),
            full.order.original_total
        );
        Ok(full)
    }

    async fn update_order(
        &self,
        order_id: i64,
        new_status: Option<OrderStatus>,
        rider_id: Option<i64>,
    ) -> Result<OrderChanged, OrderManagementError> {
        let mut tx = self.pool.begin().await?;
        let old_order = fetch_unlocked_order(order_id, &mut tx).await?;
        let mut order = old_order.clone();
        if let Some(rider_id) = rider_id {
            let rider = users::fetch_user_by_id(rider_id, &mut tx)
                .await?
                .ok_or(OrderManagementError::UserNotFound(rider_id))?;
            if !rider.is_rider() {
                return Err(OrderManagementError::NotARider(rider_id));
            }
            rider_assignments::idempotent_insert(order_id, rider_id, &mut tx).await?;
            order.rider_id = Some(rider_id);
        }
        if let Some(status) = new_status {
            order.status = status;
        }
        if order == old_order {
            return Err(OrderManagementError::OrderModificationNoOp);
        }
        let new_order = orders::save_order_changes(&order, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗃️ Order #{order_id} updated. Status: {} -> {}. Rider: {:?} -> {:?}",
            old_order.status, new_order.status, old_order.rider_id, new_order.rider_id
        );
        Ok(OrderChanged::new(old_order, new_order))
    }

    async fn assign_rider(&self, order_id: i64, rider_id: i64) -> Result<OrderChanged, OrderManagementError> {
        let mut tx = self.pool.begin().await?;
        let old_order = fetch_unlocked_order(order_id, &mut tx).await?;
        let rider =
            users::fetch_user_by_id(rider_id, &mut tx).await?.ok_or(OrderManagementError::UserNotFound(rider_id))?;
        if !rider.is_rider() {
            return Err(OrderManagementError::NotARider(rider_id));
        }
        rider_assignments::idempotent_insert(order_id, rider_id, &mut tx).await?;
        let mut order = old_order.clone();
        order.rider_id = Some(rider_id);
        order.status = OrderStatus::Shipped;
        let new_order = orders::save_order_changes(&order, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Rider {} ({rider_id}) is now handling order #{order_id}", rider.name);
        Ok(OrderChanged::new(old_order, new_order))
    }

    async fn add_order_item(
        &self,
        order_id: i64,
        product_id: i64,
        quantity: i64,
        note: Option<String>,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError> {
        if !(1..=MAX_ITEM_QUANTITY).contains(&quantity) {
            return Err(OrderManagementError::InvalidRequest(format!(
                "Quantity must be between 1 and {MAX_ITEM_QUANTITY}"
            )));
        }
        let mut tx = self.pool.begin().await?;
        let order = fetch_unlocked_order(order_id, &mut tx).await?;
        let product = products::fetch_product_by_id(product_id, &mut tx)
            .await?
            .ok_or(OrderManagementError::ProductNotFound(product_id))?;
        // Existing lines keep their purchase-time price, so the ledger delta for a top-up is
        // based on that price and not on the current catalog price.
        let amount = match order_items::fetch_item_by_product(order_id, product_id, &mut tx).await? {
            Some(item) => {
                if item.quantity + quantity > MAX_ITEM_QUANTITY {
                    return Err(OrderManagementError::InvalidRequest(format!(
                        "Line quantity may not exceed {MAX_ITEM_QUANTITY}"
                    )));
                }
                order_items::update_item_quantity(order_id, item.id, item.quantity + quantity, &mut tx).await?;
                item.price_at_purchase * quantity
            },
            None => {
                order_items::insert_item(order_id, product_id, quantity, product.price, &mut tx).await?;
                product.price * quantity
            },
        };
        let note = note.unwrap_or_else(|| format!("Added {quantity} x {}", product.name));
        adjustments::insert_adjustment(order_id, NewAdjustment::new(AdjustmentKind::AddItem, amount, note, admin_id), &mut tx)
            .await?;
        let mut updated = order;
        updated.fulfillment_status = FulfillmentStatus::Pending;
        let saved = recompute_and_save(updated, &mut tx).await?;
        let full = load_full_order(saved, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Admin {admin_id} added {quantity} x product {product_id} to order #{order_id}");
        Ok(full)
    }

    async fn update_item_quantity(
        &self,
        order_id: i64,
        item_id: i64,
        new_quantity: i64,
        note: Option<String>,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError> {
        if !(1..=MAX_ITEM_QUANTITY).contains(&new_quantity) {
            return Err(OrderManagementError::InvalidRequest(format!(
                "Quantity must be between 1 and {MAX_ITEM_QUANTITY}"
            )));
        }
        let mut tx = self.pool.begin().await?;
        let order = fetch_unlocked_order(order_id, &mut tx).await?;
        let item = order_items::fetch_item(order_id, item_id, &mut tx)
            .await?
            .ok_or(OrderManagementError::OrderItemNotFound { order_id, item_id })?;
        if item.quantity == new_quantity {
            return Err(OrderManagementError::OrderModificationNoOp);
        }
        order_items::update_item_quantity(order_id, item_id, new_quantity, &mut tx).await?;
        let amount = item.price_at_purchase * (new_quantity - item.quantity);
        let note = note.unwrap_or_else(|| format!("Quantity changed from {} to {new_quantity}", item.quantity));
        adjustments::insert_adjustment(order_id, NewAdjustment::new(AdjustmentKind::Manual, amount, note, admin_id), &mut tx)
            .await?;
        let mut updated = order;
        updated.fulfillment_status = FulfillmentStatus::Pending;
        let saved = recompute_and_save(updated, &mut tx).await?;
        let full = load_full_order(saved, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Admin {admin_id} set item {item_id} on order #{order_id} to {new_quantity} units");
        Ok(full)
    }

    async fn remove_order_item(
        &self,
        order_id: i64,
        item_id: i64,
        note: Option<String>,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_unlocked_order(order_id, &mut tx).await?;
        let item = order_items::fetch_item(order_id, item_id, &mut tx)
            .await?
            .ok_or(OrderManagementError::OrderItemNotFound { order_id, item_id })?;
        let amount = -(item.price_at_purchase * item.quantity);
        let note = note.unwrap_or_else(|| format!("Removed {} x product {}", item.quantity, item.product_id));
        adjustments::insert_adjustment(
            order_id,
            NewAdjustment::new(AdjustmentKind::RemoveItem, amount, note, admin_id),
            &mut tx,
        )
        .await?;
        order_items::delete_item(item_id, &mut tx).await?;
        let mut updated = order;
        updated.fulfillment_status = FulfillmentStatus::Pending;
        let saved = recompute_and_save(updated, &mut tx).await?;
        let full = load_full_order(saved, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Admin {admin_id} removed item {item_id} from order #{order_id}");
        Ok(full)
    }

    async fn apply_fulfillment_review(
        &self,
        order_id: i64,
        review: FulfillmentReview,
        admin_id: i64,
    ) -> Result<FullOrder, OrderManagementError> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_unlocked_order(order_id, &mut tx).await?;
        for entry in &review.items {
            // Entries that do not match an item on this order are skipped, not errors. Reviews are
            // written against a snapshot of the order and an admin may have amended it since.
            let item = match order_items::fetch_item(order_id, entry.item_id, &mut tx).await? {
                Some(item) => item,
                None => {
                    debug!("🗃️ Ignoring review entry for unknown item {} on order #{order_id}", entry.item_id);
                    continue;
                },
            };
            if entry.fulfilled_quantity.map(|q| q < 0).unwrap_or(false) {
                return Err(OrderManagementError::InvalidRequest(format!(
                    "Fulfilled quantity for item {} cannot be negative",
                    entry.item_id
                )));
            }
            let availability = entry.availability.unwrap_or(Availability::Available);
            let fulfilled = match availability {
                Availability::Missing => 0,
                Availability::Available => entry.fulfilled_quantity.unwrap_or(item.quantity).min(item.quantity),
            };
            order_items::update_item_review(order_id, item.id, fulfilled, availability, entry.admin_note.clone(), &mut tx)
                .await?;
        }
        let mut updated = order;
        updated.fulfillment_status = FulfillmentStatus::Reviewed;
        let saved = recompute_and_save(updated, &mut tx).await?;
        let full = load_full_order(saved, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗃️ Admin {admin_id} reviewed {} items on order #{order_id}. New total: {}",
            review.items.len(),
            full.order.final_total
        );
        Ok(full)
    }

    async fn process_payment_update(
        &self,
        order_id: i64,
        result: PaymentResult,
        payload: &str,
    ) -> Result<OrderChanged, OrderManagementError> {
        let mut tx = self.pool.begin().await?;
        let old_order = fetch_unlocked_order(order_id, &mut tx).await?;
        let mut order = old_order.clone();
        order.status = match result {
            PaymentResult::Paid => OrderStatus::Paid,
            PaymentResult::Failed => OrderStatus::Cancelled,
        };
        order.payment_info = Some(payload.to_string());
        if order == old_order {
            // Providers retry callbacks. A notification we have already recorded is not an error.
            debug!("🗃️ Duplicate payment notification for order #{order_id}. Nothing to do");
            return Err(OrderManagementError::OrderModificationNoOp);
        }
        let new_order = orders::save_order_changes(&order, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Payment provider reports {result} for order #{order_id}. Status is now {}", new_order.status);
        Ok(OrderChanged::new(old_order, new_order))
    }
}

impl OrderQuery for SqliteDatabase {
    async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_full_order(&self, order_id: i64) -> Result<Option<FullOrder>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let order = match orders::fetch_order_by_id(order_id, &mut conn).await? {
            Some(order) => order,
            None => return Ok(None),
        };
        let items = order_items::fetch_items_for_order(order_id, &mut conn).await?;
        let ledger = adjustments::fetch_adjustments_for_order(order_id, &mut conn).await?;
        Ok(Some(FullOrder::new(order, items, ledger)))
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let items = order_items::fetch_items_for_order(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_adjustments(&self, order_id: i64) -> Result<Vec<Adjustment>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let ledger = adjustments::fetch_adjustments_for_order(order_id, &mut conn).await?;
        Ok(ledger)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_customer(customer_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_orders_for_rider(&self, rider_id: i64) -> Result<Vec<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_rider(rider_id, &mut conn).await?;
        Ok(orders)
    }
}

impl AuthManagement for SqliteDatabase {
    async fn create_user(&self, user: NewUser) -> Result<User, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::insert_user(user, &mut conn).await?;
        info!("🗃️ New user #{} ({}) registered with roles [{}]", user.id, user.phone, user.roles);
        Ok(user)
    }

    async fn fetch_user_by_phone(&self, phone: &str) -> Result<Option<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_phone(phone, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_id(user_id, &mut conn).await?;
        Ok(user)
    }

    async fn assign_roles(&self, user_id: i64, roles: &Roles) -> Result<(), AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        users::assign_roles(user_id, roles, &mut conn).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product_by_id(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_all_products(&mut conn).await?;
        Ok(products)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
