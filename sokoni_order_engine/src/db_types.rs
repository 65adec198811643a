use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sok_common::Cents;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(pub String);

//--------------------------------------        Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A shopper. Can place orders and cancel their own orders.
    Customer,
    /// A delivery rider. Can advance the status of orders assigned to them.
    Rider,
    /// Store staff. Can do anything, including amending orders after payment.
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Rider => write!(f, "rider"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "rider" => Ok(Self::Rider),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------        Roles         ---------------------------------------------------------
/// The set of roles held by a user. Stored in the database as a comma-separated string, e.g. `customer,rider`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(Vec<Role>);

impl Roles {
    pub fn new(roles: Vec<Role>) -> Self {
        let mut result = Self::default();
        roles.into_iter().for_each(|r| result.add(r));
        result
    }

    /// Adds the role to the set, ignoring duplicates.
    pub fn add(&mut self, role: Role) {
        if !self.0.contains(&role) {
            self.0.push(role);
        }
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Role>> for Roles {
    fn from(roles: Vec<Role>) -> Self {
        Self::new(roles)
    }
}

impl Display for Roles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0.iter().map(|r| r.to_string()).collect::<Vec<String>>().join(",");
        write!(f, "{s}")
    }
}

impl FromStr for Roles {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let roles = s
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(Role::from_str)
            .collect::<Result<Vec<Role>, ConversionError>>()?;
        Ok(Self::new(roles))
    }
}

impl From<String> for Roles {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid roles string in database: {value}. Defaulting to customer.");
            Roles::new(vec![Role::Customer])
        })
    }
}

//--------------------------------------     OrderStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// The order has been placed, but no payment has been received.
    Created,
    /// Payment has been received in full.
    Paid,
    /// The order is out for delivery with a rider.
    Shipped,
    /// The order has been delivered. Terminal.
    Completed,
    /// The order has been cancelled by the customer, an admin, or a failed payment. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Terminal orders are locked. No further edits, adjustments or status changes are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Created => write!(f, "created"),
            OrderStatus::Paid => write!(f, "paid"),
            OrderStatus::Shipped => write!(f, "shipped"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to created");
            OrderStatus::Created
        })
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------  FulfillmentStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
    /// No staff member has reviewed the order against physical stock yet.
    Pending,
    /// The order has been through at least one fulfillment review.
    Reviewed,
}

impl Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FulfillmentStatus::Pending => write!(f, "pending"),
            FulfillmentStatus::Reviewed => write!(f, "reviewed"),
        }
    }
}

impl From<String> for FulfillmentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid fulfillment status: {value}. Defaulting to pending");
            FulfillmentStatus::Pending
        })
    }
}

impl FromStr for FulfillmentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "reviewed" => Ok(Self::Reviewed),
            s => Err(ConversionError(format!("Invalid fulfillment status: {s}"))),
        }
    }
}

//--------------------------------------     Availability     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// The item can be fulfilled, in full or in part.
    Available,
    /// The item is out of stock. It contributes nothing to the order total.
    Missing,
}

impl Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Available => write!(f, "available"),
            Availability::Missing => write!(f, "missing"),
        }
    }
}

impl From<String> for Availability {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid availability: {value}. Defaulting to available");
            Availability::Available
        })
    }
}

impl FromStr for Availability {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "missing" => Ok(Self::Missing),
            s => Err(ConversionError(format!("Invalid availability: {s}"))),
        }
    }
}

//--------------------------------------    AdjustmentKind    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// An item was added to the order, or the quantity of an existing item was topped up.
    AddItem,
    /// An item was removed from the order.
    RemoveItem,
    /// A staff-entered correction, e.g. a quantity change.
    Manual,
}

impl Display for AdjustmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjustmentKind::AddItem => write!(f, "add_item"),
            AdjustmentKind::RemoveItem => write!(f, "remove_item"),
            AdjustmentKind::Manual => write!(f, "manual"),
        }
    }
}

impl From<String> for AdjustmentKind {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid adjustment kind: {value}. Defaulting to manual");
            AdjustmentKind::Manual
        })
    }
}

impl FromStr for AdjustmentKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_item" => Ok(Self::AddItem),
            "remove_item" => Ok(Self::RemoveItem),
            "manual" => Ok(Self::Manual),
            s => Err(ConversionError(format!("Invalid adjustment kind: {s}"))),
        }
    }
}

//--------------------------------------    PaymentResult     ---------------------------------------------------------
/// The outcome reported by the payment provider in a webhook call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentResult {
    #[serde(rename = "PAID")]
    Paid,
    #[serde(rename = "FAILED")]
    Failed,
}

impl Display for PaymentResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentResult::Paid => write!(f, "PAID"),
            PaymentResult::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for PaymentResult {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAID" => Ok(Self::Paid),
            "FAILED" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment result: {s}"))),
        }
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub status: OrderStatus,
    /// The total at the moment the order was placed. Never changes after creation.
    pub original_total: Cents,
    /// The current total, recomputed after every amendment. Always equal to `total`.
    pub final_total: Cents,
    /// Kept identical to `final_total` for display compatibility with older clients.
    pub total: Cents,
    /// The signed sum of fulfillment review shortfalls, tracked separately from the adjustments ledger.
    pub review_delta: Cents,
    pub fulfillment_status: FulfillmentStatus,
    pub rider_id: Option<i64>,
    pub shipping_address: Option<String>,
    /// The raw payment provider payload, stored verbatim for audit.
    pub payment_info: Option<String>,
    /// Optimistic concurrency counter. Bumped on every successful write to the order row.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Terminal orders (completed or cancelled) reject every modification.
    pub fn is_locked(&self) -> bool {
        self.status.is_terminal()
    }
}

//--------------------------------------      OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// The catalog price at the moment the item entered the order. Never changes afterwards.
    pub price_at_purchase: Cents,
    /// `None` until a fulfillment review has looked at this line.
    pub fulfilled_quantity: Option<i64>,
    pub availability: Availability,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    /// The quantity this line is billed for. Missing items are billed for nothing,
    /// reviewed items for their fulfilled quantity, and unreviewed items for the ordered quantity.
    pub fn effective_quantity(&self) -> i64 {
        match self.availability {
            Availability::Missing => 0,
            Availability::Available => self.fulfilled_quantity.unwrap_or(self.quantity),
        }
    }

    pub fn line_total(&self) -> Cents {
        self.price_at_purchase * self.effective_quantity()
    }
}

//--------------------------------------      Adjustment      ---------------------------------------------------------
/// One entry in the append-only amendment ledger of an order. Entries are never edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: i64,
    pub order_id: i64,
    pub kind: AdjustmentKind,
    /// Signed. Positive entries increase the order total, negative entries decrease it.
    pub amount: Cents,
    pub note: String,
    /// The staff member who made the change.
    pub admin_id: i64,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    NewAdjustment     ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewAdjustment {
    pub kind: AdjustmentKind,
    pub amount: Cents,
    pub note: String,
    pub admin_id: i64,
}

impl NewAdjustment {
    pub fn new(kind: AdjustmentKind, amount: Cents, note: impl Into<String>, admin_id: i64) -> Self {
        Self { kind, amount, note: note.into(), admin_id }
    }
}

//--------------------------------------      NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    /// The customer placing the order.
    pub customer_id: i64,
    pub items: Vec<NewOrderItem>,
    pub shipping_address: Option<String>,
}

impl NewOrder {
    pub fn new(customer_id: i64) -> Self {
        Self { customer_id, items: Vec::new(), shipping_address: None }
    }

    pub fn with_item(mut self, product_id: i64, quantity: i64) -> Self {
        self.items.push(NewOrderItem { product_id, quantity });
        self
    }

    pub fn with_shipping_address(mut self, address: impl Into<String>) -> Self {
        self.shipping_address = Some(address.into());
        self
    }
}

/// The largest quantity a single order line will accept. Quantities arrive as arbitrary JSON
/// integers, and `price * quantity` must stay well clear of i64 overflow.
pub const MAX_ITEM_QUANTITY: i64 = 1_000_000;

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
}

//--------------------------------------        User          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub roles: Roles,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(Role::Admin)
    }

    pub fn is_rider(&self) -> bool {
        self.roles.contains(Role::Rider)
    }
}

//--------------------------------------      NewUser         ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub phone: String,
    /// An argon2 PHC string. Never the plaintext password.
    pub password_hash: String,
    pub roles: Roles,
}

impl NewUser {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            password_hash: password_hash.into(),
            roles: Roles::new(vec![Role::Customer]),
        }
    }

    pub fn with_roles(mut self, roles: Roles) -> Self {
        self.roles = roles;
        self
    }
}

//--------------------------------------      Product         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// The current catalog price. Order lines snapshot this at purchase time.
    pub price: Cents,
    pub stock: i64,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Cents,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub category: Option<String>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Cents) -> Self {
        Self { name: name.into(), price, stock: 0, category: None }
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}
