//! Request and response payloads for the REST endpoints.

use std::collections::HashMap;

use log::*;
use serde::{Deserialize, Serialize};
use sok_common::{Cents, KES_CURRENCY_CODE_LOWER};
use sokoni_order_engine::{
    db_types::{Adjustment, Availability, NewOrder, NewOrderItem, Order, OrderStatus, PaymentResult, User},
    helpers::extract_order_id_from_reference,
    order_objects::FullOrder,
};

//--------------------------------------   Authentication     ---------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub user: UserSummary,
}

/// A user without the credential fields. This is what the API returns whenever it talks about a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub phone: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self { id: user.id, name: user.name.clone(), phone: user.phone.clone() }
    }
}

//--------------------------------------    Order payloads    ---------------------------------------------------------

/// The body of `POST /api/orders`. The customer id comes from the access token, never from the payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderRequest {
    pub items: Vec<NewOrderItem>,
    pub shipping_address: Option<String>,
}

impl NewOrderRequest {
    pub fn into_new_order(self, customer_id: i64) -> NewOrder {
        NewOrder { customer_id, items: self.items, shipping_address: self.shipping_address }
    }
}

/// The body of `POST /api/orders/{id}/status`. At least one of the fields must be present.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub rider_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRiderRequest {
    pub rider_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddItemRequest {
    pub product_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Query parameters for `DELETE /api/orders/{id}/items/{item_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoveItemParams {
    #[serde(default)]
    pub note: Option<String>,
}

//--------------------------------------   Populated orders   ---------------------------------------------------------

/// An order line decorated with the product name, so clients do not have to join against the catalog themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulatedItem {
    pub id: i64,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub quantity: i64,
    pub price_at_purchase: Cents,
    pub fulfilled_quantity: Option<i64>,
    pub availability: Availability,
    pub admin_note: Option<String>,
}

/// The full single-order projection returned by `GET /api/orders/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulatedOrder {
    pub order: Order,
    pub items: Vec<PopulatedItem>,
    pub adjustments: Vec<Adjustment>,
    pub customer: Option<UserSummary>,
    pub rider: Option<UserSummary>,
}

impl PopulatedOrder {
    pub fn assemble(
        full_order: FullOrder,
        customer: Option<UserSummary>,
        rider: Option<UserSummary>,
        product_names: &HashMap<i64, String>,
    ) -> Self {
        let FullOrder { order, items, adjustments } = full_order;
        let items = items
            .into_iter()
            .map(|item| PopulatedItem {
                id: item.id,
                product_id: item.product_id,
                product_name: product_names.get(&item.product_id).cloned(),
                quantity: item.quantity,
                price_at_purchase: item.price_at_purchase,
                fulfilled_quantity: item.fulfilled_quantity,
                availability: item.availability,
                admin_note: item.admin_note,
            })
            .collect();
        Self { order, items, adjustments, customer, rider }
    }
}

//--------------------------------------   Payment webhook    ---------------------------------------------------------

/// The envelope posted by the payment provider. Every field is optional so that a malformed notification can still
/// be inspected and logged rather than bounced with an error.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallback {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub account_reference: Option<String>,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// The settled amount in cents, when the provider includes one.
    #[serde(default)]
    pub amount: Option<u64>,
}

impl PaymentCallback {
    /// The payment outcome, if the status tag is one we recognise.
    pub fn status(&self) -> Option<PaymentResult> {
        let tag = self.status.as_deref()?;
        match tag.parse::<PaymentResult>() {
            Ok(result) => Some(result),
            Err(e) => {
                debug!("📬️ Unrecognised payment status tag. {e}");
                None
            },
        }
    }

    /// The order this payment refers to. The `account_reference` field (of the form `ORDER-1234`) takes precedence
    /// over the bare `order_id` field.
    pub fn referenced_order(&self) -> Option<i64> {
        self.account_reference.as_deref().and_then(extract_order_id_from_reference).or(self.order_id)
    }

    /// Whether the notification is denominated in a currency we settle in. Most providers omit the field for
    /// domestic mobile-money payments, so a missing currency counts as shillings.
    pub fn currency_is_supported(&self) -> bool {
        self.currency.as_deref().map(|c| c.to_lowercase() == KES_CURRENCY_CODE_LOWER).unwrap_or(true)
    }
}

/// Generic acknowledgement body. The payment webhook always responds with one of these and a 200 status, so that
/// the provider does not keep retrying notifications we have already rejected for good.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: std::fmt::Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: std::fmt::Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}
