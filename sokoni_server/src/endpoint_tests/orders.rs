use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{Days, TimeZone, Utc};
use log::*;
use sokoni_order_engine::{
    db_types::{Availability, FulfillmentStatus, Order, OrderItem, OrderStatus, Product, Role, Roles, User},
    events::EventProducers,
    order_objects::{FullOrder, OrderChanged},
    AuthApi,
    CatalogApi,
    OrderFlowApi,
};

use super::{
    helpers::{get_request, issue_token, post_request},
    mocks::{MockAuthStore, MockCatalogStore, MockOrderStore},
};
use crate::{
    auth::JwtClaims,
    routes::{
        AddItemRoute,
        CompleteOrderRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        OrderStatusRoute,
        ProductsRoute,
        RiderOrdersRoute,
    },
};

const ORDERS_JSON: &str = r#"[{"id":12,"customer_id":602,"status":"created","original_total":52000,"final_total":52000,"total":52000,"review_delta":0,"fulfillment_status":"pending","rider_id":null,"shipping_address":null,"payment_info":null,"version":1,"created_at":"2024-03-15T18:30:00Z","updated_at":"2024-03-15T18:30:00Z"},{"id":11,"customer_id":602,"status":"shipped","original_total":145000,"final_total":138500,"total":138500,"review_delta":-6500,"fulfillment_status":"reviewed","rider_id":88,"shipping_address":"14 Riverside Drive, Nairobi","payment_info":"{\"status\":\"PAID\",\"account_reference\":\"ORDER-11\"}","version":4,"created_at":"2024-02-29T13:30:00Z","updated_at":"2024-03-01T08:15:00Z"}]"#;

fn valid_token(user_id: i64, name: &str, roles: Vec<Role>) -> String {
    let claims = JwtClaims { user_id, name: name.to_string(), roles: Roles::new(roles) };
    issue_token(claims, Utc::now() + Days::new(1))
}

fn sample_order(id: i64, customer_id: i64, status: OrderStatus) -> Order {
    Order {
        id,
        customer_id,
        status,
        original_total: 52000.into(),
        final_total: 52000.into(),
        total: 52000.into(),
        review_delta: 0.into(),
        fulfillment_status: FulfillmentStatus::Pending,
        rider_id: None,
        shipping_address: None,
        payment_info: None,
        version: 1,
        created_at: Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap(),
    }
}

/// The orders that [`ORDERS_JSON`] is the serialization of.
fn orders_response() -> Vec<Order> {
    let newest = sample_order(12, 602, OrderStatus::Created);
    let older = Order {
        id: 11,
        customer_id: 602,
        status: OrderStatus::Shipped,
        original_total: 145_000.into(),
        final_total: 138_500.into(),
        total: 138_500.into(),
        review_delta: (-6500).into(),
        fulfillment_status: FulfillmentStatus::Reviewed,
        rider_id: Some(88),
        shipping_address: Some("14 Riverside Drive, Nairobi".to_string()),
        payment_info: Some(r#"{"status":"PAID","account_reference":"ORDER-11"}"#.to_string()),
        version: 4,
        created_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 0).unwrap(),
    };
    vec![newest, older]
}

#[actix_web::test]
async fn fetch_my_orders_without_a_token() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/orders", configure_customer_orders).await.expect_err("Missing token must be rejected");
    debug!("Response: {err}");
    let err = err.to_lowercase();
    assert!(err.contains("jwt") || err.contains("token"), "Unexpected error: {err}");
}

#[actix_web::test]
async fn fetch_my_orders_with_a_tampered_token() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(602, "Wanjiku", vec![Role::Customer]);
    let (head, _sig) = token.rsplit_once('.').unwrap();
    let tampered = format!("{head}.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    let err = get_request(&tampered, "/orders", configure_customer_orders)
        .await
        .expect_err("A tampered token must be rejected");
    debug!("Response: {err}");
    let err = err.to_lowercase();
    assert!(err.contains("jwt") || err.contains("token"), "Unexpected error: {err}");
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(602, "Wanjiku", vec![Role::Customer]);
    let (status, body) = get_request(&token, "/orders", configure_customer_orders).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ORDERS_JSON);
}

#[actix_web::test]
async fn admins_fetch_all_orders() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(7, "Juma", vec![Role::Admin]);
    let (status, body) = get_request(&token, "/orders", configure_admin_orders).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ORDERS_JSON);
}

#[actix_web::test]
async fn strangers_cannot_cancel_an_order() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(555, "Zawadi", vec![Role::Customer]);
    let body = serde_json::json!({ "status": "cancelled" });
    let (status, body) = post_request(&token, "/orders/11/status", body, configure_stranger_status).await.unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Insufficient Permissions. You may not modify this order"}"#);
}

#[actix_web::test]
async fn admins_move_an_order_to_shipped() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(7, "Juma", vec![Role::Admin]);
    let body = serde_json::json!({ "status": "shipped" });
    let (status, body) = post_request(&token, "/orders/11/status", body, configure_admin_status).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).expect("Response was not an order");
    assert_eq!(order.id, 11);
    assert_eq!(order.status, OrderStatus::Shipped);
}

#[actix_web::test]
async fn customers_cannot_add_items() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(602, "Wanjiku", vec![Role::Customer]);
    let body = serde_json::json!({ "product_id": 5, "quantity": 2 });
    let err = post_request(&token, "/orders/11/items", body, configure_add_item)
        .await
        .expect_err("Customers must not reach the amendment routes");
    assert_eq!(err, "Insufficient permissions");
}

#[actix_web::test]
async fn riders_fetch_their_assigned_orders() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(88, "Baraka", vec![Role::Rider]);
    let (status, body) = get_request(&token, "/rider/orders", configure_rider_orders).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).expect("Response was not an order list");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].rider_id, Some(88));
    assert_eq!(orders[0].status, OrderStatus::Shipped);
}

#[actix_web::test]
async fn customers_cannot_fetch_rider_orders() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(602, "Wanjiku", vec![Role::Customer]);
    let err = get_request(&token, "/rider/orders", configure_rider_orders)
        .await
        .expect_err("Customers must not reach the rider routes");
    assert_eq!(err, "Insufficient permissions");
}

#[actix_web::test]
async fn owners_fetch_a_populated_order() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(602, "Wanjiku", vec![Role::Customer]);
    let (status, body) = get_request(&token, "/orders/11", configure_populated_order).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let populated: serde_json::Value = serde_json::from_str(&body).expect("Response was not valid JSON");
    assert_eq!(populated["order"]["id"], 11);
    assert_eq!(populated["customer"]["name"], "Wanjiku");
    assert_eq!(populated["rider"]["name"], "Baraka");
    assert_eq!(populated["items"][0]["product_name"], "Maize flour 2kg");
}

#[actix_web::test]
async fn strangers_cannot_fetch_an_order() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(555, "Zawadi", vec![Role::Customer]);
    let (status, body) = get_request(&token, "/orders/11", configure_populated_order).await.unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Insufficient Permissions. You may not view this order"}"#);
}

#[actix_web::test]
async fn assigned_rider_completes_an_order() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(88, "Baraka", vec![Role::Rider]);
    let body = serde_json::json!({});
    let (status, body) = post_request(&token, "/orders/11/complete", body, configure_complete).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).expect("Response was not an order");
    assert_eq!(order.status, OrderStatus::Completed);
}

#[actix_web::test]
async fn unrelated_rider_cannot_complete_an_order() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(99, "Njoroge", vec![Role::Rider]);
    let body = serde_json::json!({});
    let (status, body) = post_request(&token, "/orders/11/complete", body, configure_complete).await.unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Insufficient Permissions. You may not modify this order"}"#);
}

#[actix_web::test]
async fn unknown_status_strings_get_the_json_error_shape() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(7, "Juma", vec![Role::Admin]);
    let body = serde_json::json!({"status": "flying"});
    let (status, body) = post_request(&token, "/orders/11/status", body, configure_admin_status).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"Invalid request body:"#), "Unexpected error shape: {body}");
    assert!(body.contains("flying"), "The offending value should be echoed back: {body}");
}

#[actix_web::test]
async fn fetch_the_catalog() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(602, "Wanjiku", vec![Role::Customer]);
    let (status, body) = get_request(&token, "/products", configure_catalog).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        r#"[{"id":5,"name":"Maize flour 2kg","price":26000,"stock":40,"category":"Pantry","created_at":"2024-01-10T09:00:00Z","updated_at":"2024-01-10T09:00:00Z"}]"#
    );
}

fn configure_customer_orders(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store
        .expect_search_orders()
        .withf(|query| query.customer_id == Some(602) && query.rider_id.is_none())
        .returning(|_| Ok(orders_response()));
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.app_data(web::Data::new(api)).service(MyOrdersRoute::<MockOrderStore>::new());
}

fn configure_admin_orders(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store
        .expect_search_orders()
        .withf(|query| query.customer_id.is_none() && query.rider_id.is_none())
        .returning(|_| Ok(orders_response()));
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.app_data(web::Data::new(api)).service(MyOrdersRoute::<MockOrderStore>::new());
}

// The stranger never gets past the permission check, so `update_order` carries no expectation.
fn configure_stranger_status(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store
        .expect_fetch_order_by_id()
        .withf(|&order_id| order_id == 11)
        .returning(|_| Ok(Some(sample_order(11, 602, OrderStatus::Paid))));
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.app_data(web::Data::new(api)).service(OrderStatusRoute::<MockOrderStore>::new());
}

fn configure_admin_status(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store
        .expect_fetch_order_by_id()
        .withf(|&order_id| order_id == 11)
        .returning(|_| Ok(Some(sample_order(11, 602, OrderStatus::Paid))));
    store
        .expect_update_order()
        .withf(|&order_id, &status, &rider_id| {
            order_id == 11 && status == Some(OrderStatus::Shipped) && rider_id.is_none()
        })
        .returning(|_, _, _| {
            let old = sample_order(11, 602, OrderStatus::Paid);
            let new = sample_order(11, 602, OrderStatus::Shipped);
            Ok(OrderChanged::new(old, new))
        });
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.app_data(web::Data::new(api)).service(OrderStatusRoute::<MockOrderStore>::new());
}

fn configure_add_item(cfg: &mut ServiceConfig) {
    let api = OrderFlowApi::new(MockOrderStore::new(), EventProducers::default());
    cfg.app_data(web::Data::new(api)).service(AddItemRoute::<MockOrderStore>::new());
}

fn test_user(id: i64, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
        phone: format!("+25470000{id:04}"),
        password_hash: "$argon2id$unused".to_string(),
        roles: Roles::new(vec![Role::Customer]),
        created_at: Utc.with_ymd_and_hms(2024, 1, 5, 7, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 1, 5, 7, 0, 0).unwrap(),
    }
}

fn sample_product() -> Product {
    Product {
        id: 5,
        name: "Maize flour 2kg".to_string(),
        price: 26_000.into(),
        stock: 40,
        category: Some("Pantry".to_string()),
        created_at: Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
    }
}

fn configure_catalog(cfg: &mut ServiceConfig) {
    let mut store = MockCatalogStore::new();
    store.expect_fetch_products().returning(|| Ok(vec![sample_product()]));
    cfg.app_data(web::Data::new(CatalogApi::new(store))).service(ProductsRoute::<MockCatalogStore>::new());
}

fn configure_populated_order(cfg: &mut ServiceConfig) {
    let mut order_store = MockOrderStore::new();
    order_store.expect_fetch_full_order().withf(|&order_id| order_id == 11).returning(|_| {
        let mut order = sample_order(11, 602, OrderStatus::Shipped);
        order.rider_id = Some(88);
        let item = OrderItem {
            id: 41,
            order_id: 11,
            product_id: 5,
            quantity: 2,
            price_at_purchase: 26_000.into(),
            fulfilled_quantity: None,
            availability: Availability::Available,
            admin_note: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap(),
        };
        Ok(Some(FullOrder::new(order, vec![item], Vec::new())))
    });
    let mut auth_store = MockAuthStore::new();
    auth_store.expect_fetch_user_by_id().returning(|user_id| {
        let name = if user_id == 88 { "Baraka" } else { "Wanjiku" };
        Ok(Some(test_user(user_id, name)))
    });
    let mut catalog_store = MockCatalogStore::new();
    catalog_store.expect_fetch_products().returning(|| Ok(vec![sample_product()]));
    let orders_api = OrderFlowApi::new(order_store, EventProducers::default());
    cfg.app_data(web::Data::new(orders_api))
        .app_data(web::Data::new(AuthApi::new(auth_store)))
        .app_data(web::Data::new(CatalogApi::new(catalog_store)))
        .service(OrderByIdRoute::<MockOrderStore, MockAuthStore, MockCatalogStore>::new());
}

fn configure_rider_orders(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_fetch_orders_for_rider().withf(|&rider_id| rider_id == 88).returning(|_| {
        let mut order = sample_order(11, 602, OrderStatus::Shipped);
        order.rider_id = Some(88);
        Ok(vec![order])
    });
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.app_data(web::Data::new(api)).service(RiderOrdersRoute::<MockOrderStore>::new());
}

fn configure_complete(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_fetch_order_by_id().withf(|&order_id| order_id == 11).returning(|_| {
        let mut order = sample_order(11, 602, OrderStatus::Shipped);
        order.rider_id = Some(88);
        Ok(Some(order))
    });
    store
        .expect_update_order()
        .withf(|&order_id, &status, &rider_id| {
            order_id == 11 && status == Some(OrderStatus::Completed) && rider_id.is_none()
        })
        .returning(|_, _, _| {
            let old = sample_order(11, 602, OrderStatus::Shipped);
            let mut new = sample_order(11, 602, OrderStatus::Completed);
            new.rider_id = Some(88);
            Ok(OrderChanged::new(old, new))
        });
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.app_data(web::Data::new(api)).service(CompleteOrderRoute::<MockOrderStore>::new());
}
