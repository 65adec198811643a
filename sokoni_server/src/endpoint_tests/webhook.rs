use actix_web::{
    body::MessageBody,
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{TimeZone, Utc};
use sokoni_order_engine::{
    db_types::{FulfillmentStatus, Order, OrderStatus, PaymentResult},
    events::EventProducers,
    order_objects::OrderChanged,
    traits::OrderManagementError,
    OrderFlowApi,
};

use super::mocks::MockOrderStore;
use crate::{data_objects::JsonResponse, routes::PaymentWebhookRoute};

fn order_with_status(id: i64, status: OrderStatus) -> Order {
    Order {
        id,
        customer_id: 602,
        status,
        original_total: 98000.into(),
        final_total: 98000.into(),
        total: 98000.into(),
        review_delta: 0.into(),
        fulfillment_status: FulfillmentStatus::Pending,
        rider_id: None,
        shipping_address: None,
        payment_info: None,
        version: 2,
        created_at: Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap(),
    }
}

#[actix_web::test]
async fn garbage_payloads_are_acknowledged() -> anyhow::Result<()> {
    let _ = env_logger::try_init().ok();
    let (status, response) = post_payment("this is not JSON", |cfg| {
        let api = OrderFlowApi::new(MockOrderStore::new(), EventProducers::default());
        cfg.app_data(web::Data::new(api)).service(PaymentWebhookRoute::<MockOrderStore>::new());
    })
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!response.success);
    assert_eq!(response.message, "Could not parse payment notification.");
    Ok(())
}

#[actix_web::test]
async fn paid_notification_with_account_reference() -> anyhow::Result<()> {
    let _ = env_logger::try_init().ok();
    // The account reference wins over the bare order id field.
    let payload = r#"{"status":"PAID","account_reference":"ORDER-42","order_id":99,"amount":98000}"#;
    let (status, response) = post_payment(payload, |cfg| {
        let mut store = MockOrderStore::new();
        store
            .expect_process_payment_update()
            .withf(|&order_id, &result, payload| {
                order_id == 42 && result == PaymentResult::Paid && payload.contains("ORDER-42")
            })
            .returning(|_, _, _| {
                let old = order_with_status(42, OrderStatus::Created);
                let new = order_with_status(42, OrderStatus::Paid);
                Ok(OrderChanged::new(old, new))
            });
        let api = OrderFlowApi::new(store, EventProducers::default());
        cfg.app_data(web::Data::new(api)).service(PaymentWebhookRoute::<MockOrderStore>::new());
    })
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(response.success);
    assert_eq!(response.message, "Order 42 is now paid.");
    Ok(())
}

#[actix_web::test]
async fn failed_notification_cancels_the_order() -> anyhow::Result<()> {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"status":"FAILED","account_reference":"ORDER-42"}"#;
    let (status, response) = post_payment(payload, |cfg| {
        let mut store = MockOrderStore::new();
        store
            .expect_process_payment_update()
            .withf(|&order_id, &result, _payload| order_id == 42 && result == PaymentResult::Failed)
            .returning(|_, _, _| {
                let old = order_with_status(42, OrderStatus::Created);
                let new = order_with_status(42, OrderStatus::Cancelled);
                Ok(OrderChanged::new(old, new))
            });
        let api = OrderFlowApi::new(store, EventProducers::default());
        cfg.app_data(web::Data::new(api)).service(PaymentWebhookRoute::<MockOrderStore>::new());
    })
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(response.success);
    assert_eq!(response.message, "Order 42 is now cancelled.");
    Ok(())
}

#[actix_web::test]
async fn notification_for_an_unknown_order() -> anyhow::Result<()> {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"status":"PAID","order_id":57}"#;
    let (status, response) = post_payment(payload, |cfg| {
        let mut store = MockOrderStore::new();
        store
            .expect_process_payment_update()
            .withf(|&order_id, _, _| order_id == 57)
            .returning(|_, _, _| Err(OrderManagementError::OrderNotFound(57)));
        let api = OrderFlowApi::new(store, EventProducers::default());
        cfg.app_data(web::Data::new(api)).service(PaymentWebhookRoute::<MockOrderStore>::new());
    })
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(response.success);
    assert_eq!(response.message, "Payment for an unknown order was ignored.");
    Ok(())
}

#[actix_web::test]
async fn notification_for_a_closed_order() -> anyhow::Result<()> {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"status":"PAID","account_reference":"ORDER-42"}"#;
    let (status, response) = post_payment(payload, |cfg| {
        let mut store = MockOrderStore::new();
        store
            .expect_process_payment_update()
            .returning(|_, _, _| Err(OrderManagementError::OrderLocked(42)));
        let api = OrderFlowApi::new(store, EventProducers::default());
        cfg.app_data(web::Data::new(api)).service(PaymentWebhookRoute::<MockOrderStore>::new());
    })
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(response.success);
    assert_eq!(response.message, "The order is already closed.");
    Ok(())
}

#[actix_web::test]
async fn duplicate_notifications_are_acknowledged() -> anyhow::Result<()> {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"status":"PAID","account_reference":"ORDER-42"}"#;
    let (status, response) = post_payment(payload, |cfg| {
        let mut store = MockOrderStore::new();
        store
            .expect_process_payment_update()
            .returning(|_, _, _| Err(OrderManagementError::OrderModificationNoOp));
        let api = OrderFlowApi::new(store, EventProducers::default());
        cfg.app_data(web::Data::new(api)).service(PaymentWebhookRoute::<MockOrderStore>::new());
    })
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(response.success);
    assert_eq!(response.message, "The payment was already recorded.");
    Ok(())
}

#[actix_web::test]
async fn notification_with_an_unknown_status_tag() -> anyhow::Result<()> {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"status":"MAYBE","order_id":3}"#;
    let (status, response) = post_payment(payload, |cfg| {
        let api = OrderFlowApi::new(MockOrderStore::new(), EventProducers::default());
        cfg.app_data(web::Data::new(api)).service(PaymentWebhookRoute::<MockOrderStore>::new());
    })
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!response.success);
    assert_eq!(response.message, "Unknown payment status.");
    Ok(())
}

#[actix_web::test]
async fn notifications_in_a_foreign_currency_are_rejected() -> anyhow::Result<()> {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"status":"PAID","order_id":3,"currency":"USD"}"#;
    let (status, response) = post_payment(payload, |cfg| {
        let api = OrderFlowApi::new(MockOrderStore::new(), EventProducers::default());
        cfg.app_data(web::Data::new(api)).service(PaymentWebhookRoute::<MockOrderStore>::new());
    })
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!response.success);
    assert_eq!(response.message, "Unsupported currency.");
    Ok(())
}

#[actix_web::test]
async fn notification_without_an_order_reference() -> anyhow::Result<()> {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"status":"PAID"}"#;
    let (status, response) = post_payment(payload, |cfg| {
        let api = OrderFlowApi::new(MockOrderStore::new(), EventProducers::default());
        cfg.app_data(web::Data::new(api)).service(PaymentWebhookRoute::<MockOrderStore>::new());
    })
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(response.success);
    assert_eq!(response.message, "Notification does not reference an order.");
    Ok(())
}

async fn post_payment(
    payload: &str,
    configure: impl FnOnce(&mut ServiceConfig),
) -> anyhow::Result<(StatusCode, JsonResponse)> {
    let req = TestRequest::post()
        .uri("/payment")
        .insert_header(ContentType::json())
        .set_payload(payload.to_string())
        .to_request();
    let app = App::new().configure(configure);
    let app = test::init_service(app).await;
    let (_, res) = test::try_call_service(&app, req).await.map_err(|e| anyhow::anyhow!("{e}"))?.into_parts();
    let status = res.status();
    let body = res.into_body().try_into_bytes().map_err(|_| anyhow::anyhow!("Could not read the response body"))?;
    let response = serde_json::from_slice::<JsonResponse>(&body)?;
    Ok((status, response))
}
