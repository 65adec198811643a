use std::{future::Future, pin::Pin, time::Duration};

use actix_jwt_auth_middleware::use_jwt::UseJWTOnApp;
use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::future::{ok, Either};
use log::{debug, info, warn};
use sokoni_order_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    AuthApi,
    CatalogApi,
    OrderFlowApi,
    SqliteDatabase,
};

use crate::{
    auth::{build_sok_authority, TokenIssuer},
    config::ServerConfig,
    errors::{AuthError, ServerError, ServerError::AuthenticationError},
    helpers::get_remote_ip,
    routes::{
        check_token,
        health,
        AddItemRoute,
        AssignRiderRoute,
        AuthRoute,
        CompleteOrderRoute,
        MyOrdersRoute,
        NewOrderRoute,
        OrderByIdRoute,
        OrderStatusRoute,
        PaymentWebhookRoute,
        ProductByIdRoute,
        ProductsRoute,
        RegisterRoute,
        RemoveItemRoute,
        ReviewFulfillmentRoute,
        RiderOrdersRoute,
        UpdateItemRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 128;

/// Json extractor failures (malformed bodies, unknown status strings and the like) are reported in
/// the same `{"error": …}` shape every other rejection uses, instead of actix's plain-text default.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, default_event_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// The stock event hooks. Every event lands in the log and nothing else happens. Deployments that want to send
/// push notifications or invalidate caches swap these out for their own.
pub fn default_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|ev| {
        Box::pin(async move {
            info!("📬️ Order #{} has been paid. Total: {}", ev.order.id, ev.order.total);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks.on_order_annulled(|ev| {
        Box::pin(async move {
            info!("📬️ Order #{} has been annulled. Status: {}", ev.order.id, ev.status);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks.on_order_changed(|ev| {
        Box::pin(async move {
            debug!("📬️ Order #{} has changed. New total: {}", ev.order.id, ev.order.total);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks.on_order_lists_stale(|ev| {
        Box::pin(async move {
            debug!("📬️ Cached order lists are stale. Customer: {:?}", ev.customer_id);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let auth_api = AuthApi::new(db.clone());
        let catalog_api = CatalogApi::new(db.clone());
        let jwt_signer = TokenIssuer::new(&config.auth).with_validity(config.access_token_validity);
        let authority = build_sok_authority(config.auth.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sok::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(auth_api))
            .app_data(web::Data::new(catalog_api))
            .app_data(web::Data::new(jwt_signer))
            .app_data(json_config());
        // Routes that require authentication
        let auth_scope = web::scope("/api")
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(NewOrderRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase, SqliteDatabase, SqliteDatabase>::new())
            .service(OrderStatusRoute::<SqliteDatabase>::new())
            .service(AssignRiderRoute::<SqliteDatabase>::new())
            .service(CompleteOrderRoute::<SqliteDatabase>::new())
            .service(AddItemRoute::<SqliteDatabase>::new())
            .service(UpdateItemRoute::<SqliteDatabase>::new())
            .service(RemoveItemRoute::<SqliteDatabase>::new())
            .service(ReviewFulfillmentRoute::<SqliteDatabase>::new())
            .service(RiderOrdersRoute::<SqliteDatabase>::new())
            .service(ProductsRoute::<SqliteDatabase>::new())
            .service(ProductByIdRoute::<SqliteDatabase>::new())
            .service(check_token);
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let payment_whitelist = config.payment_whitelist.clone();
        let payment_scope = web::scope("/wh")
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
                let whitelisted = match (peer_ip, &payment_whitelist) {
                    (Some(ip), Some(whitelist)) => {
                        info!("💻️ Payment notification from {ip}");
                        whitelist.contains(&ip)
                    },
                    (_, None) => true,
                    (None, Some(_)) => {
                        warn!("💻️ Could not determine the peer address for a payment notification. Denying access.");
                        false
                    },
                };
                if whitelisted {
                    Either::Left(srv.call(req))
                } else {
                    Either::Right(ok(req.error_response(AuthenticationError(AuthError::ForbiddenPeer))))
                }
            })
            .service(PaymentWebhookRoute::<SqliteDatabase>::new());
        // The register route sits under the /api prefix but must stay reachable without a token, so it is
        // registered ahead of the authenticated scope.
        app.service(health)
            .service(AuthRoute::<SqliteDatabase>::new())
            .service(RegisterRoute::<SqliteDatabase>::new())
            .use_jwt(authority, auth_scope)
            .service(payment_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
