//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don't block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use std::collections::HashMap;

use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use sok_common::{Cents, KES_CURRENCY_CODE};
use sokoni_order_engine::{
    db_types::{Order, PaymentResult, Role},
    order_objects::{FulfillmentReview, FullOrder, OrderQueryFilter},
    permissions::OrderRelation,
    traits::{AuthManagement, CatalogManagement, OrderManagement, OrderManagementError},
    AuthApi,
    CatalogApi,
    OrderFlowApi,
};

use crate::{
    auth::{JwtClaims, TokenIssuer},
    data_objects::{
        AddItemRequest,
        AssignRiderRequest,
        JsonResponse,
        LoginRequest,
        NewOrderRequest,
        PaymentCallback,
        PopulatedOrder,
        RegisterRequest,
        RemoveItemParams,
        StatusUpdateRequest,
        TokenResponse,
        UpdateItemRequest,
        UserSummary,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:ty),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  ----------------------------------------------------
route!(auth => Post "/auth" impl AuthManagement);
/// Route handler for the auth endpoint
///
/// This route is used to authenticate a user and issue a JWT access token.
///
/// Users supply their phone number and password in the request body. If the credentials check out, the server
/// responds with a [`TokenResponse`] containing the signed token and a summary of the account. The token must be
/// presented in the `sok_access_token` header on every call under `/api`. It is valid for a relatively short
/// period and will NOT refresh.
///
/// An unknown phone number and a wrong password produce the same error, so the endpoint cannot be used to probe
/// which phone numbers have accounts.
pub async fn auth<A: AuthManagement>(
    body: web::Json<LoginRequest>,
    api: web::Data<AuthApi<A>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received auth request");
    let LoginRequest { phone, password } = body.into_inner();
    let user = api.authenticate(&phone, &password).await?;
    let access_token = signer.issue_token(&user)?;
    debug!("💻️ Issued access token for user {}", user.id);
    let response = TokenResponse { access_token, user: UserSummary::from(&user) };
    Ok(HttpResponse::Ok().json(response))
}

route!(register => Post "/api/register" impl AuthManagement);
/// Creates a new customer account. The only self-service account type is `customer`; rider and admin roles are
/// granted out of band.
pub async fn register<A: AuthManagement>(
    body: web::Json<RegisterRequest>,
    api: web::Data<AuthApi<A>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received registration request");
    let RegisterRequest { name, phone, password } = body.into_inner();
    let phone = phone.trim().to_string();
    if phone.is_empty() || password.is_empty() {
        return Err(ServerError::InvalidRequestBody("A phone number and a password are required".to_string()));
    }
    let user = api.register_user(name, phone, &password).await?;
    info!("💻️ New customer account #{} registered", user.id);
    Ok(HttpResponse::Ok().json(UserSummary::from(&user)))
}

#[get("/check_token")]
pub async fn check_token(claims: JwtClaims) -> impl Responder {
    debug!("💻️ GET check_token for user {}", claims.user_id);
    HttpResponse::Ok().body("Token is valid.")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(my_orders => Get "/orders" impl OrderManagement);
/// Route handler for the orders list endpoint
///
/// Admins see every order and may narrow the list with the standard query parameters (`customer_id`, `rider_id`,
/// `since`, `until`, `fulfillment_status`). Everyone else sees their own orders only; any `customer_id` filter
/// they supply is overwritten with their own id.
pub async fn my_orders<B: OrderManagement>(
    claims: JwtClaims,
    query: web::Query<OrderQueryFilter>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let filter = if claims.roles.contains(Role::Admin) {
        query.into_inner()
    } else {
        query.into_inner().with_customer_id(claims.user_id)
    };
    debug!("💻️ GET orders for user {} [{filter}]", claims.user_id);
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(new_order => Post "/orders" impl OrderManagement);
/// Places a new order for the calling user.
///
/// The customer id always comes from the access token. The item list must be non-empty, every quantity must be
/// at least one, and every product must exist; otherwise the request is rejected and nothing is written.
pub async fn new_order<B: OrderManagement>(
    claims: JwtClaims,
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST new order for user {}", claims.user_id);
    let order = body.into_inner().into_new_order(claims.user_id);
    let full_order = api.process_new_order(order).await?;
    info!("💻️ Order #{} created for user {}", full_order.order.id, claims.user_id);
    Ok(HttpResponse::Ok().json(full_order))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement, AuthManagement, CatalogManagement);
/// Fetches a single order, fully populated: line items carry their product names and the customer and rider are
/// included as summaries. Admins can fetch any order; otherwise the caller must be the owner or the assigned
/// rider.
pub async fn order_by_id<BOrder, BAuth, BCat>(
    claims: JwtClaims,
    path: web::Path<i64>,
    orders_api: web::Data<OrderFlowApi<BOrder>>,
    auth_api: web::Data<AuthApi<BAuth>>,
    catalog_api: web::Data<CatalogApi<BCat>>,
) -> Result<HttpResponse, ServerError>
where
    BOrder: OrderManagement,
    BAuth: AuthManagement,
    BCat: CatalogManagement,
{
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id} for user {}", claims.user_id);
    let full_order = orders_api.full_order(order_id).await?.ok_or(ServerError::NoRecordFound)?;
    let relation = OrderRelation::between(claims.user_id, &full_order.order);
    if !(claims.roles.contains(Role::Admin) || relation.is_owner || relation.is_assigned_rider) {
        debug!("💻️ User {} may not view order {order_id}", claims.user_id);
        return Err(ServerError::InsufficientPermissions("You may not view this order".to_string()));
    }
    let populated = populate_order(full_order, auth_api.as_ref(), catalog_api.as_ref()).await?;
    Ok(HttpResponse::Ok().json(populated))
}

async fn populate_order<BAuth, BCat>(
    full_order: FullOrder,
    auth_api: &AuthApi<BAuth>,
    catalog_api: &CatalogApi<BCat>,
) -> Result<PopulatedOrder, ServerError>
where
    BAuth: AuthManagement,
    BCat: CatalogManagement,
{
    let customer = fetch_user_summary(auth_api, full_order.order.customer_id).await?;
    let rider = match full_order.order.rider_id {
        Some(rider_id) => fetch_user_summary(auth_api, rider_id).await?,
        None => None,
    };
    // One catalog fetch covers all the line items.
    let product_names = catalog_api
        .products()
        .await
        .map_err(|e| {
            debug!("💻️ Could not fetch the product catalog. {e}");
            ServerError::BackendError(e.to_string())
        })?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect::<HashMap<i64, String>>();
    Ok(PopulatedOrder::assemble(full_order, customer, rider, &product_names))
}

async fn fetch_user_summary<B: AuthManagement>(
    api: &AuthApi<B>,
    user_id: i64,
) -> Result<Option<UserSummary>, ServerError> {
    let user = api.fetch_user_by_id(user_id).await.map_err(|e| {
        debug!("💻️ Could not fetch user {user_id}. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(user.as_ref().map(UserSummary::from))
}

//----------------------------------------------   Order lifecycle  ----------------------------------------------------
route!(order_status => Post "/orders/{order_id}/status" impl OrderManagement);
/// Generic status update endpoint. Who may move an order to which status depends on the caller's roles and their
/// relation to the order; see [`sokoni_order_engine::permissions`]. A rider may optionally be assigned in the
/// same call (admins only).
pub async fn order_status<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let StatusUpdateRequest { status, rider_id } = body.into_inner();
    debug!("💻️ POST status update for order {order_id} by user {}: {status:?}", claims.user_id);
    let changed = api.update_order(claims.user_id, &claims.roles, order_id, status, rider_id).await?;
    Ok(HttpResponse::Ok().json(changed.new_order))
}

route!(assign_rider => Post "/orders/{order_id}/assign-rider" impl OrderManagement where requires [Role::Admin]);
/// Assigns a rider to an order and ships it in one step.
pub async fn assign_rider<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<AssignRiderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let rider_id = body.into_inner().rider_id;
    debug!("💻️ POST assign rider {rider_id} to order {order_id} by admin {}", claims.user_id);
    let changed = api.assign_rider(order_id, rider_id).await?;
    Ok(HttpResponse::Ok().json(changed.new_order))
}

route!(complete_order => Post "/orders/{order_id}/complete" impl OrderManagement);
/// Marks an order as delivered. Admins and the assigned rider only.
pub async fn complete_order<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST complete order {order_id} by user {}", claims.user_id);
    let changed = api.complete_order(claims.user_id, &claims.roles, order_id).await?;
    Ok(HttpResponse::Ok().json(changed.new_order))
}

//----------------------------------------------   Fulfillment  ----------------------------------------------------
route!(add_item => Post "/orders/{order_id}/items" impl OrderManagement where requires [Role::Admin]);
/// Adds a product to an open order. The change lands in the adjustment ledger and the totals are recomputed.
pub async fn add_item<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<AddItemRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let AddItemRequest { product_id, quantity, note } = body.into_inner();
    debug!("💻️ POST add {quantity} x product {product_id} to order {order_id} by admin {}", claims.user_id);
    let full_order = api.add_item(order_id, product_id, quantity, note, claims.user_id).await?;
    Ok(HttpResponse::Ok().json(full_order))
}

route!(update_item => Patch "/orders/{order_id}/items/{item_id}" impl OrderManagement where requires [Role::Admin]);
/// Changes the quantity of a line item on an open order.
pub async fn update_item<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    body: web::Json<UpdateItemRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (order_id, item_id) = path.into_inner();
    let UpdateItemRequest { quantity, note } = body.into_inner();
    debug!("💻️ PATCH item {item_id} on order {order_id} to quantity {quantity} by admin {}", claims.user_id);
    let full_order = api.update_item_quantity(order_id, item_id, quantity, note, claims.user_id).await?;
    Ok(HttpResponse::Ok().json(full_order))
}

route!(remove_item => Delete "/orders/{order_id}/items/{item_id}" impl OrderManagement where requires [Role::Admin]);
/// Removes a line item from an open order. An optional `note` query parameter lands in the adjustment ledger.
pub async fn remove_item<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<(i64, i64)>,
    params: web::Query<RemoveItemParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (order_id, item_id) = path.into_inner();
    let note = params.into_inner().note;
    debug!("💻️ DELETE item {item_id} on order {order_id} by admin {}", claims.user_id);
    let full_order = api.remove_item(order_id, item_id, note, claims.user_id).await?;
    Ok(HttpResponse::Ok().json(full_order))
}

route!(review_fulfillment => Post "/orders/{order_id}/fulfillment" impl OrderManagement where requires [Role::Admin]);
/// Records a fulfillment review for an order: which lines could be picked, in what quantity, and which were
/// missing entirely. Review entries for items that are not on the order are ignored.
pub async fn review_fulfillment<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<FulfillmentReview>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let review = body.into_inner();
    debug!("💻️ POST fulfillment review for order {order_id} by admin {}", claims.user_id);
    let full_order = api.review_fulfillment(order_id, review, claims.user_id).await?;
    Ok(HttpResponse::Ok().json(full_order))
}

//----------------------------------------------   Riders  ----------------------------------------------------
route!(rider_orders => Get "/rider/orders" impl OrderManagement where requires [Role::Rider]);
/// The orders currently assigned to the calling rider, newest first.
pub async fn rider_orders<B: OrderManagement>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET rider orders for {}", claims.user_id);
    let orders = api.orders_for_rider(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Catalog  ----------------------------------------------------
route!(products => Get "/products" impl CatalogManagement);
pub async fn products<C: CatalogManagement>(api: web::Data<CatalogApi<C>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET products");
    let products = api.products().await.map_err(|e| {
        debug!("💻️ Could not fetch products. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(products))
}

route!(product_by_id => Get "/products/{product_id}" impl CatalogManagement);
pub async fn product_by_id<C: CatalogManagement>(
    path: web::Path<i64>,
    api: web::Data<CatalogApi<C>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    trace!("💻️ GET product {product_id}");
    let product = api
        .product(product_id)
        .await
        .map_err(|e| {
            debug!("💻️ Could not fetch product {product_id}. {e}");
            ServerError::BackendError(e.to_string())
        })?
        .ok_or(ServerError::NoRecordFound)?;
    Ok(HttpResponse::Ok().json(product))
}

//----------------------------------------------   Payment webhook  ----------------------------------------------------
route!(payment_webhook => Post "/payment" impl OrderManagement);
/// Route handler for payment provider notifications.
///
/// The provider is a server-to-server caller and retries anything that does not come back with a 200, so this
/// endpoint acknowledges every notification it can make sense of, even the ones it discards. The body of the
/// response is a [`JsonResponse`] whose `success` flag tells the two cases apart. The raw request body is stored
/// verbatim against the order for audit.
///
/// Peer whitelisting, when configured, happens in the surrounding scope before this handler runs.
pub async fn payment_webhook<B: OrderManagement>(
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B>>,
) -> HttpResponse {
    trace!("💻️ Received payment notification");
    let raw = String::from_utf8_lossy(&body).into_owned();
    let callback = match serde_json::from_slice::<PaymentCallback>(&body) {
        Ok(callback) => callback,
        Err(e) => {
            warn!("💻️ Could not parse payment notification. {e}");
            return HttpResponse::Ok().json(JsonResponse::failure("Could not parse payment notification."));
        },
    };
    info!("💻️ Payment notification received: {raw}");
    if !callback.currency_is_supported() {
        warn!("💻️ Payment notification in {:?}, but orders settle in {KES_CURRENCY_CODE}. Rejecting.", callback.currency);
        return HttpResponse::Ok().json(JsonResponse::failure("Unsupported currency."));
    }
    let result = match callback.status() {
        Some(result) => result,
        None => {
            warn!("💻️ Payment notification carried an unknown status tag: {:?}", callback.status);
            return HttpResponse::Ok().json(JsonResponse::failure("Unknown payment status."));
        },
    };
    let order_id = match callback.referenced_order() {
        Some(order_id) => order_id,
        None => {
            info!("💻️ Payment notification does not reference an order. Acknowledged and ignored.");
            return HttpResponse::Ok().json(JsonResponse::success("Notification does not reference an order."));
        },
    };
    let response = match api.process_payment_update(order_id, result, &raw).await {
        Ok(changed) => {
            info!("💻️ Payment {result} recorded against order {order_id}.");
            if result == PaymentResult::Paid {
                check_paid_amount(&callback, &changed.new_order);
            }
            JsonResponse::success(format!("Order {} is now {}.", order_id, changed.new_order.status))
        },
        Err(OrderManagementError::OrderNotFound(id)) => {
            info!("💻️ Payment notification for unknown order {id}. Acknowledged and ignored.");
            JsonResponse::success("Payment for an unknown order was ignored.")
        },
        Err(OrderManagementError::OrderLocked(id)) => {
            info!("💻️ Payment notification for closed order {id}. Acknowledged and ignored.");
            JsonResponse::success("The order is already closed.")
        },
        Err(OrderManagementError::OrderModificationNoOp) => {
            info!("💻️ Payment notification for order {order_id} had no effect.");
            JsonResponse::success("The payment was already recorded.")
        },
        Err(e) => {
            warn!("💻️ Unexpected error handling payment notification. {e}");
            JsonResponse::failure("Unexpected error handling payment.")
        },
    };
    HttpResponse::Ok().json(response)
}

/// A settled amount that differs from the order total does not block the status change, but someone should look at
/// it: it usually means the customer paid against a stale total.
fn check_paid_amount(callback: &PaymentCallback, order: &Order) {
    let Some(amount) = callback.amount else {
        return;
    };
    match Cents::try_from(amount) {
        Ok(paid) if paid == order.total => {},
        Ok(paid) => {
            warn!("🚨️ Order {} settled with a payment of {paid}, but the order total is {}.", order.id, order.total);
        },
        Err(e) => {
            warn!("🚨️ The amount on the payment notification for order {} is not usable. {e}", order.id);
        },
    }
}
