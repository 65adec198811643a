use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::{TimeZone, Utc};
use jwt_compact::{
    alg::{Hs256, Hs256Key},
    AlgorithmExt,
    Claims,
    UntrustedToken,
};
use log::*;
use sokoni_order_engine::{
    db_types::{Role, Roles, User},
    helpers::hash_password,
    traits::AuthApiError,
    AuthApi,
};

use super::{helpers::get_auth_config, mocks::MockAuthStore};
use crate::{
    auth::{JwtClaims, TokenIssuer},
    config::AuthConfig,
    data_objects::{TokenResponse, UserSummary},
    routes::{AuthRoute, RegisterRoute},
};

fn test_user(password: &str) -> User {
    User {
        id: 1,
        name: "Wanjiku".to_string(),
        phone: "+254700111222".to_string(),
        password_hash: hash_password(password).unwrap(),
        roles: Roles::new(vec![Role::Customer]),
        created_at: Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap(),
    }
}

#[actix_web::test]
async fn login_with_unknown_phone() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "phone": "+254799000000", "password": "whatever" });
    let (status, body) = post_login(get_auth_config(), None, body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. Invalid phone number or password"}"#);
}

#[actix_web::test]
async fn login_with_wrong_password() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "phone": "+254700111222", "password": "hunter3" });
    let (status, body) = post_login(get_auth_config(), Some(test_user("hunter2")), body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. Invalid phone number or password"}"#);
}

#[actix_web::test]
async fn login_happy_day() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "phone": "+254700111222", "password": "hunter2" });
    let (status, body) = post_login(get_auth_config(), Some(test_user("hunter2")), body).await;
    assert_eq!(status, StatusCode::OK);
    let response: TokenResponse = serde_json::from_str(&body).expect("Response was not a token response");
    assert_eq!(response.user, UserSummary { id: 1, name: "Wanjiku".into(), phone: "+254700111222".into() });
    let claims = validate_token(&response.access_token, &get_auth_config().jwt_signing_key).unwrap();
    assert_eq!(claims.user_id, 1);
    assert_eq!(claims.name, "Wanjiku");
    assert!(claims.roles.contains(Role::Customer));
    assert!(!claims.roles.contains(Role::Admin));
}

#[actix_web::test]
async fn login_with_missing_fields() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "phone": "+254700111222" });
    let (status, body) = post_login(get_auth_config(), Some(test_user("hunter2")), body).await;
    debug!("Response body: {body}");
    assert!(status.is_client_error());
}

#[actix_web::test]
async fn register_new_customer() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "name": "Wanjiku", "phone": "+254700111222", "password": "hunter2" });
    let (status, body) = post_register(Ok(()), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"id":1,"name":"Wanjiku","phone":"+254700111222"}"#);
}

#[actix_web::test]
async fn register_with_taken_phone_number() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "name": "Wanjiku", "phone": "+254700111222", "password": "hunter2" });
    let (status, body) = post_register(Err(AuthApiError::UserAlreadyExists("+254700111222".into())), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"An account for +254700111222 already exists"}"#);
}

#[actix_web::test]
async fn register_without_a_password() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "name": "Wanjiku", "phone": "+254700111222", "password": "" });
    let (status, body) = post_register(Ok(()), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid request body: A phone number and a password are required"}"#);
}

fn configure_login(config: AuthConfig, user: Option<User>) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut auth_store = MockAuthStore::new();
        auth_store.expect_fetch_user_by_phone().returning(move |_| Ok(user.clone()));
        let auth_api = AuthApi::new(auth_store);
        let jwt_signer = TokenIssuer::new(&config);
        cfg.app_data(web::Data::new(auth_api))
            .app_data(web::Data::new(jwt_signer))
            .service(AuthRoute::<MockAuthStore>::new());
    }
}

async fn post_login(config: AuthConfig, user: Option<User>, body: serde_json::Value) -> (StatusCode, String) {
    let req = TestRequest::post().uri("/auth").set_json(body).to_request();
    let app = App::new().configure(configure_login(config, user));
    let app = test::init_service(app).await;
    debug!("Making login request");
    let (_, res) = test::call_service(&app, req).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

fn configure_register(create_result: Result<(), AuthApiError>) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut auth_store = MockAuthStore::new();
        auth_store
            .expect_create_user()
            .withf(|user| {
                user.phone == "+254700111222" &&
                    user.roles.contains(Role::Customer) &&
                    user.password_hash.starts_with("$argon2")
            })
            .returning(move |_| match &create_result {
                Ok(()) => Ok(test_user("hunter2")),
                Err(e) => Err(e.clone()),
            });
        let auth_api = AuthApi::new(auth_store);
        cfg.app_data(web::Data::new(auth_api)).service(RegisterRoute::<MockAuthStore>::new());
    }
}

async fn post_register(create_result: Result<(), AuthApiError>, body: serde_json::Value) -> (StatusCode, String) {
    let req = TestRequest::post().uri("/api/register").set_json(body).to_request();
    let app = App::new().configure(configure_register(create_result));
    let app = test::init_service(app).await;
    debug!("Making registration request");
    let (_, res) = test::call_service(&app, req).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

fn validate_token(token: &str, key: &Hs256Key) -> Result<JwtClaims, String> {
    debug!("Validating token: {token}");
    let untrusted_token = UntrustedToken::new(token).map_err(|e| format!("Invalid token format: {e:?}"))?;
    let _claims: Claims<JwtClaims> =
        untrusted_token.deserialize_claims_unchecked().map_err(|e| format!("Claims validation error: {e:?}"))?;
    let (header, claims) = Hs256
        .validator(key)
        .validate(&untrusted_token)
        .map_err(|e| format!("Signature error: {e}"))?
        .into_parts();
    debug!("Access token validated successfully. Header: {header:?}. Claims: {claims:?}");
    let expiry = claims.expiration.unwrap().signed_duration_since(Utc::now());
    assert!(expiry.num_hours() < 24 && expiry.num_hours() >= 23, "Expiry: {}", expiry.num_hours());
    assert_eq!(header.token_type.unwrap(), "JWT");
    Ok(claims.custom)
}
