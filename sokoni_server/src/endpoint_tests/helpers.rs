use actix_jwt_auth_middleware::AuthenticationService;
use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::{DateTime, Utc};
use jwt_compact::{
    alg::{Hs256, Hs256Key},
    AlgorithmExt,
    Claims,
};
use log::debug;

use crate::{
    auth::{build_sok_authority, JwtClaims, ACCESS_TOKEN_HEADER},
    config::AuthConfig,
    server::json_config,
};

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this key anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig { jwt_signing_key: Hs256Key::new(b"sokoni-endpoint-test-signing-key-0123456789abcdef") }
}

pub fn issue_token(claims: JwtClaims, expiry: DateTime<Utc>) -> String {
    let config = get_auth_config();
    let header = jwt_compact::Header::empty().with_token_type("JWT");
    let mut claims = Claims::new(claims);
    claims.expiration = Some(expiry);
    Hs256.token(&header, &claims, &config.jwt_signing_key).expect("Failed to sign token")
}

pub async fn get_request(
    auth_header: &str,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::get().uri(path);
    if !auth_header.is_empty() {
        req = req.insert_header((ACCESS_TOKEN_HEADER, auth_header));
    }
    let req = req.to_request();
    let config = get_auth_config();
    let authority = build_sok_authority(config);
    let app = App::new().app_data(json_config()).wrap(AuthenticationService::new(authority)).configure(configure);

    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

pub async fn post_request(
    auth_header: &str,
    path: &str,
    body: serde_json::Value,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post().uri(path).set_json(body);
    if !auth_header.is_empty() {
        req = req.insert_header((ACCESS_TOKEN_HEADER, auth_header));
    }
    let req = req.to_request();
    let config = get_auth_config();
    let authority = build_sok_authority(config);
    let app = App::new().app_data(json_config()).wrap(AuthenticationService::new(authority)).configure(configure);

    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}
