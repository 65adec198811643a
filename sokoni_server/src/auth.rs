//! Access token plumbing.
//!
//! Sokoni uses short-lived JWTs signed with a symmetric key ([`Hs256`]). Clients obtain a token from the `/auth`
//! endpoint and present it in the `sok_access_token` header on every call under `/api`. The claims carry the
//! user id and role set, which the route guards ([`crate::middleware::AclMiddlewareFactory`]) inspect.

use std::time::Duration;

use actix_jwt_auth_middleware::{Authority, FromRequest, TokenSigner};
use actix_web::{Error as ActixWebError, Handler};
use jwt_compact::{
    alg::{Hs256, Hs256Key},
    Header,
};
use serde::{Deserialize, Serialize};
use sokoni_order_engine::db_types::{Roles, User};

use crate::{config::AuthConfig, errors::AuthError};

/// The header (and cookie) name carrying the access token.
pub const ACCESS_TOKEN_HEADER: &str = "sok_access_token";

const DEFAULT_TOKEN_VALIDITY: Duration = Duration::from_secs(60 * 60 * 24);

/// The claims embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRequest)]
pub struct JwtClaims {
    pub user_id: i64,
    pub name: String,
    pub roles: Roles,
}

pub fn build_jwt_signer(signing_key: Hs256Key) -> TokenSigner<JwtClaims, Hs256> {
    TokenSigner::new()
        .signing_key(signing_key)
        .algorithm(Hs256)
        .access_token_name(ACCESS_TOKEN_HEADER)
        .header(Header::empty().with_token_type("JWT"))
        .build()
        .expect("Failed to build token signer")
}

/// Builds the [`Authority`] that guards the `/api` scope. Tokens may be presented as a header or a cookie.
pub fn build_sok_authority(
    auth_config: AuthConfig,
) -> Authority<JwtClaims, Hs256, impl Handler<(), Output = Result<(), ActixWebError>>, ()> {
    let signer = build_jwt_signer(auth_config.jwt_signing_key.clone());
    Authority::<JwtClaims, Hs256, _, _>::new()
        .refresh_authorizer(|| async move { Ok(()) })
        .access_token_name(ACCESS_TOKEN_HEADER)
        .enable_header_tokens(true)
        .algorithm(Hs256)
        .verifying_key(auth_config.jwt_signing_key)
        .token_signer(Some(signer))
        .build()
        .expect("Failed to build authority")
}

/// Issues signed access tokens for authenticated users.
#[derive(Clone)]
pub struct TokenIssuer {
    signer: TokenSigner<JwtClaims, Hs256>,
    validity: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { signer: build_jwt_signer(config.jwt_signing_key.clone()), validity: DEFAULT_TOKEN_VALIDITY }
    }

    pub fn with_validity(mut self, validity: chrono::Duration) -> Self {
        self.validity = validity.to_std().unwrap_or(DEFAULT_TOKEN_VALIDITY);
        self
    }

    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        let claims = JwtClaims { user_id: user.id, name: user.name.clone(), roles: user.roles.clone() };
        self.signer.create_signed_token(&claims, self.validity).map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}
