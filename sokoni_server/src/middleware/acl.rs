//! Role-based access control middleware.
//!
//! The JWT authority deserializes the claims and stores them in the request extensions. This middleware runs
//! after it and checks that the claims carry every role the route demands. It must therefore only be attached
//! to routes living inside the authenticated scope.

use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorForbidden, ErrorInternalServerError},
    Error,
    HttpMessage,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use log::*;
use sokoni_order_engine::db_types::Role;

use crate::auth::JwtClaims;

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(roles: &[Role]) -> Self {
        Self { required_roles: roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let required_roles = self.required_roles.clone();
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let claims = req.extensions().get::<JwtClaims>().cloned();
            match claims {
                Some(claims) => {
                    if required_roles.iter().all(|role| claims.roles.contains(*role)) {
                        service.call(req).await
                    } else {
                        debug!("🔑️ User {} lacks the roles required for {}", claims.user_id, req.path());
                        Err(ErrorForbidden("Insufficient permissions"))
                    }
                },
                None => {
                    warn!("🔑️ No JWT claims found in request extensions. Is this route inside the auth scope?");
                    Err(ErrorInternalServerError("No JWT claims found in request extensions"))
                },
            }
        })
    }
}
