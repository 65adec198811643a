use actix_web::{http::header::ContentType, HttpResponse, ResponseError};
use log::*;
use sokoni_order_engine::traits::{AuthApiError, OrderManagementError, OrderQueryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("The order backend reported an error. {0}")]
    BackendError(String),
    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),
    #[error("An IO error happened on the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Unspecified server error. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The requested record was not found")]
    NoRecordFound,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The order cannot be changed right now. {0}")]
    StateConflict(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            Self::AuthenticationError(AuthError::ValidationError(_)) => StatusCode::UNAUTHORIZED,
            Self::AuthenticationError(AuthError::PoorlyFormattedToken(_)) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::StateConflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let msg = serde_json::json!({ "error": self.to_string() }).to_string();
        HttpResponse::build(self.status_code()).content_type(ContentType::json()).body(msg)
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Invalid phone number or password")]
    InvalidCredentials,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Token signature invalid. {0}")]
    ValidationError(String),
    #[error("Token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("User account not found")]
    AccountNotFound,
    #[error("This host is not permitted to call this endpoint")]
    ForbiddenPeer,
}

impl From<AuthApiError> for ServerError {
    fn from(e: AuthApiError) -> Self {
        match e {
            AuthApiError::UserNotFound => ServerError::AuthenticationError(AuthError::AccountNotFound),
            AuthApiError::UserAlreadyExists(phone) => {
                ServerError::InvalidRequestBody(format!("An account for {phone} already exists"))
            },
            AuthApiError::InvalidCredentials => ServerError::AuthenticationError(AuthError::InvalidCredentials),
            AuthApiError::PasswordHash(e) => {
                error!("🔑️ Password hashing failure. {e}");
                ServerError::BackendError("Credential processing failed".to_string())
            },
            AuthApiError::DatabaseError(e) => ServerError::BackendError(e),
        }
    }
}

impl From<OrderManagementError> for ServerError {
    fn from(e: OrderManagementError) -> Self {
        use OrderManagementError as OME;
        match e {
            OME::DatabaseError(e) => ServerError::BackendError(e),
            OME::QueryError(OrderQueryError::OrderNotFound(_)) => ServerError::NoRecordFound,
            OME::QueryError(e) => ServerError::BackendError(e.to_string()),
            OME::OrderNotFound(_) | OME::OrderItemNotFound { .. } => ServerError::NoRecordFound,
            OME::OrderLocked(id) => ServerError::StateConflict(format!("Order {id} is closed")),
            OME::OrderModificationNoOp => ServerError::StateConflict("The change had no effect".to_string()),
            OME::OrderModificationForbidden => {
                ServerError::InsufficientPermissions("You may not modify this order".to_string())
            },
            OME::StaleOrderVersion(id) => {
                ServerError::StateConflict(format!("Order {id} was modified concurrently. Retry the request"))
            },
            OME::ProductNotFound(id) => ServerError::InvalidRequestBody(format!("Product {id} does not exist")),
            OME::UserNotFound(id) => ServerError::InvalidRequestBody(format!("User {id} does not exist")),
            OME::NotARider(id) => ServerError::InvalidRequestBody(format!("User {id} is not a rider")),
            OME::InvalidRequest(msg) => ServerError::InvalidRequestBody(msg),
        }
    }
}
