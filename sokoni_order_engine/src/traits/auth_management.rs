use thiserror::Error;

use crate::db_types::{NewUser, Roles, User};

#[derive(Debug, Clone, Error)]
pub enum AuthApiError {
    #[error("User not found")]
    UserNotFound,
    #[error("A user with phone number {0} already exists")]
    UserAlreadyExists(String),
    #[error("Invalid phone number or password")]
    InvalidCredentials,
    #[error("Could not hash the password. {0}")]
    PasswordHash(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for AuthApiError {
    fn from(e: sqlx::Error) -> Self {
        AuthApiError::DatabaseError(e.to_string())
    }
}

/// The `AuthManagement` trait defines behaviour for managing user accounts and their roles.
///
/// Users log in with their phone number. Passwords are stored as argon2 PHC strings; this trait
/// only ever sees hashes, never plaintext.
#[allow(async_fn_in_trait)]
pub trait AuthManagement {
    /// Creates a new user account. Fails with [`AuthApiError::UserAlreadyExists`] if the phone
    /// number is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User, AuthApiError>;

    /// Fetches a user by their phone number. If no user exists, `None` is returned.
    async fn fetch_user_by_phone(&self, phone: &str) -> Result<Option<User>, AuthApiError>;

    /// Fetches a user by their id. If no user exists, `None` is returned.
    async fn fetch_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthApiError>;

    /// Replaces the role set of the given user.
    async fn assign_roles(&self, user_id: i64, roles: &Roles) -> Result<(), AuthApiError>;
}
