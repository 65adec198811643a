//! Account registration, login checks and role management.

use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewUser, Roles, User},
    helpers::{hash_password, verify_password},
    traits::{AuthApiError, AuthManagement},
};

/// `AuthApi` wraps everything account-related: registration, credential checks and role
/// management. It owns the password hashing policy; backends only ever see argon2 PHC strings.
pub struct AuthApi<B> {
    db: B,
}

impl<B: Debug> Debug for AuthApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthApi ({:?})", self.db)
    }
}

impl<B> AuthApi<B>
where B: AuthManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Registers a new customer account. The password is hashed before it goes anywhere near the
    /// database. Fails with [`AuthApiError::UserAlreadyExists`] if the phone number is taken.
    pub async fn register_user(&self, name: String, phone: String, password: &str) -> Result<User, AuthApiError> {
        let password_hash = hash_password(password)?;
        let user = self.db.create_user(NewUser::new(name, phone, password_hash)).await?;
        info!("🔑️ User #{} ({}) registered", user.id, user.phone);
        Ok(user)
    }

    /// Verifies a phone number and password pair and returns the matching user.
    ///
    /// An unknown phone number and a wrong password both come back as
    /// [`AuthApiError::InvalidCredentials`], so callers cannot tell the two apart.
    pub async fn authenticate(&self, phone: &str, password: &str) -> Result<User, AuthApiError> {
        let user = self.db.fetch_user_by_phone(phone).await?.ok_or(AuthApiError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            debug!("🔑️ Password verification failed for {phone}");
            return Err(AuthApiError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Fetches a user by id. If no user exists, `None` is returned.
    pub async fn fetch_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthApiError> {
        self.db.fetch_user_by_id(user_id).await
    }

    /// Fetches a user by phone number. If no user exists, `None` is returned.
    pub async fn fetch_user_by_phone(&self, phone: &str) -> Result<Option<User>, AuthApiError> {
        self.db.fetch_user_by_phone(phone).await
    }

    /// Replaces the role set of the given user.
    pub async fn assign_roles(&self, user_id: i64, roles: &Roles) -> Result<(), AuthApiError> {
        self.db.assign_roles(user_id, roles).await?;
        info!("🔑️ Roles for user #{user_id} set to [{roles}]");
        Ok(())
    }
}
