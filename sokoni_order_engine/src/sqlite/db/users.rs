use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewUser, Roles, User},
    traits::AuthApiError,
};

/// Creates a user account. The phone number is the login identifier and must be unique.
pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<User, AuthApiError> {
    let result: Result<User, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO users (name, phone, password_hash, roles)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(user.name)
    .bind(user.phone.clone())
    .bind(user.password_hash)
    .bind(user.roles.to_string())
    .fetch_one(conn)
    .await;
    match result {
        Ok(row) => {
            debug!("📝️ User {} registered with id {}", row.phone, row.id);
            Ok(row)
        },
        Err(sqlx::Error::Database(de)) if de.is_unique_violation() => Err(AuthApiError::UserAlreadyExists(user.phone)),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_user_by_id(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(user)
}

pub async fn fetch_user_by_phone(phone: &str, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE phone = $1").bind(phone).fetch_optional(conn).await?;
    Ok(user)
}

/// Replaces the role set of the user.
pub async fn assign_roles(user_id: i64, roles: &Roles, conn: &mut SqliteConnection) -> Result<(), AuthApiError> {
    let result = sqlx::query("UPDATE users SET roles = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(roles.to_string())
        .bind(user_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AuthApiError::UserNotFound);
    }
    debug!("📝️ User {user_id} now holds roles [{roles}]");
    Ok(())
}
