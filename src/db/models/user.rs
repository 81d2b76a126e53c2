//! Account and session models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::access::{Identity, Role};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn role_enum(&self) -> Role {
        Role::from(self.role.clone())
    }

    /// Build the authenticated principal for this account.
    pub fn identity(&self, employee_id: Option<String>) -> Identity {
        Identity {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role_enum(),
            employee_id,
        }
    }
}

/// Public view of an account, as returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub employee_id: Option<String>,
}

impl From<Identity> for UserResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email,
            name: identity.name,
            role: identity.role,
            employee_id: identity.employee_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Missing fields deserialize as empty strings and are reported by validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: UserResponse,
}

pub async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower(?)")
        .bind(email.trim())
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
    name: &str,
    role: Role,
) -> Result<User, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = super::now_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(email.trim())
    .bind(password_hash)
    .bind(name.trim())
    .bind(role.to_string())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(User {
        id,
        email: email.trim().to_string(),
        password_hash: password_hash.to_string(),
        name: name.trim().to_string(),
        role: role.to_string(),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Ids of every account, used to check employee owner references.
pub async fn list_account_ids(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM users")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn insert_session(
    pool: &SqlitePool,
    user_id: &str,
    token_hash: &str,
    expires_at: &str,
) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Look up a live (unexpired) session by token hash.
pub async fn find_active_session(
    pool: &SqlitePool,
    token_hash: &str,
) -> Result<Option<Session>, sqlx::Error> {
    let now = super::now_rfc3339();
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token_hash = ? AND expires_at > ?")
        .bind(token_hash)
        .bind(&now)
        .fetch_optional(pool)
        .await
}

pub async fn delete_session(pool: &SqlitePool, token_hash: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
