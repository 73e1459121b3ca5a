//! User account model and auth request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a row of the `user` table.
///
/// Ids are client-generated UUIDs stored as text; `password_hash` is a
/// salted digest and never leaves the server.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,

    /// Optional; defaults to `<username>@example.com` when absent.
    pub email: Option<String>,

    pub password: String,
}

/// Request body for `POST /api/v1/auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Account representation returned to clients (no credential material).
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub email_verified: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
            email_verified: user.email_verified,
        }
    }
}

/// Response body for a successful login.
///
/// The token is opaque and shown exactly once; only its digest is stored.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}
