//! Bearer-token authentication middleware.
//!
//! Intercepts every protected request to:
//! 1. Extract the session token from the Authorization header
//! 2. Digest it and look it up in the `session` table (expiry checked)
//! 3. Inject the account context into the request
//! 4. Reject unauthorized requests with HTTP 401

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use sqlx::Row as _;

use crate::db::{DbError, DbHandle};
use crate::error::AppError;
use crate::params;
use crate::services::auth_service;
use crate::AppState;

/// Authentication context attached to authenticated requests.
///
/// Inserted into the request's extension map; route handlers extract it
/// with `Extension<AuthContext>` to know who made the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub username: String,
    pub is_admin: bool,
}

/// Session-token authentication middleware.
///
/// Expected header format: `Authorization: Bearer <token>`. The token is
/// opaque; only its SHA-256 digest is stored server-side, so the lookup is
/// digest-for-digest with an expiry check.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AppError::AuthRequired)?;
    let token_hash = auth_service::digest(&token);

    let mut db = state.db.acquire().await?;
    let result = lookup_session(&mut db, &token_hash).await;
    db.close().await;

    let context = result?.ok_or(AppError::AuthRequired)?;
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Gate for the admin back-office. Layered inside `auth_middleware`, so the
/// context is already present for authenticated requests.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let is_admin = request
        .extensions()
        .get::<AuthContext>()
        .is_some_and(|context| context.is_admin);
    if !is_admin {
        return Err(AppError::AdminRequired);
    }
    Ok(next.run(request).await)
}

/// The raw bearer token from an Authorization header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

async fn lookup_session(
    db: &mut DbHandle,
    token_hash: &str,
) -> Result<Option<AuthContext>, AppError> {
    db.execute(
        r#"
        SELECT u.id AS user_id, u.username, u.is_admin
        FROM session s
        JOIN "user" u ON s.user_id = u.id
        WHERE s.token_hash = $1 AND s.expires_at > NOW()
        "#,
        &params![token_hash],
    )
    .await?;

    match db.fetch_one() {
        Some(row) => {
            let context = AuthContext {
                user_id: row.try_get("user_id").map_err(DbError::Statement)?,
                username: row.try_get("username").map_err(DbError::Statement)?,
                is_admin: row.try_get("is_admin").map_err(DbError::Statement)?,
            };
            Ok(Some(context))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_tokens_are_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn non_bearer_headers_are_rejected() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);
    }
}
