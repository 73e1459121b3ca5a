//! Account and session HTTP handlers.
//!
//! - POST /api/v1/auth/register - Create a new account
//! - POST /api/v1/auth/login    - Issue a session token
//! - GET  /api/v1/auth/verify   - Redeem an email verification token
//! - POST /api/v1/auth/logout   - Delete the current session
//! - GET  /api/v1/auth/me       - Current account info

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::AppError;
use crate::middleware::auth::{AuthContext, bearer_token};
use crate::models::user::{LoginRequest, LoginResponse, RegisterRequest, UserResponse};
use crate::services::auth_service;

/// Create a new account.
///
/// # Response
///
/// - **Success (201 Created)**: the created account
/// - **Error (400)**: missing username or password
/// - **Error (409)**: username already registered
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let mut db = state.db.acquire().await?;
    let result = auth_service::register(&mut db, &state.mailer, request).await;
    db.close().await;

    Ok((StatusCode::CREATED, Json(result?)))
}

/// Verify credentials and issue a bearer token.
///
/// The token is returned exactly once; only its digest is stored, so a lost
/// token means logging in again.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let mut db = state.db.acquire().await?;
    let result = auth_service::login(&mut db, request).await;
    db.close().await;

    Ok(Json(result?))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

/// Redeem an email verification token from the mailed link.
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<Value>, AppError> {
    let token = query
        .token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| AppError::Validation("missing token".to_string()))?;

    let mut db = state.db.acquire().await?;
    let result = auth_service::verify_email(&mut db, &token).await;
    db.close().await;
    result?;

    Ok(Json(json!({ "success": true })))
}

/// Delete the session behind the presented token.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::AuthRequired)?;
    let token_hash = auth_service::digest(&token);

    let mut db = state.db.acquire().await?;
    let result = auth_service::logout(&mut db, &token_hash).await;
    db.close().await;
    result?;

    Ok(StatusCode::NO_CONTENT)
}

/// Current account info for the authenticated session.
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserResponse>, AppError> {
    let mut db = state.db.acquire().await?;
    let result = auth_service::current_user(&mut db, &auth.user_id).await;
    db.close().await;

    Ok(Json(result?))
}
