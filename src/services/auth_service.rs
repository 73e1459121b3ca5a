//! Account and session logic: registration, login, logout, email
//! verification.
//!
//! Passwords are stored as salted SHA-256 digests (`<salt>$<digest>`),
//! session and verification tokens as plain SHA-256 digests; raw tokens are
//! shown to the client exactly once.

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::{DbHandle, decode_row};
use crate::error::AppError;
use crate::models::user::{LoginRequest, LoginResponse, RegisterRequest, User, UserResponse};
use crate::params;
use crate::services::mail_service::Mailer;

const UNIQUE_VIOLATION: &str = "23505";

/// Sessions expire this many days after login.
const SESSION_TTL_DAYS: i64 = 30;

/// Register a new account.
///
/// When mail is configured, a verification token is generated, its digest
/// stored on the row, and a verification link dispatched; delivery failures
/// are logged and never fail the registration.
pub async fn register(
    db: &mut DbHandle,
    mailer: &Mailer,
    request: RegisterRequest,
) -> Result<UserResponse, AppError> {
    let username = request.username.trim().to_owned();
    if username.is_empty() || request.password.is_empty() {
        return Err(AppError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let email = match request.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => email.to_owned(),
        _ => format!("{username}@example.com"),
    };

    let id = Uuid::new_v4().to_string();
    let password_hash = hash_password(&request.password);
    let verify_token = mailer.enabled().then(generate_token);
    let verify_token_hash = verify_token.as_deref().map(digest);

    db.execute(
        r#"
        INSERT INTO "user" (id, username, email, password_hash, is_admin, email_verified, verify_token_hash)
        VALUES ($1, $2, $3, $4, FALSE, FALSE, $5)
        RETURNING id, username, email, password_hash, is_admin, email_verified, created_at
        "#,
        &params![
            id.as_str(),
            username.as_str(),
            email.as_str(),
            password_hash,
            verify_token_hash
        ],
    )
    .await
    .map_err(|err| {
        if err.sqlstate().as_deref() == Some(UNIQUE_VIOLATION) {
            AppError::UsernameTaken
        } else {
            AppError::Database(err)
        }
    })?;
    db.commit().await?;

    let row = db.fetch_one().ok_or(AppError::RecordNotFound)?;
    let user: User = decode_row(&row)?;

    if let Some(token) = verify_token {
        mailer.send_verification(&user.username, &user.email, &token).await;
    }

    Ok(user.into())
}

/// Verify credentials and issue a session token.
pub async fn login(db: &mut DbHandle, request: LoginRequest) -> Result<LoginResponse, AppError> {
    db.execute(
        r#"
        SELECT id, username, email, password_hash, is_admin, email_verified, created_at
        FROM "user"
        WHERE username = $1
        "#,
        &params![request.username.trim()],
    )
    .await?;

    let row = db.fetch_one().ok_or(AppError::InvalidCredentials)?;
    let user: User = decode_row(&row)?;
    if !verify_password(&request.password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }

    let token = generate_token();
    let expires_at = Utc::now() + chrono::Duration::days(SESSION_TTL_DAYS);
    db.execute(
        "INSERT INTO session (id, user_id, token_hash, expires_at) VALUES ($1, $2, $3, $4)",
        &params![
            Uuid::new_v4().to_string(),
            user.id.as_str(),
            digest(&token),
            expires_at
        ],
    )
    .await?;
    db.commit().await?;

    Ok(LoginResponse {
        token,
        user: user.into(),
    })
}

/// Delete the session behind the presented token digest.
pub async fn logout(db: &mut DbHandle, token_hash: &str) -> Result<(), AppError> {
    db.execute(
        "DELETE FROM session WHERE token_hash = $1",
        &params![token_hash],
    )
    .await?;
    db.commit().await?;
    Ok(())
}

/// Redeem an email verification token.
pub async fn verify_email(db: &mut DbHandle, token: &str) -> Result<(), AppError> {
    db.execute(
        r#"
        UPDATE "user"
        SET email_verified = TRUE, verify_token_hash = NULL
        WHERE verify_token_hash = $1
        RETURNING id
        "#,
        &params![digest(token.trim())],
    )
    .await?;
    let verified = db.fetch_one().is_some();
    db.commit().await?;

    if verified {
        Ok(())
    } else {
        Err(AppError::VerificationInvalid)
    }
}

/// Load the authenticated account.
pub async fn current_user(db: &mut DbHandle, user_id: &str) -> Result<UserResponse, AppError> {
    db.execute(
        r#"
        SELECT id, username, email, password_hash, is_admin, email_verified, created_at
        FROM "user"
        WHERE id = $1
        "#,
        &params![user_id],
    )
    .await?;
    let row = db.fetch_one().ok_or(AppError::RecordNotFound)?;
    let user: User = decode_row(&row)?;
    Ok(user.into())
}

/// SHA-256 digest as lowercase hex. Session and verification tokens are
/// stored in this form only.
pub fn digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Opaque token: 32 random bytes, hex-encoded.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Salted password digest in `<salt>$<digest>` form.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::random();
    let salt = hex::encode(salt);
    let hashed = digest(&format!("{salt}{password}"));
    format!("{salt}${hashed}")
}

/// Check a password against a stored `<salt>$<digest>` value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => digest(&format!("{salt}{password}")) == expected,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let stored = hash_password("box-box-box");
        assert!(verify_password("box-box-box", &stored));
        assert!(!verify_password("box-box", &stored));
    }

    #[test]
    fn each_hash_gets_its_own_salt() {
        let first = hash_password("same-password");
        let second = hash_password("same-password");
        assert_ne!(first, second);
        assert!(verify_password("same-password", &first));
        assert!(verify_password("same-password", &second));
    }

    #[test]
    fn malformed_stored_value_never_verifies() {
        assert!(!verify_password("anything", "no-separator-here"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn digest_is_stable_hex() {
        let first = digest("token");
        assert_eq!(first.len(), 64);
        assert_eq!(first, digest("token"));
        assert_ne!(first, digest("other"));
    }

    #[test]
    fn tokens_are_unique_and_opaque() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_token());
    }
}
