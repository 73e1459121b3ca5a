//! Per-user data listings.
//!
//! Authenticated users manage their own custom entries next to the real
//! statistics: custom constructors and drivers carry `uc-`/`ud-` id
//! prefixes, custom races are flagged `is_real = FALSE`, and every row is
//! tagged with the owning `user_id`.
//!
//! The column set varies per listing, so rows are serialized dynamically
//! and the response carries the column order alongside the records.

use axum::{Extension, Json, extract::State};
use serde::Serialize;
use serde_json::Value;

use crate::AppState;
use crate::db::rows::{column_names, row_to_json};
use crate::db::{DbHandle, SqlParam};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::params;

#[derive(Debug, Serialize)]
pub struct UserListing {
    pub title: String,
    pub columns: Vec<String>,
    pub records: Vec<Value>,
}

/// Custom constructors created by the authenticated user.
pub async fn my_constructors(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserListing>, AppError> {
    list(
        &state,
        "My Constructors",
        "SELECT * FROM constructor WHERE id LIKE 'uc-%' AND user_id = $1 ORDER BY name ASC",
        params![auth.user_id],
    )
    .await
}

/// Custom drivers created by the authenticated user.
pub async fn my_drivers(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserListing>, AppError> {
    list(
        &state,
        "My Drivers",
        r#"
        SELECT *
        FROM driver
        WHERE id LIKE 'ud-%'
          AND user_id = $1
        ORDER BY full_name ASC
        "#,
        params![auth.user_id],
    )
    .await
}

/// Custom race events created by the authenticated user.
pub async fn my_races(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserListing>, AppError> {
    list(
        &state,
        "My Races",
        r#"
        SELECT r.*, c.full_name AS circuit_name
        FROM race r
        LEFT JOIN circuit c ON r.circuit_id = c.id
        WHERE r.is_real = FALSE AND r.user_id = $1
        ORDER BY r.year DESC, r.round DESC
        "#,
        params![auth.user_id],
    )
    .await
}

/// Result rows added by the authenticated user, joined with race, driver,
/// and constructor names.
pub async fn my_race_data(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserListing>, AppError> {
    list(
        &state,
        "My Race Data",
        r#"
        SELECT
            r.official_name AS race_name,
            d.full_name AS driver_name,
            c.full_name AS constructor_name,
            rd.position_display_order,
            rd.driver_number,
            rd.race_points,
            rd.race_pole_position,
            rd.race_qualification_position_number,
            rd.race_grid_position_number,
            rd.is_real,
            rd.created_at,
            rd.id
        FROM race_data rd
        LEFT JOIN race r ON rd.race_id = r.id
        LEFT JOIN driver d ON rd.driver_id = d.id
        LEFT JOIN constructor c ON rd.constructor_id = c.id
        WHERE rd.user_id = $1
        ORDER BY rd.created_at DESC NULLS LAST
        "#,
        params![auth.user_id],
    )
    .await
}

async fn list(
    state: &AppState,
    title: &str,
    sql: &str,
    sql_params: Vec<SqlParam>,
) -> Result<Json<UserListing>, AppError> {
    let mut db = state.db.acquire().await?;
    let result = fetch(&mut db, sql, &sql_params).await;
    db.close().await;

    let (columns, records) = result?;
    Ok(Json(UserListing {
        title: title.to_string(),
        columns,
        records,
    }))
}

async fn fetch(
    db: &mut DbHandle,
    sql: &str,
    sql_params: &[SqlParam],
) -> Result<(Vec<String>, Vec<Value>), AppError> {
    db.execute(sql, sql_params).await?;
    let rows = db.fetch_all();
    let columns = rows.first().map(column_names).unwrap_or_default();
    let records = rows.iter().map(row_to_json).collect();
    Ok((columns, records))
}
