//! Admin back-office HTTP handlers.
//!
//! Generic CRUD over the allowlisted tables, admin-gated:
//! - GET    /api/v1/admin/tables                  - table registry
//! - GET    /api/v1/admin/tables/{table}          - paginated listing
//! - GET    /api/v1/admin/tables/{table}/schema   - columns, FKs, options
//! - POST   /api/v1/admin/tables/{table}          - create
//! - GET    /api/v1/admin/tables/{table}/{id}     - single record
//! - PUT    /api/v1/admin/tables/{table}/{id}     - update
//! - DELETE /api/v1/admin/tables/{table}/{id}     - delete

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::AppState;
use crate::error::AppError;
use crate::services::admin_service::{
    self, ADMIN_TABLES, SchemaPayload, TableListing, TableSpec,
};

/// The table registry with display metadata.
pub async fn list_tables() -> Json<&'static [TableSpec]> {
    Json(ADMIN_TABLES)
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

/// Paginated rows of one table (50 per page), with the introspected
/// column schema for display.
pub async fn list_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<TableListing>, AppError> {
    let spec = admin_service::table_spec(&table)?;

    let mut db = state.db.acquire().await?;
    let result = admin_service::list_records(&mut db, spec, query.page).await;
    db.close().await;

    Ok(Json(result?))
}

/// Columns, foreign keys, and FK dropdown options for the form builder.
pub async fn table_schema(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<SchemaPayload>, AppError> {
    let spec = admin_service::table_spec(&table)?;

    let mut db = state.db.acquire().await?;
    let result = admin_service::schema_payload(&mut db, spec).await;
    db.close().await;

    Ok(Json(result?))
}

/// Single record by id.
pub async fn get_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let spec = admin_service::table_spec(&table)?;

    let mut db = state.db.acquire().await?;
    let result = admin_service::get_record(&mut db, spec, &id).await;
    db.close().await;

    result?.map(Json).ok_or(AppError::RecordNotFound)
}

/// Create a record from a dynamic JSON body.
pub async fn create_record(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let spec = admin_service::table_spec(&table)?;

    let mut db = state.db.acquire().await?;
    let result = admin_service::create_record(&mut db, spec, &body).await;
    db.close().await;

    Ok((StatusCode::CREATED, Json(result?)))
}

/// Update a record from a dynamic JSON body.
pub async fn update_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, AppError> {
    let spec = admin_service::table_spec(&table)?;

    let mut db = state.db.acquire().await?;
    let result = admin_service::update_record(&mut db, spec, &id, &body).await;
    db.close().await;

    Ok(Json(result?))
}

/// Delete a record by id.
pub async fn delete_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let spec = admin_service::table_spec(&table)?;

    let mut db = state.db.acquire().await?;
    let result = admin_service::delete_record(&mut db, spec, &id).await;
    db.close().await;
    result?;

    Ok(StatusCode::NO_CONTENT)
}
