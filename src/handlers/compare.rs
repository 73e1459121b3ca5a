//! Comparison HTTP handlers.
//!
//! Read-heavy listings used by the compare-data views:
//! - GET /api/v1/compare/circuits
//! - GET /api/v1/compare/validate-race
//! - GET /api/v1/compare/constructors-by-race
//! - GET /api/v1/compare/drivers-by-race-constructor
//!
//! Responses keep the `success` envelope the frontend expects; a failed
//! race lookup is a negative answer, not an HTTP error.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::db::{DbHandle, decode_row};
use crate::error::AppError;
use crate::models::circuit::CircuitSummary;
use crate::models::constructor::ConstructorSummary;
use crate::models::driver::DriverSummary;
use crate::models::race::RaceSummary;
use crate::params;

#[derive(Debug, Serialize)]
pub struct CircuitsResponse {
    pub success: bool,
    pub circuits: Vec<CircuitSummary>,
}

/// All circuits with their country, for the circuit picker.
pub async fn circuits(State(state): State<AppState>) -> Result<Json<CircuitsResponse>, AppError> {
    let mut db = state.db.acquire().await?;
    let result = fetch_circuits(&mut db).await;
    db.close().await;

    Ok(Json(CircuitsResponse {
        success: true,
        circuits: result?,
    }))
}

async fn fetch_circuits(db: &mut DbHandle) -> Result<Vec<CircuitSummary>, AppError> {
    db.execute(
        r#"
        SELECT c.id, c.full_name, co.name AS country_name
        FROM circuit c
        JOIN country co ON c.country_id = co.id
        ORDER BY c.full_name ASC
        "#,
        &[],
    )
    .await?;
    db.fetch_all()
        .iter()
        .map(|row| decode_row(row).map_err(AppError::from))
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct ValidateRaceQuery {
    pub circuit_id: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ValidateRaceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub race: Option<RaceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Whether a race exists for the given circuit and year.
pub async fn validate_race(
    State(state): State<AppState>,
    Query(query): Query<ValidateRaceQuery>,
) -> Result<Json<ValidateRaceResponse>, AppError> {
    let (Some(circuit_id), Some(year)) = (query.circuit_id, query.year) else {
        return Err(AppError::Validation(
            "missing circuit_id or year".to_string(),
        ));
    };

    let mut db = state.db.acquire().await?;
    let result = fetch_race(&mut db, &circuit_id, year).await;
    db.close().await;

    Ok(Json(match result? {
        Some(race) => ValidateRaceResponse {
            success: true,
            race: Some(race),
            error: None,
        },
        None => ValidateRaceResponse {
            success: false,
            race: None,
            error: Some("No race found for this circuit and year".to_string()),
        },
    }))
}

async fn fetch_race(
    db: &mut DbHandle,
    circuit_id: &str,
    year: i32,
) -> Result<Option<RaceSummary>, AppError> {
    db.execute(
        r#"
        SELECT id, official_name, date, laps
        FROM race
        WHERE circuit_id = $1 AND year = $2
        "#,
        &params![circuit_id, year],
    )
    .await?;
    db.fetch_one()
        .map(|row| decode_row(&row).map_err(AppError::from))
        .transpose()
}

#[derive(Debug, Deserialize)]
pub struct ByRaceQuery {
    pub race_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ConstructorsResponse {
    pub success: bool,
    pub constructors: Vec<ConstructorSummary>,
}

/// Constructors that participated in a specific race.
pub async fn constructors_by_race(
    State(state): State<AppState>,
    Query(query): Query<ByRaceQuery>,
) -> Result<Json<ConstructorsResponse>, AppError> {
    let race_id = query
        .race_id
        .ok_or_else(|| AppError::Validation("missing race_id".to_string()))?;

    let mut db = state.db.acquire().await?;
    let result = fetch_constructors(&mut db, race_id).await;
    db.close().await;

    Ok(Json(ConstructorsResponse {
        success: true,
        constructors: result?,
    }))
}

async fn fetch_constructors(
    db: &mut DbHandle,
    race_id: i32,
) -> Result<Vec<ConstructorSummary>, AppError> {
    db.execute(
        r#"
        SELECT DISTINCT c.id, c.name, c.full_name
        FROM race_data rd
        JOIN constructor c ON rd.constructor_id = c.id
        WHERE rd.race_id = $1
        ORDER BY c.name ASC
        "#,
        &params![race_id],
    )
    .await?;
    db.fetch_all()
        .iter()
        .map(|row| decode_row(row).map_err(AppError::from))
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct ByRaceConstructorQuery {
    pub race_id: Option<i32>,
    pub constructor_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DriversResponse {
    pub success: bool,
    pub drivers: Vec<DriverSummary>,
}

/// Drivers that drove for a constructor in a specific race.
pub async fn drivers_by_race_constructor(
    State(state): State<AppState>,
    Query(query): Query<ByRaceConstructorQuery>,
) -> Result<Json<DriversResponse>, AppError> {
    let (Some(race_id), Some(constructor_id)) = (query.race_id, query.constructor_id) else {
        return Err(AppError::Validation(
            "missing race_id or constructor_id".to_string(),
        ));
    };

    let mut db = state.db.acquire().await?;
    let result = fetch_drivers(&mut db, race_id, &constructor_id).await;
    db.close().await;

    Ok(Json(DriversResponse {
        success: true,
        drivers: result?,
    }))
}

async fn fetch_drivers(
    db: &mut DbHandle,
    race_id: i32,
    constructor_id: &str,
) -> Result<Vec<DriverSummary>, AppError> {
    db.execute(
        r#"
        SELECT DISTINCT d.id, d.name, d.full_name, d.abbreviation
        FROM race_data rd
        JOIN driver d ON rd.driver_id = d.id
        WHERE rd.race_id = $1 AND rd.constructor_id = $2
        ORDER BY d.name ASC
        "#,
        &params![race_id, constructor_id],
    )
    .await?;
    db.fetch_all()
        .iter()
        .map(|row| decode_row(row).map_err(AppError::from))
        .collect()
}
