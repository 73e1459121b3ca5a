//! Race model for the comparison endpoints.

use chrono::NaiveDate;
use serde::Serialize;

/// Race header row, as returned by the race-existence check
/// (`GET /api/v1/compare/validate-race`).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct RaceSummary {
    pub id: i32,
    pub official_name: String,
    pub date: NaiveDate,
    pub laps: Option<i32>,
}
