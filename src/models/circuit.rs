//! Circuit model for the comparison endpoints.

use serde::Serialize;

/// A circuit joined with its country, as served by
/// `GET /api/v1/compare/circuits`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CircuitSummary {
    pub id: String,
    pub full_name: String,
    pub country_name: String,
}
