//! Driver model for the comparison endpoints.

use serde::Serialize;

/// A driver that took part in a race for a given constructor.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DriverSummary {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub abbreviation: Option<String>,
}
