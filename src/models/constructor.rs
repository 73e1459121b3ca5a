//! Constructor model for the comparison endpoints.

use serde::Serialize;

/// A constructor that participated in a race.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ConstructorSummary {
    pub id: String,
    pub name: String,
    pub full_name: Option<String>,
}
