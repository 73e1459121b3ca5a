//! Positional statement parameters.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;
use uuid::Uuid;

/// A positional value for a `$1..$n` placeholder.
///
/// The variants cover every column type the schema uses. `Null` binds an
/// untyped SQL NULL and is only appropriate where the server can infer the
/// parameter type; the dynamic admin layer inlines literal NULLs instead so
/// parameter types never fight column types.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl SqlParam {
    pub(crate) fn bind<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            SqlParam::Null => query.bind(Option::<String>::None),
            SqlParam::Bool(value) => query.bind(*value),
            SqlParam::Int(value) => query.bind(*value),
            SqlParam::Float(value) => query.bind(*value),
            SqlParam::Text(value) => query.bind(value.as_str()),
            SqlParam::Uuid(value) => query.bind(*value),
            SqlParam::Date(value) => query.bind(*value),
            SqlParam::Timestamp(value) => query.bind(*value),
            SqlParam::Json(value) => query.bind(value.clone()),
        }
    }

    /// Coerce a JSON value into a parameter matching an introspected
    /// `information_schema` data type.
    ///
    /// Used by the dynamic admin layer, where values arrive as JSON and the
    /// column type is only known at runtime. The error is a human-readable
    /// description of the mismatch.
    pub fn from_json(value: &serde_json::Value, data_type: &str) -> Result<Self, String> {
        use serde_json::Value;

        if value.is_null() {
            return Ok(SqlParam::Null);
        }

        match data_type.to_ascii_lowercase().as_str() {
            "smallint" | "integer" | "bigint" => match value {
                Value::Number(n) => n
                    .as_i64()
                    .map(SqlParam::Int)
                    .ok_or_else(|| format!("expected an integer, got {n}")),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(SqlParam::Int)
                    .map_err(|_| format!("invalid integer: {s}")),
                other => Err(format!("expected an integer, got {other}")),
            },
            "real" | "double precision" | "numeric" | "decimal" => match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(SqlParam::Float)
                    .ok_or_else(|| format!("expected a number, got {n}")),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(SqlParam::Float)
                    .map_err(|_| format!("invalid number: {s}")),
                other => Err(format!("expected a number, got {other}")),
            },
            "boolean" => match value {
                Value::Bool(b) => Ok(SqlParam::Bool(*b)),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "yes" | "on" | "1" => Ok(SqlParam::Bool(true)),
                    "false" | "f" | "no" | "off" | "0" => Ok(SqlParam::Bool(false)),
                    _ => Err(format!("invalid boolean: {s}")),
                },
                other => Err(format!("expected a boolean, got {other}")),
            },
            "uuid" => match value {
                Value::String(s) => Uuid::parse_str(s.trim())
                    .map(SqlParam::Uuid)
                    .map_err(|_| format!("invalid uuid: {s}")),
                other => Err(format!("expected a uuid string, got {other}")),
            },
            "date" => match value {
                Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(SqlParam::Date)
                    .map_err(|_| format!("invalid date (want YYYY-MM-DD): {s}")),
                other => Err(format!("expected a date string, got {other}")),
            },
            ty if ty.starts_with("timestamp") => match value {
                Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                    .map(|dt| SqlParam::Timestamp(dt.with_timezone(&Utc)))
                    .map_err(|_| format!("invalid timestamp (want RFC 3339): {s}")),
                other => Err(format!("expected a timestamp string, got {other}")),
            },
            "json" | "jsonb" => Ok(SqlParam::Json(value.clone())),
            _ => match value {
                Value::String(s) => Ok(SqlParam::Text(s.clone())),
                other => Ok(SqlParam::Text(other.to_string())),
            },
        }
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_owned())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<i32> for SqlParam {
    fn from(value: i32) -> Self {
        SqlParam::Int(i64::from(value))
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Float(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Bool(value)
    }
}

impl From<Uuid> for SqlParam {
    fn from(value: Uuid) -> Self {
        SqlParam::Uuid(value)
    }
}

impl From<NaiveDate> for SqlParam {
    fn from(value: NaiveDate) -> Self {
        SqlParam::Date(value)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(value: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(value)
    }
}

impl<T> From<Option<T>> for SqlParam
where
    T: Into<SqlParam>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => SqlParam::Null,
        }
    }
}

/// Build a parameter vector from heterogeneous values.
///
/// ```ignore
/// db.execute("SELECT * FROM race WHERE circuit_id = $1 AND year = $2",
///            &params![circuit_id, year]).await?;
/// ```
#[macro_export]
macro_rules! params {
    () => { Vec::<$crate::db::SqlParam>::new() };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::db::SqlParam::from($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_integers_from_numbers_and_strings() {
        assert_eq!(
            SqlParam::from_json(&json!(42), "integer"),
            Ok(SqlParam::Int(42))
        );
        assert_eq!(
            SqlParam::from_json(&json!(" 7 "), "bigint"),
            Ok(SqlParam::Int(7))
        );
        assert!(SqlParam::from_json(&json!("seven"), "integer").is_err());
    }

    #[test]
    fn coerces_booleans_loosely() {
        assert_eq!(
            SqlParam::from_json(&json!("t"), "boolean"),
            Ok(SqlParam::Bool(true))
        );
        assert_eq!(
            SqlParam::from_json(&json!(false), "boolean"),
            Ok(SqlParam::Bool(false))
        );
        assert!(SqlParam::from_json(&json!("maybe"), "boolean").is_err());
    }

    #[test]
    fn coerces_temporal_types() {
        assert!(matches!(
            SqlParam::from_json(&json!("2024-05-26"), "date"),
            Ok(SqlParam::Date(_))
        ));
        assert!(matches!(
            SqlParam::from_json(&json!("2024-05-26T14:00:00Z"), "timestamp with time zone"),
            Ok(SqlParam::Timestamp(_))
        ));
        assert!(SqlParam::from_json(&json!("26/05/2024"), "date").is_err());
    }

    #[test]
    fn null_json_maps_to_null_param() {
        assert_eq!(
            SqlParam::from_json(&serde_json::Value::Null, "integer"),
            Ok(SqlParam::Null)
        );
    }

    #[test]
    fn unknown_types_fall_back_to_text() {
        assert_eq!(
            SqlParam::from_json(&json!("P1"), "character varying"),
            Ok(SqlParam::Text("P1".to_owned()))
        );
    }

    #[test]
    fn option_conversion_produces_null() {
        assert_eq!(SqlParam::from(Option::<i64>::None), SqlParam::Null);
        assert_eq!(SqlParam::from(Some(3_i64)), SqlParam::Int(3));
    }
}
