//! Dynamic row serialization for schema-driven result sets.
//!
//! Fixed-shape queries decode into `FromRow` structs; this path exists for
//! the admin back-office and per-user listings, where the column set is
//! only known at runtime.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{Column, Row as _, TypeInfo};
use uuid::Uuid;

use super::Row;

/// Column names of a row, in result-set order.
pub fn column_names(row: &Row) -> Vec<String> {
    row.columns()
        .iter()
        .map(|column| column.name().to_owned())
        .collect()
}

/// Serialize a row into a JSON object keyed by column name.
///
/// Values whose types fall outside the decode ladder come back as JSON
/// null rather than failing the whole listing.
pub fn row_to_json(row: &Row) -> Value {
    let mut object = Map::with_capacity(row.columns().len());
    for column in row.columns() {
        let value = column_to_json(row, column.ordinal(), column.type_info().name());
        object.insert(column.name().to_owned(), value);
    }
    Value::Object(object)
}

fn column_to_json(row: &Row, index: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map(|v| v.map(Value::Bool)),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map(|v| v.map(Value::from)),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map(|v| v.map(Value::from)),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .map(|v| v.map(Value::from)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.map(|n| json_number(f64::from(n)))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .map(|v| v.map(json_number)),
        "UUID" => row
            .try_get::<Option<Uuid>, _>(index)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)
            .map(|v| v.map(|d| Value::String(d.to_string()))),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .map(|v| v.map(|t| Value::String(t.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .map(|v| v.map(|t| Value::String(t.to_rfc3339()))),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index),
        // TEXT, VARCHAR, CHAR, NAME and anything else textual.
        _ => row
            .try_get::<Option<String>, _>(index)
            .map(|v| v.map(Value::String)),
    };

    match decoded {
        Ok(Some(value)) => value,
        Ok(None) => Value::Null,
        Err(err) => {
            tracing::debug!(column = index, type_name, error = %err, "undecodable column serialized as null");
            Value::Null
        }
    }
}

fn json_number(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
