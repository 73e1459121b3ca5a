//! Generic admin CRUD layer.
//!
//! Introspects table schemas and foreign keys from `information_schema`
//! and builds dynamic, parameterized statements against a fixed allowlist
//! of tables. Identifiers are validated and quoted before they touch SQL
//! text; values are coerced to the introspected column type before
//! binding, and empty values on nullable columns become literal NULLs.

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::Row as _;
use uuid::Uuid;

use crate::db::rows::row_to_json;
use crate::db::{DbError, DbHandle, SqlParam, decode_row};
use crate::error::AppError;
use crate::params;
use crate::services::auth_service;

/// Records per admin listing page.
pub const PER_PAGE: i64 = 50;

/// A table exposed through the admin back-office.
#[derive(Debug, Clone, Serialize)]
pub struct TableSpec {
    pub table: &'static str,
    pub label: &'static str,
    pub id_column: &'static str,
}

/// The allowlist: only these tables are reachable through the generic CRUD
/// layer, whatever else the database contains.
pub const ADMIN_TABLES: &[TableSpec] = &[
    TableSpec {
        table: "circuit",
        label: "Circuits",
        id_column: "id",
    },
    TableSpec {
        table: "driver",
        label: "Drivers",
        id_column: "id",
    },
    TableSpec {
        table: "constructor",
        label: "Constructors",
        id_column: "id",
    },
    TableSpec {
        table: "race",
        label: "Races",
        id_column: "id",
    },
    TableSpec {
        table: "race_data",
        label: "Race Data",
        id_column: "id",
    },
    TableSpec {
        table: "country",
        label: "Countries",
        id_column: "id",
    },
    TableSpec {
        table: "user",
        label: "Users",
        id_column: "id",
    },
];

pub fn table_spec(name: &str) -> Result<&'static TableSpec, AppError> {
    ADMIN_TABLES
        .iter()
        .find(|spec| spec.table == name)
        .ok_or(AppError::UnknownTable)
}

/// One introspected column.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
}

/// One introspected foreign key.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

/// An option for a foreign-key dropdown.
#[derive(Debug, Serialize)]
pub struct FkOption {
    pub id: String,
    pub display: String,
}

/// Schema description served to the admin form builder.
#[derive(Debug, Serialize)]
pub struct SchemaPayload {
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKey>,
    pub fk_options: Map<String, Value>,
}

/// Paginated listing of a table.
#[derive(Debug, Serialize)]
pub struct TableListing {
    pub records: Vec<Value>,
    pub columns: Vec<ColumnInfo>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

/// Column metadata for a table, in ordinal position order.
pub async fn table_schema(db: &mut DbHandle, table: &str) -> Result<Vec<ColumnInfo>, AppError> {
    db.execute(
        r#"
        SELECT
            column_name::text AS name,
            data_type::text AS data_type,
            (is_nullable = 'YES') AS nullable,
            column_default::text AS default_value
        FROM information_schema.columns
        WHERE table_name = $1
        ORDER BY ordinal_position
        "#,
        &params![table],
    )
    .await?;
    db.fetch_all()
        .iter()
        .map(|row| decode_row(row).map_err(AppError::from))
        .collect()
}

/// Foreign keys declared on a table.
pub async fn foreign_keys(db: &mut DbHandle, table: &str) -> Result<Vec<ForeignKey>, AppError> {
    db.execute(
        r#"
        SELECT
            kcu.column_name::text AS "column",
            ccu.table_name::text AS references_table,
            ccu.column_name::text AS references_column
        FROM information_schema.table_constraints AS tc
        JOIN information_schema.key_column_usage AS kcu
            ON tc.constraint_name = kcu.constraint_name
        JOIN information_schema.constraint_column_usage AS ccu
            ON ccu.constraint_name = tc.constraint_name
        WHERE tc.constraint_type = 'FOREIGN KEY'
            AND tc.table_name = $1
        "#,
        &params![table],
    )
    .await?;
    db.fetch_all()
        .iter()
        .map(|row| decode_row(row).map_err(AppError::from))
        .collect()
}

/// Paginated rows of a table, plus the schema for display.
pub async fn list_records(
    db: &mut DbHandle,
    spec: &TableSpec,
    page: i64,
) -> Result<TableListing, AppError> {
    let columns = table_schema(db, spec.table).await?;
    if columns.is_empty() {
        return Err(AppError::UnknownTable);
    }

    db.execute(
        &format!("SELECT COUNT(*) AS total FROM {}", quoted(spec.table)?),
        &[],
    )
    .await?;
    let total_count: i64 = match db.fetch_one() {
        Some(row) => row.try_get("total").map_err(DbError::Statement)?,
        None => 0,
    };

    let page = page.max(1);
    let offset = (page - 1) * PER_PAGE;
    // Order by the id column when the table actually has one.
    let order_clause = if columns.iter().any(|c| c.name == spec.id_column) {
        format!(" ORDER BY {}", quoted(spec.id_column)?)
    } else {
        String::new()
    };
    let sql = format!(
        "SELECT * FROM {}{} LIMIT $1 OFFSET $2",
        quoted(spec.table)?,
        order_clause
    );
    db.execute(&sql, &params![PER_PAGE, offset]).await?;
    let records: Vec<Value> = db.fetch_all().iter().map(row_to_json).collect();

    let total_pages = if total_count > 0 {
        (total_count + PER_PAGE - 1) / PER_PAGE
    } else {
        1
    };

    Ok(TableListing {
        records,
        columns,
        page,
        per_page: PER_PAGE,
        total_count,
        total_pages,
    })
}

/// Single record by id, serialized dynamically.
pub async fn get_record(
    db: &mut DbHandle,
    spec: &TableSpec,
    id: &str,
) -> Result<Option<Value>, AppError> {
    let columns = table_schema(db, spec.table).await?;
    if columns.is_empty() {
        return Err(AppError::UnknownTable);
    }
    let id_param = id_param(&columns, spec.id_column, id)?;
    let sql = format!(
        "SELECT * FROM {} WHERE {} = $1",
        quoted(spec.table)?,
        quoted(spec.id_column)?
    );
    db.execute(&sql, &[id_param]).await?;
    Ok(db.fetch_one().map(|row| row_to_json(&row)))
}

/// Insert a record from a dynamic JSON body. Returns the created row.
pub async fn create_record(
    db: &mut DbHandle,
    spec: &TableSpec,
    body: &Map<String, Value>,
) -> Result<Value, AppError> {
    let columns = table_schema(db, spec.table).await?;
    if columns.is_empty() {
        return Err(AppError::UnknownTable);
    }
    let (sql, sql_params) = build_insert(spec, &columns, body)?;
    db.execute(&sql, &sql_params).await?;
    let row = db.fetch_one();
    db.commit().await?;
    Ok(row.map(|r| row_to_json(&r)).unwrap_or(Value::Null))
}

/// Update a record from a dynamic JSON body. Returns the updated row.
pub async fn update_record(
    db: &mut DbHandle,
    spec: &TableSpec,
    id: &str,
    body: &Map<String, Value>,
) -> Result<Value, AppError> {
    let columns = table_schema(db, spec.table).await?;
    if columns.is_empty() {
        return Err(AppError::UnknownTable);
    }
    let id_param = id_param(&columns, spec.id_column, id)?;

    let select = format!(
        "SELECT * FROM {} WHERE {} = $1",
        quoted(spec.table)?,
        quoted(spec.id_column)?
    );
    db.execute(&select, &[id_param.clone()]).await?;
    if db.fetch_one().is_none() {
        return Err(AppError::RecordNotFound);
    }

    let (set_clause, mut sql_params) = build_update(spec, &columns, body)?;
    sql_params.push(id_param);
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING *",
        quoted(spec.table)?,
        set_clause,
        quoted(spec.id_column)?,
        sql_params.len()
    );
    db.execute(&sql, &sql_params).await?;
    let row = db.fetch_one();
    db.commit().await?;
    Ok(row.map(|r| row_to_json(&r)).unwrap_or(Value::Null))
}

/// Delete a record by id.
pub async fn delete_record(db: &mut DbHandle, spec: &TableSpec, id: &str) -> Result<(), AppError> {
    let columns = table_schema(db, spec.table).await?;
    if columns.is_empty() {
        return Err(AppError::UnknownTable);
    }
    let id_param = id_param(&columns, spec.id_column, id)?;

    let select = format!(
        "SELECT * FROM {} WHERE {} = $1",
        quoted(spec.table)?,
        quoted(spec.id_column)?
    );
    db.execute(&select, &[id_param.clone()]).await?;
    if db.fetch_one().is_none() {
        return Err(AppError::RecordNotFound);
    }

    let sql = format!(
        "DELETE FROM {} WHERE {} = $1",
        quoted(spec.table)?,
        quoted(spec.id_column)?
    );
    db.execute(&sql, &[id_param]).await?;
    db.commit().await?;
    Ok(())
}

/// Columns, foreign keys, and dropdown options for the admin form builder.
pub async fn schema_payload(db: &mut DbHandle, spec: &TableSpec) -> Result<SchemaPayload, AppError> {
    let columns = table_schema(db, spec.table).await?;
    if columns.is_empty() {
        return Err(AppError::UnknownTable);
    }
    let fks = foreign_keys(db, spec.table).await?;

    let mut fk_options = Map::new();
    for fk in &fks {
        let ref_schema = table_schema(db, &fk.references_table).await?;
        // Human-friendly display column when the referenced table has one.
        let display = if ref_schema.iter().any(|c| c.name == "name") {
            "name"
        } else {
            fk.references_column.as_str()
        };
        let options = referenced_options(db, &fk.references_table, &fk.references_column, display)
            .await?;
        fk_options.insert(
            fk.column.clone(),
            serde_json::to_value(options).unwrap_or(Value::Null),
        );
    }

    Ok(SchemaPayload {
        columns,
        foreign_keys: fks,
        fk_options,
    })
}

/// Options for one foreign-key dropdown: id plus display value.
async fn referenced_options(
    db: &mut DbHandle,
    table: &str,
    id_column: &str,
    display_column: &str,
) -> Result<Vec<FkOption>, AppError> {
    let sql = format!(
        "SELECT {id}::text AS id, {display}::text AS display FROM {table} ORDER BY {display}",
        id = quoted(id_column)?,
        display = quoted(display_column)?,
        table = quoted(table)?
    );
    db.execute(&sql, &[]).await?;

    let mut options = Vec::new();
    for row in db.fetch_all() {
        let id: String = row.try_get("id").map_err(DbError::Statement)?;
        let display: Option<String> = row.try_get("display").map_err(DbError::Statement)?;
        let display = display.unwrap_or_else(|| id.clone());
        options.push(FkOption { id, display });
    }
    Ok(options)
}

/// Build a dynamic INSERT for the allowlisted table.
///
/// Only introspected column names are accepted from the body; values are
/// coerced to the column type, empty values on nullable columns become
/// literal NULLs, `user.password` is digested into `password_hash`, and a
/// UUID id is generated when the id column is client-supplied and absent.
fn build_insert(
    spec: &TableSpec,
    columns: &[ColumnInfo],
    body: &Map<String, Value>,
) -> Result<(String, Vec<SqlParam>), AppError> {
    let mut names: Vec<String> = Vec::new();
    let mut fragments: Vec<String> = Vec::new();
    let mut sql_params: Vec<SqlParam> = Vec::new();
    let mut id_provided = false;

    for column in columns {
        if is_sequence_generated(column) {
            continue;
        }
        // The digest column is only settable through `password`.
        if column.name == "password_hash" {
            continue;
        }
        let Some(value) = body.get(&column.name) else {
            continue;
        };
        if is_empty(value) {
            if column.nullable {
                names.push(quoted(&column.name)?);
                fragments.push("NULL".to_string());
            }
            continue;
        }
        let param = SqlParam::from_json(value, &column.data_type)
            .map_err(|err| AppError::Validation(format!("{}: {err}", column.name)))?;
        if column.name == spec.id_column {
            id_provided = true;
        }
        names.push(quoted(&column.name)?);
        sql_params.push(param);
        fragments.push(format!("${}", sql_params.len()));
    }

    if spec.table == "user" {
        if let Some(Value::String(password)) = body.get("password") {
            if !password.is_empty() {
                names.push(quoted("password_hash")?);
                sql_params.push(SqlParam::Text(auth_service::hash_password(password)));
                fragments.push(format!("${}", sql_params.len()));
            }
        }
    }

    if names.is_empty() {
        return Err(AppError::Validation("no data provided".to_string()));
    }

    // Tables with client-supplied keys get a generated UUID id.
    let id_is_client_supplied = columns
        .iter()
        .any(|c| c.name == spec.id_column && c.default_value.is_none());
    if !id_provided && id_is_client_supplied {
        sql_params.push(SqlParam::Text(Uuid::new_v4().to_string()));
        names.insert(0, quoted(spec.id_column)?);
        fragments.insert(0, format!("${}", sql_params.len()));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        quoted(spec.table)?,
        names.join(", "),
        fragments.join(", ")
    );
    Ok((sql, sql_params))
}

/// Build the SET clause of a dynamic UPDATE. Same acceptance rules as
/// `build_insert`, minus id generation.
fn build_update(
    spec: &TableSpec,
    columns: &[ColumnInfo],
    body: &Map<String, Value>,
) -> Result<(String, Vec<SqlParam>), AppError> {
    let mut sets: Vec<String> = Vec::new();
    let mut sql_params: Vec<SqlParam> = Vec::new();

    for column in columns {
        if column.name == spec.id_column
            || column.name == "created_at"
            || is_sequence_generated(column)
            || column.name == "password_hash"
        {
            continue;
        }
        let Some(value) = body.get(&column.name) else {
            continue;
        };
        if is_empty(value) {
            if column.nullable {
                sets.push(format!("{} = NULL", quoted(&column.name)?));
            }
            continue;
        }
        let param = SqlParam::from_json(value, &column.data_type)
            .map_err(|err| AppError::Validation(format!("{}: {err}", column.name)))?;
        sql_params.push(param);
        sets.push(format!("{} = ${}", quoted(&column.name)?, sql_params.len()));
    }

    if spec.table == "user" {
        if let Some(Value::String(password)) = body.get("password") {
            if !password.is_empty() {
                sql_params.push(SqlParam::Text(auth_service::hash_password(password)));
                sets.push(format!(
                    "{} = ${}",
                    quoted("password_hash")?,
                    sql_params.len()
                ));
            }
        }
    }

    if sets.is_empty() {
        return Err(AppError::Validation("no changes provided".to_string()));
    }

    Ok((sets.join(", "), sql_params))
}

/// Auto-generated key columns (serial/identity) are never written.
fn is_sequence_generated(column: &ColumnInfo) -> bool {
    (column.name == "id" || column.name == "created_at")
        && column
            .default_value
            .as_deref()
            .is_some_and(|default| default.contains("nextval"))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Coerce a path id segment to the id column's type.
fn id_param(columns: &[ColumnInfo], id_column: &str, raw: &str) -> Result<SqlParam, AppError> {
    let data_type = columns
        .iter()
        .find(|c| c.name == id_column)
        .map(|c| c.data_type.as_str())
        .unwrap_or("text");
    SqlParam::from_json(&Value::String(raw.to_owned()), data_type).map_err(AppError::Validation)
}

/// Reject anything that is not a plain lowercase SQL identifier before it
/// is quoted into statement text.
fn ensure_identifier(name: &str) -> Result<(), AppError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid identifier: {name}")))
    }
}

fn quoted(name: &str) -> Result<String, AppError> {
    ensure_identifier(name)?;
    Ok(format!("\"{name}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_column(name: &str, nullable: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: "text".to_string(),
            nullable,
            default_value: None,
        }
    }

    fn driver_columns() -> Vec<ColumnInfo> {
        vec![
            text_column("id", false),
            text_column("name", false),
            text_column("full_name", true),
            ColumnInfo {
                name: "number".to_string(),
                data_type: "integer".to_string(),
                nullable: true,
                default_value: None,
            },
        ]
    }

    fn body(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn identifiers_are_validated_before_quoting() {
        assert!(ensure_identifier("race_data").is_ok());
        assert!(ensure_identifier("user; DROP TABLE race").is_err());
        assert!(ensure_identifier("\"quoted\"").is_err());
        assert!(ensure_identifier("").is_err());
    }

    #[test]
    fn unknown_tables_are_rejected() {
        assert!(table_spec("race").is_ok());
        assert!(matches!(
            table_spec("pg_catalog"),
            Err(AppError::UnknownTable)
        ));
    }

    #[test]
    fn insert_binds_typed_values_in_order() {
        let spec = table_spec("driver").unwrap();
        let body = body(&[
            ("id", json!("vers")),
            ("name", json!("Verstappen")),
            ("number", json!("33")),
            ("ignored_column", json!("dropped")),
        ]);

        let (sql, sql_params) = build_insert(spec, &driver_columns(), &body).unwrap();
        assert_eq!(
            sql,
            r#"INSERT INTO "driver" ("id", "name", "number") VALUES ($1, $2, $3) RETURNING *"#
        );
        assert_eq!(
            sql_params,
            vec![
                SqlParam::Text("vers".to_string()),
                SqlParam::Text("Verstappen".to_string()),
                SqlParam::Int(33),
            ]
        );
    }

    #[test]
    fn insert_generates_uuid_id_when_absent() {
        let spec = table_spec("driver").unwrap();
        let body = body(&[("name", json!("Leclerc"))]);

        let (sql, sql_params) = build_insert(spec, &driver_columns(), &body).unwrap();
        assert_eq!(
            sql,
            r#"INSERT INTO "driver" ("id", "name") VALUES ($2, $1) RETURNING *"#
        );
        assert_eq!(sql_params.len(), 2);
        assert_eq!(sql_params[0], SqlParam::Text("Leclerc".to_string()));
        assert!(matches!(&sql_params[1], SqlParam::Text(id) if uuid::Uuid::parse_str(id).is_ok()));
    }

    #[test]
    fn insert_inlines_null_for_empty_nullable_values() {
        let spec = table_spec("driver").unwrap();
        let body = body(&[("id", json!("ham")), ("full_name", json!(""))]);

        let (sql, sql_params) = build_insert(spec, &driver_columns(), &body).unwrap();
        assert_eq!(
            sql,
            r#"INSERT INTO "driver" ("id", "full_name") VALUES ($1, NULL) RETURNING *"#
        );
        assert_eq!(sql_params, vec![SqlParam::Text("ham".to_string())]);
    }

    #[test]
    fn insert_skips_sequence_generated_ids() {
        let spec = table_spec("race").unwrap();
        let columns = vec![
            ColumnInfo {
                name: "id".to_string(),
                data_type: "integer".to_string(),
                nullable: false,
                default_value: Some("nextval('race_id_seq'::regclass)".to_string()),
            },
            text_column("official_name", false),
        ];
        let body = body(&[("id", json!(9)), ("official_name", json!("Monaco GP"))]);

        let (sql, sql_params) = build_insert(spec, &columns, &body).unwrap();
        assert_eq!(
            sql,
            r#"INSERT INTO "race" ("official_name") VALUES ($1) RETURNING *"#
        );
        assert_eq!(sql_params, vec![SqlParam::Text("Monaco GP".to_string())]);
    }

    #[test]
    fn insert_digests_user_passwords() {
        let spec = table_spec("user").unwrap();
        let columns = vec![
            text_column("id", false),
            text_column("username", false),
            text_column("password_hash", false),
        ];
        let body = body(&[
            ("id", json!("u-1")),
            ("username", json!("admin")),
            ("password", json!("paddock")),
            ("password_hash", json!("must-not-pass-through")),
        ]);

        let (sql, sql_params) = build_insert(spec, &columns, &body).unwrap();
        assert_eq!(
            sql,
            r#"INSERT INTO "user" ("id", "username", "password_hash") VALUES ($1, $2, $3) RETURNING *"#
        );
        let SqlParam::Text(stored) = &sql_params[2] else {
            panic!("expected text digest");
        };
        assert!(auth_service::verify_password("paddock", stored));
    }

    #[test]
    fn insert_rejects_empty_bodies() {
        let spec = table_spec("driver").unwrap();
        assert!(matches!(
            build_insert(spec, &driver_columns(), &Map::new()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn update_skips_key_and_audit_columns() {
        let spec = table_spec("driver").unwrap();
        let mut columns = driver_columns();
        columns.push(ColumnInfo {
            name: "created_at".to_string(),
            data_type: "timestamp with time zone".to_string(),
            nullable: false,
            default_value: Some("now()".to_string()),
        });
        let body = body(&[
            ("id", json!("other-id")),
            ("created_at", json!("2020-01-01T00:00:00Z")),
            ("name", json!("Hamilton")),
            ("full_name", json!("")),
        ]);

        let (set_clause, sql_params) = build_update(spec, &columns, &body).unwrap();
        assert_eq!(set_clause, r#""name" = $1, "full_name" = NULL"#);
        assert_eq!(sql_params, vec![SqlParam::Text("Hamilton".to_string())]);
    }

    #[test]
    fn update_rejects_bodies_without_changes() {
        let spec = table_spec("driver").unwrap();
        let body = body(&[("id", json!("only-the-key"))]);
        assert!(matches!(
            build_update(spec, &driver_columns(), &body),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn id_params_follow_the_column_type() {
        let columns = vec![ColumnInfo {
            name: "id".to_string(),
            data_type: "integer".to_string(),
            nullable: false,
            default_value: None,
        }];
        assert!(matches!(
            id_param(&columns, "id", "42"),
            Ok(SqlParam::Int(42))
        ));
        assert!(id_param(&columns, "id", "not-a-number").is_err());

        let text_columns = vec![text_column("id", false)];
        assert!(matches!(
            id_param(&text_columns, "id", "uc-123"),
            Ok(SqlParam::Text(id)) if id == "uc-123"
        ));
    }
}
