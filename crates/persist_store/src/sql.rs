use sea_orm::sea_query::{
    PostgresQueryBuilder, QueryStatementWriter, SqliteQueryBuilder, Value as SeaValue,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, FromQueryResult, QueryResult, Statement};
use serde_json::Value as JsonValue;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use pmt_persist_core::{ColumnKind, FieldValue, PersistError, PersistResult, Record};

pub fn build_stmt<S: QueryStatementWriter>(
    backend: DatabaseBackend,
    stmt: &S,
) -> (String, sea_orm::sea_query::Values) {
    match backend {
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        _ => stmt.build(SqliteQueryBuilder),
    }
}

pub fn statement<S: QueryStatementWriter>(backend: DatabaseBackend, stmt: &S) -> Statement {
    let (sql, values) = build_stmt(backend, stmt);
    Statement::from_sql_and_values(backend, sql, values)
}

pub async fn exec<C, S>(conn: &C, stmt: &S) -> PersistResult<u64>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let result = conn.execute_raw(statement(backend, stmt)).await?;
    Ok(result.rows_affected())
}

pub async fn query_all<C, S>(conn: &C, stmt: &S) -> PersistResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let rows = conn.query_all_raw(statement(backend, stmt)).await?;
    Ok(rows)
}

pub async fn query_one<C, S>(conn: &C, stmt: &S) -> PersistResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let row = conn.query_one_raw(statement(backend, stmt)).await?;
    Ok(row)
}

/// Binds a coerced value for a column of `kind`.
///
/// Nulls are typed after the column so Postgres does not reject a text-typed parameter
/// against a uuid or integer column. SQLite has no uuid or json storage class; both are
/// bound as text there.
pub fn sea_value(backend: DatabaseBackend, kind: ColumnKind, value: &FieldValue) -> SeaValue {
    match value {
        FieldValue::Null => typed_null(backend, kind),
        FieldValue::Uuid(uuid) => match backend {
            DatabaseBackend::Postgres => SeaValue::from(*uuid),
            _ => SeaValue::from(uuid.to_string()),
        },
        FieldValue::Text(text) => SeaValue::from(text.clone()),
        FieldValue::Integer(value) => SeaValue::from(*value),
        FieldValue::Float(value) => SeaValue::from(*value),
        FieldValue::Boolean(value) => SeaValue::from(*value),
        FieldValue::Json(json) => match backend {
            DatabaseBackend::Postgres => SeaValue::from(json.clone()),
            _ => SeaValue::from(json.to_string()),
        },
        FieldValue::Timestamp(value) => SeaValue::from(*value),
        FieldValue::Date(value) => SeaValue::from(*value),
    }
}

fn typed_null(backend: DatabaseBackend, kind: ColumnKind) -> SeaValue {
    let sqlite = !matches!(backend, DatabaseBackend::Postgres);
    match kind {
        ColumnKind::Uuid if !sqlite => Option::<Uuid>::None.into(),
        ColumnKind::Json if !sqlite => Option::<JsonValue>::None.into(),
        ColumnKind::Integer => Option::<i64>::None.into(),
        ColumnKind::Float => Option::<f64>::None.into(),
        ColumnKind::Boolean => Option::<bool>::None.into(),
        ColumnKind::Timestamp => Option::<OffsetDateTime>::None.into(),
        ColumnKind::Date => Option::<Date>::None.into(),
        _ => Option::<String>::None.into(),
    }
}

/// Reads a key column back as the value to store in a referencing column.
pub fn read_key(
    row: &QueryResult,
    column: &str,
    kind: ColumnKind,
) -> PersistResult<Option<FieldValue>> {
    match kind {
        ColumnKind::Uuid => {
            if let Ok(value) = row.try_get::<Option<Uuid>>("", column) {
                return Ok(value.map(FieldValue::Uuid));
            }
            if let Ok(value) = row.try_get::<Option<String>>("", column) {
                return match value {
                    Some(text) => Uuid::parse_str(&text)
                        .map(|uuid| Some(FieldValue::Uuid(uuid)))
                        .map_err(|err| PersistError::storage(format!("invalid uuid key: {err}"))),
                    None => Ok(None),
                };
            }
        }
        ColumnKind::Integer => {
            if let Ok(value) = row.try_get::<Option<i64>>("", column) {
                return Ok(value.map(FieldValue::Integer));
            }
            if let Ok(value) = row.try_get::<Option<i32>>("", column) {
                return Ok(value.map(|value| FieldValue::Integer(value.into())));
            }
        }
        _ => {}
    }
    if let Ok(value) = row.try_get::<Option<String>>("", column) {
        return Ok(value.map(FieldValue::Text));
    }
    Err(PersistError::storage(format!(
        "unsupported key format for column {column}"
    )))
}

pub fn row_to_record(row: &QueryResult) -> PersistResult<Record> {
    match JsonValue::from_query_result(row, "")? {
        JsonValue::Object(map) => Ok(map),
        other => Err(PersistError::storage(format!(
            "row decoded to non-object value: {other}"
        ))),
    }
}
