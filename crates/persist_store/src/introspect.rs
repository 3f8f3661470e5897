//! Reads table metadata from the live database.
//!
//! Postgres is read through `information_schema`, SQLite through `sqlite_master` and the
//! `pragma_table_info` / `pragma_foreign_key_list` table-valued functions.

use sea_orm::{ConnectionTrait, DatabaseBackend, QueryResult, Statement};

use pmt_persist_core::{
    ColumnDescriptor, ColumnKind, ForeignKeyDescriptor, PersistError, PersistResult, TableSchema,
};

const PG_TABLES: &str = r#"
SELECT table_name::text AS table_name
FROM information_schema.tables
WHERE table_schema = $1 AND table_type = 'BASE TABLE'
ORDER BY table_name
"#;

const PG_COLUMNS: &str = r#"
SELECT column_name::text AS column_name,
       data_type::text AS data_type,
       udt_name::text AS udt_name,
       (is_nullable = 'YES') AS nullable,
       (column_default IS NOT NULL OR is_identity = 'YES' OR is_generated = 'ALWAYS') AS has_default,
       character_maximum_length::int4 AS max_length
FROM information_schema.columns
WHERE table_schema = $1 AND table_name = $2
ORDER BY ordinal_position
"#;

const PG_PRIMARY_KEYS: &str = r#"
SELECT kcu.column_name::text AS column_name
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON tc.constraint_name = kcu.constraint_name
 AND tc.table_schema = kcu.table_schema
 AND tc.table_name = kcu.table_name
WHERE tc.constraint_type = 'PRIMARY KEY'
  AND tc.table_schema = $1
  AND tc.table_name = $2
ORDER BY kcu.ordinal_position
"#;

const PG_FOREIGN_KEYS: &str = r#"
SELECT kcu.column_name::text AS column_name,
       ccu.table_name::text AS foreign_table,
       ccu.column_name::text AS foreign_column
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON tc.constraint_name = kcu.constraint_name
 AND tc.table_schema = kcu.table_schema
 AND tc.table_name = kcu.table_name
JOIN information_schema.constraint_column_usage ccu
  ON ccu.constraint_name = tc.constraint_name
 AND ccu.constraint_schema = tc.constraint_schema
WHERE tc.constraint_type = 'FOREIGN KEY'
  AND tc.table_schema = $1
  AND tc.table_name = $2
ORDER BY kcu.ordinal_position
"#;

const SQLITE_TABLES: &str = r#"
SELECT name FROM sqlite_master
WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
ORDER BY name
"#;

const SQLITE_COLUMNS: &str = r#"
SELECT name, type, "notnull", dflt_value, pk
FROM pragma_table_info(?)
ORDER BY cid
"#;

const SQLITE_FOREIGN_KEYS: &str = r#"
SELECT "from", "table", "to"
FROM pragma_foreign_key_list(?)
ORDER BY id, seq
"#;

pub async fn list_base_tables<C: ConnectionTrait>(
    conn: &C,
    namespace: &str,
) -> PersistResult<Vec<String>> {
    let backend = conn.get_database_backend();
    let stmt = match backend {
        DatabaseBackend::Postgres => {
            Statement::from_sql_and_values(backend, PG_TABLES, [namespace.into()])
        }
        DatabaseBackend::Sqlite => Statement::from_string(backend, SQLITE_TABLES),
        other => return Err(unsupported(other)),
    };
    let column = match backend {
        DatabaseBackend::Postgres => "table_name",
        _ => "name",
    };
    let rows = conn.query_all_raw(stmt).await?;
    rows.iter().map(|row| text(row, column)).collect()
}

/// Returns `None` when the table does not exist in `namespace`.
pub async fn fetch_table_schema<C: ConnectionTrait>(
    conn: &C,
    namespace: &str,
    table: &str,
) -> PersistResult<Option<TableSchema>> {
    match conn.get_database_backend() {
        DatabaseBackend::Postgres => fetch_postgres(conn, namespace, table).await,
        DatabaseBackend::Sqlite => fetch_sqlite(conn, table).await,
        other => Err(unsupported(other)),
    }
}

fn unsupported(backend: DatabaseBackend) -> PersistError {
    PersistError::storage(format!("schema introspection is not supported on {backend:?}"))
}

async fn fetch_postgres<C: ConnectionTrait>(
    conn: &C,
    namespace: &str,
    table: &str,
) -> PersistResult<Option<TableSchema>> {
    let backend = DatabaseBackend::Postgres;
    let scoped = |sql: &str| {
        Statement::from_sql_and_values(backend, sql, [namespace.into(), table.into()])
    };

    let column_rows = conn.query_all_raw(scoped(PG_COLUMNS)).await?;
    if column_rows.is_empty() {
        return Ok(None);
    }
    let primary_keys = conn
        .query_all_raw(scoped(PG_PRIMARY_KEYS))
        .await?
        .iter()
        .map(|row| text(row, "column_name"))
        .collect::<PersistResult<Vec<_>>>()?;

    let mut columns = Vec::with_capacity(column_rows.len());
    for row in &column_rows {
        let name = text(row, "column_name")?;
        let data_type = text(row, "data_type")?;
        let declared_type = if data_type.eq_ignore_ascii_case("USER-DEFINED") {
            text(row, "udt_name")?
        } else {
            data_type
        };
        let is_primary_key = primary_keys.contains(&name);
        columns.push(ColumnDescriptor {
            kind: ColumnKind::from_declared(&declared_type),
            nullable: row.try_get::<bool>("", "nullable")? && !is_primary_key,
            has_default: row.try_get::<bool>("", "has_default")?,
            max_length: row.try_get::<Option<i32>>("", "max_length")?,
            name,
            declared_type,
            is_primary_key,
        });
    }

    let mut foreign_keys: Vec<ForeignKeyDescriptor> = Vec::new();
    for row in conn.query_all_raw(scoped(PG_FOREIGN_KEYS)).await? {
        let fk = ForeignKeyDescriptor {
            column: text(&row, "column_name")?,
            foreign_table: text(&row, "foreign_table")?,
            foreign_column: text(&row, "foreign_column")?,
        };
        push_foreign_key(&mut foreign_keys, fk);
    }

    Ok(Some(TableSchema {
        table_name: table.to_string(),
        columns,
        primary_keys,
        foreign_keys,
    }))
}

async fn fetch_sqlite<C: ConnectionTrait>(
    conn: &C,
    table: &str,
) -> PersistResult<Option<TableSchema>> {
    let backend = conn.get_database_backend();
    let column_rows = conn
        .query_all_raw(Statement::from_sql_and_values(
            backend,
            SQLITE_COLUMNS,
            [table.into()],
        ))
        .await?;
    if column_rows.is_empty() {
        return Ok(None);
    }

    let mut ranked_keys: Vec<(i64, String)> = Vec::new();
    let mut columns = Vec::with_capacity(column_rows.len());
    for row in &column_rows {
        let name = text(row, "name")?;
        let declared_type = row.try_get::<Option<String>>("", "type")?.unwrap_or_default();
        let not_null = row.try_get::<i64>("", "notnull")? != 0;
        let default = row.try_get::<Option<String>>("", "dflt_value")?;
        let pk_rank = row.try_get::<i64>("", "pk")?;
        if pk_rank > 0 {
            ranked_keys.push((pk_rank, name.clone()));
        }
        columns.push(ColumnDescriptor {
            kind: ColumnKind::from_declared(&declared_type),
            nullable: !not_null && pk_rank == 0,
            has_default: default.is_some(),
            max_length: parse_max_length(&declared_type),
            is_primary_key: pk_rank > 0,
            name,
            declared_type,
        });
    }
    ranked_keys.sort();
    let primary_keys: Vec<String> = ranked_keys.into_iter().map(|(_, name)| name).collect();

    // A lone INTEGER PRIMARY KEY aliases the rowid and is assigned by SQLite.
    if let [key] = primary_keys.as_slice()
        && let Some(column) = columns.iter_mut().find(|column| &column.name == key)
        && column.declared_type.eq_ignore_ascii_case("integer")
    {
        column.has_default = true;
    }

    let mut foreign_keys: Vec<ForeignKeyDescriptor> = Vec::new();
    let fk_rows = conn
        .query_all_raw(Statement::from_sql_and_values(
            backend,
            SQLITE_FOREIGN_KEYS,
            [table.into()],
        ))
        .await?;
    for row in fk_rows {
        let column = text(&row, "from")?;
        let foreign_table = text(&row, "table")?;
        let foreign_column = match row.try_get::<Option<String>>("", "to")? {
            Some(column) => column,
            None => match sqlite_primary_key(conn, &foreign_table).await? {
                Some(column) => column,
                None => {
                    log::warn!(
                        "persist: skipping foreign key {table}.{column}: {foreign_table} has no primary key"
                    );
                    continue;
                }
            },
        };
        let fk = ForeignKeyDescriptor {
            column,
            foreign_table,
            foreign_column,
        };
        push_foreign_key(&mut foreign_keys, fk);
    }

    Ok(Some(TableSchema {
        table_name: table.to_string(),
        columns,
        primary_keys,
        foreign_keys,
    }))
}

async fn sqlite_primary_key<C: ConnectionTrait>(
    conn: &C,
    table: &str,
) -> PersistResult<Option<String>> {
    let backend = conn.get_database_backend();
    let rows = conn
        .query_all_raw(Statement::from_sql_and_values(
            backend,
            SQLITE_COLUMNS,
            [table.into()],
        ))
        .await?;
    for row in rows {
        if row.try_get::<i64>("", "pk")? == 1 {
            return text(&row, "name").map(Some);
        }
    }
    Ok(None)
}

// Composite foreign keys surface one row per column pair; the first mapping for a column wins.
fn push_foreign_key(foreign_keys: &mut Vec<ForeignKeyDescriptor>, fk: ForeignKeyDescriptor) {
    if foreign_keys.iter().all(|existing| existing.column != fk.column) {
        foreign_keys.push(fk);
    }
}

fn text(row: &QueryResult, column: &str) -> PersistResult<String> {
    row.try_get::<String>("", column)
        .map_err(|err| PersistError::storage(format!("read {column}: {err}")))
}

/// Length bound declared as `VARCHAR(255)` or `CHARACTER VARYING(40)`.
pub fn parse_max_length(declared: &str) -> Option<i32> {
    let lowered = declared.to_ascii_lowercase();
    if !lowered.contains("char") {
        return None;
    }
    let open = lowered.find('(')?;
    let close = lowered[open..].find(')')? + open;
    lowered[open + 1..close].trim().parse().ok()
}
