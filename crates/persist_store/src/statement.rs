use sea_orm::sea_query::{Alias, Expr, ExprTrait, Query, SimpleExpr};
use sea_orm::{DatabaseBackend, Statement};
use uuid::Uuid;

use pmt_persist_core::{
    ColumnKind, FieldValue, Operation, PersistError, PersistResult, TableSchema,
};

use crate::sql::{sea_value, statement};

const UPDATED_AT: &str = "updated_at";

/// Column values that survived alias mapping, reference resolution and coercion.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRecord {
    pub table: String,
    values: Vec<(String, FieldValue)>,
}

impl ResolvedRecord {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    /// Sets `column`, replacing an earlier value for the same column.
    pub fn insert(&mut self, column: impl Into<String>, value: FieldValue) {
        let column = column.into();
        match self.values.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Renders resolved records as parameterized `INSERT` / `UPDATE ... RETURNING *` statements.
#[derive(Clone, Copy, Debug)]
pub struct StatementBuilder {
    backend: DatabaseBackend,
}

impl StatementBuilder {
    pub fn new(backend: DatabaseBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    pub fn build_insert(
        &self,
        schema: &TableSchema,
        mut record: ResolvedRecord,
    ) -> PersistResult<Statement> {
        if record.is_empty() {
            return Err(PersistError::no_valid_columns(
                &schema.table_name,
                Operation::Insert,
            ));
        }
        for key in &schema.primary_keys {
            if record.contains(key) {
                continue;
            }
            if schema
                .column(key)
                .is_some_and(|column| column.kind == ColumnKind::Uuid)
            {
                record.insert(key.clone(), FieldValue::Uuid(Uuid::new_v4()));
            }
        }
        let bound = self.bind(schema, record)?;

        let mut insert = Query::insert();
        insert
            .into_table(Alias::new(schema.table_name.as_str()))
            .columns(bound.iter().map(|(column, _)| Alias::new(column.as_str())))
            .values(bound.into_iter().map(|(_, value)| value))
            .map_err(|err| PersistError::storage(err.to_string()))?
            .returning_all();
        Ok(statement(self.backend, &insert))
    }

    /// `record_id` must already be coerced to the primary key's type.
    pub fn build_update(
        &self,
        schema: &TableSchema,
        record_id: FieldValue,
        record: ResolvedRecord,
    ) -> PersistResult<Statement> {
        if record.is_empty() {
            return Err(PersistError::no_valid_columns(
                &schema.table_name,
                Operation::Update,
            ));
        }
        let Some(primary_key) = schema.primary_key() else {
            return Err(PersistError::invalid(format!(
                "table {} has no primary key to update by",
                schema.table_name
            )));
        };
        let touch_updated_at =
            schema.has_column(UPDATED_AT) && !record.contains(UPDATED_AT);
        let bound = self.bind(schema, record)?;

        let mut assignments: Vec<(Alias, SimpleExpr)> = bound
            .into_iter()
            .map(|(column, value)| (Alias::new(column.as_str()), value))
            .collect();
        if touch_updated_at {
            assignments.push((Alias::new(UPDATED_AT), Expr::current_timestamp().into()));
        }

        let key_value = sea_value(self.backend, primary_key.kind, &record_id);
        let mut update = Query::update();
        update
            .table(Alias::new(schema.table_name.as_str()))
            .values(assignments)
            .and_where(Expr::col(Alias::new(primary_key.name.as_str())).eq(key_value))
            .returning_all();
        Ok(statement(self.backend, &update))
    }

    // Identifiers only ever come from the live schema; anything else is rejected here.
    fn bind(
        &self,
        schema: &TableSchema,
        record: ResolvedRecord,
    ) -> PersistResult<Vec<(String, SimpleExpr)>> {
        let mut ordered = Vec::with_capacity(record.len());
        for (column, value) in record.values {
            let Some(position) = schema.column_position(&column) else {
                return Err(PersistError::invalid(format!(
                    "unknown column {column} for table {}",
                    schema.table_name
                )));
            };
            let kind = schema.columns[position].kind;
            ordered.push((position, column, sea_value(self.backend, kind, &value).into()));
        }
        ordered.sort_by_key(|(position, _, _)| *position);
        Ok(ordered
            .into_iter()
            .map(|(_, column, value)| (column, value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{ResolvedRecord, StatementBuilder};
    use pmt_persist_core::{
        ColumnDescriptor, ColumnKind, FieldValue, Operation, PersistError, TableSchema,
    };
    use sea_orm::DatabaseBackend;
    use uuid::Uuid;

    fn column(name: &str, kind: ColumnKind, pk: bool) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            declared_type: format!("{kind:?}").to_lowercase(),
            kind,
            nullable: !pk,
            has_default: false,
            max_length: None,
            is_primary_key: pk,
        }
    }

    fn projects() -> TableSchema {
        TableSchema {
            table_name: "projects".to_string(),
            columns: vec![
                column("project_id", ColumnKind::Uuid, true),
                column("name", ColumnKind::Text, false),
                column("owner_id", ColumnKind::Uuid, false),
                column("metadata", ColumnKind::Json, false),
                column("updated_at", ColumnKind::Timestamp, false),
            ],
            primary_keys: vec!["project_id".to_string()],
            foreign_keys: vec![],
        }
    }

    fn postgres() -> StatementBuilder {
        StatementBuilder::new(DatabaseBackend::Postgres)
    }

    #[test]
    fn resolved_record_replaces_duplicate_columns() {
        let mut record = ResolvedRecord::new("projects");
        record.insert("name", FieldValue::Text("a".to_string()));
        record.insert("name", FieldValue::Text("b".to_string()));
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("name"), Some(&FieldValue::Text("b".to_string())));
    }

    #[test]
    fn insert_generates_uuid_key_and_orders_by_schema_position() {
        let mut record = ResolvedRecord::new("projects");
        record.insert("owner_id", FieldValue::Uuid(Uuid::new_v4()));
        record.insert("name", FieldValue::Text("Demo".to_string()));
        let stmt = postgres().build_insert(&projects(), record).expect("insert");
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "projects" ("project_id", "name", "owner_id") VALUES ($1, $2, $3) RETURNING *"#
        );
        let values = stmt.values.expect("bound values").0;
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn insert_keeps_caller_supplied_key() {
        let id = Uuid::new_v4();
        let mut record = ResolvedRecord::new("projects");
        record.insert("project_id", FieldValue::Uuid(id));
        record.insert("name", FieldValue::Text("Demo".to_string()));
        let stmt = postgres().build_insert(&projects(), record).expect("insert");
        let values = stmt.values.expect("bound values").0;
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], id.into());
    }

    #[test]
    fn empty_record_is_rejected_before_key_generation() {
        let err = postgres()
            .build_insert(&projects(), ResolvedRecord::new("projects"))
            .expect_err("empty insert");
        assert!(matches!(
            err,
            PersistError::NoValidColumns {
                operation: Operation::Insert,
                ..
            }
        ));
        let err = postgres()
            .build_update(
                &projects(),
                FieldValue::Uuid(Uuid::new_v4()),
                ResolvedRecord::new("projects"),
            )
            .expect_err("empty update");
        assert!(matches!(
            err,
            PersistError::NoValidColumns {
                operation: Operation::Update,
                ..
            }
        ));
    }

    #[test]
    fn update_touches_updated_at_and_keys_by_primary_key() {
        let mut record = ResolvedRecord::new("projects");
        record.insert("name", FieldValue::Text("Renamed".to_string()));
        record.insert("owner_id", FieldValue::Null);
        let stmt = postgres()
            .build_update(&projects(), FieldValue::Uuid(Uuid::new_v4()), record)
            .expect("update");
        assert!(stmt.sql.starts_with(r#"UPDATE "projects" SET "name" = $1, "owner_id" = $2"#));
        assert!(stmt.sql.contains(r#""updated_at" = CURRENT_TIMESTAMP"#));
        assert!(stmt.sql.contains(r#"WHERE "project_id" = $3"#));
        assert!(stmt.sql.ends_with("RETURNING *"));
    }

    #[test]
    fn update_without_updated_at_column_does_not_touch_it() {
        let mut schema = projects();
        schema.columns.retain(|column| column.name != "updated_at");
        let mut record = ResolvedRecord::new("projects");
        record.insert("name", FieldValue::Text("Renamed".to_string()));
        let stmt = postgres()
            .build_update(&schema, FieldValue::Uuid(Uuid::new_v4()), record)
            .expect("update");
        assert!(!stmt.sql.contains("updated_at"));
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let mut record = ResolvedRecord::new("projects");
        record.insert("name; DROP TABLE projects", FieldValue::Text("x".to_string()));
        let err = postgres()
            .build_insert(&projects(), record)
            .expect_err("unknown column");
        assert!(matches!(err, PersistError::InvalidInput { .. }));
    }

    #[test]
    fn sqlite_uses_question_mark_placeholders() {
        let mut record = ResolvedRecord::new("projects");
        record.insert("name", FieldValue::Text("Demo".to_string()));
        let stmt = StatementBuilder::new(DatabaseBackend::Sqlite)
            .build_insert(&projects(), record)
            .expect("insert");
        assert!(stmt.sql.contains("VALUES (?, ?)"));
        assert!(stmt.sql.ends_with("RETURNING *"));
    }
}
