use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ColumnKind;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub has_default: bool,
    pub max_length: Option<i32>,
    pub is_primary_key: bool,
}

impl ColumnDescriptor {
    /// NOT NULL without a default: the caller has to supply it.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.has_default
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// The first primary-key column, which is the row identifier for updates and reads.
    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.primary_keys
            .first()
            .and_then(|name| self.column(name))
    }

    pub fn foreign_key(&self, column: &str) -> Option<&ForeignKeyDescriptor> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    pub fn required_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|column| column.is_required())
            .map(|column| column.name.as_str())
            .collect()
    }

    pub fn optional_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|column| !column.is_required())
            .map(|column| column.name.as_str())
            .collect()
    }
}

/// table -> column -> foreign key, derived from a set of table schemas.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelationshipMap {
    tables: HashMap<String, HashMap<String, ForeignKeyDescriptor>>,
}

impl RelationshipMap {
    pub fn from_schemas<'a>(schemas: impl IntoIterator<Item = &'a TableSchema>) -> Self {
        let mut tables: HashMap<String, HashMap<String, ForeignKeyDescriptor>> = HashMap::new();
        for schema in schemas {
            for fk in &schema.foreign_keys {
                tables
                    .entry(schema.table_name.clone())
                    .or_default()
                    .insert(fk.column.clone(), fk.clone());
            }
        }
        Self { tables }
    }

    pub fn get(&self, table: &str, column: &str) -> Option<&ForeignKeyDescriptor> {
        self.tables.get(table).and_then(|columns| columns.get(column))
    }

    pub fn for_table(&self, table: &str) -> Option<&HashMap<String, ForeignKeyDescriptor>> {
        self.tables.get(table)
    }

    /// Number of foreign-key relationships across all tables.
    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, kind: ColumnKind, nullable: bool, has_default: bool) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            declared_type: format!("{kind:?}").to_lowercase(),
            kind,
            nullable,
            has_default,
            max_length: None,
            is_primary_key: false,
        }
    }

    fn tasks() -> TableSchema {
        let mut task_id = column("task_id", ColumnKind::Uuid, false, false);
        task_id.is_primary_key = true;
        TableSchema {
            table_name: "tasks".to_string(),
            columns: vec![
                task_id,
                column("title", ColumnKind::Text, false, false),
                column("project_id", ColumnKind::Uuid, true, false),
                column("assignee_id", ColumnKind::Uuid, true, false),
                column("created_at", ColumnKind::Timestamp, false, true),
            ],
            primary_keys: vec!["task_id".to_string()],
            foreign_keys: vec![
                ForeignKeyDescriptor {
                    column: "project_id".to_string(),
                    foreign_table: "projects".to_string(),
                    foreign_column: "project_id".to_string(),
                },
                ForeignKeyDescriptor {
                    column: "assignee_id".to_string(),
                    foreign_table: "users".to_string(),
                    foreign_column: "user_id".to_string(),
                },
            ],
        }
    }

    #[test]
    fn relationship_map_indexes_every_foreign_key() {
        let tasks = tasks();
        let users = TableSchema {
            table_name: "users".to_string(),
            columns: vec![column("user_id", ColumnKind::Uuid, false, false)],
            primary_keys: vec!["user_id".to_string()],
            foreign_keys: vec![],
        };
        let map = RelationshipMap::from_schemas([&tasks, &users]);
        assert_eq!(map.len(), 2);
        let fk = map.get("tasks", "assignee_id").expect("assignee fk");
        assert_eq!(fk.foreign_table, "users");
        assert_eq!(fk.foreign_column, "user_id");
        assert!(map.get("tasks", "title").is_none());
        assert!(map.for_table("users").is_none());
    }

    #[test]
    fn empty_map_reports_empty() {
        let map = RelationshipMap::from_schemas(std::iter::empty());
        assert!(map.is_empty());
    }

    #[test]
    fn splits_required_and_optional_columns() {
        let tasks = tasks();
        assert_eq!(tasks.required_columns(), vec!["task_id", "title"]);
        assert_eq!(
            tasks.optional_columns(),
            vec!["project_id", "assignee_id", "created_at"]
        );
    }

    #[test]
    fn primary_key_lookup_uses_first_key_column() {
        let tasks = tasks();
        assert_eq!(tasks.primary_key().map(|c| c.name.as_str()), Some("task_id"));
        assert_eq!(tasks.column_position("project_id"), Some(2));
        assert!(tasks.foreign_key("project_id").is_some());
    }
}
