use std::collections::HashMap;

use pmt_persist_core::TableSchema;

const GENERIC_ID: &str = "id";

/// Maps caller-facing field names onto real column names.
///
/// Configured per-table aliases are consulted first. A bare `id` then maps onto the table's
/// primary key unless the table really has an `id` column.
#[derive(Clone, Debug, Default)]
pub struct ColumnAliases {
    tables: HashMap<String, HashMap<String, String>>,
}

impl ColumnAliases {
    pub fn new(tables: HashMap<String, HashMap<String, String>>) -> Self {
        Self { tables }
    }

    pub fn resolve(&self, schema: &TableSchema, key: &str) -> String {
        if let Some(column) = self
            .tables
            .get(&schema.table_name)
            .and_then(|aliases| aliases.get(key))
        {
            return column.clone();
        }
        if key == GENERIC_ID
            && !schema.has_column(GENERIC_ID)
            && let Some(pk) = schema.primary_key()
        {
            return pk.name.clone();
        }
        key.to_string()
    }
}
