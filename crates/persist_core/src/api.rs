use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{PersistResult, ResolutionContext, TableSchema};

/// Untyped field map handed in by the request layer.
pub type RawRecord = Map<String, JsonValue>;

/// A persisted row, one entry per returned column.
pub type Record = Map<String, JsonValue>;

#[async_trait]
pub trait RecordWriteApi {
    /// Resolves references in `data`, fills generated keys and inserts one row into `table`.
    async fn smart_insert(
        &self,
        table: &str,
        data: RawRecord,
        context: &ResolutionContext,
    ) -> PersistResult<Record>;

    /// Same resolution pipeline as `smart_insert`, applied to the row whose primary key is `record_id`.
    async fn smart_update(
        &self,
        table: &str,
        record_id: &str,
        data: RawRecord,
        context: &ResolutionContext,
    ) -> PersistResult<Record>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRowsInput {
    pub limit: u64,
    pub offset: u64,
}

impl Default for ListRowsInput {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

#[async_trait]
pub trait RecordReadApi {
    async fn find_by_primary_key(&self, table: &str, id: &str) -> PersistResult<Option<Record>>;

    /// Rows ordered by primary key, newest key first.
    async fn list_rows(&self, table: &str, input: ListRowsInput) -> PersistResult<Vec<Record>>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogReport {
    pub cached: usize,
    pub skipped: Vec<String>,
}

#[async_trait]
pub trait CatalogApi {
    async fn table_names(&self) -> PersistResult<Vec<String>>;
    async fn table_schema(&self, table: &str) -> PersistResult<Option<Arc<TableSchema>>>;
    async fn reload_schema(&self) -> PersistResult<CatalogReport>;
}
