use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use sea_orm::DatabaseConnection;

use pmt_persist_core::{
    CatalogReport, ForeignKeyDescriptor, PersistResult, RelationshipMap, TableSchema,
};

use crate::introspect::{fetch_table_schema, list_base_tables};

/// Immutable view of every cached table plus the relationships derived from them.
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    tables: HashMap<String, Arc<TableSchema>>,
    relationships: RelationshipMap,
}

impl CatalogSnapshot {
    pub fn from_tables(tables: HashMap<String, Arc<TableSchema>>) -> Self {
        let relationships = RelationshipMap::from_schemas(tables.values().map(Arc::as_ref));
        Self {
            tables,
            relationships,
        }
    }

    /// Copy of this snapshot with `schema` added or replaced.
    pub fn with_table(&self, schema: Arc<TableSchema>) -> Self {
        let mut tables = self.tables.clone();
        tables.insert(schema.table_name.clone(), schema);
        Self::from_tables(tables)
    }

    pub fn table(&self, name: &str) -> Option<&Arc<TableSchema>> {
        self.tables.get(name)
    }

    pub fn relationships(&self) -> &RelationshipMap {
        &self.relationships
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Cache of live table metadata.
///
/// Readers load the current snapshot without locking. A full reload builds a new snapshot
/// and swaps it in; a lazy miss copies the snapshot with the one new table.
pub struct SchemaCatalog {
    conn: DatabaseConnection,
    namespace: String,
    snapshot: ArcSwap<CatalogSnapshot>,
}

impl SchemaCatalog {
    pub fn new(conn: DatabaseConnection, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
            snapshot: ArcSwap::from_pointee(CatalogSnapshot::default()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.load_full()
    }

    /// Introspects every base table and replaces the snapshot.
    ///
    /// Listing the tables must succeed; a table whose metadata cannot be read is logged and
    /// left out of the new snapshot.
    pub async fn cache_all(&self) -> PersistResult<CatalogReport> {
        let names = list_base_tables(&self.conn, &self.namespace).await?;
        let mut fetched = Vec::with_capacity(names.len());
        for name in names {
            let result = fetch_table_schema(&self.conn, &self.namespace, &name).await;
            fetched.push((name, result));
        }
        let (snapshot, report) = build_snapshot(fetched);
        log::info!(
            "persist: cached {} tables ({} relationships, {} skipped)",
            report.cached,
            snapshot.relationships().len(),
            report.skipped.len()
        );
        self.snapshot.store(Arc::new(snapshot));
        Ok(report)
    }

    /// Cached schema for `table`, fetched and cached on first miss.
    ///
    /// `Ok(None)` means the table does not exist.
    pub async fn get(&self, table: &str) -> PersistResult<Option<Arc<TableSchema>>> {
        if let Some(schema) = self.snapshot.load().table(table) {
            return Ok(Some(schema.clone()));
        }
        let Some(schema) = fetch_table_schema(&self.conn, &self.namespace, table).await? else {
            return Ok(None);
        };
        let schema = Arc::new(schema);
        log::debug!("persist: lazily cached schema for {table}");
        self.snapshot
            .rcu(|current| Arc::new(current.with_table(schema.clone())));
        Ok(Some(schema))
    }

    pub fn relationship(&self, table: &str, column: &str) -> Option<ForeignKeyDescriptor> {
        self.snapshot
            .load()
            .relationships()
            .get(table, column)
            .cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.snapshot.load().table_names()
    }
}

/// Keeps every table whose metadata was read; the rest are named in the report.
fn build_snapshot(
    fetched: Vec<(String, PersistResult<Option<TableSchema>>)>,
) -> (CatalogSnapshot, CatalogReport) {
    let mut tables = HashMap::with_capacity(fetched.len());
    let mut skipped = Vec::new();
    for (name, result) in fetched {
        match result {
            Ok(Some(schema)) => {
                tables.insert(name, Arc::new(schema));
            }
            Ok(None) => {
                log::warn!("persist: table {name} disappeared during schema caching");
                skipped.push(name);
            }
            Err(err) => {
                log::warn!("persist: skipping table {name} during schema caching: {err}");
                skipped.push(name);
            }
        }
    }
    let snapshot = CatalogSnapshot::from_tables(tables);
    let report = CatalogReport {
        cached: snapshot.len(),
        skipped,
    };
    (snapshot, report)
}
