use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Asterisk, Expr, ExprTrait, Order, Query};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use pmt_persist_core::api::{
    CatalogApi, CatalogReport, ListRowsInput, RawRecord, Record, RecordReadApi, RecordWriteApi,
};
use pmt_persist_core::{
    ColumnDescriptor, ColumnKind, FieldValue, Operation, PersistError, PersistResult,
    ResolutionContext, TableSchema,
};

use crate::aliases::ColumnAliases;
use crate::catalog::SchemaCatalog;
use crate::resolver::{ReferenceResolver, StrategyRegistry};
use crate::sql::{query_all, query_one, row_to_record, sea_value};
use crate::statement::{ResolvedRecord, StatementBuilder};
use crate::config::load_or_init_config;
use crate::{DatabaseConfig, PersistConfig};

/// Schema-aware persistence over one connection pool.
///
/// Cloning is cheap; clones share the pool, the schema catalog and the resolver.
#[derive(Clone)]
pub struct PersistStore {
    conn: DatabaseConnection,
    backend: DatabaseBackend,
    catalog: Arc<SchemaCatalog>,
    resolver: Arc<ReferenceResolver>,
    builder: StatementBuilder,
    aliases: Arc<ColumnAliases>,
}

impl PersistStore {
    pub async fn connect(config: &PersistConfig, base_dir: &Path) -> PersistResult<Self> {
        Self::connect_with_strategies(config, base_dir, StrategyRegistry::with_defaults()).await
    }

    /// Connects, warms the schema catalog and resolves references with `strategies`.
    pub async fn connect_with_strategies(
        config: &PersistConfig,
        base_dir: &Path,
        strategies: StrategyRegistry,
    ) -> PersistResult<Self> {
        let url = build_connection_url(config, base_dir)?;
        let mut options = ConnectOptions::new(url);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        options.sqlx_logging(false);
        let conn = Database::connect(options).await.map_err(PersistError::from)?;
        let backend = conn.get_database_backend();

        let catalog = Arc::new(SchemaCatalog::new(conn.clone(), config.namespace()));
        let report = catalog.cache_all().await?;
        if !report.skipped.is_empty() {
            log::warn!(
                "persist: schema warm-up skipped {} tables: {}",
                report.skipped.len(),
                report.skipped.join(", ")
            );
        }
        let resolver = Arc::new(ReferenceResolver::new(
            conn.clone(),
            catalog.clone(),
            strategies,
            config.admin_fallback(),
        ));
        let aliases = Arc::new(ColumnAliases::new(
            config.column_aliases.clone().unwrap_or_default(),
        ));
        Ok(Self {
            conn,
            backend,
            catalog,
            resolver,
            builder: StatementBuilder::new(backend),
            aliases,
        })
    }

    pub async fn connect_sqlite(path: &Path) -> PersistResult<Self> {
        let config = PersistConfig::default_sqlite(path.to_string_lossy());
        Self::connect(&config, path.parent().unwrap_or_else(|| Path::new("."))).await
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    async fn require_schema(&self, table: &str) -> PersistResult<Arc<TableSchema>> {
        self.catalog
            .get(table)
            .await?
            .ok_or_else(|| PersistError::table_not_found(table))
    }

    /// Maps aliases, drops unknown and null fields, resolves foreign keys and coerces the rest.
    async fn prepare_record(
        &self,
        schema: &TableSchema,
        data: RawRecord,
        context: &ResolutionContext,
    ) -> PersistResult<ResolvedRecord> {
        let table = schema.table_name.as_str();
        let mut record = ResolvedRecord::new(table);
        for (key, value) in data {
            let column = self.aliases.resolve(schema, &key);
            let Some(descriptor) = schema.column(&column) else {
                log::warn!("persist: dropping unknown column {key} for {table}");
                continue;
            };
            if matches!(value, JsonValue::Null) {
                continue;
            }
            if self.catalog.relationship(table, &column).is_some() {
                match self
                    .resolver
                    .resolve(table, &column, &value, context)
                    .await?
                {
                    Some(resolved) => record.insert(column, resolved),
                    None => log::debug!("persist: omitting unresolved {table}.{column}"),
                }
                continue;
            }
            record.insert(column, descriptor.kind.coerce(value));
        }
        Ok(record)
    }

    async fn insert_record(
        &self,
        table: &str,
        data: RawRecord,
        context: &ResolutionContext,
    ) -> PersistResult<Record> {
        let schema = self.require_schema(table).await?;
        let record = self.prepare_record(&schema, data, context).await?;
        let stmt = self.builder.build_insert(&schema, record)?;
        let row = self
            .conn
            .query_one_raw(stmt)
            .await?
            .ok_or_else(|| PersistError::storage(format!("insert into {table} returned no row")))?;
        row_to_record(&row)
    }

    async fn update_record(
        &self,
        table: &str,
        record_id: &str,
        data: RawRecord,
        context: &ResolutionContext,
    ) -> PersistResult<Record> {
        let schema = self.require_schema(table).await?;
        let key = primary_key(&schema)?;
        let id = parse_record_id(key, record_id)?;
        let record = self.prepare_record(&schema, data, context).await?;
        let stmt = self.builder.build_update(&schema, id, record)?;
        let row = self
            .conn
            .query_one_raw(stmt)
            .await?
            .ok_or_else(|| PersistError::record_not_found(table, record_id))?;
        row_to_record(&row)
    }
}

#[async_trait]
impl RecordWriteApi for PersistStore {
    async fn smart_insert(
        &self,
        table: &str,
        data: RawRecord,
        context: &ResolutionContext,
    ) -> PersistResult<Record> {
        let result = self.insert_record(table, data, context).await;
        if let Err(err) = &result {
            log_failure(table, Operation::Insert, err);
        }
        result
    }

    async fn smart_update(
        &self,
        table: &str,
        record_id: &str,
        data: RawRecord,
        context: &ResolutionContext,
    ) -> PersistResult<Record> {
        let result = self.update_record(table, record_id, data, context).await;
        if let Err(err) = &result {
            log_failure(table, Operation::Update, err);
        }
        result
    }
}

#[async_trait]
impl RecordReadApi for PersistStore {
    async fn find_by_primary_key(&self, table: &str, id: &str) -> PersistResult<Option<Record>> {
        let schema = self.require_schema(table).await?;
        let key = primary_key(&schema)?;
        let id = parse_record_id(key, id)?;
        let select = Query::select()
            .column(Asterisk)
            .from(Alias::new(table))
            .and_where(Expr::col(Alias::new(key.name.as_str())).eq(sea_value(
                self.backend,
                key.kind,
                &id,
            )))
            .limit(1)
            .to_owned();
        match query_one(&self.conn, &select).await? {
            Some(row) => row_to_record(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_rows(&self, table: &str, input: ListRowsInput) -> PersistResult<Vec<Record>> {
        let schema = self.require_schema(table).await?;
        let mut select = Query::select();
        select
            .column(Asterisk)
            .from(Alias::new(table))
            .limit(input.limit)
            .offset(input.offset);
        if let Some(key) = schema.primary_key() {
            select.order_by(Alias::new(key.name.as_str()), Order::Desc);
        }
        let rows = query_all(&self.conn, &select).await?;
        rows.iter().map(row_to_record).collect()
    }
}

#[async_trait]
impl CatalogApi for PersistStore {
    async fn table_names(&self) -> PersistResult<Vec<String>> {
        Ok(self.catalog.table_names())
    }

    async fn table_schema(&self, table: &str) -> PersistResult<Option<Arc<TableSchema>>> {
        self.catalog.get(table).await
    }

    async fn reload_schema(&self) -> PersistResult<CatalogReport> {
        self.catalog.cache_all().await
    }
}

fn primary_key(schema: &TableSchema) -> PersistResult<&ColumnDescriptor> {
    schema.primary_key().ok_or_else(|| {
        PersistError::invalid(format!("table {} has no primary key", schema.table_name))
    })
}

fn parse_record_id(key: &ColumnDescriptor, raw: &str) -> PersistResult<FieldValue> {
    let raw = raw.trim();
    match key.kind {
        ColumnKind::Uuid => Uuid::parse_str(raw).map(FieldValue::Uuid).map_err(|_| {
            PersistError::invalid(format!("{} expects a uuid, got {raw:?}", key.name))
        }),
        ColumnKind::Integer => raw.parse::<i64>().map(FieldValue::Integer).map_err(|_| {
            PersistError::invalid(format!("{} expects an integer, got {raw:?}", key.name))
        }),
        kind => Ok(kind.coerce(JsonValue::String(raw.to_string()))),
    }
}

fn log_failure(table: &str, operation: Operation, err: &PersistError) {
    if err.is_client_error() {
        log::warn!("persist: {operation} on {table} rejected: {err}");
    } else {
        log::error!("persist: {operation} on {table} failed: {err}");
    }
}

/// Opens the store configured in `base`, writing a SQLite default on first use.
pub async fn open_store(base: &Path) -> PersistResult<PersistStore> {
    let config = load_or_init_config(base)?;
    let store = PersistStore::connect(&config, base).await?;
    log::info!(
        "persist: opened {} store with {} tables",
        config.backend_name(),
        store.catalog.table_names().len()
    );
    Ok(store)
}

fn build_connection_url(config: &PersistConfig, base_dir: &Path) -> PersistResult<String> {
    match &config.database {
        DatabaseConfig::Sqlite { .. } => {
            let path = config.sqlite_path(base_dir)?;
            Ok(format!("sqlite://{}?mode=rwc", path.display()))
        }
        DatabaseConfig::Postgres { url } => Ok(url.clone()),
    }
}
