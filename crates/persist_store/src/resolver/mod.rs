//! Turns loosely specified foreign-key values into verified keys of the referenced table.
//!
//! Resolution runs in fixed order: empty values resolve to nothing, values that already parse
//! as the referenced key (or as a UUID stored in a text key) are checked for existence, and anything else goes to the
//! strategy registered for the referenced table. Tables without a strategy resolve nothing.

mod admins;
mod companies;
mod projects;
mod users;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Condition, Expr, ExprTrait, Query, Value as SeaValue};
use sea_orm::{DatabaseBackend, DatabaseConnection};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use pmt_persist_core::{
    ColumnDescriptor, ColumnKind, FieldValue, PersistResult, ResolutionContext, TableSchema,
};

use crate::AdminFallbackConfig;
use crate::catalog::SchemaCatalog;
use crate::sql::{query_one, read_key, sea_value};

pub use admins::AdminStrategy;
pub use companies::CompanyStrategy;
pub use projects::ProjectStrategy;
pub use users::UserStrategy;

/// Domain rule for one referenced table.
///
/// Returning `Ok(None)` leaves the column out of the record. Errors are reserved for database
/// failures and are never folded into `None`.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    async fn resolve(
        &self,
        lookup: &Lookup<'_>,
        reference: &str,
        context: &ResolutionContext,
    ) -> PersistResult<Option<FieldValue>>;
}

/// Strategies keyed by the referenced table's name.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn ResolutionStrategy>>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("users", Arc::new(UserStrategy));
        registry.register("admins", Arc::new(AdminStrategy));
        registry.register("companies", Arc::new(CompanyStrategy));
        registry.register("projects", Arc::new(ProjectStrategy));
        registry
    }

    /// Registers `strategy` for references into `table`, replacing any earlier one.
    pub fn register(&mut self, table: impl Into<String>, strategy: Arc<dyn ResolutionStrategy>) {
        self.strategies.insert(table.into(), strategy);
    }

    pub fn get(&self, table: &str) -> Option<&Arc<dyn ResolutionStrategy>> {
        self.strategies.get(table)
    }

    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        tables.sort_unstable();
        tables
    }
}

/// Read access to the referenced table for the duration of one resolution.
pub struct Lookup<'a> {
    conn: &'a DatabaseConnection,
    catalog: &'a SchemaCatalog,
    foreign: &'a TableSchema,
    key: &'a ColumnDescriptor,
    admin: &'a AdminFallbackConfig,
}

impl<'a> Lookup<'a> {
    pub fn connection(&self) -> &'a DatabaseConnection {
        self.conn
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.conn.get_database_backend()
    }

    pub fn catalog(&self) -> &'a SchemaCatalog {
        self.catalog
    }

    /// Schema of the referenced table.
    pub fn foreign(&self) -> &'a TableSchema {
        self.foreign
    }

    /// The referenced column whose value is returned.
    pub fn key(&self) -> &'a ColumnDescriptor {
        self.key
    }

    pub fn admin_defaults(&self) -> &'a AdminFallbackConfig {
        self.admin
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.foreign.has_column(column)
    }

    /// Binds `value` for a column of the referenced table.
    pub fn bind(&self, column: &str, value: &FieldValue) -> SeaValue {
        let kind = self
            .foreign
            .column(column)
            .map(|column| column.kind)
            .unwrap_or(ColumnKind::Text);
        sea_value(self.backend(), kind, value)
    }

    /// Binds caller-supplied text after coercing it to the column's kind.
    pub fn bind_text(&self, column: &str, value: &str) -> SeaValue {
        let kind = self
            .foreign
            .column(column)
            .map(|column| column.kind)
            .unwrap_or(ColumnKind::Text);
        sea_value(
            self.backend(),
            kind,
            &kind.coerce(JsonValue::String(value.to_string())),
        )
    }

    pub async fn key_exists(&self, value: &FieldValue) -> PersistResult<bool> {
        let key = self.key.name.as_str();
        let condition = Condition::all().add(Expr::col(Alias::new(key)).eq(self.bind(key, value)));
        Ok(self.first_key(Some(condition)).await?.is_some())
    }

    /// Key of the first row matching `condition`, in the database's default order.
    pub async fn first_key(&self, condition: Option<Condition>) -> PersistResult<Option<FieldValue>> {
        let mut select = Query::select();
        select
            .column(Alias::new(self.key.name.as_str()))
            .from(Alias::new(self.foreign.table_name.as_str()))
            .limit(1);
        if let Some(condition) = condition {
            select.cond_where(condition);
        }
        let Some(row) = query_one(self.conn, &select).await? else {
            return Ok(None);
        };
        read_key(&row, &self.key.name, self.key.kind)
    }

    /// Key of the first row whose `column` equals `value`; `None` when the column does not exist.
    pub async fn first_key_matching(
        &self,
        column: &str,
        value: &str,
    ) -> PersistResult<Option<FieldValue>> {
        if !self.has_column(column) {
            log::debug!(
                "persist: {} has no {column} column to match on",
                self.foreign.table_name
            );
            return Ok(None);
        }
        let condition =
            Condition::all().add(Expr::col(Alias::new(column)).eq(self.bind_text(column, value)));
        self.first_key(Some(condition)).await
    }
}

pub struct ReferenceResolver {
    conn: DatabaseConnection,
    catalog: Arc<SchemaCatalog>,
    registry: StrategyRegistry,
    admin: AdminFallbackConfig,
}

impl ReferenceResolver {
    pub fn new(
        conn: DatabaseConnection,
        catalog: Arc<SchemaCatalog>,
        registry: StrategyRegistry,
        admin: AdminFallbackConfig,
    ) -> Self {
        Self {
            conn,
            catalog,
            registry,
            admin,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Resolves `raw` for the foreign-key column `table.column`.
    ///
    /// `Ok(None)` means the column should be left out: the value was empty, named a key
    /// that does not exist, or could not be matched by the referenced table's strategy.
    pub async fn resolve(
        &self,
        table: &str,
        column: &str,
        raw: &JsonValue,
        context: &ResolutionContext,
    ) -> PersistResult<Option<FieldValue>> {
        let Some(reference) = reference_text(raw) else {
            return Ok(None);
        };
        let Some(fk) = self.catalog.relationship(table, column) else {
            return Ok(None);
        };
        let Some(foreign) = self.catalog.get(&fk.foreign_table).await? else {
            log::warn!(
                "persist: {table}.{column} references unknown table {}",
                fk.foreign_table
            );
            return Ok(None);
        };
        let Some(key) = foreign.column(&fk.foreign_column) else {
            log::warn!(
                "persist: {table}.{column} references missing column {}.{}",
                fk.foreign_table,
                fk.foreign_column
            );
            return Ok(None);
        };
        let lookup = Lookup {
            conn: &self.conn,
            catalog: &self.catalog,
            foreign: &foreign,
            key,
            admin: &self.admin,
        };

        if let Some(direct) = direct_key(key.kind, &reference) {
            let found = lookup.key_exists(&direct).await?;
            log::debug!(
                "persist: {table}.{column} direct key into {} {}",
                fk.foreign_table,
                if found { "found" } else { "missing" }
            );
            return Ok(found.then_some(direct));
        }

        let Some(strategy) = self.registry.get(&fk.foreign_table) else {
            log::debug!(
                "persist: no strategy for {}; leaving {table}.{column} unresolved",
                fk.foreign_table
            );
            return Ok(None);
        };
        let resolved = strategy.resolve(&lookup, &reference, context).await?;
        if resolved.is_none() {
            log::debug!("persist: {table}.{column} reference {reference:?} did not resolve");
        }
        Ok(resolved)
    }
}

/// Scalar text of a raw reference; empty strings, nulls and composites carry none.
pub fn reference_text(raw: &JsonValue) -> Option<String> {
    match raw {
        JsonValue::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        JsonValue::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

// A reference already shaped like the key is checked directly instead of going to a strategy.
// Text keys holding UUIDs are matched on the reference exactly as given.
fn direct_key(kind: ColumnKind, reference: &str) -> Option<FieldValue> {
    match kind {
        ColumnKind::Uuid => Uuid::parse_str(reference).ok().map(FieldValue::Uuid),
        ColumnKind::Integer => reference.parse::<i64>().ok().map(FieldValue::Integer),
        ColumnKind::Text => Uuid::parse_str(reference)
            .ok()
            .map(|_| FieldValue::Text(reference.to_string())),
        _ => None,
    }
}
