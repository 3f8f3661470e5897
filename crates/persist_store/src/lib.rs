pub mod aliases;
pub mod catalog;
pub mod config;
mod db;
mod introspect;
pub mod resolver;
mod sql;
pub mod statement;
pub mod store;

pub mod api {
    pub use pmt_persist_core::api::*;
}

pub mod schema {
    pub use pmt_persist_core::schema::*;
}

pub mod value {
    pub use pmt_persist_core::value::*;
}

pub use aliases::ColumnAliases;
pub use catalog::{CatalogSnapshot, SchemaCatalog};
pub use config::{
    AdminFallbackConfig, CatalogConfig, DatabaseConfig, PersistConfig, PoolConfig,
    default_sqlite_path, load_or_init_config,
};
pub use pmt_persist_core::*;
pub use resolver::{Lookup, ReferenceResolver, ResolutionStrategy, StrategyRegistry};
pub use statement::{ResolvedRecord, StatementBuilder};
pub use store::{PersistStore, open_store};
