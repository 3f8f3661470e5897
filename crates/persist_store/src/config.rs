use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pmt_persist_core::{PersistError, PersistResult};

const DEFAULT_CONFIG_NAME: &str = "persist.json";
const DEFAULT_NAMESPACE: &str = "public";
const DEFAULT_DB_NAME: &str = "pmt.sqlite";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Postgres schema whose base tables are introspected.
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminFallbackConfig {
    pub default_email: Option<String>,
    pub default_first_name: Option<String>,
    pub default_last_name: Option<String>,
    pub default_role: Option<String>,
    pub created_role: Option<String>,
    pub placeholder_password: Option<String>,
}

impl AdminFallbackConfig {
    pub fn with_defaults() -> Self {
        Self {
            default_email: Some("admin@system.local".to_string()),
            default_first_name: Some("System".to_string()),
            default_last_name: Some("Admin".to_string()),
            default_role: Some("super_admin".to_string()),
            created_role: Some("admin".to_string()),
            placeholder_password: Some("!unset".to_string()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    pub catalog: Option<CatalogConfig>,
    pub column_aliases: Option<HashMap<String, HashMap<String, String>>>,
    pub admin_fallback: Option<AdminFallbackConfig>,
}

impl PersistConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            catalog: None,
            column_aliases: None,
            admin_fallback: Some(AdminFallbackConfig::with_defaults()),
        }
    }

    pub fn postgres(url: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Postgres { url: url.into() },
            pool: None,
            catalog: Some(CatalogConfig {
                namespace: Some(DEFAULT_NAMESPACE.to_string()),
            }),
            column_aliases: None,
            admin_fallback: Some(AdminFallbackConfig::with_defaults()),
        }
    }

    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> PersistResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| PersistError::storage(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| PersistError::storage(format!("read config: {err}")))?;
            let config: PersistConfig =
                serde_json::from_str(&raw).map_err(|err| PersistError::invalid(err.to_string()))?;
            return Ok(config);
        }
        let default = PersistConfig::default_sqlite(default_sqlite_path.to_string_lossy());
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| PersistError::storage(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| PersistError::storage(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> PersistResult<PathBuf> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let path = path.clone().unwrap_or_else(|| DEFAULT_DB_NAME.to_string());
                let candidate = PathBuf::from(path);
                if candidate.is_absolute() {
                    Ok(candidate)
                } else {
                    Ok(base_dir.join(candidate))
                }
            }
            _ => Err(PersistError::invalid("config is not sqlite backend")),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            DatabaseConfig::Sqlite { .. } => "sqlite",
            DatabaseConfig::Postgres { .. } => "postgres",
        }
    }

    pub fn connection_url(&self) -> Option<&str> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => None,
            DatabaseConfig::Postgres { url } => Some(url.as_str()),
        }
    }

    pub fn namespace(&self) -> &str {
        self.catalog
            .as_ref()
            .and_then(|catalog| catalog.namespace.as_deref())
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn admin_fallback(&self) -> AdminFallbackConfig {
        let defaults = AdminFallbackConfig::with_defaults();
        let Some(configured) = self.admin_fallback.clone() else {
            return defaults;
        };
        AdminFallbackConfig {
            default_email: configured.default_email.or(defaults.default_email),
            default_first_name: configured.default_first_name.or(defaults.default_first_name),
            default_last_name: configured.default_last_name.or(defaults.default_last_name),
            default_role: configured.default_role.or(defaults.default_role),
            created_role: configured.created_role.or(defaults.created_role),
            placeholder_password: configured
                .placeholder_password
                .or(defaults.placeholder_password),
        }
    }
}

/// `persist.json` under `base`, created on first use with a SQLite database beside it.
pub fn load_or_init_config(base: &Path) -> PersistResult<PersistConfig> {
    PersistConfig::load_or_init(base, &default_sqlite_path(base))
}

pub fn default_sqlite_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_DB_NAME)
}
