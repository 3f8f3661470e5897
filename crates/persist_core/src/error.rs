use std::fmt;

use sea_orm::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Insert => f.write_str("insert"),
            Operation::Update => f.write_str("update"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("table not found: {table}")]
    TableNotFound { table: String },
    #[error("no valid columns to {operation} in {table}")]
    NoValidColumns { table: String, operation: Operation },
    #[error("record not found: {table} {id}")]
    RecordNotFound { table: String, id: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("constraint violation: {message}")]
    ConstraintViolation { message: String },
    #[error("connection error: {message}")]
    Connection { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl PersistError {
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    pub fn no_valid_columns(table: impl Into<String>, operation: Operation) -> Self {
        Self::NoValidColumns {
            table: table.into(),
            operation,
        }
    }

    pub fn record_not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// True for errors caused by the request rather than the database.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::TableNotFound { .. }
                | Self::NoValidColumns { .. }
                | Self::RecordNotFound { .. }
                | Self::InvalidInput { .. }
        )
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

impl From<DbErr> for PersistError {
    fn from(value: DbErr) -> Self {
        if let Some(sql_err) = value.sql_err() {
            return match sql_err {
                SqlErr::UniqueConstraintViolation(message)
                | SqlErr::ForeignKeyConstraintViolation(message) => {
                    PersistError::constraint(message)
                }
                _ => PersistError::constraint(value.to_string()),
            };
        }
        let message = value.to_string();
        match value {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => PersistError::connection(message),
            DbErr::Exec(_) | DbErr::Query(_) if is_constraint_message(&message) => {
                PersistError::constraint(message)
            }
            _ => PersistError::storage(message),
        }
    }
}

// Not-null and check failures are not mapped by `sql_err`; both drivers word them consistently.
fn is_constraint_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    (lowered.contains("violates") && lowered.contains("constraint"))
        || lowered.contains("constraint failed")
}
