//! Error types for mapsql

use std::time::Duration;
use thiserror::Error;

/// Result type alias for mapsql operations
pub type SqlResult<T> = Result<T, SqlError>;

/// Errors raised while turning a where-map into SQL.
///
/// These never reach the driver: a statement that fails to build is not sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// A directive key holds a value of the wrong kind (e.g. `_field` not text)
    #[error("directive '{key}' expects {expected}, got {got}")]
    InvalidDirective {
        key: &'static str,
        expected: &'static str,
        got: &'static str,
    },

    /// A SELECT-only directive was passed to UPDATE or DELETE
    #[error("directive '{key}' is not supported by {statement}")]
    UnsupportedDirective {
        key: &'static str,
        statement: &'static str,
    },

    /// `in` / `between` operators need a list value
    #[error("operator '{op}' on column '{column}' requires a list value")]
    SequenceRequired { column: String, op: String },

    /// `in` with no elements would render `in ()`
    #[error("operator '{op}' on column '{column}' got an empty list")]
    EmptyInList { column: String, op: String },

    /// `between` needs at least two elements
    #[error("operator '{op}' on column '{column}' needs 2 values, got {got}")]
    BetweenArity {
        column: String,
        op: String,
        got: usize,
    },

    /// A list or nested map was given where one bound value is expected
    #[error("column '{column}' expects a single value, got {got}")]
    NotScalar { column: String, got: &'static str },

    /// Empty table or column name
    #[error("empty identifier")]
    EmptyIdentifier,

    /// INSERT / UPDATE without any column to write
    #[error("{statement} requires at least one value")]
    EmptyValues { statement: &'static str },
}

/// Error types for database operations
#[derive(Debug, Error)]
pub enum SqlError {
    /// Statement construction error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Error reported by the driver, passed through unchanged
    #[error("Driver error: {0}")]
    Driver(#[from] sqlx::Error),

    /// A result column has no field to land in
    #[error("Unmatched column '{column}' for {target}")]
    UnmatchedColumn { column: String, target: &'static str },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Deadline reached before the driver answered
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the operation
    #[error("Query cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// No database installed under this name
    #[error("Unknown database '{0}'")]
    UnknownDatabase(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A statement in this transaction was abandoned by its context
    #[error("Transaction aborted by an interrupted statement")]
    TxAborted,

    /// Rolling back after `source` failed as well
    #[error("{source} (rollback failed: {rollback})")]
    Rollback {
        source: Box<SqlError>,
        rollback: Box<SqlError>,
    },
}

impl SqlError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Combine a failed operation with the error of the rollback that followed
    pub fn rollback_failed(source: SqlError, rollback: SqlError) -> Self {
        Self::Rollback {
            source: Box::new(source),
            rollback: Box::new(rollback),
        }
    }

    /// Check if this is a statement construction error
    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build(_))
    }

    /// Check if this error came from the driver
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if the transaction was aborted by an interrupted statement
    pub fn is_tx_aborted(&self) -> bool {
        matches!(self, Self::TxAborted)
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The underlying driver error, if any
    pub fn as_driver(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Driver(err) => Some(err),
            _ => None,
        }
    }
}
