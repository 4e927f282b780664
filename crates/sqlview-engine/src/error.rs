//! Error types for the engine facade

use crate::notify::Severity;
use thiserror::Error;

/// Coarse classification of an [`EngineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The engine runtime could not be initialized
    EngineInit,
    /// Input bytes are not a database image the engine recognizes
    Load,
    /// Table listing or catalog introspection failed
    Catalog,
    /// Serializing the open handle failed
    Export,
    /// A generated statement was rejected
    Statement,
    /// Configuration could not be parsed
    Config,
}

/// Facade error type
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine runtime initialization error
    #[error("Engine initialization error: {0}")]
    Init(String),

    /// Database image could not be opened
    #[error("Load error: {0}")]
    Load(String),

    /// Catalog query failed or no handle is open
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Database serialization failed
    #[error("Export error: {0}")]
    Export(String),

    /// Configuration parse error
    #[error("Config error: {0}")]
    Config(String),

    /// Statement building or execution error
    #[error(transparent)]
    Statement(#[from] StatementError),
}

impl EngineError {
    /// Error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Init(_) => ErrorKind::EngineInit,
            Self::Load(_) => ErrorKind::Load,
            Self::Catalog(_) => ErrorKind::Catalog,
            Self::Export(_) => ErrorKind::Export,
            Self::Config(_) => ErrorKind::Config,
            Self::Statement(_) => ErrorKind::Statement,
        }
    }

    /// Severity used when this error is surfaced as a notification
    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Statement(StatementError::Sqlite(err))
    }
}

/// Errors raised while validating, building, or running a statement
#[derive(Error, Debug)]
pub enum StatementError {
    /// No database handle is open
    #[error("No database is open")]
    NoHandle,

    /// Table is not present in the live catalog
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Column is not present on the table
    #[error("Unknown column {column} on table {table}")]
    UnknownColumn { table: String, column: String },

    /// Column already exists on the table
    #[error("Column {column} already exists on table {table}")]
    DuplicateColumn { table: String, column: String },

    /// Identifier contains characters outside the safe set
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Declared column type contains characters outside the safe set
    #[error("Invalid column type: {0:?}")]
    InvalidColumnType(String),

    /// UPDATE with no columns to set
    #[error("Update requires at least one column")]
    EmptyAssignment,

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for facade operations
pub type EngineResult<T> = Result<T, EngineError>;
