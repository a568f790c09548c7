use thiserror::Error;

/// Classified outcome of the query stage.
///
/// At most one of these is kept per operation. When several conditions could apply, the
/// variants win in declaration order.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unsupported destination, should be slice or struct")]
    UnsupportedDestination,

    #[error("SQL preparation error: {0}")]
    Preparation(String),

    #[error("SQL execution error: {0}")]
    Execution(#[source] DriverError),

    #[error("row iteration error: {0}")]
    RowIteration(#[source] DriverError),

    #[error("record not found")]
    RecordNotFound,

    #[error("after_find hook failed: {0}")]
    Hook(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueryError {
    /// True for the not-found condition, which callers usually treat as a soft miss.
    #[must_use]
    pub fn is_record_not_found(&self) -> bool {
        matches!(self, QueryError::RecordNotFound)
    }
}

/// Failures raised by an executor or cursor.
#[derive(Debug, Error)]
pub enum DriverError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("column {column:?}: {source}")]
    Field {
        column: String,
        #[source]
        source: FieldError,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

/// A driver value that could not be assigned into a model field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("unexpected NULL for non-optional field")]
    UnexpectedNull,

    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },

    #[error("parse error: {0}")]
    Parse(String),
}
