//! Error types for the synchronization library.

use thiserror::Error;

/// Main error type for copy operations.
#[derive(Error, Debug)]
pub enum CopyError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine identifier with no defined vendor policy.
    #[error("Unknown database vendor: '{0}'. Supported vendors: oracle, postgresql, mysql, mariadb, mssql, h2")]
    UnknownVendor(String),

    /// A requested administrative operation has no policy for this vendor.
    #[error("Vendor '{vendor}' does not support {operation}")]
    VendorUnsupported {
        vendor: &'static str,
        operation: &'static str,
    },

    /// Constraint or trigger toggle failed.
    #[error("Failed to {action} {toggle}: {message}")]
    ConstraintToggle {
        toggle: &'static str,
        action: &'static str,
        message: String,
    },

    /// Value extraction or coercion failed for one row.
    #[error("Row conversion failed for {table}.{column}: {message}")]
    RowConversion {
        table: String,
        column: String,
        message: String,
    },

    /// Batch insert execution failed.
    #[error("Batch execution failed for table {table}: {message}")]
    BatchExecution { table: String, message: String },

    /// Sequence synchronization failed.
    #[error("Sequence synchronization failed for {sequence}: {message}")]
    SequenceSync { sequence: String, message: String },

    /// Database-level error reported by a session adapter.
    #[error("Database error: {0}")]
    Database(String),

    /// Snapshot extraction failed.
    #[error("Snapshot extraction failed: {0}")]
    Snapshot(String),

    /// IO error (large-object materialization, SQL script files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Copy was cancelled between batch boundaries.
    #[error("Copy cancelled")]
    Cancelled,
}

impl CopyError {
    /// Create a RowConversion error.
    pub fn row_conversion(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CopyError::RowConversion {
            table: table.into(),
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a BatchExecution error.
    pub fn batch(table: impl Into<String>, message: impl Into<String>) -> Self {
        CopyError::BatchExecution {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a SequenceSync error.
    pub fn sequence(sequence: impl Into<String>, message: impl Into<String>) -> Self {
        CopyError::SequenceSync {
            sequence: sequence.into(),
            message: message.into(),
        }
    }

    /// Create a Database error from any displayable source.
    pub fn db(message: impl std::fmt::Display) -> Self {
        CopyError::Database(message.to_string())
    }
}

impl From<tokio_postgres::Error> for CopyError {
    fn from(e: tokio_postgres::Error) -> Self {
        CopyError::Database(e.to_string())
    }
}

/// Result type alias for copy operations.
pub type Result<T> = std::result::Result<T, CopyError>;
