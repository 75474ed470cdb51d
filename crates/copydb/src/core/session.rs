//! Core traits connecting the engine to externally supplied databases.
//!
//! The engine never opens connections or issues catalog queries itself.
//! An embedding caller supplies:
//!
//! - [`SqlSession`]: statement execution, transaction control, a streaming
//!   read cursor, and a reusable batched insert statement
//! - [`SnapshotProvider`]: point-in-time schema descriptions
//!
//! All methods take `&self`; adapters own whatever interior state their
//! driver needs. The engine awaits strictly sequentially, so adapters never
//! see overlapping calls from one run.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::vendor::Vendor;

use super::schema::{Snapshot, SnapshotRequest};
use super::value::{Cell, SqlValue};

/// Whether SQL text should be logged when a statement executes.
///
/// Threaded explicitly through every execution path; internal bookkeeping
/// SQL (constraint toggles) always runs quiet regardless of configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlLog {
    /// Log each statement under the `sql` target.
    Statements,

    /// Suppress statement logging.
    Quiet,
}

impl SqlLog {
    /// Build from the `logging.sql` configuration flag.
    #[must_use]
    pub fn from_config(log_sql: bool) -> Self {
        if log_sql {
            SqlLog::Statements
        } else {
            SqlLog::Quiet
        }
    }

    /// Emit one statement according to this mode.
    pub fn emit(self, sql: &str) {
        if self == SqlLog::Statements {
            info!(target: "sql", "{}", sql);
        }
    }
}

/// One database session with an open transaction.
///
/// Commits and rollbacks apply to the session's current transaction; a new
/// transaction is implicitly open afterwards.
#[async_trait]
pub trait SqlSession: Send + Sync {
    /// The engine family this session talks to.
    fn vendor(&self) -> Vendor;

    /// Execute a list of statements, in order, without committing.
    async fn execute(&self, statements: &[String]) -> Result<()>;

    /// Commit the current transaction.
    async fn commit(&self) -> Result<()>;

    /// Roll back the current transaction.
    async fn rollback(&self) -> Result<()>;

    /// Run a query returning a single integer value (row counts).
    async fn query_count(&self, sql: &str) -> Result<i64>;

    /// Open a forward-only streaming cursor over the given query.
    async fn open_cursor(&self, sql: &str) -> Result<Box<dyn RowCursor>>;

    /// Prepare a reusable insert statement with batch semantics.
    async fn prepare_insert(&self, sql: &str) -> Result<Box<dyn InsertBatch>>;
}

/// Forward-only cursor over query results.
#[async_trait]
pub trait RowCursor: Send {
    /// Fetch the next row, or `None` when the result set is exhausted.
    ///
    /// Any large-object handle taken from the returned row is invalidated
    /// by the next call.
    async fn next_row(&mut self) -> Result<Option<Box<dyn SourceRow>>>;
}

/// One row yielded by a [`RowCursor`].
pub trait SourceRow: Send {
    /// Take the value of the named column (case-insensitive).
    ///
    /// Errors if the row has no such column; column sets of source and
    /// target must align by name.
    fn take(&mut self, column: &str) -> Result<Cell>;
}

/// A prepared insert statement accumulating rows for batched execution.
#[async_trait]
pub trait InsertBatch: Send {
    /// Queue one row of bound parameter values.
    fn add_row(&mut self, row: Vec<SqlValue>);

    /// Execute all queued rows as one batch and clear the queue.
    async fn execute_batch(&mut self) -> Result<()>;
}

/// Supplies read-only schema snapshots for one connection.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Take a snapshot of the requested object categories in the
    /// connection's default schema.
    async fn snapshot(&self, request: SnapshotRequest) -> Result<Snapshot>;
}
