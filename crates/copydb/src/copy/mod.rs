//! Streaming row transfer for one table.
//!
//! Rows flow from a forward-only source cursor through value coercion into
//! a reusable batched insert statement. The target transaction commits at
//! every batch boundary; earlier batches stay committed if a later one
//! fails. Within a table, rows keep the order the cursor yields them, and
//! batch *n+1* is not built before batch *n* has committed.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::coerce::RowCoercer;
use crate::core::schema::TableDescriptor;
use crate::core::session::{InsertBatch, RowCursor, SqlLog, SqlSession};
use crate::error::{CopyError, Result};
use crate::vendor::Vendor;

/// Default rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Statistics from one table copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyStats {
    /// Rows copied.
    pub rows: i64,

    /// Batches committed.
    pub batches: u64,
}

/// Receives one notification per committed batch.
pub trait ProgressSink: Send + Sync {
    fn batch_committed(&self, table: &str, rows_copied: i64, total_rows: i64, percent: i64);
}

/// Default sink: a progress line per batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn batch_committed(&self, table: &str, rows_copied: i64, total_rows: i64, percent: i64) {
        info!(
            "Loading {} {}/{} rows ({}%)",
            table, rows_copied, total_rows, percent
        );
    }
}

/// Copies the rows of one table from source to target.
pub struct TableCopyEngine {
    batch_size: usize,
    sql_log: SqlLog,
    progress: Arc<dyn ProgressSink>,
    cancel: Option<watch::Receiver<bool>>,
}

impl TableCopyEngine {
    #[must_use]
    pub fn new(batch_size: usize, sql_log: SqlLog) -> Self {
        Self {
            batch_size: batch_size.max(1),
            sql_log,
            progress: Arc::new(LogProgress),
            cancel: None,
        }
    }

    /// Replace the default logging progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Observe a cancellation flag at batch boundaries. Mid-batch
    /// cancellation is not supported.
    #[must_use]
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Copy all rows of `source_table` into `target_table`.
    ///
    /// Column sets must align by name; the target's declared column order
    /// drives the generated INSERT. The read cursor and the insert
    /// statement are released on every exit path.
    pub async fn copy(
        &self,
        source: &dyn SqlSession,
        target: &dyn SqlSession,
        source_table: &TableDescriptor,
        target_table: &TableDescriptor,
    ) -> Result<CopyStats> {
        let insert_sql = insert_statement(target_table, target.vendor());
        self.sql_log.emit(&insert_sql);

        let total = source
            .query_count(&format!("SELECT COUNT(*) FROM {}", source_table.name))
            .await?;

        let mut cursor = source
            .open_cursor(&format!("SELECT * FROM {}", source_table.name))
            .await?;
        let mut insert = target.prepare_insert(&insert_sql).await?;

        let coercer = RowCoercer::new(source.vendor() != target.vendor());

        let result = self
            .stream(
                cursor.as_mut(),
                insert.as_mut(),
                target,
                target_table,
                &coercer,
                total,
            )
            .await;

        if result.is_err() {
            if let Err(e) = target.rollback().await {
                warn!("Rollback after failed copy of {} failed: {}", target_table.name, e);
            }
        }

        result
    }

    async fn stream(
        &self,
        cursor: &mut dyn RowCursor,
        insert: &mut dyn InsertBatch,
        target: &dyn SqlSession,
        target_table: &TableDescriptor,
        coercer: &RowCoercer,
        total: i64,
    ) -> Result<CopyStats> {
        let mut stats = CopyStats::default();
        let mut rows_in_batch = 0usize;

        while let Some(mut row) = cursor.next_row().await? {
            let mut params = Vec::with_capacity(target_table.columns.len());
            for column in &target_table.columns {
                let cell = row.take(&column.name).map_err(|e| {
                    CopyError::row_conversion(&target_table.name, &column.name, e.to_string())
                })?;
                params.push(coercer.coerce(cell, &target_table.name, column).await?);
            }
            insert.add_row(params);
            stats.rows += 1;
            rows_in_batch += 1;

            if rows_in_batch == self.batch_size {
                rows_in_batch = 0;
                self.flush(insert, target, &target_table.name, stats.rows, total)
                    .await?;
                stats.batches += 1;
                self.check_cancelled()?;
            }
        }

        if rows_in_batch != 0 {
            self.flush(insert, target, &target_table.name, stats.rows, total)
                .await?;
            stats.batches += 1;
        }

        Ok(stats)
    }

    async fn flush(
        &self,
        insert: &mut dyn InsertBatch,
        target: &dyn SqlSession,
        table: &str,
        rows_copied: i64,
        total: i64,
    ) -> Result<()> {
        insert
            .execute_batch()
            .await
            .map_err(|e| CopyError::batch(table, e.to_string()))?;
        target
            .commit()
            .await
            .map_err(|e| CopyError::batch(table, e.to_string()))?;

        let percent = if total > 0 { 100 * rows_copied / total } else { 100 };
        self.progress.batch_committed(table, rows_copied, total, percent);
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if let Some(cancel) = &self.cancel {
            if *cancel.borrow() {
                return Err(CopyError::Cancelled);
            }
        }
        Ok(())
    }
}

/// Build the target INSERT statement: columns in target-declared order,
/// vendor-appropriate placeholders.
fn insert_statement(table: &TableDescriptor, vendor: Vendor) -> String {
    let mut sql = String::from("INSERT INTO ");
    sql.push_str(&table.name);
    sql.push('(');
    for (i, column) in table.columns.iter().enumerate() {
        if i != 0 {
            sql.push(',');
        }
        sql.push_str(&column.name);
    }
    sql.push_str(") VALUES(");
    for i in 1..=table.columns.len() {
        if i != 1 {
            sql.push(',');
        }
        sql.push_str(&vendor.insert_placeholder(i));
    }
    sql.push(')');
    sql
}
