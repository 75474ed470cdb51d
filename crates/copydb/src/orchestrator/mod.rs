//! Copy orchestrator - main workflow coordinator.
//!
//! Drives one run: snapshot both endpoints, reconcile sequences, then for
//! tables truncate (if requested), suspend constraints, copy each table in
//! filter order, and restore constraints. Restoration runs on every path
//! out of the copy phase; its own failures are collected next to the
//! primary error, never in place of it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::CopyConfig;
use crate::copy::{ProgressSink, TableCopyEngine};
use crate::core::schema::{SequenceDescriptor, Snapshot, SnapshotRequest, TableDescriptor};
use crate::core::session::{SnapshotProvider, SqlLog, SqlSession};
use crate::error::CopyError;
use crate::sequence::SequenceSynchronizer;
use crate::toggle::ConstraintToggle;
use crate::vendor::Vendor;

/// One database endpoint: a session plus its snapshot provider.
#[derive(Clone)]
pub struct Endpoint {
    session: Arc<dyn SqlSession>,
    snapshots: Arc<dyn SnapshotProvider>,
}

impl Endpoint {
    pub fn new(session: Arc<dyn SqlSession>, snapshots: Arc<dyn SnapshotProvider>) -> Self {
        Self { session, snapshots }
    }

    fn session(&self) -> &dyn SqlSession {
        self.session.as_ref()
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables considered for copying (present and filtered in on both sides).
    pub tables_total: usize,

    /// Tables copied.
    pub tables_copied: usize,

    /// Total rows copied.
    pub rows_copied: i64,

    /// Sequences (re)created in the target.
    pub sequences_synchronized: usize,

    /// Sequences that failed to synchronize. Per-sequence failures do not
    /// abort the run.
    pub sequence_failures: Vec<SequenceFailure>,
}

impl RunReport {
    /// Convert to a JSON string.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One failed sequence synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceFailure {
    pub sequence: String,
    pub error: String,
}

/// A failed run: the primary error plus any errors raised while restoring
/// constraints afterwards, in the order they occurred.
#[derive(Debug)]
pub struct RunFailure {
    /// The error that aborted the run.
    pub error: CopyError,

    /// Restoration errors gathered during cleanup.
    pub restore_errors: Vec<CopyError>,
}

impl RunFailure {
    fn new(error: CopyError, restore_errors: Vec<CopyError>) -> Self {
        Self {
            error,
            restore_errors,
        }
    }
}

impl From<CopyError> for RunFailure {
    fn from(error: CopyError) -> Self {
        Self::new(error, Vec::new())
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        for (i, e) in self.restore_errors.iter().enumerate() {
            write!(f, "\n  restoration error {}: {}", i + 1, e)?;
        }
        Ok(())
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Copy orchestrator.
pub struct CopyOrchestrator {
    config: CopyConfig,
    source: Endpoint,
    target: Endpoint,
    source_vendor: Vendor,
    target_vendor: Vendor,
    sql_log: SqlLog,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl CopyOrchestrator {
    /// Create a new orchestrator over two endpoints.
    pub fn new(
        config: CopyConfig,
        source: Endpoint,
        target: Endpoint,
    ) -> crate::error::Result<Self> {
        config.validate()?;
        let source_vendor = source.session().vendor();
        let target_vendor = target.session().vendor();
        let sql_log = SqlLog::from_config(config.log_sql);
        Ok(Self {
            config,
            source,
            target,
            source_vendor,
            target_vendor,
            sql_log,
            progress: None,
        })
    }

    /// Replace the default logging progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the copy.
    pub async fn run(
        &self,
        cancel: Option<watch::Receiver<bool>>,
    ) -> std::result::Result<RunReport, RunFailure> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting copy run {}", run_id);

        let tables = self.config.tables_filter();
        let sequences = self.config.sequences_filter();

        let copy_tables = tables.is_enabled() && !tables.excludes_all();
        let sync_sequences = sequences.is_enabled();

        let source_snapshot = self
            .source
            .snapshots
            .snapshot(SnapshotRequest {
                tables: copy_tables,
                sequences: sync_sequences,
                foreign_keys: false,
            })
            .await
            .map_err(RunFailure::from)?;

        let target_snapshot = self
            .target
            .snapshots
            .snapshot(SnapshotRequest {
                tables: copy_tables,
                sequences: sync_sequences,
                foreign_keys: copy_tables,
            })
            .await
            .map_err(RunFailure::from)?;

        let mut report = RunReport {
            run_id,
            started_at,
            completed_at: started_at,
            duration_seconds: 0.0,
            tables_total: 0,
            tables_copied: 0,
            rows_copied: 0,
            sequences_synchronized: 0,
            sequence_failures: Vec::new(),
        };

        if sync_sequences {
            self.synchronize_sequences(&sequences, &source_snapshot, &target_snapshot, &mut report)
                .await;
        }

        if copy_tables {
            self.copy_tables(
                &tables,
                &source_snapshot,
                &target_snapshot,
                cancel,
                &mut report,
            )
            .await?;
        }

        report.completed_at = Utc::now();
        report.duration_seconds =
            (report.completed_at - report.started_at).num_milliseconds() as f64 / 1000.0;

        info!(
            "Copy run {} completed: {} tables, {} rows in {:.1}s",
            report.run_id, report.tables_copied, report.rows_copied, report.duration_seconds
        );

        Ok(report)
    }

    /// Reconcile filtered sequences, source into target. Failures are
    /// per-sequence: logged, recorded, never fatal to the run.
    async fn synchronize_sequences(
        &self,
        filter: &crate::filter::ObjectFilter,
        source_snapshot: &Snapshot,
        target_snapshot: &Snapshot,
        report: &mut RunReport,
    ) {
        let mut ordered: Vec<&SequenceDescriptor> = source_snapshot
            .sequences
            .iter()
            .filter(|s| filter.contains(&s.name))
            .collect();
        filter.sort(&mut ordered, |s| s.name.as_str());

        let synchronizer = SequenceSynchronizer::new(self.source_vendor, self.target_vendor);

        for seq in ordered {
            let target_seq = target_snapshot.sequence(&seq.name);
            match synchronizer
                .synchronize(self.target.session(), seq, target_seq, self.sql_log)
                .await
            {
                Ok(true) => report.sequences_synchronized += 1,
                Ok(false) => {}
                Err(e) => {
                    error!("{}", e);
                    report.sequence_failures.push(SequenceFailure {
                        sequence: seq.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Copy all filtered tables: truncate, suspend constraints, copy,
    /// restore constraints.
    async fn copy_tables(
        &self,
        filter: &crate::filter::ObjectFilter,
        source_snapshot: &Snapshot,
        target_snapshot: &Snapshot,
        cancel: Option<watch::Receiver<bool>>,
        report: &mut RunReport,
    ) -> std::result::Result<(), RunFailure> {
        let source_tables: HashMap<String, &TableDescriptor> = source_snapshot
            .tables
            .iter()
            .filter(|t| filter.contains(&t.name))
            .map(|t| (t.name.to_lowercase(), t))
            .collect();

        let mut target_tables: Vec<&TableDescriptor> = target_snapshot
            .tables
            .iter()
            .filter(|t| filter.contains(&t.name))
            .filter(|t| {
                let present = source_tables.contains_key(&t.name.to_lowercase());
                if !present {
                    debug!("Skipping {}: not present in source", t.name);
                }
                present
            })
            .collect();

        if target_tables.is_empty() {
            return Ok(());
        }

        filter.sort(&mut target_tables, |t| t.name.as_str());
        report.tables_total = target_tables.len();

        // Truncating: nothing is suspended yet, so a failure here needs no
        // restoration.
        if self.config.truncate {
            for table in &target_tables {
                self.truncate_table(&table.name).await?;
            }
        }

        // ConstraintsDisabled: each toggle that made it through disable()
        // must see a matching enable() on every later exit path.
        let mut disabled: Vec<ConstraintToggle> = Vec::new();
        let mut requested: Vec<ConstraintToggle> = Vec::new();
        if self.config.disable_triggers {
            requested.push(ConstraintToggle::triggers(self.target_vendor));
        }
        if self.config.disable_foreign_keys {
            requested.push(ConstraintToggle::foreign_keys(
                self.target_vendor,
                target_snapshot.foreign_keys(),
            ));
        }

        for toggle in requested {
            match toggle.disable(self.target.session()).await {
                Ok(()) => disabled.push(toggle),
                Err(e) => {
                    let restore_errors = self.restore(&disabled).await;
                    return Err(RunFailure::new(e, restore_errors));
                }
            }
        }

        // CopyingTables
        let mut engine = TableCopyEngine::new(self.config.batch_size, self.sql_log);
        if let Some(progress) = &self.progress {
            engine = engine.with_progress(progress.clone());
        }
        if let Some(cancel) = cancel.clone() {
            engine = engine.with_cancel(cancel);
        }

        for table in &target_tables {
            if let Some(cancel) = &cancel {
                if *cancel.borrow() {
                    let restore_errors = self.restore(&disabled).await;
                    return Err(RunFailure::new(CopyError::Cancelled, restore_errors));
                }
            }

            let source_table = source_tables[&table.name.to_lowercase()];
            match engine
                .copy(self.source.session(), self.target.session(), source_table, table)
                .await
            {
                Ok(stats) => {
                    info!("{}: completed ({} rows)", table.name, stats.rows);
                    report.tables_copied += 1;
                    report.rows_copied += stats.rows;
                }
                Err(e) => {
                    let restore_errors = self.restore(&disabled).await;
                    return Err(RunFailure::new(e, restore_errors));
                }
            }
        }

        // ConstraintsRestored: constraints silently left disabled are not a
        // success, so a restoration failure fails the run.
        let mut restore_errors = self.restore(&disabled).await.into_iter();
        if let Some(primary) = restore_errors.next() {
            return Err(RunFailure::new(primary, restore_errors.collect()));
        }

        Ok(())
    }

    async fn truncate_table(&self, table: &str) -> std::result::Result<(), RunFailure> {
        let statement = self
            .target_vendor
            .truncate_statement(table, self.config.disable_foreign_keys);
        self.sql_log.emit(&statement);

        let result = async {
            self.target.session().execute(&[statement]).await?;
            self.target.session().commit().await
        }
        .await;

        if let Err(e) = result {
            let _ = self.target.session().rollback().await;
            return Err(RunFailure::from(CopyError::Database(format!(
                "truncate of {table} failed: {e}"
            ))));
        }
        Ok(())
    }

    /// Re-enable every toggle whose disable() succeeded, most recent
    /// first, collecting failures without stopping.
    async fn restore(&self, disabled: &[ConstraintToggle]) -> Vec<CopyError> {
        let mut errors = Vec::new();
        for toggle in disabled.iter().rev() {
            if let Err(e) = toggle.enable(self.target.session()).await {
                error!("Constraint restoration failed: {}", e);
                errors.push(e);
            }
        }
        errors
    }
}
