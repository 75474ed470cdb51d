//! Sequence reconciliation.
//!
//! A source sequence is reproduced in the target by dropping any existing
//! definition and creating it afresh; engines disagree on which sequence
//! attributes ALTER can change in place, so drop-and-create is the only
//! portable path. The statement pair runs as one batch and commits
//! atomically per sequence.

use tracing::debug;

use crate::core::schema::SequenceDescriptor;
use crate::core::session::{SqlLog, SqlSession};
use crate::error::{CopyError, Result};
use crate::vendor::Vendor;

/// Reconciles sequence definitions from a source engine into a target
/// engine, clamping bounds to what the target can hold.
#[derive(Debug, Clone, Copy)]
pub struct SequenceSynchronizer {
    source_vendor: Vendor,
    target_vendor: Vendor,
}

impl SequenceSynchronizer {
    pub fn new(source_vendor: Vendor, target_vendor: Vendor) -> Self {
        Self {
            source_vendor,
            target_vendor,
        }
    }

    /// Bring one target sequence in line with its source definition.
    ///
    /// Returns `true` when the sequence was (re)created, `false` when the
    /// target already matched. A database failure aborts this sequence
    /// only; the error names it.
    pub async fn synchronize(
        &self,
        target: &dyn SqlSession,
        source_seq: &SequenceDescriptor,
        target_seq: Option<&SequenceDescriptor>,
        log: SqlLog,
    ) -> Result<bool> {
        if let Some(existing) = target_seq {
            if existing.start_value == source_seq.start_value {
                debug!("Sequence {} already in sync", source_seq.name);
                return Ok(false);
            }
        }

        let mut statements = Vec::with_capacity(2);
        if target_seq.is_some() {
            statements.push(format!("DROP SEQUENCE {}", source_seq.name));
        }
        statements.push(self.create_statement(source_seq));

        for stmt in &statements {
            log.emit(stmt);
        }

        let result = async {
            target.execute(&statements).await?;
            target.commit().await
        }
        .await;

        if let Err(e) = result {
            let _ = target.rollback().await;
            return Err(CopyError::sequence(&source_seq.name, e.to_string()));
        }

        Ok(true)
    }

    /// Build the CREATE SEQUENCE statement for the target engine.
    ///
    /// Max value policy: a source max equal to the source engine's
    /// "unbounded" sentinel is omitted so the target applies its own
    /// default; a max beyond the target's hard ceiling is clamped to that
    /// ceiling; anything else is copied verbatim.
    fn create_statement(&self, seq: &SequenceDescriptor) -> String {
        let mut sql = format!(
            "CREATE SEQUENCE {} START WITH {} INCREMENT BY {} MINVALUE {}",
            seq.name, seq.start_value, seq.increment, seq.min_value
        );

        if let Some(max) = self.synchronized_max(seq.max_value) {
            sql.push_str(&format!(" MAXVALUE {max}"));
        }

        if let Some(cache) = seq.cache_size {
            sql.push_str(&format!(" CACHE {cache}"));
        }

        if seq.cycle {
            sql.push_str(" CYCLE");
        }

        // ORDER is an Oracle-only clause; other engines reject it.
        if seq.ordered && self.target_vendor == Vendor::Oracle {
            sql.push_str(" ORDER");
        }

        sql
    }

    fn synchronized_max(&self, max: Option<i128>) -> Option<i128> {
        let max = max?;
        if self.source_vendor.max_sequence_bound() == Some(max) {
            return None;
        }
        match self.target_vendor.max_sequence_bound() {
            Some(bound) if max > bound => Some(bound),
            _ => Some(max),
        }
    }
}
