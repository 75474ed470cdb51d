//! # copydb
//!
//! Bulk data synchronization between relational databases.
//!
//! This library copies the contents of selected schema objects (sequences
//! and tables, row by row) from a source database to a target database,
//! applying vendor-specific corrections so that data moved between
//! different engines stays semantically correct:
//!
//! - **Object filtering** with include/exclude/order rules
//! - **Sequence reconciliation** with per-engine max-value clamping
//! - **Constraint and trigger suspension** bracketing the bulk load
//! - **Batched streaming row transfer** with cross-vendor value coercion
//! - **Guaranteed constraint restoration** even when the copy aborts
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use copydb::{CopyConfig, CopyOrchestrator, Endpoint};
//! use copydb::drivers::postgres::PgDriver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CopyConfig::load("copydb.yaml")?;
//!     let source = Arc::new(PgDriver::connect(&config.source).await?);
//!     let target = Arc::new(PgDriver::connect(&config.target).await?);
//!     let orchestrator = CopyOrchestrator::new(
//!         config,
//!         Endpoint::new(source.clone(), source),
//!         Endpoint::new(target.clone(), target),
//!     )?;
//!     let report = orchestrator.run(None).await?;
//!     println!("Copied {} rows", report.rows_copied);
//!     Ok(())
//! }
//! ```

pub mod coerce;
pub mod config;
pub mod copy;
pub mod core;
pub mod drivers;
pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod sequence;
pub mod toggle;
pub mod vendor;

// Re-exports for convenient access
pub use coerce::RowCoercer;
pub use config::{CopyConfig, EndpointConfig, FilterConfig};
pub use copy::{CopyStats, ProgressSink, TableCopyEngine};
pub use core::schema::{
    ColumnDescriptor, ForeignKeyDescriptor, LogicalType, SequenceDescriptor, Snapshot,
    SnapshotRequest, TableDescriptor,
};
pub use core::session::{InsertBatch, RowCursor, SnapshotProvider, SourceRow, SqlLog, SqlSession};
pub use core::value::{BinaryLob, Cell, SqlValue, TextLob};
pub use error::{CopyError, Result};
pub use filter::ObjectFilter;
pub use orchestrator::{CopyOrchestrator, Endpoint, RunFailure, RunReport, SequenceFailure};
pub use sequence::SequenceSynchronizer;
pub use toggle::{ConstraintToggle, ToggleKind};
pub use vendor::Vendor;
