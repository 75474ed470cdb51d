//! Core data model and engine-facing traits.

pub mod schema;
pub mod session;
pub mod value;

pub use schema::{
    ColumnDescriptor, ForeignKeyDescriptor, LogicalType, SequenceDescriptor, Snapshot,
    SnapshotRequest, TableDescriptor,
};
pub use session::{InsertBatch, RowCursor, SnapshotProvider, SourceRow, SqlLog, SqlSession};
pub use value::{BinaryLob, Cell, SqlValue, TextLob};
