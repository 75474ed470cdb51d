//! SQL value types for database-agnostic row transfer.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Result;

/// A single extracted or coerced column value.
///
/// The portable variants (`Text`, the numerics, the temporals, `Bytes`,
/// `Bool`, `Char`) can be bound into any target engine. The `Vendor*`
/// variants describe values a source driver could only express in an
/// engine-proprietary shape; cross-vendor coercion normalizes them before
/// they reach a target statement. `Other` carries the display form of a
/// value with no portable representation at all.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// 16-bit signed integer (smallint).
    I16(i16),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 32-bit floating point (real/float4).
    F32(f32),

    /// 64-bit floating point (double precision/float8).
    F64(f64),

    /// Exact numeric with fixed scale.
    Decimal(Decimal),

    /// Single character.
    Char(char),

    /// Text data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID/GUID value.
    Uuid(Uuid),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// Engine-proprietary timestamp exposed only through its textual form
    /// (`YYYY-MM-DD HH:MM:SS[.fff...]`).
    VendorTimestamp(String),

    /// Engine subtype of the portable timestamp carrying epoch time and
    /// sub-second precision as separate fields.
    VendorDateTime { epoch_millis: i64, nanos: u32 },

    /// Engine subtype of the portable date.
    VendorDate(NaiveDate),

    /// Value with no portable runtime type; carried as its display form.
    Other(String),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Check if this value is numeric (integer, float, or decimal).
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlValue::I16(_)
                | SqlValue::I32(_)
                | SqlValue::I64(_)
                | SqlValue::F32(_)
                | SqlValue::F64(_)
                | SqlValue::Decimal(_)
        )
    }

    /// Interpret a numeric value as a boolean via "nonzero means true".
    ///
    /// Returns `None` for non-numeric values.
    #[must_use]
    pub fn nonzero(&self) -> Option<bool> {
        match self {
            SqlValue::I16(v) => Some(*v != 0),
            SqlValue::I32(v) => Some(*v != 0),
            SqlValue::I64(v) => Some(*v != 0),
            SqlValue::F32(v) => Some(*v != 0.0),
            SqlValue::F64(v) => Some(*v != 0.0),
            SqlValue::Decimal(v) => Some(!v.is_zero()),
            _ => None,
        }
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

/// Streaming reader over a large text value.
///
/// The handle is only valid while the source cursor stays on the row that
/// produced it, which is why the coercer drains it eagerly.
#[async_trait]
pub trait TextLob: Send {
    /// Read the next chunk of characters; `None` means end of stream.
    async fn read_chunk(&mut self) -> Result<Option<String>>;
}

/// Streaming reader over a large binary value.
#[async_trait]
pub trait BinaryLob: Send {
    /// Read the next chunk of bytes; `None` means end of stream.
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// One extracted cell: either an immediate value or a large-object handle
/// that must be materialized before the cursor advances.
pub enum Cell {
    /// An immediate value.
    Value(SqlValue),

    /// A large text value, streamed from the source.
    LargeText(Box<dyn TextLob>),

    /// A large binary value, streamed from the source.
    LargeBinary(Box<dyn BinaryLob>),
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Cell::LargeText(_) => f.write_str("LargeText(..)"),
            Cell::LargeBinary(_) => f.write_str("LargeBinary(..)"),
        }
    }
}

impl From<SqlValue> for Cell {
    fn from(v: SqlValue) -> Self {
        Cell::Value(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_null() {
        assert!(SqlValue::Null.is_null());
        assert!(!SqlValue::I32(0).is_null());
    }

    #[test]
    fn test_nonzero() {
        assert_eq!(SqlValue::I64(0).nonzero(), Some(false));
        assert_eq!(SqlValue::I64(-3).nonzero(), Some(true));
        assert_eq!(SqlValue::F64(0.0).nonzero(), Some(false));
        assert_eq!(SqlValue::Decimal(Decimal::new(1, 2)).nonzero(), Some(true));
        assert_eq!(SqlValue::Text("1".into()).nonzero(), None);
    }
}
