//! Cross-vendor value coercion.
//!
//! Converts one extracted cell into a value the target engine accepts.
//! Large objects are always materialized in memory, because a source
//! large-object handle is not valid once the cursor advances. The
//! remaining rules only apply when source and target are different engine
//! families.

use chrono::{DateTime, NaiveDateTime};

use crate::core::schema::{ColumnDescriptor, LogicalType};
use crate::core::value::{BinaryLob, Cell, SqlValue, TextLob};
use crate::error::{CopyError, Result};

/// Textual form used by engine-proprietary timestamps.
const VENDOR_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Converts extracted values for one table copy.
#[derive(Debug, Clone, Copy)]
pub struct RowCoercer {
    cross_vendor: bool,
}

impl RowCoercer {
    /// Create a coercer; `cross_vendor` is true when source and target are
    /// different engine families.
    #[must_use]
    pub fn new(cross_vendor: bool) -> Self {
        Self { cross_vendor }
    }

    /// Coerce one cell destined for the given target column.
    ///
    /// `table` and the column name only feed error reporting.
    pub async fn coerce(
        &self,
        cell: Cell,
        table: &str,
        target: &ColumnDescriptor,
    ) -> Result<SqlValue> {
        let value = match cell {
            // Large objects are drained unconditionally, even within one
            // engine family.
            Cell::LargeText(lob) => {
                SqlValue::Text(self.materialize_text(lob, table, &target.name).await?)
            }
            Cell::LargeBinary(lob) => {
                SqlValue::Bytes(self.materialize_bytes(lob, table, &target.name).await?)
            }
            Cell::Value(v) => v,
        };

        if value.is_null() || !self.cross_vendor {
            return Ok(value);
        }

        match value {
            SqlValue::VendorTimestamp(text) => {
                let parsed = NaiveDateTime::parse_from_str(&text, VENDOR_TIMESTAMP_FORMAT)
                    .map_err(|e| {
                        CopyError::row_conversion(
                            table,
                            &target.name,
                            format!("unparseable vendor timestamp '{text}': {e}"),
                        )
                    })?;
                Ok(SqlValue::DateTime(parsed))
            }
            v if v.is_numeric() && target.logical_type == LogicalType::Boolean => {
                // nonzero() is total over numeric variants.
                Ok(SqlValue::Bool(v.nonzero().unwrap_or(false)))
            }
            SqlValue::VendorDateTime { epoch_millis, nanos } => {
                let seconds = epoch_millis.div_euclid(1000);
                let dt = DateTime::from_timestamp(seconds, nanos).ok_or_else(|| {
                    CopyError::row_conversion(
                        table,
                        &target.name,
                        format!("vendor timestamp out of range: {epoch_millis}ms/{nanos}ns"),
                    )
                })?;
                Ok(SqlValue::DateTime(dt.naive_utc()))
            }
            SqlValue::VendorDate(d) => Ok(SqlValue::Date(d)),
            SqlValue::Other(s) => Ok(SqlValue::Text(s)),
            v => Ok(v),
        }
    }

    async fn materialize_text(
        &self,
        mut lob: Box<dyn TextLob>,
        table: &str,
        column: &str,
    ) -> Result<String> {
        let mut out = String::new();
        loop {
            match lob.read_chunk().await {
                Ok(Some(chunk)) => out.push_str(&chunk),
                Ok(None) => return Ok(out),
                Err(e) => {
                    return Err(CopyError::row_conversion(
                        table,
                        column,
                        format!("large text read failed: {e}"),
                    ))
                }
            }
        }
    }

    async fn materialize_bytes(
        &self,
        mut lob: Box<dyn BinaryLob>,
        table: &str,
        column: &str,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            match lob.read_chunk().await {
                Ok(Some(chunk)) => out.extend_from_slice(&chunk),
                Ok(None) => return Ok(out),
                Err(e) => {
                    return Err(CopyError::row_conversion(
                        table,
                        column,
                        format!("large binary read failed: {e}"),
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct ChunkedText(Vec<String>);

    #[async_trait]
    impl TextLob for ChunkedText {
        async fn read_chunk(&mut self) -> Result<Option<String>> {
            if self.0.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.0.remove(0)))
            }
        }
    }

    struct ChunkedBytes(Vec<Vec<u8>>);

    #[async_trait]
    impl BinaryLob for ChunkedBytes {
        async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
            if self.0.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.0.remove(0)))
            }
        }
    }

    struct FailingText;

    #[async_trait]
    impl TextLob for FailingText {
        async fn read_chunk(&mut self) -> Result<Option<String>> {
            Err(CopyError::Database("stream reset".into()))
        }
    }

    fn col(logical_type: LogicalType) -> ColumnDescriptor {
        ColumnDescriptor::new("c", 1, logical_type)
    }

    #[tokio::test]
    async fn test_null_short_circuits() {
        let coercer = RowCoercer::new(true);
        let out = coercer
            .coerce(Cell::Value(SqlValue::Null), "t", &col(LogicalType::Boolean))
            .await
            .unwrap();
        assert_eq!(out, SqlValue::Null);
    }

    #[tokio::test]
    async fn test_large_text_materialized_even_same_vendor() {
        let coercer = RowCoercer::new(false);
        let chunks = vec!["ab".repeat(2048), "cd".repeat(1000)];
        let expected: String = chunks.concat();
        let out = coercer
            .coerce(
                Cell::LargeText(Box::new(ChunkedText(chunks))),
                "t",
                &col(LogicalType::LargeText),
            )
            .await
            .unwrap();
        assert_eq!(out, SqlValue::Text(expected));
    }

    #[tokio::test]
    async fn test_large_binary_materialized() {
        let coercer = RowCoercer::new(true);
        let chunks = vec![vec![1u8; 4096], vec![2u8; 5904]];
        let mut expected = Vec::new();
        for c in &chunks {
            expected.extend_from_slice(c);
        }
        let out = coercer
            .coerce(
                Cell::LargeBinary(Box::new(ChunkedBytes(chunks))),
                "t",
                &col(LogicalType::LargeBinary),
            )
            .await
            .unwrap();
        assert_eq!(out, SqlValue::Bytes(expected));
    }

    #[tokio::test]
    async fn test_lob_failure_is_row_conversion_error() {
        let coercer = RowCoercer::new(false);
        let err = coercer
            .coerce(
                Cell::LargeText(Box::new(FailingText)),
                "docs",
                &col(LogicalType::LargeText),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CopyError::RowConversion { table, column, .. } if table == "docs" && column == "c"
        ));
    }

    #[tokio::test]
    async fn test_same_vendor_leaves_values_untouched() {
        let coercer = RowCoercer::new(false);
        let out = coercer
            .coerce(
                Cell::Value(SqlValue::VendorTimestamp("2024-05-01 10:00:00".into())),
                "t",
                &col(LogicalType::Temporal),
            )
            .await
            .unwrap();
        assert_eq!(out, SqlValue::VendorTimestamp("2024-05-01 10:00:00".into()));
    }

    #[tokio::test]
    async fn test_vendor_timestamp_parsed_cross_vendor() {
        let coercer = RowCoercer::new(true);
        let out = coercer
            .coerce(
                Cell::Value(SqlValue::VendorTimestamp("2024-05-01 10:20:30.500".into())),
                "t",
                &col(LogicalType::Temporal),
            )
            .await
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_milli_opt(10, 20, 30, 500)
            .unwrap();
        assert_eq!(out, SqlValue::DateTime(expected));
    }

    #[tokio::test]
    async fn test_unparseable_vendor_timestamp_fails() {
        let coercer = RowCoercer::new(true);
        let err = coercer
            .coerce(
                Cell::Value(SqlValue::VendorTimestamp("not a date".into())),
                "t",
                &col(LogicalType::Temporal),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CopyError::RowConversion { .. }));
    }

    #[tokio::test]
    async fn test_numeric_to_boolean_target() {
        let coercer = RowCoercer::new(true);
        for (value, expected) in [
            (SqlValue::I64(1), true),
            (SqlValue::I64(0), false),
            (SqlValue::I16(-1), true),
            (SqlValue::F64(0.0), false),
        ] {
            let out = coercer
                .coerce(Cell::Value(value), "t", &col(LogicalType::Boolean))
                .await
                .unwrap();
            assert_eq!(out, SqlValue::Bool(expected));
        }
    }

    #[tokio::test]
    async fn test_numeric_to_numeric_target_not_coerced() {
        let coercer = RowCoercer::new(true);
        let out = coercer
            .coerce(Cell::Value(SqlValue::I64(7)), "t", &col(LogicalType::Numeric))
            .await
            .unwrap();
        assert_eq!(out, SqlValue::I64(7));
    }

    #[tokio::test]
    async fn test_vendor_datetime_preserves_subsecond_precision() {
        let coercer = RowCoercer::new(true);
        let out = coercer
            .coerce(
                Cell::Value(SqlValue::VendorDateTime {
                    epoch_millis: 1_714_558_800_123,
                    nanos: 123_456_789,
                }),
                "t",
                &col(LogicalType::Temporal),
            )
            .await
            .unwrap();
        match out {
            SqlValue::DateTime(dt) => {
                use chrono::Timelike;
                assert_eq!(dt.and_utc().timestamp(), 1_714_558_800);
                assert_eq!(dt.nanosecond(), 123_456_789);
            }
            other => panic!("expected DateTime, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_vendor_date_normalized() {
        let coercer = RowCoercer::new(true);
        let day = NaiveDate::from_ymd_opt(2023, 12, 24).unwrap();
        let out = coercer
            .coerce(
                Cell::Value(SqlValue::VendorDate(day)),
                "t",
                &col(LogicalType::Temporal),
            )
            .await
            .unwrap();
        assert_eq!(out, SqlValue::Date(day));
    }

    #[tokio::test]
    async fn test_other_stringified_cross_vendor() {
        let coercer = RowCoercer::new(true);
        let out = coercer
            .coerce(
                Cell::Value(SqlValue::Other("{\"k\":1}".into())),
                "t",
                &col(LogicalType::Other),
            )
            .await
            .unwrap();
        assert_eq!(out, SqlValue::Text("{\"k\":1}".into()));
    }

    #[tokio::test]
    async fn test_portable_values_pass_through_cross_vendor() {
        let coercer = RowCoercer::new(true);
        for v in [
            SqlValue::Text("x".into()),
            SqlValue::Char('y'),
            SqlValue::Bool(true),
            SqlValue::Bytes(vec![1, 2, 3]),
        ] {
            let out = coercer
                .coerce(Cell::Value(v.clone()), "t", &col(LogicalType::Other))
                .await
                .unwrap();
            assert_eq!(out, v);
        }
    }
}
