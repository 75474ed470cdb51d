//! PostgreSQL adapter over `tokio-postgres`.
//!
//! One driver instance wraps a single client with an explicitly managed
//! transaction: the session opens with BEGIN and every commit or rollback
//! immediately opens the next transaction. The engine runs strictly
//! sequentially, so one connection per endpoint is all it needs.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::TryStreamExt;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls, RowStream, Statement};
use tracing::{error, info};

use crate::config::EndpointConfig;
use crate::core::schema::{
    ColumnDescriptor, ForeignKeyDescriptor, LogicalType, SequenceDescriptor, Snapshot,
    SnapshotRequest, TableDescriptor,
};
use crate::core::session::{InsertBatch, RowCursor, SnapshotProvider, SourceRow, SqlSession};
use crate::core::value::{Cell, SqlValue};
use crate::error::{CopyError, Result};
use crate::vendor::Vendor;

/// PostgreSQL session and snapshot provider.
pub struct PgDriver {
    client: Arc<Client>,
}

impl PgDriver {
    /// Connect using the endpoint's conninfo URL, appending credentials
    /// when configured separately.
    pub async fn connect(config: &EndpointConfig) -> Result<Self> {
        if config.vendor()? != Vendor::Postgres {
            return Err(CopyError::Config(format!(
                "PgDriver cannot serve vendor '{}'",
                config.vendor
            )));
        }

        let mut conninfo = config.url.clone();
        if let Some(user) = &config.user {
            conninfo.push_str(&format!(" user={user}"));
        }
        if let Some(password) = &config.password {
            conninfo.push_str(&format!(" password={password}"));
        }

        let (client, connection) = tokio_postgres::connect(&conninfo, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        client.batch_execute("BEGIN").await?;
        info!("Connected to PostgreSQL: {}", config.url);

        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl SqlSession for PgDriver {
    fn vendor(&self) -> Vendor {
        Vendor::Postgres
    }

    async fn execute(&self, statements: &[String]) -> Result<()> {
        for statement in statements {
            self.client.batch_execute(statement).await?;
        }
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn query_count(&self, sql: &str) -> Result<i64> {
        let row = self.client.query_one(sql, &[]).await?;
        Ok(row.try_get::<_, i64>(0)?)
    }

    async fn open_cursor(&self, sql: &str) -> Result<Box<dyn RowCursor>> {
        let params: Vec<i32> = Vec::new();
        let stream = self.client.query_raw(sql, params).await?;
        Ok(Box::new(PgCursor {
            stream: Box::pin(stream),
        }))
    }

    async fn prepare_insert(&self, sql: &str) -> Result<Box<dyn InsertBatch>> {
        let statement = self.client.prepare(sql).await?;
        Ok(Box::new(PgInsertBatch {
            client: self.client.clone(),
            statement,
            rows: Vec::new(),
        }))
    }
}

struct PgCursor {
    stream: Pin<Box<RowStream>>,
}

#[async_trait]
impl RowCursor for PgCursor {
    async fn next_row(&mut self) -> Result<Option<Box<dyn SourceRow>>> {
        match self.stream.as_mut().try_next().await? {
            Some(row) => Ok(Some(Box::new(PgSourceRow { row }))),
            None => Ok(None),
        }
    }
}

struct PgSourceRow {
    row: tokio_postgres::Row,
}

impl SourceRow for PgSourceRow {
    fn take(&mut self, column: &str) -> Result<Cell> {
        let idx = self
            .row
            .columns()
            .iter()
            .position(|c| c.name().eq_ignore_ascii_case(column))
            .ok_or_else(|| CopyError::Database(format!("no column named {column}")))?;

        let type_name = self.row.columns()[idx].type_().name().to_string();
        let value = self.read_value(idx, &type_name)?;
        Ok(Cell::Value(value))
    }
}

impl PgSourceRow {
    fn read_value(&self, idx: usize, type_name: &str) -> Result<SqlValue> {
        let value = match type_name {
            "bool" => self.row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
            "int2" => self.row.try_get::<_, Option<i16>>(idx)?.map(SqlValue::I16),
            "int4" => self.row.try_get::<_, Option<i32>>(idx)?.map(SqlValue::I32),
            "int8" => self.row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::I64),
            "float4" => self.row.try_get::<_, Option<f32>>(idx)?.map(SqlValue::F32),
            "float8" => self.row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::F64),
            "numeric" => self
                .row
                .try_get::<_, Option<rust_decimal::Decimal>>(idx)?
                .map(SqlValue::Decimal),
            "uuid" => self
                .row
                .try_get::<_, Option<uuid::Uuid>>(idx)?
                .map(SqlValue::Uuid),
            "timestamp" => self
                .row
                .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
                .map(SqlValue::DateTime),
            "timestamptz" => self
                .row
                .try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)?
                .map(SqlValue::DateTimeOffset),
            "date" => self
                .row
                .try_get::<_, Option<chrono::NaiveDate>>(idx)?
                .map(SqlValue::Date),
            "time" => self
                .row
                .try_get::<_, Option<chrono::NaiveTime>>(idx)?
                .map(SqlValue::Time),
            "bytea" => self
                .row
                .try_get::<_, Option<Vec<u8>>>(idx)?
                .map(SqlValue::Bytes),
            "json" | "jsonb" => self
                .row
                .try_get::<_, Option<serde_json::Value>>(idx)?
                .map(|v| SqlValue::Other(v.to_string())),
            _ => self.row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text),
        };
        Ok(value.unwrap_or(SqlValue::Null))
    }
}

struct PgInsertBatch {
    client: Arc<Client>,
    statement: Statement,
    rows: Vec<Vec<SqlValue>>,
}

#[async_trait]
impl InsertBatch for PgInsertBatch {
    fn add_row(&mut self, row: Vec<SqlValue>) {
        self.rows.push(row);
    }

    async fn execute_batch(&mut self) -> Result<()> {
        for row in self.rows.drain(..) {
            let params: Vec<&(dyn ToSql + Sync)> =
                row.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            self.client.execute(&self.statement, &params).await?;
        }
        Ok(())
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => v.to_sql(ty, out),
            SqlValue::I16(v) => v.to_sql(ty, out),
            SqlValue::I32(v) => v.to_sql(ty, out),
            SqlValue::I64(v) => v.to_sql(ty, out),
            SqlValue::F32(v) => v.to_sql(ty, out),
            SqlValue::F64(v) => v.to_sql(ty, out),
            SqlValue::Decimal(v) => v.to_sql(ty, out),
            SqlValue::Char(c) => c.to_string().to_sql(ty, out),
            SqlValue::Text(s) => s.to_sql(ty, out),
            SqlValue::Bytes(b) => b.to_sql(ty, out),
            SqlValue::Uuid(u) => u.to_sql(ty, out),
            SqlValue::Date(d) => d.to_sql(ty, out),
            SqlValue::Time(t) => t.to_sql(ty, out),
            SqlValue::DateTime(dt) => dt.to_sql(ty, out),
            SqlValue::DateTimeOffset(dt) => dt.to_sql(ty, out),
            // Unnormalized vendor values only survive same-vendor copies;
            // bind them through their closest portable form.
            SqlValue::VendorTimestamp(s) => s.to_sql(ty, out),
            SqlValue::VendorDateTime { epoch_millis, nanos } => {
                let seconds = epoch_millis.div_euclid(1000);
                let dt = chrono::DateTime::from_timestamp(seconds, *nanos)
                    .ok_or("vendor timestamp out of range")?;
                dt.naive_utc().to_sql(ty, out)
            }
            SqlValue::VendorDate(d) => d.to_sql(ty, out),
            SqlValue::Other(s) => s.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

#[async_trait]
impl SnapshotProvider for PgDriver {
    async fn snapshot(&self, request: SnapshotRequest) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();
        if request.tables {
            snapshot.tables = self.load_tables().await?;
            if request.foreign_keys {
                self.load_foreign_keys(&mut snapshot.tables).await?;
            }
        }
        if request.sequences {
            snapshot.sequences = self.load_sequences().await?;
        }
        Ok(snapshot)
    }
}

impl PgDriver {
    async fn load_tables(&self) -> Result<Vec<TableDescriptor>> {
        let query = r#"
            SELECT c.table_name, c.column_name, c.udt_name, c.ordinal_position::int4
            FROM information_schema.columns c
            JOIN information_schema.tables t
              ON t.table_schema = c.table_schema AND t.table_name = c.table_name
            WHERE c.table_schema = current_schema() AND t.table_type = 'BASE TABLE'
            ORDER BY c.table_name, c.ordinal_position
        "#;

        let rows = self
            .client
            .query(query, &[])
            .await
            .map_err(|e| CopyError::Snapshot(e.to_string()))?;

        let mut tables: Vec<TableDescriptor> = Vec::new();
        for row in rows {
            let table_name: String = row.get(0);
            let column = ColumnDescriptor::new(
                row.get::<_, String>(1),
                row.get::<_, i32>(3),
                logical_type(&row.get::<_, String>(2)),
            );
            match tables.last_mut() {
                Some(last) if last.is_named(&table_name) => last.columns.push(column),
                _ => tables.push(TableDescriptor::new(table_name, vec![column])),
            }
        }
        Ok(tables)
    }

    async fn load_foreign_keys(&self, tables: &mut [TableDescriptor]) -> Result<()> {
        let query = r#"
            SELECT table_name, constraint_name
            FROM information_schema.table_constraints
            WHERE table_schema = current_schema() AND constraint_type = 'FOREIGN KEY'
            ORDER BY table_name, constraint_name
        "#;

        let rows = self
            .client
            .query(query, &[])
            .await
            .map_err(|e| CopyError::Snapshot(e.to_string()))?;

        for row in rows {
            let table_name: String = row.get(0);
            if let Some(table) = tables.iter_mut().find(|t| t.is_named(&table_name)) {
                table.foreign_keys.push(ForeignKeyDescriptor {
                    table: table_name,
                    name: row.get(1),
                });
            }
        }
        Ok(())
    }

    async fn load_sequences(&self) -> Result<Vec<SequenceDescriptor>> {
        let query = r#"
            SELECT sequencename, start_value, increment_by, min_value, max_value,
                   cache_size, cycle
            FROM pg_catalog.pg_sequences
            WHERE schemaname = current_schema()
            ORDER BY sequencename
        "#;

        let rows = self
            .client
            .query(query, &[])
            .await
            .map_err(|e| CopyError::Snapshot(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| SequenceDescriptor {
                name: row.get(0),
                start_value: row.get::<_, i64>(1) as i128,
                increment: row.get::<_, i64>(2) as i128,
                min_value: row.get::<_, i64>(3) as i128,
                max_value: row.get::<_, Option<i64>>(4).map(i128::from),
                cache_size: row.get::<_, Option<i64>>(5).map(i128::from),
                cycle: row.get(6),
                // PostgreSQL has no ORDER attribute.
                ordered: false,
            })
            .collect())
    }
}

/// Map a PostgreSQL udt name onto the coarse logical categories the
/// coercion rules care about.
fn logical_type(udt_name: &str) -> LogicalType {
    match udt_name {
        "bool" => LogicalType::Boolean,
        "int2" | "int4" | "int8" | "float4" | "float8" | "numeric" | "money" => {
            LogicalType::Numeric
        }
        "varchar" | "bpchar" | "char" | "name" | "text" => LogicalType::Text,
        "bytea" => LogicalType::Binary,
        "timestamp" | "timestamptz" | "date" | "time" | "timetz" | "interval" => {
            LogicalType::Temporal
        }
        _ => LogicalType::Other,
    }
}
