//! Scripted in-memory database for engine and orchestrator tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use copydb::{
    BinaryLob, Cell, ColumnDescriptor, CopyError, ForeignKeyDescriptor, InsertBatch, LogicalType,
    ProgressSink, Result, RowCursor, SequenceDescriptor, Snapshot, SnapshotProvider, SourceRow,
    SqlSession, SqlValue, TableDescriptor, TextLob, Vendor,
};

/// Cloneable recipe for one cell; turned into a real [`Cell`] per read.
#[derive(Debug, Clone)]
pub enum CellSpec {
    Value(SqlValue),
    LargeText(String),
    LargeBinary(Vec<u8>),
}

impl CellSpec {
    fn to_cell(&self) -> Cell {
        match self {
            CellSpec::Value(v) => Cell::Value(v.clone()),
            CellSpec::LargeText(s) => Cell::LargeText(Box::new(ChunkedTextLob {
                remaining: s.clone(),
            })),
            CellSpec::LargeBinary(b) => Cell::LargeBinary(Box::new(ChunkedBinaryLob {
                remaining: b.clone(),
            })),
        }
    }
}

struct ChunkedTextLob {
    remaining: String,
}

#[async_trait]
impl TextLob for ChunkedTextLob {
    async fn read_chunk(&mut self) -> Result<Option<String>> {
        if self.remaining.is_empty() {
            return Ok(None);
        }
        let split: usize = self
            .remaining
            .chars()
            .take(4096)
            .map(char::len_utf8)
            .sum();
        let rest = self.remaining.split_off(split);
        Ok(Some(std::mem::replace(&mut self.remaining, rest)))
    }
}

struct ChunkedBinaryLob {
    remaining: Vec<u8>,
}

#[async_trait]
impl BinaryLob for ChunkedBinaryLob {
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.remaining.is_empty() {
            return Ok(None);
        }
        let split = self.remaining.len().min(4096);
        let rest = self.remaining.split_off(split);
        Ok(Some(std::mem::replace(&mut self.remaining, rest)))
    }
}

#[derive(Debug, Clone)]
struct TableData {
    columns: Vec<String>,
    rows: Vec<Vec<CellSpec>>,
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Everything the session was asked to do, in order.
    pub journal: Vec<String>,

    /// Batches that executed successfully, in commit order.
    pub batches: Vec<Vec<Vec<SqlValue>>>,

    /// Running count of executed batches (successful or not).
    pub batches_executed: usize,

    /// Fail `execute` for any statement containing this text.
    pub fail_execute_containing: Option<String>,

    /// Fail the nth call to `execute_batch` (1-based).
    pub fail_batch_number: Option<usize>,
}

/// A scripted database: session and snapshot provider in one.
pub struct MockDb {
    vendor: Vendor,
    tables: HashMap<String, TableData>,
    snapshot: Snapshot,
    state: Arc<Mutex<MockState>>,
}

impl MockDb {
    pub fn new(vendor: Vendor) -> Self {
        Self {
            vendor,
            tables: HashMap::new(),
            snapshot: Snapshot::default(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Register a table: descriptor in the snapshot plus row data.
    pub fn with_table(
        mut self,
        name: &str,
        columns: &[(&str, LogicalType)],
        rows: Vec<Vec<CellSpec>>,
    ) -> Self {
        let descriptors = columns
            .iter()
            .enumerate()
            .map(|(i, (n, t))| ColumnDescriptor::new(*n, i as i32 + 1, *t))
            .collect();
        self.snapshot
            .tables
            .push(TableDescriptor::new(name, descriptors));
        self.tables.insert(
            name.to_lowercase(),
            TableData {
                columns: columns.iter().map(|(n, _)| n.to_string()).collect(),
                rows,
            },
        );
        self
    }

    pub fn with_foreign_key(mut self, table: &str, constraint: &str) -> Self {
        if let Some(t) = self
            .snapshot
            .tables
            .iter_mut()
            .find(|t| t.is_named(table))
        {
            t.foreign_keys.push(ForeignKeyDescriptor {
                table: table.to_string(),
                name: constraint.to_string(),
            });
        }
        self
    }

    pub fn with_sequence(mut self, sequence: SequenceDescriptor) -> Self {
        self.snapshot.sequences.push(sequence);
        self
    }

    pub fn fail_execute_containing(self, text: &str) -> Self {
        self.state.lock().unwrap().fail_execute_containing = Some(text.to_string());
        self
    }

    pub fn fail_batch(self, number: usize) -> Self {
        self.state.lock().unwrap().fail_batch_number = Some(number);
        self
    }

    pub fn journal(&self) -> Vec<String> {
        self.state.lock().unwrap().journal.clone()
    }

    pub fn batches(&self) -> Vec<Vec<Vec<SqlValue>>> {
        self.state.lock().unwrap().batches.clone()
    }

    /// Index of the first journal entry containing `text`; panics with the
    /// journal when absent.
    pub fn journal_pos(&self, text: &str) -> usize {
        let journal = self.journal();
        journal
            .iter()
            .position(|e| e.contains(text))
            .unwrap_or_else(|| panic!("'{text}' not found in journal: {journal:#?}"))
    }

    pub fn journal_contains(&self, text: &str) -> bool {
        self.journal().iter().any(|e| e.contains(text))
    }

    fn table_for(&self, sql: &str, prefix: &str) -> Result<&TableData> {
        let name = sql
            .strip_prefix(prefix)
            .ok_or_else(|| CopyError::Database(format!("unexpected query: {sql}")))?
            .trim();
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| CopyError::Database(format!("unknown table: {name}")))
    }
}

#[async_trait]
impl SqlSession for MockDb {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn execute(&self, statements: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for statement in statements {
            if let Some(fail) = &state.fail_execute_containing {
                if statement.contains(fail.as_str()) {
                    state.journal.push(format!("FAIL {statement}"));
                    return Err(CopyError::Database("simulated statement failure".into()));
                }
            }
            state.journal.push(format!("EXEC {statement}"));
        }
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.state.lock().unwrap().journal.push("COMMIT".into());
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.state.lock().unwrap().journal.push("ROLLBACK".into());
        Ok(())
    }

    async fn query_count(&self, sql: &str) -> Result<i64> {
        let data = self.table_for(sql, "SELECT COUNT(*) FROM ")?;
        let count = data.rows.len() as i64;
        self.state.lock().unwrap().journal.push(sql.to_string());
        Ok(count)
    }

    async fn open_cursor(&self, sql: &str) -> Result<Box<dyn RowCursor>> {
        let data = self.table_for(sql, "SELECT * FROM ")?;
        self.state.lock().unwrap().journal.push(sql.to_string());
        Ok(Box::new(MockCursor {
            columns: data.columns.clone(),
            rows: data.rows.clone().into(),
        }))
    }

    async fn prepare_insert(&self, sql: &str) -> Result<Box<dyn InsertBatch>> {
        self.state
            .lock()
            .unwrap()
            .journal
            .push(format!("PREPARE {sql}"));
        Ok(Box::new(MockInsert {
            state: self.state.clone(),
            pending: Vec::new(),
        }))
    }
}

#[async_trait]
impl SnapshotProvider for MockDb {
    async fn snapshot(&self, _request: copydb::SnapshotRequest) -> Result<Snapshot> {
        Ok(self.snapshot.clone())
    }
}

struct MockCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<CellSpec>>,
}

#[async_trait]
impl RowCursor for MockCursor {
    async fn next_row(&mut self) -> Result<Option<Box<dyn SourceRow>>> {
        match self.rows.pop_front() {
            Some(row) => Ok(Some(Box::new(MockRow {
                columns: self.columns.clone(),
                cells: row.into_iter().map(Some).collect(),
            }))),
            None => Ok(None),
        }
    }
}

struct MockRow {
    columns: Vec<String>,
    cells: Vec<Option<CellSpec>>,
}

impl SourceRow for MockRow {
    fn take(&mut self, column: &str) -> Result<Cell> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| CopyError::Database(format!("no column named {column}")))?;
        let spec = self.cells[idx]
            .take()
            .ok_or_else(|| CopyError::Database(format!("column {column} already taken")))?;
        Ok(spec.to_cell())
    }
}

struct MockInsert {
    state: Arc<Mutex<MockState>>,
    pending: Vec<Vec<SqlValue>>,
}

#[async_trait]
impl InsertBatch for MockInsert {
    fn add_row(&mut self, row: Vec<SqlValue>) {
        self.pending.push(row);
    }

    async fn execute_batch(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.batches_executed += 1;
        if state.fail_batch_number == Some(state.batches_executed) {
            state.journal.push("BATCH FAIL".into());
            self.pending.clear();
            return Err(CopyError::Database("simulated batch failure".into()));
        }
        let batch = std::mem::take(&mut self.pending);
        state.journal.push(format!("BATCH {}", batch.len()));
        state.batches.push(batch);
        Ok(())
    }
}

/// Progress sink capturing `(table, copied, total, percent)` tuples.
#[derive(Default)]
pub struct CaptureProgress {
    events: Mutex<Vec<(String, i64, i64, i64)>>,
}

impl CaptureProgress {
    pub fn events(&self) -> Vec<(String, i64, i64, i64)> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for CaptureProgress {
    fn batch_committed(&self, table: &str, rows_copied: i64, total_rows: i64, percent: i64) {
        self.events
            .lock()
            .unwrap()
            .push((table.to_string(), rows_copied, total_rows, percent));
    }
}

/// Shorthand for an integer cell.
pub fn int(v: i64) -> CellSpec {
    CellSpec::Value(SqlValue::I64(v))
}

/// Shorthand for a text cell.
pub fn text(v: &str) -> CellSpec {
    CellSpec::Value(SqlValue::Text(v.to_string()))
}
