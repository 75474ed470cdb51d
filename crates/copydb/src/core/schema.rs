//! Schema object descriptors.
//!
//! Descriptors are read-only snapshots taken once per run by an external
//! [`SnapshotProvider`](super::session::SnapshotProvider). The engine never
//! issues catalog queries itself; it only filters, sorts, and consults
//! these descriptions. Names are case-preserving but always compared
//! case-insensitively.

use serde::{Deserialize, Serialize};

/// Logical type tag for a column, abstracted over vendor type names.
///
/// The coercion rules only care about these broad categories; the exact
/// vendor type string stays behind in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    Text,
    Numeric,
    Boolean,
    Temporal,
    Binary,
    LargeText,
    LargeBinary,
    Other,
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name (case-preserving).
    pub name: String,

    /// Ordinal position (1-based).
    pub ordinal: i32,

    /// Logical type tag.
    pub logical_type: LogicalType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, ordinal: i32, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            ordinal,
            logical_type,
        }
    }
}

/// Table metadata.
///
/// Column order is the order declared by the catalog; it drives the column
/// list of the generated INSERT statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,

    /// Column definitions in declared order.
    pub columns: Vec<ColumnDescriptor>,

    /// Foreign key constraints owned by this table.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
            foreign_keys: Vec::new(),
        }
    }

    /// Case-insensitive name match.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Foreign key constraint metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    /// Name of the table owning the constraint.
    pub table: String,

    /// Constraint name.
    pub name: String,
}

/// Sequence metadata.
///
/// Numeric fields use `i128`: some engines allow sequence bounds far beyond
/// the 64-bit range (Oracle permits 28 decimal digits).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceDescriptor {
    /// Sequence name.
    pub name: String,

    /// Start value.
    pub start_value: i128,

    /// Increment.
    pub increment: i128,

    /// Minimum value.
    pub min_value: i128,

    /// Maximum value, if bounded.
    pub max_value: Option<i128>,

    /// Cache size, if reported by the catalog.
    pub cache_size: Option<i128>,

    /// Whether the sequence cycles at its bounds.
    pub cycle: bool,

    /// Whether values are guaranteed to be issued in order (Oracle ORDER).
    pub ordered: bool,
}

/// Which object categories a snapshot should cover.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotRequest {
    /// Include tables and their columns.
    pub tables: bool,

    /// Include sequences.
    pub sequences: bool,

    /// Include foreign key constraints on the tables.
    pub foreign_keys: bool,
}

/// A point-in-time description of the schema objects of one connection's
/// default schema.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Tables, in catalog order.
    pub tables: Vec<TableDescriptor>,

    /// Sequences, in catalog order.
    pub sequences: Vec<SequenceDescriptor>,
}

impl Snapshot {
    /// Find a table by case-insensitive name.
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.is_named(name))
    }

    /// Find a sequence by case-insensitive name.
    pub fn sequence(&self, name: &str) -> Option<&SequenceDescriptor> {
        self.sequences
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// All foreign keys across all tables.
    pub fn foreign_keys(&self) -> Vec<ForeignKeyDescriptor> {
        self.tables
            .iter()
            .flat_map(|t| t.foreign_keys.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lookup_is_case_insensitive() {
        let snapshot = Snapshot {
            tables: vec![TableDescriptor::new("Users", Vec::new())],
            sequences: Vec::new(),
        };
        assert!(snapshot.table("users").is_some());
        assert!(snapshot.table("USERS").is_some());
        assert!(snapshot.table("orders").is_none());
    }

    #[test]
    fn test_foreign_keys_collected_across_tables() {
        let mut a = TableDescriptor::new("a", Vec::new());
        a.foreign_keys.push(ForeignKeyDescriptor {
            table: "a".into(),
            name: "fk_a_b".into(),
        });
        let b = TableDescriptor::new("b", Vec::new());
        let snapshot = Snapshot {
            tables: vec![a, b],
            sequences: Vec::new(),
        };
        assert_eq!(snapshot.foreign_keys().len(), 1);
    }
}
