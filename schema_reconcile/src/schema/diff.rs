//! Schema difference calculator
//!
//! Pure set arithmetic over two snapshots. Nothing here touches a connection.

use std::collections::BTreeSet;

use crate::schema::types::{ColumnDescriptor, SchemaSnapshot, TableColumns};

/// Three-way partition of table names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablePartition {
    /// Tables only in source: to be created, or claimed by a rename
    pub source_only: BTreeSet<String>,
    /// Tables only in target: orphans awaiting a decision
    pub target_only: BTreeSet<String>,
    /// Tables on both sides, diffed column by column
    pub shared: BTreeSet<String>,
}

impl TablePartition {
    pub fn is_aligned(&self) -> bool {
        self.source_only.is_empty() && self.target_only.is_empty()
    }
}

/// Partition table names of source and target
pub fn partition_tables(source: &SchemaSnapshot, target: &SchemaSnapshot) -> TablePartition {
    TablePartition {
        source_only: source.tables.difference(&target.tables).cloned().collect(),
        target_only: target.tables.difference(&source.tables).cloned().collect(),
        shared: source.tables.intersection(&target.tables).cloned().collect(),
    }
}

/// Rename targets still available for orphans, in lexicographic order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePool {
    names: BTreeSet<String>,
}

impl CandidatePool {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Consume a candidate. Returns false if it was not in the pool.
    pub fn take(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Column-level difference of one shared table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDiff {
    pub table: String,
    /// Columns present in target but absent in source, by field name
    pub orphaned_columns: Vec<ColumnDescriptor>,
    /// Columns present in source but absent in target
    pub new_columns: CandidatePool,
}

impl TableDiff {
    pub fn is_empty(&self) -> bool {
        self.orphaned_columns.is_empty() && self.new_columns.is_empty()
    }
}

/// Compute the column partition of a table present on both sides
pub fn diff_columns(table: &str, source: &TableColumns, target: &TableColumns) -> TableDiff {
    let mut orphaned_columns: Vec<ColumnDescriptor> = target
        .iter()
        .filter(|col| !source.contains(&col.field))
        .cloned()
        .collect();
    orphaned_columns.sort_by(|a, b| a.field.cmp(&b.field));

    let new_columns = CandidatePool::new(source.names().filter(|name| !target.contains(name)));

    TableDiff {
        table: table.to_string(),
        orphaned_columns,
        new_columns,
    }
}
