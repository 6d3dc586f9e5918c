//! Type definitions for introspected schema objects

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The set of table names observed on one connection at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: BTreeSet<String>,
}

impl SchemaSnapshot {
    /// Create a snapshot from any collection of table names
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// One column as reported by the database's introspection facility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub field: String,
    /// Native type string, verbatim (e.g. `varchar(64)`, `int unsigned`)
    pub column_type: String,
    pub nullable: bool,
    pub key: Option<String>,
    pub default: Option<String>,
    pub extra: Option<String>,
    pub comment: Option<String>,
    pub collation: Option<String>,
}

impl ColumnDescriptor {
    /// Create a new column with the given name and type
    pub fn new(field: &str, column_type: &str) -> Self {
        Self {
            field: field.to_string(),
            column_type: column_type.to_string(),
            nullable: false,
            key: None,
            default: None,
            extra: None,
            comment: None,
            collation: None,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Columns of one table keyed by field name, in ordinal order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumns {
    columns: IndexMap<String, ColumnDescriptor>,
}

impl TableColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column. A later column with the same field replaces the earlier one.
    pub fn insert(&mut self, column: ColumnDescriptor) {
        self.columns.insert(column.field.clone(), column);
    }

    pub fn get(&self, field: &str) -> Option<&ColumnDescriptor> {
        self.columns.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.columns.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<ColumnDescriptor> for TableColumns {
    fn from_iter<I: IntoIterator<Item = ColumnDescriptor>>(iter: I) -> Self {
        let mut columns = TableColumns::new();
        for column in iter {
            columns.insert(column);
        }
        columns
    }
}
