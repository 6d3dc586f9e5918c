//! Schema inspector
//!
//! Builds snapshots and column maps from a live connection. Type strings are
//! kept exactly as the server reports them, since a renamed column reuses its
//! type verbatim.

use crate::db::connection::Database;
use crate::error::{Error, Result};
use crate::schema::types::{SchemaSnapshot, TableColumns};

/// Schema inspector for one side of the reconciliation
pub struct SchemaInspector<'a> {
    connection: &'a dyn Database,
}

impl<'a> SchemaInspector<'a> {
    /// Create a new schema inspector
    pub fn new(connection: &'a dyn Database) -> Self {
        Self { connection }
    }

    pub fn label(&self) -> &str {
        self.connection.label()
    }

    /// Snapshot the set of table names
    pub async fn snapshot(&self) -> Result<SchemaSnapshot> {
        let tables = self.connection.list_tables().await?;
        let snapshot = SchemaSnapshot::new(tables);
        tracing::debug!(side = self.label(), tables = snapshot.len(), "Listed tables");
        Ok(snapshot)
    }

    /// Describe a table's columns in ordinal order
    pub async fn describe_table(&self, table: &str) -> Result<TableColumns> {
        let descriptors = self.connection.describe_table(table).await?;

        // information_schema answers an unknown table with zero rows
        if descriptors.is_empty() {
            return Err(Error::IntrospectionError(format!(
                "{} table `{}` reported no columns",
                self.label(),
                table
            )));
        }

        if let Some(blank) = descriptors.iter().position(|c| c.field.is_empty()) {
            return Err(Error::IntrospectionError(format!(
                "{} table `{}` reported an unnamed column at position {}",
                self.label(),
                table,
                blank + 1
            )));
        }

        Ok(descriptors.into_iter().collect())
    }

    /// The canonical `CREATE TABLE` text for a table
    pub async fn canonical_definition(&self, table: &str) -> Result<String> {
        let definition = self.connection.show_create_table(table).await?;
        if definition.trim().is_empty() {
            return Err(Error::IntrospectionError(format!(
                "{} returned an empty definition for `{}`",
                self.label(),
                table
            )));
        }
        Ok(definition)
    }
}
