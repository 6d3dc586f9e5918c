//! DDL generator
//!
//! Translates reconciliation decisions into MySQL statements.

use serde::Serialize;
use std::fmt;

use crate::utils::naming::quote_identifier;

/// One statement to run against the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DdlStatement {
    /// Replicate a source table using its `SHOW CREATE TABLE` text
    CreateTable { table: String, definition: String },
    DropTable { table: String },
    RenameTable { from: String, to: String },
    DropColumn { table: String, column: String },
    /// Rename a column. `column_type` is reused verbatim.
    ChangeColumn {
        table: String,
        from: String,
        to: String,
        column_type: String,
    },
}

impl DdlStatement {
    /// Render the statement as SQL
    pub fn to_sql(&self) -> String {
        match self {
            DdlStatement::CreateTable { definition, .. } => definition.clone(),
            DdlStatement::DropTable { table } => {
                format!("DROP TABLE {}", quote_identifier(table))
            }
            DdlStatement::RenameTable { from, to } => format!(
                "RENAME TABLE {} TO {}",
                quote_identifier(from),
                quote_identifier(to)
            ),
            DdlStatement::DropColumn { table, column } => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote_identifier(table),
                quote_identifier(column)
            ),
            DdlStatement::ChangeColumn {
                table,
                from,
                to,
                column_type,
            } => format!(
                "ALTER TABLE {} CHANGE COLUMN {} {} {}",
                quote_identifier(table),
                quote_identifier(from),
                quote_identifier(to),
                column_type
            ),
        }
    }

    /// Human-readable name of the object the statement acts on
    pub fn object(&self) -> String {
        match self {
            DdlStatement::CreateTable { table, .. } | DdlStatement::DropTable { table } => {
                format!("`{}`", table)
            }
            DdlStatement::RenameTable { from, .. } => format!("`{}`", from),
            DdlStatement::DropColumn { table, column } => format!("`{}`.`{}`", table, column),
            DdlStatement::ChangeColumn { table, from, .. } => format!("`{}`.`{}`", table, from),
        }
    }
}

impl fmt::Display for DdlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
