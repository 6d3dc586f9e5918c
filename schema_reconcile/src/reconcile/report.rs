//! Run report

use serde::Serialize;
use std::fmt;

use crate::schema::generator::DdlStatement;

/// The table or column an outcome refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectRef {
    Table { table: String },
    Column { table: String, column: String },
}

impl ObjectRef {
    pub fn table(table: &str) -> Self {
        ObjectRef::Table {
            table: table.to_string(),
        }
    }

    pub fn column(table: &str, column: &str) -> Self {
        ObjectRef::Column {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Table { table } => write!(f, "`{}`", table),
            ObjectRef::Column { table, column } => write!(f, "`{}`.`{}`", table, column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Deleted,
    Renamed { to: String },
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectOutcome {
    pub object: ObjectRef,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Counts per outcome kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub created: usize,
    pub deleted: usize,
    pub renamed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} deleted, {} renamed, {} skipped, {} failed",
            self.created, self.deleted, self.renamed, self.skipped, self.failed
        )
    }
}

/// Everything one reconciliation pass did, in the order it did it.
/// Objects already in agreement are not listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub outcomes: Vec<ObjectOutcome>,
    /// SQL issued, or that would have been issued in a dry run
    pub statements: Vec<String>,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn record(&mut self, object: ObjectRef, outcome: Outcome) {
        match &outcome {
            Outcome::Failed { reason } => {
                tracing::warn!(object = %object, reason = %reason, "Object not reconciled")
            }
            other => tracing::debug!(object = %object, outcome = ?other, "Object reconciled"),
        }
        self.outcomes.push(ObjectOutcome { object, outcome });
    }

    pub fn record_statement(&mut self, statement: &DdlStatement) {
        self.statements.push(statement.to_sql());
    }

    pub fn outcome_of(&self, object: &ObjectRef) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|entry| &entry.object == object)
            .map(|entry| &entry.outcome)
    }

    pub fn summary(&self) -> Summary {
        self.outcomes
            .iter()
            .fold(Summary::default(), |mut summary, entry| {
                match entry.outcome {
                    Outcome::Created => summary.created += 1,
                    Outcome::Deleted => summary.deleted += 1,
                    Outcome::Renamed { .. } => summary.renamed += 1,
                    Outcome::Skipped => summary.skipped += 1,
                    Outcome::Failed { .. } => summary.failed += 1,
                }
                summary
            })
    }

    pub fn ddl_count(&self) -> usize {
        self.statements.len()
    }

    pub fn has_failures(&self) -> bool {
        self.summary().failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn summary_counts_each_outcome() {
        let mut report = RunReport::new(false);
        report.record(ObjectRef::table("sessions"), Outcome::Created);
        report.record(ObjectRef::table("tmp_old"), Outcome::Skipped);
        report.record(
            ObjectRef::column("users", "nick"),
            Outcome::Renamed {
                to: "nickname".into(),
            },
        );
        report.record(
            ObjectRef::table("audit"),
            Outcome::Failed {
                reason: "locked".into(),
            },
        );

        let summary = report.summary();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.renamed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert!(report.has_failures());
        assert_eq!(
            report.outcome_of(&ObjectRef::table("tmp_old")),
            Some(&Outcome::Skipped)
        );
    }

    #[test]
    fn serializes_flat_outcomes() {
        let mut report = RunReport::new(true);
        report.record(
            ObjectRef::column("users", "nick"),
            Outcome::Renamed {
                to: "nickname".into(),
            },
        );
        report.record_statement(&DdlStatement::DropTable {
            table: "tmp_old".into(),
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "dry_run": true,
                "outcomes": [{
                    "object": { "type": "column", "table": "users", "column": "nick" },
                    "result": "renamed",
                    "to": "nickname"
                }],
                "statements": ["DROP TABLE `tmp_old`"]
            })
        );
    }
}
