//! Reconciliation engine
//!
//! One [`ReconciliationRun`] is one pass over a source/target pair. Orphaned
//! tables are resolved first so that a rename can claim a source-only table
//! before it would otherwise be created. Remaining source-only tables are then
//! created, and finally every shared table is reconciled column by column.

pub mod report;
pub mod resolution;

use std::collections::BTreeSet;

use crate::config::ReconcileConfig;
use crate::db::connection::Database;
use crate::db::executor::DdlExecutor;
use crate::error::Result;
use crate::operator::Operator;
use crate::schema::diff::{diff_columns, partition_tables, CandidatePool, TablePartition};
use crate::schema::generator::DdlStatement;
use crate::schema::inspector::SchemaInspector;
use crate::schema::types::{SchemaSnapshot, TableColumns};
use crate::utils::naming::check_identifier_conflicts;

pub use report::{ObjectOutcome, ObjectRef, Outcome, RunReport, Summary};
pub use resolution::{
    OrphanObject, Resolution, ResolutionContext, ResolutionEvent, ResolutionState,
};

/// Context for a single reconciliation pass
pub struct ReconciliationRun<'a> {
    source: SchemaInspector<'a>,
    target: SchemaInspector<'a>,
    executor: DdlExecutor<'a>,
    operator: &'a mut dyn Operator,
    options: ReconcileConfig,
    report: RunReport,
}

impl<'a> ReconciliationRun<'a> {
    pub fn new(
        source: &'a dyn Database,
        target: &'a dyn Database,
        operator: &'a mut dyn Operator,
        options: ReconcileConfig,
    ) -> Self {
        Self {
            source: SchemaInspector::new(source),
            target: SchemaInspector::new(target),
            executor: DdlExecutor::new(target, options.dry_run),
            operator,
            report: RunReport::new(options.dry_run),
            options,
        }
    }

    /// Run the pass to completion
    ///
    /// Failing to list tables on either side aborts the run. Everything after
    /// that fails per object and ends up in the report.
    pub async fn execute(mut self) -> Result<RunReport> {
        let source_tables = self.source.snapshot().await?;
        let target_tables = self.target.snapshot().await?;
        warn_on_case_conflicts(&source_tables);

        let TablePartition {
            source_only,
            target_only,
            mut shared,
        } = partition_tables(&source_tables, &target_tables);

        tracing::info!(
            source = source_tables.len(),
            target = target_tables.len(),
            new = source_only.len(),
            orphaned = target_only.len(),
            shared = shared.len(),
            dry_run = self.options.dry_run,
            "Reconciling schemas"
        );

        let mut pool = CandidatePool::new(source_only);
        for table in &target_only {
            if let Some(renamed_to) = self.reconcile_orphan_table(table, &mut pool).await? {
                if !source_tables.contains(&renamed_to) {
                    continue;
                }
                if self.executor.is_dry_run() {
                    tracing::info!(
                        table = %renamed_to,
                        "Not diffing columns of a table that was only renamed in a dry run"
                    );
                } else {
                    shared.insert(renamed_to);
                }
            }
        }

        for table in pool.iter() {
            self.create_table(table).await?;
        }

        for table in &shared {
            self.reconcile_columns(table).await?;
        }

        let summary = self.report.summary();
        tracing::info!(
            created = summary.created,
            deleted = summary.deleted,
            renamed = summary.renamed,
            skipped = summary.skipped,
            failed = summary.failed,
            statements = self.report.ddl_count(),
            "Reconciliation finished"
        );

        Ok(self.report)
    }

    async fn resolve(
        &mut self,
        object: &OrphanObject<'_>,
        pool: &CandidatePool,
    ) -> Result<Resolution> {
        let mut ctx = ResolutionContext {
            policy: self.options.orphans,
            operator: &mut *self.operator,
            executor: &self.executor,
            report: &mut self.report,
        };
        resolution::resolve(object, pool, &mut ctx).await
    }

    /// Resolve one target-only table. Returns the new name if it was renamed.
    async fn reconcile_orphan_table(
        &mut self,
        table: &str,
        pool: &mut CandidatePool,
    ) -> Result<Option<String>> {
        let object = OrphanObject::Table { name: table };
        let resolution = self.resolve(&object, pool).await?;

        let renamed_to = match &resolution.state {
            ResolutionState::Renamed(name) => {
                if pool.take(name) {
                    tracing::debug!(table, candidate = %name, "Candidate table claimed by rename");
                }
                Some(name.clone())
            }
            _ => None,
        };

        self.record_resolution(ObjectRef::table(table), resolution);
        Ok(renamed_to)
    }

    /// Replicate a source-only table from its canonical definition
    async fn create_table(&mut self, table: &str) -> Result<()> {
        let object = ObjectRef::table(table);

        let definition = match self.source.canonical_definition(table).await {
            Ok(definition) => definition,
            Err(e) if e.is_recoverable() => {
                self.report.record(object, Outcome::Failed { reason: e.to_string() });
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let statement = DdlStatement::CreateTable {
            table: table.to_string(),
            definition,
        };
        match self.executor.execute(&statement).await {
            Ok(()) => {
                self.report.record_statement(&statement);
                self.report.record(object, Outcome::Created);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                self.report.record(object, Outcome::Failed { reason: e.to_string() });
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve every orphaned column of a table present on both sides
    async fn reconcile_columns(&mut self, table: &str) -> Result<()> {
        let (source_columns, target_columns) = match self.describe_both(table).await {
            Ok(columns) => columns,
            Err(e) if e.is_recoverable() => {
                self.report
                    .record(ObjectRef::table(table), Outcome::Failed { reason: e.to_string() });
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let diff = diff_columns(table, &source_columns, &target_columns);
        if diff.is_empty() {
            tracing::debug!(table, "Columns already match");
            return Ok(());
        }

        let mut candidates = diff.new_columns;
        for column in &diff.orphaned_columns {
            let object = OrphanObject::Column {
                table,
                column,
                source_columns: &source_columns,
                type_rule: self.options.rename_column_type,
            };
            let resolution = self.resolve(&object, &candidates).await?;

            if let ResolutionState::Renamed(name) = &resolution.state {
                candidates.take(name);
            }
            self.record_resolution(ObjectRef::column(table, &column.field), resolution);
        }

        if !candidates.is_empty() {
            let unmatched: BTreeSet<&str> = candidates.iter().collect();
            tracing::info!(
                table,
                columns = ?unmatched,
                "Source columns missing on target were left unmatched"
            );
        }

        Ok(())
    }

    async fn describe_both(&self, table: &str) -> Result<(TableColumns, TableColumns)> {
        let source = self.source.describe_table(table).await?;
        let target = self.target.describe_table(table).await?;
        Ok((source, target))
    }

    fn record_resolution(&mut self, object: ObjectRef, resolution: Resolution) {
        let outcome = match resolution.state {
            ResolutionState::Deleted => Outcome::Deleted,
            ResolutionState::Renamed(name) => Outcome::Renamed { to: name },
            ResolutionState::Abandoned => Outcome::Failed {
                reason: resolution
                    .last_error
                    .unwrap_or_else(|| "abandoned without an operator".to_string()),
            },
            _ => Outcome::Skipped,
        };
        self.report.record(object, outcome);
    }
}

fn warn_on_case_conflicts(source: &SchemaSnapshot) {
    let names: Vec<String> = source.tables.iter().cloned().collect();
    if let Some((first, second)) = check_identifier_conflicts(&names, true) {
        tracing::warn!(
            first = %first,
            second = %second,
            "Source tables differ only by case; a case-insensitive target cannot hold both"
        );
    }
}
