//! DDL executor
//!
//! Runs generated statements against the target one at a time.

use crate::db::connection::Database;
use crate::error::Result;
use crate::schema::generator::DdlStatement;

/// Statement executor for the target database
pub struct DdlExecutor<'a> {
    connection: &'a dyn Database,
    dry_run: bool,
}

impl<'a> DdlExecutor<'a> {
    /// Create a new executor
    pub fn new(connection: &'a dyn Database, dry_run: bool) -> Self {
        Self {
            connection,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Execute a single statement. Each statement commits on its own.
    pub async fn execute(&self, statement: &DdlStatement) -> Result<()> {
        let object = statement.object();

        if self.dry_run {
            tracing::info!(object = %object, sql = %statement, "DDL (dry run)");
            return Ok(());
        }

        match self.connection.apply(statement).await {
            Ok(()) => {
                tracing::info!(
                    side = self.connection.label(),
                    object = %object,
                    sql = %statement,
                    "DDL applied"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    side = self.connection.label(),
                    object = %object,
                    sql = %statement,
                    error = %e,
                    "DDL failed"
                );
                Err(e)
            }
        }
    }
}
