//! schema_reconcile: brings a target MySQL schema in line with a source schema
//!
//! Tables and columns that exist only on the source are created or offered as
//! rename targets. Tables and columns that exist only on the target are put to
//! an operator, who decides per object whether to skip, drop, or rename it.
//! Either database may be reached through an SSH tunnel.

pub mod config;
pub mod db;
pub mod error;
pub mod operator;
pub mod reconcile;
pub mod schema;
pub mod utils;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-export main types for easier access
pub use config::Config;
pub use db::connection::{Database, DatabaseConnection};
pub use error::{Error, Result};
pub use operator::{Operator, TerminalOperator, Unattended};
pub use reconcile::{ReconciliationRun, RunReport};

/// Load a configuration file and connect to both databases
pub async fn init(config_path: &str) -> Result<ReconcileClient> {
    let config = config::load_from_file(config_path)?;
    ReconcileClient::new(config).await
}

/// Connected source and target, ready to reconcile
pub struct ReconcileClient {
    config: Config,
    source: DatabaseConnection,
    target: DatabaseConnection,
}

impl ReconcileClient {
    /// Connect to both sides. A failed target connection closes the source again.
    pub async fn new(config: Config) -> Result<Self> {
        let source = DatabaseConnection::connect("source", &config.source).await?;
        let target = match DatabaseConnection::connect("target", &config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self {
            config,
            source,
            target,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one reconciliation pass
    pub async fn reconcile(&self, operator: &mut dyn Operator) -> Result<RunReport> {
        ReconciliationRun::new(
            &self.source,
            &self.target,
            operator,
            self.config.reconcile.clone(),
        )
        .execute()
        .await
    }

    /// Close both connections and any tunnels
    pub async fn close(self) {
        self.source.close().await;
        self.target.close().await;
    }
}
