//! Command-line entry point for schema_reconcile.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;

use schema_reconcile::config::{self, Config, OrphanPolicy, RenameTypeRule};
use schema_reconcile::utils::init_logging;
use schema_reconcile::{Operator, ReconcileClient, TerminalOperator, Unattended};

/// Reconcile a target MySQL schema against a source schema.
#[derive(Debug, Parser)]
#[command(name = "schema_reconcile", version, about)]
struct Cli {
    /// Configuration file (TOML, or JSON with a `.json` extension).
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Log the statements instead of running them.
    #[arg(long)]
    dry_run: bool,
    /// How to treat tables and columns that exist only on the target.
    #[arg(long, value_enum)]
    orphans: Option<OrphanPolicy>,
    /// Which type a renamed column keeps.
    #[arg(long, value_enum)]
    rename_column_type: Option<RenameTypeRule>,
    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Command-line flags win over the file's `[reconcile]` table
    fn apply_overrides(&self, config: &mut Config) {
        if self.dry_run {
            config.reconcile.dry_run = true;
        }
        if let Some(orphans) = self.orphans {
            config.reconcile.orphans = orphans;
        }
        if let Some(rule) = self.rename_column_type {
            config.reconcile.rename_column_type = rule;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_from_file(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);
    init_logging(&config.logging).context("initializing logging")?;

    let mut operator: Box<dyn Operator> = match config.reconcile.orphans {
        OrphanPolicy::Prompt => Box::new(TerminalOperator::new()?),
        OrphanPolicy::Skip | OrphanPolicy::Delete => Box::new(Unattended),
    };

    let client = ReconcileClient::new(config)
        .await
        .context("connecting to source and target")?;
    let result = client.reconcile(operator.as_mut()).await;
    client.close().await;
    let report = result.context("reconciliation aborted")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let prefix = if report.dry_run { "dry run: " } else { "" };
        println!("{}{}", prefix, report.summary());
        for statement in &report.statements {
            tracing::debug!(sql = %statement, "Statement issued");
        }
    }

    let failed = report.summary().failed;
    if failed > 0 {
        bail!("{} object(s) could not be reconciled", failed);
    }

    Ok(())
}
