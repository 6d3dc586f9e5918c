//! Database connection handling
//!
//! This module establishes MySQL connections, optionally through an SSH
//! tunnel, and exposes them behind the [`Database`] trait the engine runs on.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{Connection, Executor, FromRow, Row};
use std::time::Duration;

use crate::config::{ConnectionMode, EndpointConfig};
use crate::db::tunnel::SshTunnel;
use crate::error::{Error, Result};
use crate::schema::generator::DdlStatement;
use crate::schema::types::ColumnDescriptor;
use crate::utils::naming::quote_identifier;

const ACQUIRE_TIMEOUT_SECONDS: u64 = 30;

/// Operations the reconciliation engine needs from a live database
#[async_trait]
pub trait Database: Send + Sync {
    /// Short name used in log lines (`source` / `target`)
    fn label(&self) -> &str;

    /// Base tables of the connected schema
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns of a table in ordinal order, types verbatim
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// The `CREATE TABLE` text the server reports for a table
    async fn show_create_table(&self, table: &str) -> Result<String>;

    /// Execute a single statement
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Apply a DDL statement
    async fn apply(&self, statement: &DdlStatement) -> Result<()> {
        self.execute(&statement.to_sql()).await
    }
}

#[derive(FromRow)]
struct TableRow {
    table_name: String,
}

#[derive(FromRow)]
struct ColumnRow {
    field: String,
    column_type: String,
    is_nullable: String,
    column_key: Option<String>,
    column_default: Option<String>,
    extra: Option<String>,
    column_comment: Option<String>,
    collation_name: Option<String>,
}

impl From<ColumnRow> for ColumnDescriptor {
    fn from(row: ColumnRow) -> Self {
        ColumnDescriptor {
            field: row.field,
            column_type: row.column_type,
            nullable: row.is_nullable.eq_ignore_ascii_case("YES"),
            key: non_empty(row.column_key),
            default: row.column_default,
            extra: non_empty(row.extra),
            comment: non_empty(row.column_comment),
            collation: row.collation_name,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// A live MySQL connection for one side of the reconciliation
#[derive(Debug)]
pub struct DatabaseConnection {
    label: String,
    pool: MySqlPool,
    tunnel: Option<SshTunnel>,
}

impl DatabaseConnection {
    /// Open and ping a connection from endpoint configuration
    pub async fn connect(label: &str, config: &EndpointConfig) -> Result<Self> {
        tracing::info!(side = label, endpoint = %config, "Connecting");

        let tunnel = match config.mode {
            ConnectionMode::Ssh => Some(SshTunnel::open(config).await?),
            ConnectionMode::Tcp => None,
        };

        let (host, port) = match &tunnel {
            Some(tunnel) => {
                let addr = tunnel.local_addr();
                (addr.ip().to_string(), addr.port())
            }
            None => (config.db_host.clone(), config.database_port()),
        };

        let options = MySqlConnectOptions::new()
            .host(&host)
            .port(port)
            .username(&config.db_user)
            .password(&config.db_password)
            .database(&config.database)
            .charset(&config.charset);

        let pool = match Self::open_pool(options).await {
            Ok(pool) => pool,
            Err(e) => {
                if let Some(tunnel) = tunnel {
                    tunnel.close().await;
                }
                return Err(Error::ConnectionError(format!("{} database: {}", label, e)));
            }
        };

        tracing::info!(side = label, database = %config.database, "Connected");

        Ok(Self {
            label: label.to_string(),
            pool,
            tunnel,
        })
    }

    /// Single-connection pool, pinged before it is handed out
    async fn open_pool(options: MySqlConnectOptions) -> std::result::Result<MySqlPool, sqlx::Error> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECONDS))
            .connect_with(options)
            .await?;

        let ping = async {
            let mut conn = pool.acquire().await?;
            conn.ping().await
        };
        if let Err(e) = ping.await {
            pool.close().await;
            return Err(e);
        }

        Ok(pool)
    }

    /// Close the pool and tear down the tunnel, if any
    pub async fn close(self) {
        self.pool.close().await;
        if let Some(tunnel) = self.tunnel {
            tunnel.close().await;
        }
        tracing::debug!(side = %self.label, "Connection closed");
    }
}

#[async_trait]
impl Database for DatabaseConnection {
    fn label(&self) -> &str {
        &self.label
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT CAST(TABLE_NAME AS CHAR) AS table_name
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE()
              AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows = sqlx::query_as::<_, TableRow>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::IntrospectionError(format!("listing {} tables: {}", self.label, e)))?;

        Ok(rows.into_iter().map(|row| row.table_name).collect())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let sql = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR) AS field,
                CAST(COLUMN_TYPE AS CHAR) AS column_type,
                CAST(IS_NULLABLE AS CHAR) AS is_nullable,
                CAST(COLUMN_KEY AS CHAR) AS column_key,
                CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
                CAST(EXTRA AS CHAR) AS extra,
                CAST(COLUMN_COMMENT AS CHAR) AS column_comment,
                CAST(COLLATION_NAME AS CHAR) AS collation_name
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows = sqlx::query_as::<_, ColumnRow>(sql)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::IntrospectionError(format!(
                    "describing {} table `{}`: {}",
                    self.label, table, e
                ))
            })?;

        Ok(rows.into_iter().map(ColumnDescriptor::from).collect())
    }

    async fn show_create_table(&self, table: &str) -> Result<String> {
        let sql = format!("SHOW CREATE TABLE {}", quote_identifier(table));
        let row = (&self.pool).fetch_one(sql.as_str()).await.map_err(|e| {
            Error::IntrospectionError(format!("exporting {} table `{}`: {}", self.label, table, e))
        })?;

        row.try_get::<String, _>(1).map_err(|e| {
            Error::IntrospectionError(format!("exporting {} table `{}`: {}", self.label, table, e))
        })
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        (&self.pool)
            .execute(sql)
            .await
            .map_err(|e| Error::DdlExecutionError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_rows_map_to_descriptors() {
        let row = ColumnRow {
            field: "id".into(),
            column_type: "int unsigned".into(),
            is_nullable: "NO".into(),
            column_key: Some("PRI".into()),
            column_default: None,
            extra: Some("auto_increment".into()),
            column_comment: Some(String::new()),
            collation_name: None,
        };

        let column = ColumnDescriptor::from(row);
        assert_eq!(column.field, "id");
        assert_eq!(column.column_type, "int unsigned");
        assert!(!column.nullable);
        assert_eq!(column.key.as_deref(), Some("PRI"));
        assert_eq!(column.extra.as_deref(), Some("auto_increment"));
        assert_eq!(column.comment, None);
    }
}
