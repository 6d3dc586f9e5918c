//! Database module
//!
//! This module handles database connections, SSH tunneling, and DDL execution.

pub mod connection;
pub mod executor;
pub mod tunnel;

// Re-export key types
pub use connection::{Database, DatabaseConnection};
pub use executor::DdlExecutor;
pub use tunnel::SshTunnel;
