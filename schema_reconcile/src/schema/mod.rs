//! Schema module
//!
//! This module handles schema introspection, comparison, and DDL generation.

pub mod diff;
pub mod generator;
pub mod inspector;
pub mod types;

// Re-export key types
pub use diff::{diff_columns, partition_tables, CandidatePool, TableDiff, TablePartition};
pub use generator::DdlStatement;
pub use inspector::SchemaInspector;
pub use types::{ColumnDescriptor, SchemaSnapshot, TableColumns};
