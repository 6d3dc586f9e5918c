//! Utilities shared across the crate

pub mod logging;
pub mod naming;

pub use logging::init_logging;
pub use naming::{quote_identifier, validate_identifier};
