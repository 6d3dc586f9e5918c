//! Identifier utilities
//!
//! Quoting and validation for MySQL identifiers that end up in generated DDL.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// MySQL limit for table and column names
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Quote an identifier with backticks, doubling any embedded backtick
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Validate an operator-supplied identifier and return it trimmed
pub fn validate_identifier(name: &str) -> Result<String> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(Error::OperatorError("identifier must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(Error::OperatorError(format!(
            "identifier `{}` is longer than {} characters",
            trimmed, MAX_IDENTIFIER_LENGTH
        )));
    }
    if trimmed.contains('\0') {
        return Err(Error::OperatorError("identifier must not contain NUL".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Check for name conflicts in a list of identifiers
///
/// Returns the first pair that collides. Used to warn when a target runs with
/// `lower_case_table_names` and two source tables differ only by case.
pub fn check_identifier_conflicts(
    names: &[String],
    ignore_case: bool,
) -> Option<(String, String)> {
    let mut seen = HashMap::<String, String>::new();

    for name in names {
        let key = if ignore_case { name.to_lowercase() } else { name.clone() };

        if let Some(existing) = seen.get(&key) {
            if name != existing {
                return Some((existing.clone(), name.clone()));
            }
        } else {
            seen.insert(key, name.clone());
        }
    }

    None
}
