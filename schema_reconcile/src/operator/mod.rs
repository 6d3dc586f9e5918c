//! Operator decision interface
//!
//! The resolution state machine only ever asks two kinds of question: pick one
//! item from a list, or type a line of text. A cancelled prompt comes back as
//! [`Error::OperatorCancelled`](crate::error::Error::OperatorCancelled) and is
//! treated as "go back".

pub mod terminal;

use crate::error::{Error, Result};

pub use terminal::TerminalOperator;

/// Something that can answer the reconciliation prompts
pub trait Operator {
    /// Choose one of `items`, returning its index
    fn select(&mut self, label: &str, items: &[String]) -> Result<usize>;

    /// Read a line of free text
    fn prompt_text(&mut self, label: &str) -> Result<String>;
}

/// Stand-in used when orphans are handled by policy and nobody is at the keyboard
#[derive(Debug, Default, Clone, Copy)]
pub struct Unattended;

impl Operator for Unattended {
    fn select(&mut self, label: &str, _items: &[String]) -> Result<usize> {
        Err(Error::OperatorError(format!("no operator attached to answer: {}", label)))
    }

    fn prompt_text(&mut self, label: &str) -> Result<String> {
        Err(Error::OperatorError(format!("no operator attached to answer: {}", label)))
    }
}
