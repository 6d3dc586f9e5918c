//! In-memory doubles for the database and operator seams
//!
//! Enabled for unit tests and, through the `test-support` feature, for the
//! integration suite.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::db::connection::Database;
use crate::error::{Error, Result};
use crate::operator::Operator;
use crate::schema::generator::DdlStatement;
use crate::schema::types::ColumnDescriptor;
use crate::utils::naming::quote_identifier;

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Vec<ColumnDescriptor>>,
    executed: Vec<String>,
    fail_on: Vec<String>,
    fail_once: Vec<String>,
    fail_describe: BTreeSet<String>,
    fail_listing: bool,
}

/// A schema held in memory that applies DDL structurally
#[derive(Debug)]
pub struct MemoryDatabase {
    label: String,
    state: Mutex<State>,
}

impl MemoryDatabase {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Add a table of `NOT NULL` columns given as `(field, type)`
    pub fn with_table(self, name: &str, columns: &[(&str, &str)]) -> Self {
        self.with_columns(
            name,
            columns
                .iter()
                .map(|(field, ty)| ColumnDescriptor::new(field, ty))
                .collect(),
        )
    }

    pub fn with_columns(self, name: &str, columns: Vec<ColumnDescriptor>) -> Self {
        self.state().tables.insert(name.to_string(), columns);
        self
    }

    /// Statements containing `fragment` always fail
    pub fn fail_on(self, fragment: &str) -> Self {
        self.state().fail_on.push(fragment.to_string());
        self
    }

    /// The first statement containing `fragment` fails, later ones succeed
    pub fn fail_once(self, fragment: &str) -> Self {
        self.state().fail_once.push(fragment.to_string());
        self
    }

    pub fn fail_describe(self, table: &str) -> Self {
        self.state().fail_describe.insert(table.to_string());
        self
    }

    pub fn fail_listing(self) -> Self {
        self.state().fail_listing = true;
        self
    }

    pub fn push_column(&self, table: &str, column: ColumnDescriptor) {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(column);
    }

    /// Every statement that reached the database, in order
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state().tables.keys().cloned().collect()
    }

    /// `(field, type)` pairs of a table, or `None` if it does not exist
    pub fn columns(&self, table: &str) -> Option<Vec<(String, String)>> {
        self.state().tables.get(table).map(|columns| {
            columns
                .iter()
                .map(|c| (c.field.clone(), c.column_type.clone()))
                .collect()
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Render a definition in the shape `SHOW CREATE TABLE` returns
fn render_definition(table: &str, columns: &[ColumnDescriptor]) -> String {
    let lines: Vec<String> = columns
        .iter()
        .map(|c| {
            format!(
                "  {} {} {}",
                quote_identifier(&c.field),
                c.column_type,
                if c.nullable { "NULL" } else { "NOT NULL" }
            )
        })
        .collect();
    format!(
        "CREATE TABLE {} (\n{}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        quote_identifier(table),
        lines.join(",\n")
    )
}

/// Inverse of [`render_definition`]
fn parse_definition(definition: &str) -> Vec<ColumnDescriptor> {
    definition
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("  `")?;
            let (field, rest) = rest.split_once("` ")?;
            let rest = rest.trim_end_matches(',');
            let (column_type, nullable) = match rest.strip_suffix(" NOT NULL") {
                Some(ty) => (ty, false),
                None => (rest.strip_suffix(" NULL").unwrap_or(rest), true),
            };
            Some(ColumnDescriptor::new(&field.replace("``", "`"), column_type).nullable(nullable))
        })
        .collect()
}

fn missing(what: &str) -> Error {
    Error::DdlExecutionError(format!("{} does not exist", what))
}

fn apply_to(tables: &mut BTreeMap<String, Vec<ColumnDescriptor>>, statement: &DdlStatement) -> Result<()> {
    match statement {
        DdlStatement::CreateTable { table, definition } => {
            if tables.contains_key(table) {
                return Err(Error::DdlExecutionError(format!("table `{}` already exists", table)));
            }
            tables.insert(table.clone(), parse_definition(definition));
        }
        DdlStatement::DropTable { table } => {
            tables.remove(table).ok_or_else(|| missing(table))?;
        }
        DdlStatement::RenameTable { from, to } => {
            if tables.contains_key(to) {
                return Err(Error::DdlExecutionError(format!("table `{}` already exists", to)));
            }
            let columns = tables.remove(from).ok_or_else(|| missing(from))?;
            tables.insert(to.clone(), columns);
        }
        DdlStatement::DropColumn { table, column } => {
            let columns = tables.get_mut(table).ok_or_else(|| missing(table))?;
            let position = columns
                .iter()
                .position(|c| &c.field == column)
                .ok_or_else(|| missing(column))?;
            columns.remove(position);
        }
        DdlStatement::ChangeColumn {
            table,
            from,
            to,
            column_type,
        } => {
            let columns = tables.get_mut(table).ok_or_else(|| missing(table))?;
            if from != to && columns.iter().any(|c| &c.field == to) {
                return Err(Error::DdlExecutionError(format!("duplicate column name `{}`", to)));
            }
            let column = columns
                .iter_mut()
                .find(|c| &c.field == from)
                .ok_or_else(|| missing(from))?;
            column.field = to.clone();
            column.column_type = column_type.clone();
        }
    }
    Ok(())
}

#[async_trait]
impl Database for MemoryDatabase {
    fn label(&self) -> &str {
        &self.label
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let state = self.state();
        if state.fail_listing {
            return Err(Error::IntrospectionError(format!("{}: cannot list tables", self.label)));
        }
        Ok(state.tables.keys().cloned().collect())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let state = self.state();
        if state.fail_describe.contains(table) {
            return Err(Error::IntrospectionError(format!("cannot describe `{}`", table)));
        }
        state
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| Error::IntrospectionError(format!("table `{}` does not exist", table)))
    }

    async fn show_create_table(&self, table: &str) -> Result<String> {
        self.state()
            .tables
            .get(table)
            .map(|columns| render_definition(table, columns))
            .ok_or_else(|| Error::IntrospectionError(format!("table `{}` does not exist", table)))
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.state().executed.push(sql.to_string());
        Ok(())
    }

    async fn apply(&self, statement: &DdlStatement) -> Result<()> {
        let sql = statement.to_sql();
        let mut state = self.state();

        if state.fail_on.iter().any(|fragment| sql.contains(fragment.as_str())) {
            return Err(Error::DdlExecutionError(format!("rejected: {}", sql)));
        }
        if let Some(index) = state.fail_once.iter().position(|f| sql.contains(f.as_str())) {
            state.fail_once.remove(index);
            return Err(Error::DdlExecutionError(format!("rejected once: {}", sql)));
        }

        apply_to(&mut state.tables, statement)?;
        state.executed.push(sql);
        Ok(())
    }
}

/// One scripted operator answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Select by index
    Choose(usize),
    /// Select the item equal to, or else the first containing, this text
    Pick(String),
    /// Answer a text prompt
    Text(String),
    Cancel,
}

impl Reply {
    pub fn pick(text: &str) -> Self {
        Reply::Pick(text.to_string())
    }

    pub fn text(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

/// Operator that replays a fixed list of answers and records what it was asked
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    replies: VecDeque<Reply>,
    asked: Vec<(String, Vec<String>)>,
}

impl ScriptedOperator {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Labels and items of every prompt shown; text prompts have no items
    pub fn asked(&self) -> &[(String, Vec<String>)] {
        &self.asked
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }

    fn next_reply(&mut self, label: &str) -> Result<Reply> {
        self.replies
            .pop_front()
            .ok_or_else(|| Error::OperatorError(format!("script exhausted at: {}", label)))
    }
}

impl Operator for ScriptedOperator {
    fn select(&mut self, label: &str, items: &[String]) -> Result<usize> {
        self.asked.push((label.to_string(), items.to_vec()));
        match self.next_reply(label)? {
            Reply::Choose(index) => Ok(index),
            Reply::Pick(text) => items
                .iter()
                .position(|item| item == &text)
                .or_else(|| items.iter().position(|item| item.contains(text.as_str())))
                .ok_or_else(|| Error::OperatorError(format!("no item matching {:?} in {:?}", text, items))),
            Reply::Cancel => Err(Error::OperatorCancelled),
            Reply::Text(text) => Err(Error::OperatorError(format!(
                "scripted text {:?} given to a menu: {}",
                text, label
            ))),
        }
    }

    fn prompt_text(&mut self, label: &str) -> Result<String> {
        self.asked.push((label.to_string(), Vec::new()));
        match self.next_reply(label)? {
            Reply::Text(text) => Ok(text),
            Reply::Cancel => Err(Error::OperatorCancelled),
            other => Err(Error::OperatorError(format!(
                "scripted {:?} given to a text prompt: {}",
                other, label
            ))),
        }
    }
}
