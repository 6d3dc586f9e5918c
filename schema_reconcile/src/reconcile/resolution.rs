//! Orphan resolution state machine
//!
//! Every orphaned table or column goes through the same finite-state machine.
//! [`ResolutionState::next`] is the pure transition function; [`resolve`] is
//! the driver loop that feeds it operator answers and DDL results until a
//! terminal state is reached.

use crate::config::{OrphanPolicy, RenameTypeRule};
use crate::db::executor::DdlExecutor;
use crate::error::{Error, Result};
use crate::operator::Operator;
use crate::reconcile::report::RunReport;
use crate::schema::diff::CandidatePool;
use crate::schema::generator::DdlStatement;
use crate::schema::types::{ColumnDescriptor, TableColumns};
use crate::utils::naming::validate_identifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionState {
    Undecided,
    ConfirmingDelete,
    ChoosingRenameSource,
    ChoosingCandidate,
    TypingName,
    PendingDelete,
    /// Rename to the chosen or typed name
    PendingRename(String),
    Skipped,
    Deleted,
    Renamed(String),
    /// Unattended run whose DDL failed; nobody is there to retry
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionEvent {
    Skip,
    Delete,
    Rename,
    Back,
    Confirm,
    PickFromPool,
    TypeName,
    Candidate(String),
    Typed(String),
    Cancelled,
    Applied,
    Failed,
    Abandon,
}

impl ResolutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolutionState::Skipped
                | ResolutionState::Deleted
                | ResolutionState::Renamed(_)
                | ResolutionState::Abandoned
        )
    }

    /// Apply one event. Events that make no sense in a state leave it unchanged.
    pub fn next(self, event: ResolutionEvent) -> ResolutionState {
        use ResolutionEvent as E;
        use ResolutionState as S;

        match (self, event) {
            (state, _) if state.is_terminal() => state,
            (_, E::Abandon) => S::Abandoned,

            (S::Undecided, E::Skip | E::Cancelled) => S::Skipped,
            (S::Undecided, E::Delete) => S::ConfirmingDelete,
            (S::Undecided, E::Rename) => S::ChoosingRenameSource,

            (S::ConfirmingDelete, E::Back | E::Cancelled) => S::Undecided,
            (S::ConfirmingDelete, E::Confirm) => S::PendingDelete,

            (S::ChoosingRenameSource, E::Back | E::Cancelled) => S::Undecided,
            (S::ChoosingRenameSource, E::PickFromPool) => S::ChoosingCandidate,
            (S::ChoosingRenameSource, E::TypeName) => S::TypingName,

            (S::ChoosingCandidate, E::Back | E::Cancelled) => S::ChoosingRenameSource,
            (S::ChoosingCandidate, E::Candidate(name)) => S::PendingRename(name),

            (S::TypingName, E::Back | E::Cancelled) => S::ChoosingRenameSource,
            (S::TypingName, E::Typed(name)) => S::PendingRename(name),

            (S::PendingDelete, E::Applied) => S::Deleted,
            (S::PendingDelete, E::Failed) => S::Undecided,
            (S::PendingRename(name), E::Applied) => S::Renamed(name),
            (S::PendingRename(_), E::Failed) => S::ChoosingRenameSource,

            (state, _) => state,
        }
    }
}

/// The object a resolution is about
#[derive(Debug, Clone, Copy)]
pub enum OrphanObject<'a> {
    Table {
        name: &'a str,
    },
    Column {
        table: &'a str,
        column: &'a ColumnDescriptor,
        source_columns: &'a TableColumns,
        type_rule: RenameTypeRule,
    },
}

impl<'a> OrphanObject<'a> {
    pub fn name(&self) -> &'a str {
        match *self {
            OrphanObject::Table { name } => name,
            OrphanObject::Column { column, .. } => &column.field,
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            OrphanObject::Table { .. } => "table",
            OrphanObject::Column { .. } => "field",
        }
    }

    pub fn delete_statement(&self) -> DdlStatement {
        match self {
            OrphanObject::Table { name } => DdlStatement::DropTable {
                table: name.to_string(),
            },
            OrphanObject::Column { table, column, .. } => DdlStatement::DropColumn {
                table: table.to_string(),
                column: column.field.clone(),
            },
        }
    }

    pub fn rename_statement(&self, to: &str) -> DdlStatement {
        match self {
            OrphanObject::Table { name } => DdlStatement::RenameTable {
                from: name.to_string(),
                to: to.to_string(),
            },
            OrphanObject::Column {
                table,
                column,
                source_columns,
                type_rule,
            } => DdlStatement::ChangeColumn {
                table: table.to_string(),
                from: column.field.clone(),
                to: to.to_string(),
                column_type: rename_type(column, source_columns, to, *type_rule),
            },
        }
    }
}

/// Type used for `CHANGE COLUMN`
///
/// `Target` always keeps the orphan's own type. `Source` adopts the type of the
/// source column named `to` when one exists, else falls back to the orphan's.
pub fn rename_type(
    column: &ColumnDescriptor,
    source_columns: &TableColumns,
    to: &str,
    rule: RenameTypeRule,
) -> String {
    match rule {
        RenameTypeRule::Target => column.column_type.clone(),
        RenameTypeRule::Source => source_columns
            .get(to)
            .map(|source| source.column_type.clone())
            .unwrap_or_else(|| column.column_type.clone()),
    }
}

/// A question for the operator, with the event each answer produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Select {
        label: String,
        items: Vec<(String, ResolutionEvent)>,
    },
    Text {
        label: String,
    },
}

impl Prompt {
    pub fn label(&self) -> &str {
        match self {
            Prompt::Select { label, .. } | Prompt::Text { label } => label,
        }
    }

    /// Put the error that sent the operator back here above the question
    fn with_notice(mut self, notice: Option<String>) -> Self {
        if let Some(notice) = notice {
            let label = match &mut self {
                Prompt::Select { label, .. } | Prompt::Text { label } => label,
            };
            *label = format!("The last statement failed: {}\n{}", notice, label);
        }
        self
    }
}

/// The prompt shown in a non-pending, non-terminal state
pub fn prompt_for(state: &ResolutionState, object: &OrphanObject<'_>, pool: &CandidatePool) -> Option<Prompt> {
    let noun = object.noun();
    let name = object.name();
    let back = || ("Go back to reselect".to_string(), ResolutionEvent::Back);

    let prompt = match state {
        ResolutionState::Undecided => {
            let label = match object {
                OrphanObject::Table { .. } => format!(
                    "The table `{}` exists on the target database but not in the source database. Please select your operation",
                    name
                ),
                OrphanObject::Column { table, .. } => format!(
                    "The field `{}` exists on the target table `{}` but not in the source database. Please select your operation",
                    name, table
                ),
            };
            Prompt::Select {
                label,
                items: vec![
                    ("Skip".to_string(), ResolutionEvent::Skip),
                    (format!("Delete the {} `{}`", noun, name), ResolutionEvent::Delete),
                    (format!("Rename the {} `{}`", noun, name), ResolutionEvent::Rename),
                ],
            }
        }
        ResolutionState::ConfirmingDelete => Prompt::Select {
            label: format!(
                "The {} `{}` cannot be recovered after deletion, please confirm:",
                noun, name
            ),
            items: vec![
                back(),
                (format!("Delete the {} `{}`", noun, name), ResolutionEvent::Confirm),
            ],
        },
        ResolutionState::ChoosingRenameSource => {
            let pick = match object {
                OrphanObject::Table { .. } => {
                    "Select a table name from the source database".to_string()
                }
                OrphanObject::Column { table, .. } => {
                    format!("Select a field name from the source table `{}`", table)
                }
            };
            Prompt::Select {
                label: format!("How should the {} `{}` be renamed?", noun, name),
                items: vec![
                    back(),
                    (pick, ResolutionEvent::PickFromPool),
                    (format!("Input a new {} name", noun), ResolutionEvent::TypeName),
                ],
            }
        }
        ResolutionState::ChoosingCandidate => {
            let mut items = vec![back()];
            items.extend(
                pool.iter()
                    .map(|candidate| (candidate.to_string(), ResolutionEvent::Candidate(candidate.to_string()))),
            );
            Prompt::Select {
                label: format!("Please select a {} name or go back to reselect", noun),
                items,
            }
        }
        ResolutionState::TypingName => Prompt::Text {
            label: format!("Please input a new {} name for `{}`:", noun, name),
        },
        _ => return None,
    };

    Some(prompt)
}

/// Ask the operator and translate the answer into an event
fn ask(operator: &mut dyn Operator, prompt: Prompt, current_name: &str) -> Result<ResolutionEvent> {
    tracing::debug!(object = current_name, prompt = prompt.label(), "Asking operator");
    match prompt {
        Prompt::Select { label, items } => {
            let labels: Vec<String> = items.iter().map(|(text, _)| text.clone()).collect();
            match operator.select(&label, &labels) {
                Ok(index) => items
                    .into_iter()
                    .nth(index)
                    .map(|(_, event)| event)
                    .ok_or_else(|| {
                        Error::OperatorError(format!("selection {} is out of range", index))
                    }),
                Err(Error::OperatorCancelled) => Ok(ResolutionEvent::Cancelled),
                Err(e) => Err(e),
            }
        }
        Prompt::Text { label } => match operator.prompt_text(&label) {
            Ok(text) => match validate_identifier(&text) {
                Ok(name) if name == current_name => {
                    tracing::warn!(name = %name, "New name is the same as the current one");
                    Ok(ResolutionEvent::Cancelled)
                }
                Ok(name) => Ok(ResolutionEvent::Typed(name)),
                Err(e) => {
                    tracing::warn!(error = %e, "Rejected name");
                    Ok(ResolutionEvent::Cancelled)
                }
            },
            Err(Error::OperatorCancelled) => Ok(ResolutionEvent::Cancelled),
            Err(e) => Err(e),
        },
    }
}

/// Answer that an unattended policy gives in a given state
fn unattended(policy: OrphanPolicy, state: &ResolutionState) -> ResolutionEvent {
    match (policy, state) {
        (OrphanPolicy::Delete, ResolutionState::Undecided) => ResolutionEvent::Delete,
        (OrphanPolicy::Delete, ResolutionState::ConfirmingDelete) => ResolutionEvent::Confirm,
        (OrphanPolicy::Delete, _) => ResolutionEvent::Abandon,
        _ => ResolutionEvent::Skip,
    }
}

/// Final state of one orphan, plus the last DDL error seen on the way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub state: ResolutionState,
    pub last_error: Option<String>,
}

/// Everything the driver needs besides the object itself
pub struct ResolutionContext<'r, 'a> {
    pub policy: OrphanPolicy,
    pub operator: &'r mut dyn Operator,
    pub executor: &'r DdlExecutor<'a>,
    pub report: &'r mut RunReport,
}

/// Drive one orphan to a terminal state
///
/// Only fatal errors (connection loss, a broken operator interface) are
/// returned as `Err`; failed DDL is reported and fed back into the machine.
pub async fn resolve(
    object: &OrphanObject<'_>,
    pool: &CandidatePool,
    ctx: &mut ResolutionContext<'_, '_>,
) -> Result<Resolution> {
    let mut state = ResolutionState::Undecided;
    let mut last_error = None;
    let mut notice = None;

    while !state.is_terminal() {
        let event = match &state {
            ResolutionState::PendingDelete => {
                apply(object.delete_statement(), ctx, &mut last_error).await?
            }
            ResolutionState::PendingRename(name) => {
                apply(object.rename_statement(name), ctx, &mut last_error).await?
            }
            other => match ctx.policy {
                OrphanPolicy::Prompt => match prompt_for(other, object, pool) {
                    Some(prompt) => ask(ctx.operator, prompt.with_notice(notice.take()), object.name())?,
                    None => ResolutionEvent::Abandon,
                },
                policy => unattended(policy, other),
            },
        };

        if event == ResolutionEvent::Failed {
            notice = last_error.clone();
        }
        state = state.next(event);
    }

    Ok(Resolution { state, last_error })
}

async fn apply(
    statement: DdlStatement,
    ctx: &mut ResolutionContext<'_, '_>,
    last_error: &mut Option<String>,
) -> Result<ResolutionEvent> {
    match ctx.executor.execute(&statement).await {
        Ok(()) => {
            ctx.report.record_statement(&statement);
            Ok(ResolutionEvent::Applied)
        }
        Err(e) if e.is_recoverable() => {
            *last_error = Some(e.to_string());
            if ctx.policy == OrphanPolicy::Prompt {
                Ok(ResolutionEvent::Failed)
            } else {
                Ok(ResolutionEvent::Abandon)
            }
        }
        Err(e) => Err(e),
    }
}
