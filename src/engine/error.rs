use ulid::Ulid;

use crate::model::{Ms, TestStep};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    InvalidInterval { start: Ms, end: Ms },
    IncompleteDraft(Vec<&'static str>),
    ConflictRejected(Vec<TestStep>),
    NotFound(Ulid),
    UnknownReference { field: &'static str, id: String },
    LimitExceeded(&'static str),
}

impl SchedulerError {
    /// Short machine-readable tag, used for metrics labels and protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerError::InvalidInterval { .. } => "invalid_interval",
            SchedulerError::IncompleteDraft(_) => "incomplete_draft",
            SchedulerError::ConflictRejected(_) => "conflict_rejected",
            SchedulerError::NotFound(_) => "not_found",
            SchedulerError::UnknownReference { .. } => "unknown_reference",
            SchedulerError::LimitExceeded(_) => "limit_exceeded",
        }
    }
}

impl std::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerError::InvalidInterval { start, end } => {
                write!(f, "invalid interval [{start}, {end}): start must be before end")
            }
            SchedulerError::IncompleteDraft(missing) => {
                write!(f, "incomplete step: missing {}", missing.join(", "))
            }
            SchedulerError::ConflictRejected(conflicts) => {
                write!(f, "conflicts with {} step(s):", conflicts.len())?;
                for step in conflicts {
                    write!(
                        f,
                        " {} \"{}\" [{}, {})",
                        step.id, step.step_name, step.span.start, step.span.end
                    )?;
                }
                Ok(())
            }
            SchedulerError::NotFound(id) => write!(f, "step not found: {id}"),
            SchedulerError::UnknownReference { field, id } => {
                write!(f, "unknown {field}: {id}")
            }
            SchedulerError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for SchedulerError {}
