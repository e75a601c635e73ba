use serde::Deserialize;
use ulid::Ulid;

use crate::model::*;

/// One line of the session protocol, tagged by `"cmd"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    Create {
        step: StepDraft,
    },
    BatchCreate {
        steps: Vec<StepDraft>,
    },
    Update {
        id: Ulid,
        #[serde(default)]
        changes: StepChanges,
    },
    /// Calendar drag or resize.
    Reschedule {
        id: Ulid,
        start: Ms,
        end: Ms,
    },
    Status {
        id: Ulid,
        status: StepStatus,
    },
    Delete {
        id: Ulid,
    },
    Get {
        id: Ulid,
    },
    List,
    Conflicts {
        start: Ms,
        end: Ms,
        equipment_id: Option<String>,
        analyst_id: Option<String>,
        exclude: Option<Ulid>,
    },
    Availability {
        start: Ms,
        end: Ms,
        exclude: Option<Ulid>,
    },
    FreeWindows {
        resource: ResourceRef,
        start: Ms,
        end: Ms,
        min_duration: Option<Ms>,
        exclude: Option<Ulid>,
    },
    JointFreeWindows {
        equipment_id: String,
        analyst_id: String,
        start: Ms,
        end: Ms,
        min_duration: Option<Ms>,
        exclude: Option<Ulid>,
    },
    Listen {
        channel: String,
    },
    /// Stop one channel, or every channel when `channel` is absent.
    Unlisten {
        channel: Option<String>,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    Parse(String),
    LineTooLong,
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty command"),
            CommandError::Parse(e) => write!(f, "parse error: {e}"),
            CommandError::LineTooLong => write!(f, "command line too long"),
        }
    }
}

impl std::error::Error for CommandError {}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(CommandError::Empty);
    }
    serde_json::from_str(trimmed).map_err(|e| CommandError::Parse(e.to_string()))
}
