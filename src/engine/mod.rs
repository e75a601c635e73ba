mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod store;

pub use availability::{
    busy_spans, free_spans, merge_overlapping, subtract_intervals, summarize_availability,
};
pub use conflict::find_conflicts;
pub use error::SchedulerError;
pub use store::StepStore;

use std::sync::Arc;

use crate::directory::Directory;
use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyHub;

use conflict::validate_span;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Resolve equipment, analyst and sample → aliquot → test references
    /// against the directory before accepting a step.
    pub strict_references: bool,
}

/// The validation gate for one scheduling session.
///
/// Owns the step store; every change to a step's time range or resources goes
/// through [`propose_create`](Scheduler::propose_create) or
/// [`propose_update`](Scheduler::propose_update).
pub struct Scheduler {
    store: StepStore,
    directory: Arc<Directory>,
    notify: Arc<NotifyHub>,
    options: SchedulerOptions,
}

impl Scheduler {
    pub fn new(
        directory: Arc<Directory>,
        notify: Arc<NotifyHub>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            store: StepStore::new(),
            directory,
            notify,
            options,
        }
    }

    pub fn notify(&self) -> &Arc<NotifyHub> {
        &self.notify
    }

    /// Field-level checks shared by create and update, in rejection order:
    /// interval, required fields, length limits, then directory references.
    fn validate_draft(&self, draft: &StepDraft) -> Result<Span, SchedulerError> {
        let span = validate_span(draft.start, draft.end)?;

        let missing = draft.missing_fields();
        if !missing.is_empty() {
            return Err(SchedulerError::IncompleteDraft(missing));
        }

        let too_long = [
            &draft.step_name,
            &draft.sample_id,
            &draft.aliquot_id,
            &draft.test_id,
            &draft.equipment_id,
            &draft.analyst_id,
        ]
        .iter()
        .any(|v| v.len() > MAX_NAME_LEN);
        if too_long {
            return Err(SchedulerError::LimitExceeded("field too long"));
        }

        if self.options.strict_references
            && let Some((field, id)) = self.directory.unresolved(draft)
        {
            return Err(SchedulerError::UnknownReference {
                field,
                id: id.to_string(),
            });
        }

        Ok(span)
    }

    /// Publish a committed change and refresh the step gauge.
    fn committed(&self, event: StepEvent) {
        metrics::gauge!(crate::observability::STEPS_ACTIVE).set(self.store.len() as f64);
        self.notify.publish(&event);
    }

    fn rejected(&self, op: &'static str, err: SchedulerError) -> SchedulerError {
        metrics::counter!(crate::observability::PROPOSALS_REJECTED_TOTAL, "reason" => err.kind())
            .increment(1);
        tracing::debug!("{op} rejected: {err}");
        err
    }
}
