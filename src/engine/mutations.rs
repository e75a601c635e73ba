use tracing::debug;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_batch_internal, find_conflicts};
use super::{Scheduler, SchedulerError};

impl Scheduler {
    /// Validate a new step and store it if it collides with nothing.
    ///
    /// Rejections, in order: `InvalidInterval`, `IncompleteDraft`, then
    /// `ConflictRejected` carrying every colliding step. Nothing is stored on
    /// rejection.
    pub fn propose_create(&mut self, draft: StepDraft) -> Result<TestStep, SchedulerError> {
        let span = self
            .validate_draft(&draft)
            .map_err(|e| self.rejected("create", e))?;
        if self.store.len() >= MAX_STEPS_PER_SESSION {
            return Err(self.rejected("create", SchedulerError::LimitExceeded("too many steps")));
        }

        let conflicts = find_conflicts(
            self.store.iter(),
            &span,
            Some(draft.equipment_id.as_str()),
            Some(draft.analyst_id.as_str()),
            None,
        );
        if !conflicts.is_empty() {
            return Err(self.rejected("create", SchedulerError::ConflictRejected(conflicts)));
        }

        let step = self.store.create(draft, span);
        debug!("created step {} on {}/{}", step.id, step.equipment_id, step.analyst_id);
        self.committed(StepEvent::Created { step: step.clone() });
        Ok(step)
    }

    /// Create several steps all-or-nothing. Drafts are checked against the
    /// store and against each other; the first failure aborts the batch.
    pub fn propose_batch_create(
        &mut self,
        drafts: Vec<StepDraft>,
    ) -> Result<Vec<TestStep>, SchedulerError> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        if drafts.len() > MAX_BATCH_SIZE {
            let err = SchedulerError::LimitExceeded("batch too large");
            return Err(self.rejected("batch_create", err));
        }
        if self.store.len() + drafts.len() > MAX_STEPS_PER_SESSION {
            let err = SchedulerError::LimitExceeded("too many steps");
            return Err(self.rejected("batch_create", err));
        }

        // Phase 1: validate every draft against the current store.
        let mut pending: Vec<TestStep> = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let span = self
                .validate_draft(&draft)
                .map_err(|e| self.rejected("batch_create", e))?;
            let conflicts = find_conflicts(
                self.store.iter(),
                &span,
                Some(draft.equipment_id.as_str()),
                Some(draft.analyst_id.as_str()),
                None,
            );
            if !conflicts.is_empty() {
                let err = SchedulerError::ConflictRejected(conflicts);
                return Err(self.rejected("batch_create", err));
            }
            let mut step = self.store.prepare(draft, span);
            while pending.iter().any(|p| p.id == step.id) {
                step.id = Ulid::new();
            }
            pending.push(step);
        }
        check_batch_internal(&pending).map_err(|e| self.rejected("batch_create", e))?;

        // Phase 2: commit.
        for step in &pending {
            self.store.insert(step.clone());
        }
        debug!("created batch of {} steps", pending.len());
        for step in &pending {
            self.committed(StepEvent::Created { step: step.clone() });
        }
        Ok(pending)
    }

    /// Validate an edit against every other step, then apply it.
    ///
    /// The merged record goes through the same checks as a new step, with the
    /// step itself excluded from conflict detection. On rejection the stored
    /// step is left exactly as it was.
    pub fn propose_update(
        &mut self,
        id: Ulid,
        changes: StepChanges,
    ) -> Result<TestStep, SchedulerError> {
        let before = self
            .store
            .get(&id)
            .cloned()
            .ok_or_else(|| self.rejected("update", SchedulerError::NotFound(id)))?;
        let merged = StepDraft::from(&before).merge(changes.clone());
        let span = self
            .validate_draft(&merged)
            .map_err(|e| self.rejected("update", e))?;

        let conflicts = find_conflicts(
            self.store.iter(),
            &span,
            Some(merged.equipment_id.as_str()),
            Some(merged.analyst_id.as_str()),
            Some(id),
        );
        if !conflicts.is_empty() {
            return Err(self.rejected("update", SchedulerError::ConflictRejected(conflicts)));
        }

        let after = self.store.update(id, changes)?;
        debug!("updated step {id}");
        self.committed(StepEvent::Updated {
            before,
            after: after.clone(),
        });
        Ok(after)
    }

    /// Move or resize a step from the calendar. Same validation as a form edit.
    pub fn reschedule(&mut self, id: Ulid, start: Ms, end: Ms) -> Result<TestStep, SchedulerError> {
        self.propose_update(id, StepChanges::span(start, end))
    }

    /// Overwrite the status. Any value is accepted; scheduling is unaffected.
    pub fn transition_status(
        &mut self,
        id: Ulid,
        status: StepStatus,
    ) -> Result<TestStep, SchedulerError> {
        let from = self
            .store
            .get(&id)
            .map(|s| s.status)
            .ok_or_else(|| self.rejected("status", SchedulerError::NotFound(id)))?;
        let step = self.store.set_status(id, status)?;
        debug!("step {id}: {} -> {}", from.as_str(), status.as_str());
        self.committed(StepEvent::StatusChanged {
            step: step.clone(),
            from,
        });
        Ok(step)
    }

    /// Remove a step, freeing its equipment and analyst. Returns whether it existed.
    pub fn delete(&mut self, id: Ulid) -> bool {
        match self.store.delete(&id) {
            Some(step) => {
                debug!("deleted step {id}");
                self.committed(StepEvent::Deleted { step });
                true
            }
            None => false,
        }
    }
}
