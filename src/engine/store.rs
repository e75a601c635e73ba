use ulid::Ulid;

use crate::model::*;

use super::SchedulerError;

/// Authoritative collection of test steps for one session, in insertion order.
///
/// The store only checks identity. Whether a step may exist alongside the
/// others is decided by the [`Scheduler`](super::Scheduler) before it calls in.
#[derive(Debug, Default)]
pub struct StepStore {
    steps: Vec<TestStep>,
}

impl StepStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestStep> {
        self.steps.iter()
    }

    pub fn list(&self) -> Vec<TestStep> {
        self.steps.clone()
    }

    pub fn get(&self, id: &Ulid) -> Option<&TestStep> {
        self.steps.iter().find(|s| s.id == *id)
    }

    fn position(&self, id: &Ulid) -> Option<usize> {
        self.steps.iter().position(|s| s.id == *id)
    }

    /// Build a `Scheduled` step with an id unused in this store, without inserting it.
    pub(crate) fn prepare(&self, draft: StepDraft, span: Span) -> TestStep {
        let mut id = Ulid::new();
        while self.position(&id).is_some() {
            id = Ulid::new();
        }
        TestStep {
            id,
            sample_id: draft.sample_id,
            aliquot_id: draft.aliquot_id,
            test_id: draft.test_id,
            step_name: draft.step_name,
            equipment_id: draft.equipment_id,
            analyst_id: draft.analyst_id,
            span,
            status: StepStatus::Scheduled,
        }
    }

    pub(crate) fn insert(&mut self, step: TestStep) {
        debug_assert!(self.position(&step.id).is_none(), "duplicate step id");
        self.steps.push(step);
    }

    /// Append a new `Scheduled` step with a freshly minted id.
    pub fn create(&mut self, draft: StepDraft, span: Span) -> TestStep {
        let step = self.prepare(draft, span);
        self.insert(step.clone());
        step
    }

    /// Merge `changes` into the stored step in place. Position in the list is kept.
    pub fn update(&mut self, id: Ulid, changes: StepChanges) -> Result<TestStep, SchedulerError> {
        let pos = self.position(&id).ok_or(SchedulerError::NotFound(id))?;
        let merged = StepDraft::from(&self.steps[pos]).merge(changes);
        let span = Span::checked(merged.start, merged.end).ok_or(SchedulerError::InvalidInterval {
            start: merged.start,
            end: merged.end,
        })?;

        let current = &mut self.steps[pos];
        current.sample_id = merged.sample_id;
        current.aliquot_id = merged.aliquot_id;
        current.test_id = merged.test_id;
        current.step_name = merged.step_name;
        current.equipment_id = merged.equipment_id;
        current.analyst_id = merged.analyst_id;
        current.span = span;
        Ok(current.clone())
    }

    pub fn set_status(&mut self, id: Ulid, status: StepStatus) -> Result<TestStep, SchedulerError> {
        let pos = self.position(&id).ok_or(SchedulerError::NotFound(id))?;
        self.steps[pos].status = status;
        Ok(self.steps[pos].clone())
    }

    /// Remove a step. Absent ids are not an error.
    pub fn delete(&mut self, id: &Ulid) -> Option<TestStep> {
        self.position(id).map(|pos| self.steps.remove(pos))
    }
}
