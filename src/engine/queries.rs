use ulid::Ulid;

use crate::model::*;

use super::availability::{free_spans, summarize_availability};
use super::conflict::{find_conflicts, validate_span};
use super::{Scheduler, SchedulerError};

impl Scheduler {
    /// Snapshot of all steps in insertion order.
    pub fn list(&self) -> Vec<TestStep> {
        self.store.list()
    }

    pub fn get(&self, id: &Ulid) -> Option<&TestStep> {
        self.store.get(id)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Steps that would collide with a step on `equipment_id` / `analyst_id`
    /// during `[start, end)`. Used to warn before anything is submitted.
    pub fn conflicts_for(
        &self,
        start: Ms,
        end: Ms,
        equipment_id: Option<&str>,
        analyst_id: Option<&str>,
        exclude: Option<Ulid>,
    ) -> Result<Vec<TestStep>, SchedulerError> {
        let window = validate_span(start, end)?;
        Ok(find_conflicts(
            self.store.iter(),
            &window,
            equipment_id,
            analyst_id,
            exclude,
        ))
    }

    /// Free/busy state of every directory entry during `[start, end)`.
    pub fn availability_summary(
        &self,
        start: Ms,
        end: Ms,
        exclude: Option<Ulid>,
    ) -> Result<AvailabilitySummary, SchedulerError> {
        let window = validate_span(start, end)?;
        Ok(summarize_availability(
            self.store.iter(),
            &window,
            &self.directory.equipment,
            &self.directory.analysts,
            exclude,
        ))
    }

    /// Free sub-ranges of `[start, end)` for one resource.
    pub fn free_windows(
        &self,
        resource: &ResourceRef,
        start: Ms,
        end: Ms,
        min_duration_ms: Option<Ms>,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Span>, SchedulerError> {
        let window = validate_span(start, end)?;
        Ok(free_spans(
            self.store.iter(),
            std::slice::from_ref(resource),
            &window,
            min_duration_ms,
            exclude,
        ))
    }

    /// Sub-ranges of `[start, end)` where the equipment and the analyst are both free.
    pub fn joint_free_windows(
        &self,
        equipment_id: &str,
        analyst_id: &str,
        start: Ms,
        end: Ms,
        min_duration_ms: Option<Ms>,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Span>, SchedulerError> {
        let window = validate_span(start, end)?;
        let pair = [
            ResourceRef::Equipment(equipment_id.to_string()),
            ResourceRef::Analyst(analyst_id.to_string()),
        ];
        Ok(free_spans(
            self.store.iter(),
            &pair,
            &window,
            min_duration_ms,
            exclude,
        ))
    }
}
