use ulid::Ulid;

use crate::model::*;

use super::SchedulerError;

/// Turn untrusted bounds into a span. The only rule is `start < end`.
pub(crate) fn validate_span(start: Ms, end: Ms) -> Result<Span, SchedulerError> {
    Span::checked(start, end).ok_or(SchedulerError::InvalidInterval { start, end })
}

/// Every step sharing the equipment or the analyst whose span overlaps `candidate`.
///
/// A `None` resource matches nothing, so passing only one side gives a per-resource check.
/// The step with id `exclude` is skipped, which lets an edit be validated against the
/// rest of the schedule without colliding with itself. Results keep `steps` order.
pub fn find_conflicts<'a, I>(
    steps: I,
    candidate: &Span,
    equipment_id: Option<&str>,
    analyst_id: Option<&str>,
    exclude: Option<Ulid>,
) -> Vec<TestStep>
where
    I: IntoIterator<Item = &'a TestStep>,
{
    steps
        .into_iter()
        .filter(|s| exclude != Some(s.id))
        .filter(|s| s.uses_either(equipment_id, analyst_id))
        .filter(|s| s.span.overlaps(candidate))
        .cloned()
        .collect()
}

/// Reject a batch whose provisional steps collide with each other. Reports the
/// earlier batch members hit by the first colliding step.
pub(crate) fn check_batch_internal(batch: &[TestStep]) -> Result<(), SchedulerError> {
    for (i, later) in batch.iter().enumerate() {
        let hits = find_conflicts(
            &batch[..i],
            &later.span,
            Some(later.equipment_id.as_str()),
            Some(later.analyst_id.as_str()),
            None,
        );
        if !hits.is_empty() {
            return Err(SchedulerError::ConflictRejected(hits));
        }
    }
    Ok(())
}
