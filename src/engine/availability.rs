use ulid::Ulid;

use crate::model::*;

use super::conflict::find_conflicts;

// ── Availability Algorithm ────────────────────────────────────────

/// For every directory entry, whether it is free during `window`.
///
/// Each resource is checked on its own (the other side left empty), so an
/// instrument shows as busy only because of its own bookings, never because
/// of the analyst the user might pair it with.
pub fn summarize_availability<'a, I>(
    steps: I,
    window: &Span,
    equipment: &[Equipment],
    analysts: &[Analyst],
    exclude: Option<Ulid>,
) -> AvailabilitySummary
where
    I: IntoIterator<Item = &'a TestStep>,
{
    let steps: Vec<&TestStep> = steps.into_iter().collect();
    let check = |conflicts: Vec<TestStep>, id: &str| ResourceAvailability {
        id: id.to_string(),
        is_available: conflicts.is_empty(),
        conflicts,
    };

    AvailabilitySummary {
        equipment: equipment
            .iter()
            .map(|e| {
                let hits = find_conflicts(
                    steps.iter().copied(),
                    window,
                    Some(e.id.as_str()),
                    None,
                    exclude,
                );
                check(hits, e.id.as_str())
            })
            .collect(),
        analysts: analysts
            .iter()
            .map(|a| {
                let hits = find_conflicts(
                    steps.iter().copied(),
                    window,
                    None,
                    Some(a.id.as_str()),
                    exclude,
                );
                check(hits, a.id.as_str())
            })
            .collect(),
    }
}

/// Occupied sub-ranges of `window` for any of `resources`, clamped, sorted and merged.
pub fn busy_spans<'a, I>(
    steps: I,
    resources: &[ResourceRef],
    window: &Span,
    exclude: Option<Ulid>,
) -> Vec<Span>
where
    I: IntoIterator<Item = &'a TestStep>,
{
    let mut busy: Vec<Span> = steps
        .into_iter()
        .filter(|s| exclude != Some(s.id))
        .filter(|s| resources.iter().any(|r| s.uses(r)))
        .filter(|s| s.span.overlaps(window))
        .map(|s| Span::new(s.span.start.max(window.start), s.span.end.min(window.end)))
        .collect();
    busy.sort_by_key(|s| s.start);
    merge_overlapping(&busy)
}

/// Free sub-ranges of `window` where none of `resources` is booked.
pub fn free_spans<'a, I>(
    steps: I,
    resources: &[ResourceRef],
    window: &Span,
    min_duration_ms: Option<Ms>,
    exclude: Option<Ulid>,
) -> Vec<Span>
where
    I: IntoIterator<Item = &'a TestStep>,
{
    let busy = busy_spans(steps, resources, window, exclude);
    let mut free = subtract_intervals(&[*window], &busy);
    if let Some(min_dur) = min_duration_ms {
        free.retain(|span| span.duration_ms() >= min_dur);
    }
    free
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// Remove sorted, disjoint `to_remove` spans from sorted, disjoint `base` spans.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
