use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Build a span from untrusted bounds. `None` for zero-length or inverted ranges.
    pub fn checked(start: Ms, end: Ms) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Saturates instead of overflowing for spans wider than `Ms::MAX`.
    pub fn duration_ms(&self) -> Ms {
        self.end.saturating_sub(self.start)
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }
}

/// Half-open overlap test: ranges that only touch at an endpoint do not overlap.
pub fn overlaps(a_start: Ms, a_end: Ms, b_start: Ms, b_end: Ms) -> bool {
    a_start < b_end && a_end > b_start
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Scheduled => "scheduled",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
        }
    }
}

/// A scheduled unit of lab work: one sample/aliquot/test, one instrument, one analyst.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStep {
    pub id: Ulid,
    pub sample_id: String,
    pub aliquot_id: String,
    pub test_id: String,
    pub step_name: String,
    pub equipment_id: String,
    pub analyst_id: String,
    pub span: Span,
    pub status: StepStatus,
}

impl TestStep {
    /// True if the step occupies either of the given resources.
    pub fn uses_either(&self, equipment_id: Option<&str>, analyst_id: Option<&str>) -> bool {
        equipment_id.is_some_and(|e| self.equipment_id == e)
            || analyst_id.is_some_and(|a| self.analyst_id == a)
    }

    pub fn uses(&self, resource: &ResourceRef) -> bool {
        match resource {
            ResourceRef::Equipment(id) => self.equipment_id == *id,
            ResourceRef::Analyst(id) => self.analyst_id == *id,
        }
    }
}

/// A step as proposed by the user, before the store assigns an id.
///
/// Bounds are raw so an inverted range can reach validation and be rejected there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDraft {
    pub sample_id: String,
    pub aliquot_id: String,
    pub test_id: String,
    pub step_name: String,
    pub equipment_id: String,
    pub analyst_id: String,
    pub start: Ms,
    pub end: Ms,
}

impl StepDraft {
    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("step_name", &self.step_name),
            ("sample_id", &self.sample_id),
            ("aliquot_id", &self.aliquot_id),
            ("test_id", &self.test_id),
            ("equipment_id", &self.equipment_id),
            ("analyst_id", &self.analyst_id),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Apply `changes` on top of this draft.
    pub fn merge(mut self, changes: StepChanges) -> Self {
        if let Some(v) = changes.sample_id {
            self.sample_id = v;
        }
        if let Some(v) = changes.aliquot_id {
            self.aliquot_id = v;
        }
        if let Some(v) = changes.test_id {
            self.test_id = v;
        }
        if let Some(v) = changes.step_name {
            self.step_name = v;
        }
        if let Some(v) = changes.equipment_id {
            self.equipment_id = v;
        }
        if let Some(v) = changes.analyst_id {
            self.analyst_id = v;
        }
        if let Some(v) = changes.start {
            self.start = v;
        }
        if let Some(v) = changes.end {
            self.end = v;
        }
        self
    }
}

impl From<&TestStep> for StepDraft {
    fn from(step: &TestStep) -> Self {
        Self {
            sample_id: step.sample_id.clone(),
            aliquot_id: step.aliquot_id.clone(),
            test_id: step.test_id.clone(),
            step_name: step.step_name.clone(),
            equipment_id: step.equipment_id.clone(),
            analyst_id: step.analyst_id.clone(),
            start: step.span.start,
            end: step.span.end,
        }
    }
}

/// Partial edit of a step. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepChanges {
    pub sample_id: Option<String>,
    pub aliquot_id: Option<String>,
    pub test_id: Option<String>,
    pub step_name: Option<String>,
    pub equipment_id: Option<String>,
    pub analyst_id: Option<String>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
}

impl StepChanges {
    pub fn span(start: Ms, end: Ms) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }
}

// ── Directories (read-only reference data) ───────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analyst {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabTest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aliquot {
    pub id: String,
    #[serde(default)]
    pub tests: Vec<LabTest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    #[serde(default)]
    pub aliquots: Vec<Aliquot>,
}

/// One schedulable resource, by kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceRef {
    Equipment(String),
    Analyst(String),
}

// ── Events ───────────────────────────────────────────────────────

/// Change to the step store, broadcast per resource channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    Created { step: TestStep },
    Updated { before: TestStep, after: TestStep },
    StatusChanged { step: TestStep, from: StepStatus },
    Deleted { step: TestStep },
}

impl StepEvent {
    /// Resource channels this event is published on, deduplicated.
    pub fn channels(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::with_capacity(4);
        let steps: Vec<&TestStep> = match self {
            StepEvent::Created { step }
            | StepEvent::StatusChanged { step, .. }
            | StepEvent::Deleted { step } => vec![step],
            StepEvent::Updated { before, after } => vec![after, before],
        };
        for step in steps {
            for ch in [step.equipment_id.as_str(), step.analyst_id.as_str()] {
                if !out.contains(&ch) {
                    out.push(ch);
                }
            }
        }
        out
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAvailability {
    pub id: String,
    pub is_available: bool,
    pub conflicts: Vec<TestStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySummary {
    pub equipment: Vec<ResourceAvailability>,
    pub analysts: Vec<ResourceAvailability>,
}
