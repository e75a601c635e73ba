use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::*;

/// Read-only reference data supplied by the sample, equipment and staff subsystems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Directory {
    pub equipment: Vec<Equipment>,
    pub analysts: Vec<Analyst>,
    pub samples: Vec<Sample>,
}

#[derive(Debug)]
pub enum DirectoryError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::Io(e) => write!(f, "cannot read directory file: {e}"),
            DirectoryError::Parse(e) => write!(f, "invalid directory file: {e}"),
        }
    }
}

impl std::error::Error for DirectoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DirectoryError::Io(e) => Some(e),
            DirectoryError::Parse(e) => Some(e),
        }
    }
}

impl Directory {
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        serde_json::from_str(json).map_err(DirectoryError::Parse)
    }

    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path).map_err(DirectoryError::Io)?;
        Self::from_json(&raw)
    }

    pub fn equipment(&self, id: &str) -> Option<&Equipment> {
        self.equipment.iter().find(|e| e.id == id)
    }

    pub fn analyst(&self, id: &str) -> Option<&Analyst> {
        self.analysts.iter().find(|a| a.id == id)
    }

    pub fn sample(&self, id: &str) -> Option<&Sample> {
        self.samples.iter().find(|s| s.id == id)
    }

    /// First reference in `draft` that does not resolve, as `(field, id)`.
    ///
    /// Walks sample → aliquot → test so a test id that exists under a different
    /// aliquot is still reported.
    pub fn unresolved<'d>(&self, draft: &'d StepDraft) -> Option<(&'static str, &'d str)> {
        if self.equipment(&draft.equipment_id).is_none() {
            return Some(("equipment_id", &draft.equipment_id));
        }
        if self.analyst(&draft.analyst_id).is_none() {
            return Some(("analyst_id", &draft.analyst_id));
        }
        let Some(sample) = self.sample(&draft.sample_id) else {
            return Some(("sample_id", &draft.sample_id));
        };
        let Some(aliquot) = sample.aliquots.iter().find(|a| a.id == draft.aliquot_id) else {
            return Some(("aliquot_id", &draft.aliquot_id));
        };
        if !aliquot.tests.iter().any(|t| t.id == draft.test_id) {
            return Some(("test_id", &draft.test_id));
        }
        None
    }
}
