//! Reference dataset
//!
//! Static fixture describing the routines a user can select, the report
//! files each routine requires, and the field specification of every report.
//! Read-only after load; shared between tiers as `Arc<ReferenceDataset>`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One column/field a report is expected to carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// Human-readable name and field specification for a report key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// A selectable routine and the report keys it requires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub required_files: Vec<String>,
}

/// Routine and report catalog consulted by the resolution tiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDataset {
    #[serde(default)]
    pub routines: Vec<Routine>,
    #[serde(default)]
    pub reports: BTreeMap<String, ReportDefinition>,
}

impl ReferenceDataset {
    /// Parse a dataset from its JSON representation
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a dataset fixture from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read reference dataset {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Human name + field spec for a report key
    pub fn report(&self, report_key: &str) -> Option<&ReportDefinition> {
        self.reports.get(report_key)
    }

    pub fn routine(&self, code: &str) -> Option<&Routine> {
        self.routines.iter().find(|r| r.code == code)
    }

    /// Report keys a routine requires (empty for unknown routines)
    pub fn required_files(&self, routine_code: &str) -> &[String] {
        self.routine(routine_code)
            .map(|r| r.required_files.as_slice())
            .unwrap_or(&[])
    }

    /// Whether any of the given routines requires `report_key`
    pub fn is_required_by(&self, report_key: &str, routine_codes: &[String]) -> bool {
        routine_codes
            .iter()
            .any(|code| self.required_files(code).iter().any(|k| k == report_key))
    }
}
