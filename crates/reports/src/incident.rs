//! Incident classification.

use serde::{Deserialize, Serialize};

/// Category of a reported incident.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCategory {
    Violence,
    MissingMaterials,
    Proselytism,
    Other,
}

impl IncidentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentCategory::Violence => "violence",
            IncidentCategory::MissingMaterials => "missing_materials",
            IncidentCategory::Proselytism => "proselytism",
            IncidentCategory::Other => "other",
        }
    }
}

/// Severity of a reported incident.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// High-severity incidents surface as critical alerts on the dashboard.
    pub fn is_critical(&self) -> bool {
        matches!(self, Severity::High)
    }
}

/// Incident-specific sub-fields carried inside a report form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentFields {
    pub category: IncidentCategory,
    pub severity: Severity,
    pub description: String,
}

impl IncidentFields {
    pub fn new(
        category: IncidentCategory,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            description: description.into(),
        }
    }
}
