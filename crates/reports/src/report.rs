//! Report kinds, geolocation and the open form payload.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use vigia_core::DomainError;

use crate::incident::IncidentFields;

/// Kind of a field report.
///
/// `Closing` is part of the domain but currently unused by the submission UI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Opening,
    Midday,
    Closing,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Opening => "opening",
            ReportKind::Midday => "midday",
            ReportKind::Closing => "closing",
        }
    }
}

impl core::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opening" => Ok(ReportKind::Opening),
            "midday" => Ok(ReportKind::Midday),
            "closing" => Ok(ReportKind::Closing),
            other => Err(DomainError::validation(format!(
                "unknown report kind '{other}'"
            ))),
        }
    }
}

/// Best-effort GPS fix captured alongside a report. Absence is valid (GPS
/// permission denied or capture still in progress).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, DomainError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(DomainError::validation(format!(
                "latitude {latitude} out of range"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(DomainError::validation(format!(
                "longitude {longitude} out of range"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Open, semi-structured form payload of a report.
///
/// `fields` varies by report kind (ballot-table counts for an opening report,
/// free observations for midday, ...). `incident: Some(..)` IS the incident
/// marker: the sync engine relies on it to decide whether a detail record
/// must be written alongside the parent report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportForm {
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident: Option<IncidentFields>,
}

impl ReportForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one open form field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Mark this form as an incident report.
    pub fn with_incident(mut self, incident: IncidentFields) -> Self {
        self.incident = Some(incident);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn is_incident(&self) -> bool {
        self.incident.is_some()
    }

    pub fn incident(&self) -> Option<&IncidentFields> {
        self.incident.as_ref()
    }
}
