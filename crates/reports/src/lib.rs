//! `vigia-reports` — the field-report domain.
//!
//! **Responsibility:** everything an observer captures on election day:
//! report kinds, the open form payload with its structural incident marker,
//! incident classification, geolocation, and the portable evidence-image
//! encoding that lets a photo survive offline persistence.

pub mod evidence;
pub mod incident;
pub mod report;

pub use evidence::{submission_evidence_key, sync_evidence_key, EvidenceError, EvidenceImage};
pub use incident::{IncidentCategory, IncidentFields, Severity};
pub use report::{GeoPoint, ReportForm, ReportKind};
