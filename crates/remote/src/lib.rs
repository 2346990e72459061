//! `vigia-remote` — the Remote Store collaborator.
//!
//! **Responsibility:** the contract the submission pipeline writes against:
//! parent report inserts, incident-detail inserts, evidence blob upload, the
//! read-only aggregation RPCs the dashboard consumes, and a reachability
//! probe. Two implementations are provided: a REST client (`RestStore`) and
//! an in-memory store (`InMemoryStore`) for tests and development.
//!
//! Aggregation snapshots are eventually consistent: a report sitting in the
//! local queue is invisible to them until it has been replayed.

pub mod in_memory;
pub mod rest;
pub mod store;

pub use in_memory::InMemoryStore;
pub use rest::RestStore;
pub use store::{
    with_demo_fallback, DashboardSummary, LocationCrumb, ManagedUser, NewIncident, NewReport,
    RecentReport, RemoteStore, ReportStatus, StoreError, Venue,
};
