//! `vigia-observability`
//!
//! **Responsibility:** process-wide tracing/logging initialization.

pub mod tracing;

pub use tracing::init;
