//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use vigia_remote::RestStore;

/// Configuration for the submission pipeline.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the hosted backend.
    pub api_url: String,
    /// API key attached to every request; optional for local development.
    pub api_key: Option<String>,
    /// Storage bucket evidence photos are uploaded to.
    pub evidence_bucket: String,
    /// Path of the SQLite database backing the local queue.
    pub queue_db_path: PathBuf,
    /// Fixed interval between scheduled sync attempts.
    pub sync_interval: Duration,
    /// How long a `success` status stays visible before clearing to neutral.
    pub status_clear_after: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:54321".to_string(),
            api_key: None,
            evidence_bucket: "incident-evidence".to_string(),
            queue_db_path: default_queue_path().unwrap_or_else(|err| {
                tracing::warn!("falling back to working directory for queue db: {err:?}");
                PathBuf::from("vigia-queue.db")
            }),
            sync_interval: Duration::from_secs(30),
            status_clear_after: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Build a configuration from environment variables, with dev defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        match std::env::var("VIGIA_API_URL") {
            Ok(url) => config.api_url = url,
            Err(_) => {
                tracing::warn!("VIGIA_API_URL not set; using local dev default");
            }
        }

        if let Ok(key) = std::env::var("VIGIA_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(path) = std::env::var("VIGIA_QUEUE_DB") {
            config.queue_db_path = PathBuf::from(path);
        }

        config
    }

    /// Build the REST store this configuration points at.
    pub fn rest_store(&self) -> RestStore {
        let store = RestStore::new(self.api_url.as_str(), self.evidence_bucket.as_str());
        match &self.api_key {
            Some(key) => store.with_api_key(key.as_str()),
            None => store,
        }
    }
}

/// Resolve the default path of the queue database:
/// `{app_data_dir}/vigia/queue.db`.
fn default_queue_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory")?;

    let mut path = base;
    path.push("vigia");
    path.push("queue.db");
    Ok(path)
}
