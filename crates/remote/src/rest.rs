//! REST implementation of the remote store.
//!
//! Speaks the hosted backend's three surfaces: the relational REST API
//! (`/rest/v1`), the RPC endpoint for pre-aggregated reads (`/rest/v1/rpc`)
//! and blob storage (`/storage/v1`). Authentication is a bearer API key.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use vigia_core::{LocationId, ObserverId, ReportId};

use crate::store::{
    DashboardSummary, LocationCrumb, ManagedUser, NewIncident, NewReport, RecentReport,
    RemoteStore, StoreError, Venue,
};

/// Postgres error code for a foreign-key violation, as surfaced in REST
/// error bodies.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// REST client for the hosted backend.
#[derive(Debug, Clone)]
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    bucket: String,
}

/// Error body shape returned by the REST layer.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct InsertedReportRow {
    id: ReportId,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            bucket: bucket.into(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    fn public_object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("apikey", key).bearer_auth(key),
            None => req,
        }
    }

    async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, StoreError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api(status.as_u16(), body));
        }
        resp.json::<T>()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn rpc<T: DeserializeOwned>(&self, function: &str, params: Value) -> Result<T, StoreError> {
        let resp = self
            .authed(self.http.post(self.rpc_url(function)))
            .json(&params)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Self::read_json(resp).await
    }
}

/// Classify a failed write into the structured taxonomy.
///
/// The backend reports constraint failures only as an error body with a
/// Postgres code and human-readable message; this adapter is the single
/// place that text is inspected.
fn classify_write_error(status: u16, body: &str) -> StoreError {
    if let Ok(err) = serde_json::from_str::<ApiErrorBody>(body) {
        if err.code.as_deref() == Some(FOREIGN_KEY_VIOLATION)
            || err.message.contains("violates foreign key constraint")
        {
            return StoreError::ReferentialIntegrity(err.message);
        }
        return StoreError::Api(status, err.message);
    }
    StoreError::Api(status, body.to_string())
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn health_check(&self) -> bool {
        let url = format!("{}/auth/v1/health", self.base_url);
        match self.authed(self.http.get(url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                tracing::debug!("health probe failed: {err}");
                false
            }
        }
    }

    async fn list_venues(&self) -> Result<Vec<Venue>, StoreError> {
        let url = format!("{}?select=id,name&order=name.asc", self.rest_url("venues"));
        let resp = self
            .authed(self.http.get(url))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Self::read_json(resp).await
    }

    async fn upload_evidence(
        &self,
        key: &str,
        bytes: &[u8],
        mime: &str,
    ) -> Result<String, StoreError> {
        let resp = self
            .authed(self.http.post(self.object_url(key)))
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api(status.as_u16(), body));
        }

        Ok(self.public_object_url(key))
    }

    async fn insert_report(&self, report: &NewReport) -> Result<ReportId, StoreError> {
        let resp = self
            .authed(self.http.post(self.rest_url("reports")))
            .header("Prefer", "return=representation")
            .json(&json!([report]))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_write_error(status.as_u16(), &body));
        }

        let rows: Vec<InsertedReportRow> = resp
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| StoreError::Parse("insert returned no rows".to_string()))
    }

    async fn insert_incident(&self, incident: &NewIncident) -> Result<(), StoreError> {
        let resp = self
            .authed(self.http.post(self.rest_url("incidents")))
            .header("Prefer", "return=minimal")
            .json(&json!([incident]))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_write_error(status.as_u16(), &body));
        }

        Ok(())
    }

    async fn dashboard_summary(&self, user: ObserverId) -> Result<DashboardSummary, StoreError> {
        self.rpc(
            "get_dashboard_summary",
            json!({ "user_id_param": user }),
        )
        .await
    }

    async fn recent_reports(
        &self,
        user: ObserverId,
        limit: u32,
    ) -> Result<Vec<RecentReport>, StoreError> {
        self.rpc(
            "get_recent_reports",
            json!({ "user_id_param": user, "limit_param": limit }),
        )
        .await
    }

    async fn managed_users(&self, manager: ObserverId) -> Result<Vec<ManagedUser>, StoreError> {
        self.rpc("get_managed_users", json!({ "manager_id": manager }))
            .await
    }

    async fn location_path(
        &self,
        location: LocationId,
    ) -> Result<Vec<LocationCrumb>, StoreError> {
        self.rpc(
            "get_location_path",
            json!({ "target_location_id": location }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_key_violations_become_referential_integrity() {
        let body = r#"{"code":"23503","message":"insert or update on table \"reports\" violates foreign key constraint \"reports_venue_id_fkey\"","details":null}"#;
        let err = classify_write_error(409, body);
        assert!(err.is_referential_integrity());
    }

    #[test]
    fn message_text_is_matched_when_code_is_absent() {
        let body = r#"{"message":"new row violates foreign key constraint"}"#;
        assert!(classify_write_error(409, body).is_referential_integrity());
    }

    #[test]
    fn other_api_errors_stay_transient_class() {
        let body = r#"{"code":"42501","message":"permission denied"}"#;
        let err = classify_write_error(403, body);
        assert!(!err.is_referential_integrity());
        assert!(matches!(err, StoreError::Api(403, _)));
    }

    #[test]
    fn unparseable_bodies_fall_back_to_raw_text() {
        let err = classify_write_error(500, "<html>gateway timeout</html>");
        assert!(matches!(err, StoreError::Api(500, body) if body.contains("gateway")));
    }

    #[test]
    fn urls_are_rooted_at_base() {
        let store = RestStore::new("https://demo.example.org/", "evidence");
        assert_eq!(
            store.rest_url("reports"),
            "https://demo.example.org/rest/v1/reports"
        );
        assert_eq!(
            store.rpc_url("get_dashboard_summary"),
            "https://demo.example.org/rest/v1/rpc/get_dashboard_summary"
        );
        assert_eq!(
            store.public_object_url("obs/1-evidence.jpg"),
            "https://demo.example.org/storage/v1/object/public/evidence/obs/1-evidence.jpg"
        );
    }
}
