//! Nautobot interface status REST client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::config::InventoryConfig;
use crate::mapping::{INTERFACE_NAME_LABEL, Labels, TARGET_LABEL};
use crate::state::InterfaceState;

/// Body of one interface status upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub device_name: String,
    pub interface_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_admin_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_oper_status: Option<String>,
}

impl SyncPayload {
    /// Build a payload from the raw (unslugged) label values and the merged
    /// interface state. Absent labels are sent as empty strings.
    pub fn from_labels(labels: &Labels, state: &InterfaceState) -> Self {
        let label = |key: &str| labels.get(key).cloned().unwrap_or_default();
        Self {
            device_name: label(TARGET_LABEL),
            interface_name: label(INTERFACE_NAME_LABEL),
            interface_admin_status: state.admin.clone(),
            interface_oper_status: state.oper.clone(),
        }
    }
}

/// Errors returned by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// The addressed interface record does not exist.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// The inventory answered with a non-success status.
    #[error("Inventory rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request could not be sent or its response not read.
    #[error("Inventory transport error: {0}")]
    Transport(String),
}

impl InventoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, InventoryError::NotFound { .. })
    }
}

/// Client side of the inventory's interface status resource.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Update the status record addressed by `endpoint`.
    async fn patch_interface_status(
        &self,
        endpoint: &str,
        payload: &SyncPayload,
    ) -> Result<Value, InventoryError>;

    /// Create status records.
    async fn post_interfaces_status(&self, payloads: &[SyncPayload])
    -> Result<Value, InventoryError>;
}

/// `reqwest` implementation talking to a Nautobot instance.
#[derive(Clone)]
pub struct NautobotClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    status_path: String,
}

impl NautobotClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        status_path: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            status_path: status_path.into(),
        }
    }

    /// Build a client from the environment variables named in the config.
    ///
    /// Unset variables become empty strings; nothing is validated locally.
    pub fn from_env(config: &InventoryConfig) -> Self {
        let base_url = std::env::var(&config.url_env).unwrap_or_default();
        let token = std::env::var(&config.token_env).unwrap_or_default();
        Self::new(base_url, token, config.status_path.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}{}", self.base_url, self.status_path)
    }

    fn record_url(&self, endpoint: &str) -> String {
        format!("{}{}{}/", self.base_url, self.status_path, endpoint)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.token))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value, InventoryError> {
        let resp = req
            .send()
            .await
            .map_err(|e| InventoryError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| InventoryError::Transport(e.to_string()))?;
        trace!(status = status.as_u16(), body = %body, "Inventory response");

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| InventoryError::Transport(format!("Invalid response body: {}", e)))
    }
}

#[async_trait]
impl InventoryClient for NautobotClient {
    async fn patch_interface_status(
        &self,
        endpoint: &str,
        payload: &SyncPayload,
    ) -> Result<Value, InventoryError> {
        let req = self
            .request(reqwest::Method::PATCH, &self.record_url(endpoint))
            .json(payload);
        self.send(req).await
    }

    async fn post_interfaces_status(
        &self,
        payloads: &[SyncPayload],
    ) -> Result<Value, InventoryError> {
        let req = self
            .request(reqwest::Method::POST, &self.collection_url())
            .json(payloads);
        self.send(req).await
    }
}

/// Map a non-success response to an error.
///
/// A `detail` of "Not found." (any case) marks a missing record.
pub fn classify_error(status: u16, body: &str) -> InventoryError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string));

    match detail {
        Some(detail) if detail.trim().eq_ignore_ascii_case("not found.") => {
            InventoryError::NotFound { message: detail }
        }
        Some(detail) => InventoryError::Rejected {
            status,
            message: detail,
        },
        None => InventoryError::Rejected {
            status,
            message: body.to_string(),
        },
    }
}
