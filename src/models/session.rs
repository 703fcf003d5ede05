use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::model::Model;

/// Credentials for one remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Read `LLM_PANEL_URL` / `LLM_PANEL_TOKEN`. Returns `None` unless both are set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("LLM_PANEL_URL").ok()?;
        let token = std::env::var("LLM_PANEL_TOKEN").ok()?;
        Some(Self::new(base_url, token))
    }

    /// Both fields must be non-blank before any request is made.
    pub fn is_complete(&self) -> bool {
        !self.base_url.trim().is_empty() && !self.token.trim().is_empty()
    }
}

/// Where the connect/refresh/save lifecycle currently stands.
///
/// - `Disconnected`: no credentials, empty working set
/// - `Connecting`: first fetch in flight
/// - `Connected`: working set loaded
/// - `Refreshing`: re-fetch in flight, prior list still served
/// - `Saving`: batch save in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    Connected,
    Refreshing,
    Saving,
}

impl SessionPhase {
    /// True once a catalog has been loaded, including while it is being
    /// refreshed or saved.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Refreshing | Self::Saving)
    }
}

/// Output of one reconcile pass: the working list plus the base entries the
/// full list does not know about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub list: Vec<Model>,
    pub missing: Vec<Model>,
}

/// Aggregate outcome of a batch save. Failures never abort the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    pub success: usize,
    pub failed: usize,
    /// Failure reason keyed by model id.
    pub errors: BTreeMap<String, String>,
}

/// Aggregate outcome of creating missing models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateReport {
    /// Models as returned by the server, with server-assigned fields.
    pub created: Vec<Model>,
    pub failed: usize,
    pub errors: BTreeMap<String, String>,
}

/// What the operator sees after a successful connect or refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSummary {
    pub models: usize,
    pub missing: Vec<Model>,
}

/// Snapshot of the session for status displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub base_url: Option<String>,
    pub models: usize,
    pub missing: usize,
    pub selected: Option<String>,
    pub active_patches: Vec<String>,
}
