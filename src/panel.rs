//! Session controller: connect, refresh, save and create-missing on top of
//! the working-state store.
//!
//! The store sits behind a mutex that is only held for synchronous
//! mutations, never across a network await. Fetch results carry a ticket so
//! a slow response can never overwrite a newer one.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use thiserror::Error;

use crate::client::{CatalogClient, ClientError};
use crate::config::PanelSettings;
use crate::models::*;
use crate::patch::{
    edit_patch_name, icon_patch, IconCatalog, IconPatchConfig, ModelEdit, Patch, ICON_PATCH,
};
use crate::prompt::{build_prompt, PromptRequest};
use crate::storage::{self, KeyValueStore};
use crate::store::WorkingState;

/// Errors surfaced to the operator. Each carries a readable reason.
#[derive(Debug, Error)]
pub enum PanelError {
    /// Credentials incomplete; nothing was sent.
    #[error("Incomplete connection settings: {0}")]
    Connection(String),

    #[error("Not connected to a catalog")]
    NotConnected,

    /// A listing request failed or returned a non-success status.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// A response or imported file was not valid model JSON.
    #[error("Parse failed: {0}")]
    Parse(String),

    #[error("No models to save")]
    NothingToSave,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// A newer operation replaced the state this request would have written.
    #[error("Superseded by a newer request")]
    Superseded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ClientError> for PanelError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Decode(e) => Self::Parse(e.to_string()),
            ClientError::Http(e) if e.is_decode() => Self::Parse(e.to_string()),
            other => Self::Fetch(other.to_string()),
        }
    }
}

struct PanelInner {
    state: WorkingState,
    phase: SessionPhase,
    client: Option<CatalogClient>,
}

/// Cloneable handle to one panel session.
#[derive(Clone)]
pub struct Panel {
    inner: Arc<Mutex<PanelInner>>,
    storage: Arc<dyn KeyValueStore>,
    settings: PanelSettings,
}

impl Panel {
    pub fn new(storage: Arc<dyn KeyValueStore>, settings: PanelSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PanelInner {
                state: WorkingState::new(),
                phase: SessionPhase::Disconnected,
                client: None,
            })),
            storage,
            settings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PanelInner> {
        self.inner.lock().expect("panel state lock poisoned")
    }

    /// Run `f` against the working state under the lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut WorkingState) -> R) -> R {
        f(&mut self.lock().state)
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.lock();
        SessionStatus {
            phase: inner.phase,
            base_url: inner.client.as_ref().map(|c| c.base_url().to_string()),
            models: inner.state.models().len(),
            missing: inner.state.missing().len(),
            selected: inner.state.selected().map(|m| m.id.clone()),
            active_patches: inner.state.active().iter().map(str::to_string).collect(),
        }
    }

    /// Credentials saved by the last successful connect.
    pub fn stored_config(&self) -> Option<ApiConfig> {
        storage::load_config(self.storage.as_ref()).unwrap_or_else(|e| {
            tracing::warn!("Failed to read stored config: {}", e);
            None
        })
    }

    fn connected_client(&self) -> Result<CatalogClient, PanelError> {
        let inner = self.lock();
        match (&inner.client, inner.phase.is_connected()) {
            (Some(client), true) => Ok(client.clone()),
            _ => Err(PanelError::NotConnected),
        }
    }

    // ============================================================
    // Lifecycle
    // ============================================================

    /// Validate credentials, fetch and reconcile, then populate the store.
    ///
    /// On failure the previous state is left exactly as it was.
    pub async fn connect(&self, config: ApiConfig) -> Result<FetchSummary, PanelError> {
        if !config.is_complete() {
            return Err(PanelError::Connection(
                "base URL and token are both required".to_string(),
            ));
        }
        let client = CatalogClient::new(&config, &self.settings)?;

        let (ticket, previous) = {
            let mut inner = self.lock();
            let previous = inner.phase;
            inner.phase = SessionPhase::Connecting;
            (inner.state.begin_fetch(), previous)
        };

        tracing::info!("Connecting to {}", client.base_url());
        let fetched = client.fetch_catalog().await;

        let mut inner = self.lock();
        let current = inner.state.is_current(ticket);
        if !current && inner.phase == SessionPhase::Connecting {
            inner.phase = previous;
        }
        let result = match fetched {
            Ok(result) => result,
            Err(e) => {
                if current {
                    inner.phase = previous;
                }
                tracing::error!("Connect to {} failed: {}", client.base_url(), e);
                return Err(e.into());
            }
        };

        let summary = FetchSummary {
            models: result.list.len(),
            missing: result.missing.clone(),
        };
        if !inner.state.commit_fetch(ticket, result) {
            return Err(PanelError::Superseded);
        }
        inner.phase = SessionPhase::Connected;
        inner.client = Some(client);
        drop(inner);

        if let Err(e) = storage::store_connection(self.storage.as_ref(), &config) {
            tracing::warn!("Failed to persist connection config: {}", e);
        }
        tracing::info!(
            "Connected: {} models, {} missing",
            summary.models,
            summary.missing.len()
        );
        Ok(summary)
    }

    /// Re-fetch and replace the list. A failed refresh keeps the prior list.
    pub async fn refresh(&self) -> Result<FetchSummary, PanelError> {
        let client = self.connected_client()?;
        let ticket = {
            let mut inner = self.lock();
            inner.phase = SessionPhase::Refreshing;
            inner.state.begin_fetch()
        };

        let fetched = client.fetch_catalog().await;

        let mut inner = self.lock();
        if inner.phase == SessionPhase::Refreshing {
            inner.phase = SessionPhase::Connected;
        }
        let result = fetched.map_err(|e| {
            tracing::error!("Refresh failed, keeping previous list: {}", e);
            PanelError::from(e)
        })?;

        let summary = FetchSummary {
            models: result.list.len(),
            missing: result.missing.clone(),
        };
        if !inner.state.commit_fetch(ticket, result) {
            return Err(PanelError::Superseded);
        }
        tracing::info!("Refreshed {} models", summary.models);
        Ok(summary)
    }

    /// Submit the effective list entry by entry.
    ///
    /// The batch is backed up locally first. Per-entry failures end up in
    /// the report; already-saved entries are not rolled back.
    pub async fn save(&self) -> Result<SaveReport, PanelError> {
        let client = self.connected_client()?;
        let batch = {
            let mut inner = self.lock();
            let batch = inner.state.effective_models();
            if batch.is_empty() {
                return Err(PanelError::NothingToSave);
            }
            inner.phase = SessionPhase::Saving;
            batch
        };

        if let Err(e) = storage::store_backup(self.storage.as_ref(), &batch, Utc::now()) {
            tracing::warn!("Failed to back up save batch: {}", e);
        }

        let report = client.save_models(&batch).await;

        let mut inner = self.lock();
        if inner.phase == SessionPhase::Saving {
            inner.phase = SessionPhase::Connected;
        }
        if report.failed == 0 {
            tracing::info!("Saved {} models", report.success);
        } else {
            tracing::warn!(
                "Saved {} models, {} failed: {:?}",
                report.success,
                report.failed,
                report.errors
            );
        }
        Ok(report)
    }

    /// Create every model in the missing set.
    ///
    /// Failures are isolated per model, like saves. Created models join the
    /// raw list and leave the missing set; failed ones stay missing. If the
    /// working set was replaced while the requests ran (refresh, import or
    /// disconnect), the report is returned but nothing is written back.
    pub async fn create_missing(&self) -> Result<CreateReport, PanelError> {
        let client = self.connected_client()?;
        let (ticket, batch) = self.with_state(|s| (s.current_ticket(), s.missing().to_vec()));
        if batch.is_empty() {
            return Ok(CreateReport::default());
        }

        let report = client.create_models(&batch).await;

        let mut inner = self.lock();
        if !inner.phase.is_connected() || !inner.state.is_current(ticket) {
            tracing::warn!(
                "Working set changed while creating models; {} created model(s) not merged",
                report.created.len()
            );
            return Ok(report);
        }
        let created: HashSet<&str> = batch
            .iter()
            .map(|m| m.id.as_str())
            .filter(|id| !report.errors.contains_key(*id))
            .collect();
        let still_missing = inner
            .state
            .missing()
            .iter()
            .filter(|m| !created.contains(m.id.as_str()))
            .cloned()
            .collect();
        inner.state.set_missing(still_missing);
        inner.state.extend_models(report.created.iter().cloned());
        drop(inner);

        tracing::info!(
            "Created {} missing models, {} failed",
            report.created.len(),
            report.failed
        );
        Ok(report)
    }

    /// Forget the catalog: list, selection, missing set and credentials.
    pub fn disconnect(&self) {
        {
            let mut inner = self.lock();
            inner.state.clear();
            inner.client = None;
            inner.phase = SessionPhase::Disconnected;
        }
        if let Err(e) = storage::clear_connection(self.storage.as_ref()) {
            tracing::warn!("Failed to clear stored connection: {}", e);
        }
        tracing::info!("Disconnected");
    }

    // ============================================================
    // Working set
    // ============================================================

    /// Replace the raw list with imported models. Fetches still in flight
    /// become stale and will not overwrite the import.
    pub fn import_models(&self, models: Vec<Model>) -> usize {
        let count = models.len();
        self.with_state(|s| {
            s.set_models(models);
            s.invalidate_fetches();
        });
        tracing::info!("Imported {} models", count);
        count
    }

    pub fn effective_models(&self) -> Vec<Model> {
        self.with_state(|s| s.effective_models())
    }

    pub fn raw_models(&self) -> Vec<Model> {
        self.with_state(|s| s.models().to_vec())
    }

    pub fn missing_models(&self) -> Vec<Model> {
        self.with_state(|s| s.missing().to_vec())
    }

    pub fn selected(&self) -> Option<Model> {
        self.with_state(|s| s.selected().cloned())
    }

    /// Select by id, or clear with `None`.
    pub fn select(&self, id: Option<&str>) -> Result<Option<Model>, PanelError> {
        self.with_state(|s| match id {
            Some(id) => {
                if s.select_by_id(id) {
                    Ok(s.selected().cloned())
                } else {
                    Err(PanelError::UnknownModel(id.to_string()))
                }
            }
            None => {
                s.set_selected(None);
                Ok(None)
            }
        })
    }

    // ============================================================
    // Patches
    // ============================================================

    /// `(name, active)` in registration order.
    pub fn patches(&self) -> Vec<(String, bool)> {
        self.with_state(|s| {
            s.registry()
                .names()
                .map(|name| (name.to_string(), s.active().contains(name)))
                .collect()
        })
    }

    pub fn register_patch(&self, name: impl Into<String>, patch: impl Patch + 'static) {
        let name = name.into();
        let replaced = self.with_state(|s| s.register_patch(name.clone(), patch));
        tracing::debug!(
            "{} patch {}",
            if replaced { "Replaced" } else { "Registered" },
            name
        );
    }

    pub fn activate(&self, name: &str) {
        self.with_state(|s| s.activate(name));
    }

    pub fn deactivate(&self, name: &str) {
        self.with_state(|s| s.deactivate(name));
    }

    pub fn reset_active(&self) {
        self.with_state(|s| s.reset_active());
    }

    /// Register (or replace) and enable the `icon/preview` patch.
    pub fn apply_icon_config(&self, config: IconPatchConfig, catalog: IconCatalog) {
        self.register_patch(ICON_PATCH, icon_patch(config, catalog));
        self.activate(ICON_PATCH);
    }

    /// Register and enable an edit patch for one raw model.
    pub fn edit_model(&self, id: &str, edit: ModelEdit) -> Result<String, PanelError> {
        let exists = self.with_state(|s| s.models().iter().any(|m| m.id == id));
        if !exists {
            return Err(PanelError::UnknownModel(id.to_string()));
        }
        let name = edit_patch_name(id);
        self.register_patch(name.clone(), edit.into_patch(id));
        self.activate(&name);
        Ok(name)
    }

    pub fn build_prompt(&self, request: &PromptRequest) -> String {
        self.with_state(|s| build_prompt(request, &s.effective_models(), s.models()))
    }
}
