use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::*;
use crate::panel::{Panel, PanelError};
use crate::patch::{IconCatalog, IconPatchConfig, ModelEdit};
use crate::prompt::PromptRequest;
use crate::transfer::{export_file_name, to_pretty_json};

// ============================================================
// Error Handling
// ============================================================

/// Map a panel error to a status code and plain-text reason.
///
/// Operator mistakes and upstream failures are passed through verbatim;
/// local IO failures are logged and reported generically.
fn panel_error(e: PanelError) -> (StatusCode, String) {
    let status = match &e {
        PanelError::Connection(_) | PanelError::NothingToSave => StatusCode::BAD_REQUEST,
        PanelError::UnknownModel(_) => StatusCode::NOT_FOUND,
        PanelError::NotConnected | PanelError::Superseded => StatusCode::CONFLICT,
        PanelError::Fetch(_) | PanelError::Parse(_) => StatusCode::BAD_GATEWAY,
        PanelError::Io(_) => {
            tracing::error!("Internal error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };
    tracing::warn!("Request failed: {}", e);
    (status, e.to_string())
}

// ============================================================
// Request / response bodies
// ============================================================

#[derive(Debug, Deserialize)]
pub struct PatchNameInput {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectionInput {
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PatchInfo {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResult {
    pub imported: usize,
}

#[derive(Debug, Deserialize)]
pub struct IconPatchInput {
    #[serde(flatten)]
    pub config: IconPatchConfig,
    /// Replaces the bundled icon catalog: `{"name": {"color": bool}}`.
    #[serde(default)]
    pub catalog: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EditResult {
    pub patch: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptResult {
    pub prompt: String,
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Session
// ============================================================

pub async fn get_session(State(panel): State<Panel>) -> Json<SessionStatus> {
    Json(panel.status())
}

pub async fn connect(
    State(panel): State<Panel>,
    Json(config): Json<ApiConfig>,
) -> Result<Json<FetchSummary>, (StatusCode, String)> {
    panel.connect(config).await.map(Json).map_err(panel_error)
}

pub async fn refresh(
    State(panel): State<Panel>,
) -> Result<Json<FetchSummary>, (StatusCode, String)> {
    panel.refresh().await.map(Json).map_err(panel_error)
}

pub async fn save(State(panel): State<Panel>) -> Result<Json<SaveReport>, (StatusCode, String)> {
    panel.save().await.map(Json).map_err(panel_error)
}

pub async fn disconnect(State(panel): State<Panel>) -> StatusCode {
    panel.disconnect();
    StatusCode::NO_CONTENT
}

pub async fn list_missing(State(panel): State<Panel>) -> Json<Vec<Model>> {
    Json(panel.missing_models())
}

pub async fn create_missing(
    State(panel): State<Panel>,
) -> Result<Json<CreateReport>, (StatusCode, String)> {
    panel.create_missing().await.map(Json).map_err(panel_error)
}

// ============================================================
// Models
// ============================================================

pub async fn list_models(State(panel): State<Panel>) -> Json<Vec<Model>> {
    Json(panel.effective_models())
}

pub async fn list_raw_models(State(panel): State<Panel>) -> Json<Vec<Model>> {
    Json(panel.raw_models())
}

pub async fn import_models(
    State(panel): State<Panel>,
    Json(models): Json<Vec<Model>>,
) -> Json<ImportResult> {
    Json(ImportResult {
        imported: panel.import_models(models),
    })
}

pub async fn export_models(
    State(panel): State<Panel>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let models = panel.effective_models();
    if models.is_empty() {
        return Err((StatusCode::NOT_FOUND, "No models to export".to_string()));
    }
    let body = to_pretty_json(&models).map_err(panel_error)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(Utc::now().date_naive())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

pub async fn edit_model(
    State(panel): State<Panel>,
    Path(id): Path<String>,
    Json(edit): Json<ModelEdit>,
) -> Result<Json<EditResult>, (StatusCode, String)> {
    panel
        .edit_model(&id, edit)
        .map(|patch| Json(EditResult { patch }))
        .map_err(panel_error)
}

// ============================================================
// Selection
// ============================================================

pub async fn get_selection(State(panel): State<Panel>) -> Json<Option<Model>> {
    Json(panel.selected())
}

pub async fn set_selection(
    State(panel): State<Panel>,
    Json(input): Json<SelectionInput>,
) -> Result<Json<Option<Model>>, (StatusCode, String)> {
    panel
        .select(input.id.as_deref())
        .map(Json)
        .map_err(panel_error)
}

// ============================================================
// Patches
// ============================================================

pub async fn list_patches(State(panel): State<Panel>) -> Json<Vec<PatchInfo>> {
    Json(
        panel
            .patches()
            .into_iter()
            .map(|(name, active)| PatchInfo { name, active })
            .collect(),
    )
}

pub async fn activate_patch(
    State(panel): State<Panel>,
    Json(input): Json<PatchNameInput>,
) -> StatusCode {
    panel.activate(&input.name);
    StatusCode::NO_CONTENT
}

pub async fn deactivate_patch(
    State(panel): State<Panel>,
    Json(input): Json<PatchNameInput>,
) -> StatusCode {
    panel.deactivate(&input.name);
    StatusCode::NO_CONTENT
}

pub async fn reset_patches(State(panel): State<Panel>) -> StatusCode {
    panel.reset_active();
    StatusCode::NO_CONTENT
}

pub async fn apply_icon_patch(
    State(panel): State<Panel>,
    Json(input): Json<IconPatchInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    let catalog = match input.catalog {
        Some(listing) => IconCatalog::from_json(&listing.to_string())
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid icon catalog: {}", e)))?,
        None => IconCatalog::builtin(),
    };
    panel.apply_icon_config(input.config, catalog);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Prompts
// ============================================================

pub async fn build_prompt(
    State(panel): State<Panel>,
    Json(request): Json<PromptRequest>,
) -> Json<PromptResult> {
    Json(PromptResult {
        prompt: panel.build_prompt(&request),
    })
}
