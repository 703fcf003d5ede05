//! JSON import and export of model lists.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};

use crate::models::Model;
use crate::panel::PanelError;

/// File name used for an export made on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("openwebui-models-{}.json", date.format("%Y-%m-%d"))
}

/// Parse a JSON array of models. Any malformed input fails the whole import.
pub fn parse_models(text: &str) -> Result<Vec<Model>, PanelError> {
    serde_json::from_str(text).map_err(|e| PanelError::Parse(format!("Invalid model file: {}", e)))
}

pub fn to_pretty_json(models: &[Model]) -> Result<String, PanelError> {
    serde_json::to_string_pretty(models).map_err(|e| PanelError::Parse(e.to_string()))
}

pub fn import_models(path: &Path) -> Result<Vec<Model>, PanelError> {
    let text = fs::read_to_string(path)?;
    let models = parse_models(&text)?;
    tracing::info!("Imported {} models from {}", models.len(), path.display());
    Ok(models)
}

/// Write `models` into `dir` under today's export name and return the path.
pub fn export_models(models: &[Model], dir: &Path) -> Result<PathBuf, PanelError> {
    let path = dir.join(export_file_name(Utc::now().date_naive()));
    fs::write(&path, to_pretty_json(models)?)?;
    tracing::info!("Exported {} models to {}", models.len(), path.display());
    Ok(path)
}
