//! Local key-value persistence for connection config and save backups.
//!
//! Nothing here is required for correctness: callers log storage failures
//! and carry on.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::models::{ApiConfig, Model};

pub const CONFIG_KEY: &str = "openwebui_config";
pub const CONNECTED_KEY: &str = "openwebui_connected";
pub const BACKUP_PREFIX: &str = "models_backup_";
pub const LATEST_KEY: &str = "models_latest";

const STATE_FILE: &str = "panel-state.json";

/// Opaque string store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

/// All keys in one JSON object file.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store in the platform data directory.
    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "llm-panel")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(Self::open(dirs.data_dir().join(STATE_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path).context("Failed to read state file")?;
        serde_json::from_str(&content).context("Failed to parse state file")
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        let content = serde_json::to_string_pretty(entries).context("Failed to serialize state")?;
        fs::write(&self.path, content).context("Failed to write state file")
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().expect("state file lock poisoned");
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().expect("state file lock poisoned");
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().expect("state file lock poisoned");
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().expect("state file lock poisoned");
        Ok(self.read_all()?.into_keys().collect())
    }
}

/// Process-local store, for tests and one-shot runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().expect("memory store lock poisoned");
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("memory store lock poisoned");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("memory store lock poisoned");
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().expect("memory store lock poisoned");
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

// ============================================================
// Typed helpers
// ============================================================

pub fn load_config(store: &dyn KeyValueStore) -> Result<Option<ApiConfig>> {
    match store.get(CONFIG_KEY)? {
        Some(raw) => Ok(Some(
            serde_json::from_str(&raw).context("Failed to parse stored config")?,
        )),
        None => Ok(None),
    }
}

/// Persist credentials and mark the session connected.
pub fn store_connection(store: &dyn KeyValueStore, config: &ApiConfig) -> Result<()> {
    store.set(CONFIG_KEY, &serde_json::to_string(config)?)?;
    store.set(CONNECTED_KEY, "true")
}

pub fn clear_connection(store: &dyn KeyValueStore) -> Result<()> {
    store.remove(CONFIG_KEY)?;
    store.remove(CONNECTED_KEY)
}

pub fn is_marked_connected(store: &dyn KeyValueStore) -> Result<bool> {
    Ok(store.get(CONNECTED_KEY)?.as_deref() == Some("true"))
}

/// Key of the backup taken at `at`.
pub fn backup_key(at: DateTime<Utc>) -> String {
    format!("{}{}", BACKUP_PREFIX, at.to_rfc3339())
}

/// Keep a timestamped copy of a save batch plus the latest batch.
pub fn store_backup(store: &dyn KeyValueStore, models: &[Model], at: DateTime<Utc>) -> Result<()> {
    let json = serde_json::to_string(models)?;
    store.set(&backup_key(at), &json)?;
    store.set(LATEST_KEY, &json)
}

pub fn load_latest_batch(store: &dyn KeyValueStore) -> Result<Option<Vec<Model>>> {
    match store.get(LATEST_KEY)? {
        Some(raw) => Ok(Some(
            serde_json::from_str(&raw).context("Failed to parse stored batch")?,
        )),
        None => Ok(None),
    }
}
