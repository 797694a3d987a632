//! Key-value settings storage shared by the coordinator and the settings page.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RewriteError;
use crate::models::Credentials;

pub const API_KEY: &str = "chameleon_api_key";
pub const MODEL: &str = "chameleon_model";
pub const LAST_SOURCE_TEXT: &str = "chameleon_last_source_text";

/// Storage area a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// Persisted settings (credentials).
    Sync,
    /// Cleared when the extension session ends.
    Session,
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, area: Area, key: &str) -> Result<Option<Value>, RewriteError>;
    async fn set(&self, area: Area, key: &str, value: Value) -> Result<(), RewriteError>;
}

/// Read the credentials; `None` when no key is stored.
pub async fn load_credentials(
    store: &dyn SettingsStore,
    default_model: &str,
) -> Result<Option<Credentials>, RewriteError> {
    let api_key = get_string(store, Area::Sync, API_KEY).await?;
    let model = get_string(store, Area::Sync, MODEL).await?;
    Ok(Credentials::from_stored(api_key, model, default_model))
}

pub async fn save_credentials(
    store: &dyn SettingsStore,
    api_key: &str,
    model: &str,
) -> Result<(), RewriteError> {
    store
        .set(Area::Sync, API_KEY, Value::String(api_key.trim().to_string()))
        .await?;
    store
        .set(Area::Sync, MODEL, Value::String(model.trim().to_string()))
        .await
}

pub async fn get_last_source(store: &dyn SettingsStore) -> Result<String, RewriteError> {
    Ok(get_string(store, Area::Session, LAST_SOURCE_TEXT)
        .await?
        .unwrap_or_default())
}

pub async fn set_last_source(store: &dyn SettingsStore, text: &str) -> Result<(), RewriteError> {
    store
        .set(Area::Session, LAST_SOURCE_TEXT, Value::String(text.to_string()))
        .await
}

async fn get_string(
    store: &dyn SettingsStore,
    area: Area,
    key: &str,
) -> Result<Option<String>, RewriteError> {
    Ok(match store.get(area, key).await? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Both areas held in memory.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(Area, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, area: Area, key: &str) -> Result<Option<Value>, RewriteError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| RewriteError::Store(e.to_string()))?;
        Ok(entries.get(&(area, key.to_string())).cloned())
    }

    async fn set(&self, area: Area, key: &str, value: Value) -> Result<(), RewriteError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| RewriteError::Store(e.to_string()))?;
        entries.insert((area, key.to_string()), value);
        Ok(())
    }
}

/// Sync area persisted as a JSON object on disk; session area kept in memory.
pub struct FileStore {
    path: PathBuf,
    session: MemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            session: MemoryStore::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// `settings.json` in the app data directory.
    pub fn in_app_data_dir() -> Result<Self, String> {
        Ok(Self::new(
            super::config_service::get_app_data_dir()?.join("settings.json"),
        ))
    }

    fn read_all(&self) -> Result<serde_json::Map<String, Value>, RewriteError> {
        if !self.path.exists() {
            return Ok(serde_json::Map::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| RewriteError::Store(format!("Failed to read settings: {}", e)))?;
        match serde_json::from_str(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Ok(serde_json::Map::new()),
            Err(e) => Err(RewriteError::Store(format!(
                "Failed to parse settings: {}",
                e
            ))),
        }
    }
}

#[async_trait]
impl SettingsStore for FileStore {
    async fn get(&self, area: Area, key: &str) -> Result<Option<Value>, RewriteError> {
        match area {
            Area::Session => self.session.get(area, key).await,
            Area::Sync => Ok(self.read_all()?.get(key).cloned()),
        }
    }

    async fn set(&self, area: Area, key: &str, value: Value) -> Result<(), RewriteError> {
        if area == Area::Session {
            return self.session.set(area, key, value).await;
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| RewriteError::Store(e.to_string()))?;
        let mut map = self.read_all()?;
        map.insert(key.to_string(), value);
        let content = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| RewriteError::Store(format!("Failed to serialize settings: {}", e)))?;
        fs::write(&self.path, content)
            .map_err(|e| RewriteError::Store(format!("Failed to write settings: {}", e)))
    }
}
