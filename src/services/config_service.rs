use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RewriteError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_REVIEW_PAGE: &str = "popup.html";
pub const DEFAULT_COMPARE_TONES: [&str; 5] =
    ["casual", "formal", "friendly", "assertive", "slightly formal"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 420,
            height: 640,
        }
    }
}

/// Coordinator settings stored next to the synced settings file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub review_page: Option<String>,
    #[serde(default)]
    pub review_window: Option<WindowSize>,
    #[serde(default)]
    pub compare_tones: Vec<String>,
}

impl Config {
    /// Completion endpoint, with `/chat/completions` appended unless already present.
    pub fn completions_url(&self) -> Result<String, RewriteError> {
        let base = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BASE_URL);
        Url::parse(base)
            .map_err(|e| RewriteError::InvalidPayload(format!("invalid base_url {base}: {e}")))?;

        if base.contains("/chat/completions") {
            Ok(base.to_string())
        } else {
            Ok(format!("{}/chat/completions", base.trim_end_matches('/')))
        }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn review_page(&self) -> &str {
        self.review_page.as_deref().unwrap_or(DEFAULT_REVIEW_PAGE)
    }

    pub fn review_window(&self) -> WindowSize {
        self.review_window.unwrap_or_default()
    }

    pub fn compare_tones(&self) -> Vec<String> {
        if self.compare_tones.is_empty() {
            DEFAULT_COMPARE_TONES.iter().map(|t| t.to_string()).collect()
        } else {
            self.compare_tones.clone()
        }
    }

    /// Apply `CHAMELEON_BASE_URL` / `CHAMELEON_MODEL` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("CHAMELEON_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = Some(url);
            }
        }
        if let Ok(model) = std::env::var("CHAMELEON_MODEL") {
            if !model.trim().is_empty() {
                self.default_model = Some(model);
            }
        }
        self
    }
}

pub fn get_app_data_dir() -> Result<PathBuf, String> {
    let data_dir = dirs::data_dir()
        .ok_or("Could not find data directory")?
        .join("Chameleon");

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir).map_err(|e| e.to_string())?;
    }

    Ok(data_dir)
}

fn get_config_path() -> Result<PathBuf, String> {
    Ok(get_app_data_dir()?.join("config.json"))
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

pub fn save_config_to(path: &Path, config: &Config) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;
    Ok(())
}

/// Config file plus environment overrides.
pub fn load_config() -> Result<Config, String> {
    Ok(load_config_from(&get_config_path()?)?.with_env_overrides())
}
