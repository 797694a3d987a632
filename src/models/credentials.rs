use std::fmt;

pub const DEFAULT_MODEL: &str = "gpt-5-mini";

/// API key and model as stored by the settings page.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub model: String,
}

impl Credentials {
    /// Build from raw stored values, returning `None` when no usable key is present.
    ///
    /// A missing or blank model falls back to `default_model`.
    pub fn from_stored(
        api_key: Option<String>,
        model: Option<String>,
        default_model: &str,
    ) -> Option<Self> {
        let api_key = api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())?;
        let model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model.to_string());
        Some(Self { api_key, model })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}
