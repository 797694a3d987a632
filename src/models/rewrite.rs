use serde::{Deserialize, Serialize};

use crate::error::RewriteError;

/// A tone or goal selection as sent by the review surface.
///
/// `"custom"` and `"auto"` are reserved; anything else is taken as a named value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Directive {
    Named(String),
    Custom,
    Auto,
}

impl From<String> for Directive {
    fn from(value: String) -> Self {
        match value.as_str() {
            "custom" => Directive::Custom,
            "auto" => Directive::Auto,
            _ => Directive::Named(value),
        }
    }
}

impl From<Directive> for String {
    fn from(value: Directive) -> Self {
        match value {
            Directive::Named(name) => name,
            Directive::Custom => "custom".to_string(),
            Directive::Auto => "auto".to_string(),
        }
    }
}

/// What a directive means once the paired custom text has been taken into account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<'a> {
    Unconstrained,
    Infer,
    Fixed(&'a str),
}

/// Resolve a tone/goal selection against its custom free-text field.
///
/// `Custom` always defers to the custom text, and an empty custom text leaves the dimension
/// unconstrained.
pub fn resolve_directive<'a>(directive: Option<&'a Directive>, custom: &'a str) -> Resolved<'a> {
    let value = match directive {
        None => return Resolved::Unconstrained,
        Some(Directive::Auto) => return Resolved::Infer,
        Some(Directive::Custom) => custom.trim(),
        Some(Directive::Named(name)) => name.trim(),
    };
    if value.is_empty() {
        Resolved::Unconstrained
    } else {
        Resolved::Fixed(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRequest {
    #[serde(alias = "sourceText")]
    pub text: String,
    #[serde(default)]
    pub tone: Option<Directive>,
    #[serde(default)]
    pub goal: Option<Directive>,
    #[serde(default)]
    pub custom_tone: String,
    #[serde(default)]
    pub custom_goal: String,
    #[serde(default)]
    pub custom_prompt: String,
    #[serde(default)]
    pub compare_tones: bool,
    #[serde(default)]
    pub tones_for_compare: Vec<String>,
}

impl RewriteRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Tones to compare, falling back to `defaults` when the request names none. A blank name
    /// would leave its result unlabeled, so it rejects the request.
    pub fn effective_tones(&self, defaults: &[String]) -> Result<Vec<String>, RewriteError> {
        if self.tones_for_compare.is_empty() {
            return Ok(defaults.to_vec());
        }
        self.tones_for_compare
            .iter()
            .enumerate()
            .map(|(i, tone)| match tone.trim() {
                "" => Err(RewriteError::InvalidPayload(format!(
                    "tonesForCompare[{i}] is blank"
                ))),
                name => Ok(name.to_string()),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneVariant {
    pub tone: String,
    pub text: String,
}

/// Normalized output of a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RewriteResult {
    Compare { compare: Vec<ToneVariant> },
    Single { text: String, subject: String },
}
