use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::RewriteError;
use crate::models::{RewriteResult, ToneVariant};

const COMPARE_INSTRUCTION: &str = "Return valid JSON only when JSON is requested.";
const SINGLE_INSTRUCTION: &str =
    "Return only what was requested. If JSON was requested, return valid JSON and nothing else.";

/// Upper bound on how much of an error body is carried in the error message.
const MAX_ERROR_BODY: usize = 500;

/// OpenAI-compatible chat completion request
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Client for the external completion service.
pub struct CompletionClient {
    client: Client,
    url: String,
    temperature: f32,
}

impl CompletionClient {
    pub fn new(url: &str, temperature: f32, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url: url.to_string(),
            temperature,
        }
    }

    pub fn build_request(
        &self,
        model: &str,
        prompt: &str,
        compare_tones: bool,
        tones: &[String],
    ) -> ChatCompletionRequest {
        let messages = if compare_tones {
            vec![
                ChatMessage::system(COMPARE_INSTRUCTION),
                ChatMessage::user(prompt),
                ChatMessage::user(&format!("Tones to compare: {}.", tones.join(", "))),
            ]
        } else {
            vec![
                ChatMessage::system(SINGLE_INSTRUCTION),
                ChatMessage::user(prompt),
            ]
        };

        ChatCompletionRequest {
            model: model.to_string(),
            messages,
            temperature: Some(self.temperature),
        }
    }

    /// Run one completion and normalize whatever came back.
    ///
    /// Only transport and HTTP failures are errors; an answer in the wrong format is downgraded
    /// to raw text.
    pub async fn complete(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        compare_tones: bool,
        tones: &[String],
    ) -> Result<RewriteResult, RewriteError> {
        let request = self.build_request(model, prompt, compare_tones, tones);

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RewriteError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RewriteError::Transport(format!("Failed to read response: {}", e)))?;
        let raw = extract_content(&body);
        debug!(chars = raw.len(), compare_tones, "completion received");

        Ok(if compare_tones {
            RewriteResult::Compare {
                compare: normalize_compare(&raw, tones),
            }
        } else {
            normalize_single(&raw)
        })
    }
}

pub fn classify_status(status: StatusCode, body: &str) -> RewriteError {
    match status {
        StatusCode::UNAUTHORIZED => RewriteError::Auth,
        StatusCode::TOO_MANY_REQUESTS => RewriteError::RateLimit,
        _ => RewriteError::Service {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        },
    }
}

/// Pull the answer text out of a response body.
///
/// Looks at `output_text`, `content[0].text` and `choices[0].message.content` in that order; a
/// body that is not JSON is taken as the answer itself.
pub fn extract_content(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    let candidates = [
        value.get("output_text"),
        value.pointer("/content/0/text"),
        value.pointer("/choices/0/message/content"),
    ];
    let text = candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    text
}

#[derive(Debug, Deserialize)]
struct SubjectBody {
    #[serde(default)]
    subject: Option<String>,
    #[serde(alias = "text")]
    body: String,
}

/// Single-rewrite normalization: `{subject, body}` when parseable, the raw text otherwise.
pub fn normalize_single(raw: &str) -> RewriteResult {
    match parse_embedded::<SubjectBody>(raw, '{', '}') {
        Some(parsed) => RewriteResult::Single {
            text: parsed.body,
            subject: parsed.subject.unwrap_or_default(),
        },
        None => {
            warn!("rewrite was not a subject/body object, using raw text");
            RewriteResult::Single {
                text: raw.to_string(),
                subject: String::new(),
            }
        }
    }
}

/// Comparison normalization: always one entry per requested tone, in request order.
pub fn normalize_compare(raw: &str, tones: &[String]) -> Vec<ToneVariant> {
    let parsed = parse_embedded::<Vec<ToneVariant>>(raw, '[', ']')
        .or_else(|| parse_wrapped_variants(raw))
        .unwrap_or_else(|| {
            warn!("comparison was not a JSON array, using raw text for every tone");
            Vec::new()
        });

    // Claim name matches first so a positional fallback never reuses another tone's variant.
    let mut claimed = vec![false; parsed.len()];
    let by_name: Vec<Option<usize>> = tones
        .iter()
        .map(|tone| {
            let found = parsed.iter().enumerate().position(|(i, v)| {
                !claimed[i] && v.tone.trim().eq_ignore_ascii_case(tone.trim())
            });
            if let Some(i) = found {
                claimed[i] = true;
            }
            found
        })
        .collect();

    tones
        .iter()
        .zip(by_name)
        .enumerate()
        .map(|(index, (tone, matched))| {
            let slot = matched.or_else(|| {
                let free = (index < parsed.len() && !claimed[index])
                    .then_some(index)
                    .or_else(|| claimed.iter().position(|c| !c));
                if let Some(i) = free {
                    claimed[i] = true;
                }
                free
            });
            ToneVariant {
                tone: tone.clone(),
                text: slot
                    .map(|i| parsed[i].text.clone())
                    .unwrap_or_else(|| raw.to_string()),
            }
        })
        .collect()
}

/// `{ "<anything>": [ {tone, text}, ... ] }`
fn parse_wrapped_variants(raw: &str) -> Option<Vec<ToneVariant>> {
    let object = parse_embedded::<serde_json::Map<String, Value>>(raw, '{', '}')?;
    object
        .into_iter()
        .find_map(|(_, value)| serde_json::from_value::<Vec<ToneVariant>>(value).ok())
}

/// Parse `raw` as `T`, tolerating code fences and prose around the JSON.
fn parse_embedded<T: serde::de::DeserializeOwned>(raw: &str, open: char, close: char) -> Option<T> {
    let trimmed = strip_code_fence(raw.trim());
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let start = trimmed.find(open)?;
    let end = trimmed.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
