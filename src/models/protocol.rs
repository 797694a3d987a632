use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RewriteRequest;
use crate::error::RewriteError;

/// The closed set of requests the coordinator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    RequestRewrite,
    RequestApplyRewrite,
    SaveLastSource,
    GetLastSource,
    OpenSettings,
    OpenReviewSurface,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        OperationKind::RequestRewrite,
        OperationKind::RequestApplyRewrite,
        OperationKind::SaveLastSource,
        OperationKind::GetLastSource,
        OperationKind::OpenSettings,
        OperationKind::OpenReviewSurface,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            OperationKind::RequestRewrite => "CHAMELEON_REWRITE_TEXT",
            OperationKind::RequestApplyRewrite => "CHAMELEON_REQUEST_APPLY_REWRITE",
            OperationKind::SaveLastSource => "CHAMELEON_SAVE_LAST_SOURCE",
            OperationKind::GetLastSource => "CHAMELEON_GET_LAST_SOURCE",
            OperationKind::OpenSettings => "CHAMELEON_OPEN_OPTIONS",
            OperationKind::OpenReviewSurface => "CHAMELEON_OPEN_POPUP",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcePayload {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPayload {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Typed form of a coordinator request, used by callers inside this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    RequestRewrite(RewriteRequest),
    RequestApplyRewrite(ApplyPayload),
    SaveLastSource(SourcePayload),
    GetLastSource,
    OpenSettings,
    OpenReviewSurface(ReviewPayload),
}

impl Message {
    pub fn kind(&self) -> OperationKind {
        match self {
            Message::RequestRewrite(_) => OperationKind::RequestRewrite,
            Message::RequestApplyRewrite(_) => OperationKind::RequestApplyRewrite,
            Message::SaveLastSource(_) => OperationKind::SaveLastSource,
            Message::GetLastSource => OperationKind::GetLastSource,
            Message::OpenSettings => OperationKind::OpenSettings,
            Message::OpenReviewSurface(_) => OperationKind::OpenReviewSurface,
        }
    }

    /// Encode as `{ "type": ..., "payload": ... }`.
    pub fn to_wire(&self) -> Value {
        let payload = match self {
            Message::RequestRewrite(req) => serde_json::to_value(req).ok(),
            Message::RequestApplyRewrite(p) => serde_json::to_value(p).ok(),
            Message::SaveLastSource(p) => serde_json::to_value(p).ok(),
            Message::OpenReviewSurface(p) => serde_json::to_value(p).ok(),
            Message::GetLastSource | Message::OpenSettings => None,
        };
        let mut wire = serde_json::json!({ "type": self.kind().wire_name() });
        if let Some(payload) = payload {
            wire["payload"] = payload;
        }
        wire
    }
}

/// Messages the coordinator sends into a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PageMessage {
    #[serde(rename = "CHAMELEON_APPLY_REWRITE")]
    ApplyRewrite(SourcePayload),
}

/// Reply to any cross-context request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            ok: true,
            data: None,
            error: None,
        }
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// The error code prefix, if this is a failure.
    pub fn error_code(&self) -> Option<&str> {
        let error = self.error.as_deref()?;
        let end = error
            .find(|c: char| !(c.is_ascii_uppercase() || c == '_'))
            .unwrap_or(error.len());
        Some(&error[..end])
    }
}

impl From<Result<Option<Value>, RewriteError>> for Response {
    fn from(result: Result<Option<Value>, RewriteError>) -> Self {
        match result {
            Ok(Some(data)) => Response::with_data(data),
            Ok(None) => Response::ok(),
            Err(err) => Response::failure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_names_round_trip() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::from_wire(kind.wire_name()), Some(kind));
        }
        assert_eq!(OperationKind::from_wire("CHAMELEON_SELF_DESTRUCT"), None);
    }

    #[test]
    fn unit_messages_have_no_payload() {
        assert_eq!(
            Message::GetLastSource.to_wire(),
            json!({ "type": "CHAMELEON_GET_LAST_SOURCE" })
        );
    }

    #[test]
    fn page_message_uses_apply_wire_name() {
        let msg = PageMessage::ApplyRewrite(SourcePayload { text: "x".into() });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "type": "CHAMELEON_APPLY_REWRITE", "payload": { "text": "x" } })
        );
    }

    #[test]
    fn ok_response_omits_error() {
        assert_eq!(serde_json::to_value(Response::ok()).unwrap(), json!({ "ok": true }));
        assert_eq!(
            serde_json::to_value(Response::failure("NO_API_KEY")).unwrap(),
            json!({ "ok": false, "error": "NO_API_KEY" })
        );
    }

    #[test]
    fn error_code_is_the_uppercase_prefix() {
        assert_eq!(
            Response::failure("RATE_LIMIT: slow down").error_code(),
            Some("RATE_LIMIT")
        );
        assert_eq!(Response::failure("NO_API_KEY").error_code(), Some("NO_API_KEY"));
        assert_eq!(Response::ok().error_code(), None);
    }
}
