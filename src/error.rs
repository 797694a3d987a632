use thiserror::Error;

/// Failures surfaced to whoever sent a coordinator request.
///
/// The `Display` form always starts with the wire code so the review surface can branch on the
/// prefix and still show the rest to the user.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RewriteError {
    #[error("NO_API_KEY")]
    NoApiKey,
    #[error("AUTH_ERROR: the API key was rejected, check it in Settings")]
    Auth,
    #[error("RATE_LIMIT: no credits left or rate limited, check the billing and usage limits of this API key")]
    RateLimit,
    #[error("GENERIC_SERVICE_ERROR ({status}): {body}")]
    Service { status: u16, body: String },
    #[error("GENERIC_SERVICE_ERROR: request failed: {0}")]
    Transport(String),
    #[error("UNKNOWN_MESSAGE")]
    UnknownMessage(String),
    #[error("INJECT_OR_SEND_FAILED: reload the mail page, place the cursor in the compose box and try again ({0})")]
    InjectOrSendFailed(String),
    #[error("NO_ACTIVE_TAB")]
    NoActiveTab,
    #[error("INVALID_PAYLOAD: {0}")]
    InvalidPayload(String),
    #[error("STORE_ERROR: {0}")]
    Store(String),
    #[error("HOST_ERROR: {0}")]
    Host(String),
}

impl RewriteError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoApiKey => "NO_API_KEY",
            Self::Auth => "AUTH_ERROR",
            Self::RateLimit => "RATE_LIMIT",
            Self::Service { .. } | Self::Transport(_) => "GENERIC_SERVICE_ERROR",
            Self::UnknownMessage(_) => "UNKNOWN_MESSAGE",
            Self::InjectOrSendFailed(_) => "INJECT_OR_SEND_FAILED",
            Self::NoActiveTab => "NO_ACTIVE_TAB",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::Store(_) => "STORE_ERROR",
            Self::Host(_) => "HOST_ERROR",
        }
    }
}

/// Failures reported by the browser host seam.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    #[error("no agent is listening in tab {0}")]
    NoReceiver(u64),
    #[error("not supported by this host: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Failed(String),
}

impl From<HostError> for RewriteError {
    fn from(err: HostError) -> Self {
        RewriteError::Host(err.to_string())
    }
}
