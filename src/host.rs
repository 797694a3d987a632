//! Seam between the coordinator and the browser that hosts it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::HostError;
use crate::models::{PageMessage, Response};

pub type TabId = u64;

/// A standalone window request, used when the review popup cannot be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// The tab the user is currently looking at.
    async fn active_tab(&self) -> Option<TabId>;

    /// Deliver a message to the agent in `tab`. Fails with [`HostError::NoReceiver`] when no
    /// agent is listening there.
    async fn send_to_tab(&self, tab: TabId, message: PageMessage) -> Result<Response, HostError>;

    /// Load the capture agent into `tab`.
    async fn inject_agent(&self, tab: TabId) -> Result<(), HostError>;

    async fn open_settings(&self) -> Result<(), HostError>;

    /// Present the review popup attached to the toolbar action.
    async fn open_review_popup(&self) -> Result<(), HostError>;

    async fn open_window(&self, spec: WindowSpec) -> Result<(), HostError>;
}

/// Host with no tabs or surfaces, used by the stdio binary.
///
/// Surface requests are logged so a wrapper process can act on them.
#[derive(Debug, Default)]
pub struct DetachedHost;

#[async_trait]
impl BrowserHost for DetachedHost {
    async fn active_tab(&self) -> Option<TabId> {
        None
    }

    async fn send_to_tab(&self, tab: TabId, _message: PageMessage) -> Result<Response, HostError> {
        Err(HostError::NoReceiver(tab))
    }

    async fn inject_agent(&self, _tab: TabId) -> Result<(), HostError> {
        Err(HostError::Unsupported("agent injection".to_string()))
    }

    async fn open_settings(&self) -> Result<(), HostError> {
        info!("settings requested");
        Ok(())
    }

    async fn open_review_popup(&self) -> Result<(), HostError> {
        Err(HostError::Unsupported("toolbar popup".to_string()))
    }

    async fn open_window(&self, spec: WindowSpec) -> Result<(), HostError> {
        info!(url = %spec.url, width = spec.width, height = spec.height, "review window requested");
        Ok(())
    }
}
