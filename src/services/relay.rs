use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{HostError, RewriteError};
use crate::host::{BrowserHost, TabId};
use crate::models::{PageMessage, Response, SourcePayload};

/// Which tab a finished rewrite should go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabTarget {
    Active,
    Tab(TabId),
}

/// Pushes a finished rewrite into a page, re-injecting the capture agent once if nobody answers.
pub struct DeliveryRelay {
    host: Arc<dyn BrowserHost>,
}

impl DeliveryRelay {
    pub fn new(host: Arc<dyn BrowserHost>) -> Self {
        Self { host }
    }

    async fn resolve(&self, target: TabTarget) -> Option<TabId> {
        match target {
            TabTarget::Active => self.host.active_tab().await,
            TabTarget::Tab(id) => Some(id),
        }
    }

    pub async fn deliver(&self, target: TabTarget, text: &str) -> Result<Response, RewriteError> {
        let tab = self.resolve(target).await.ok_or(RewriteError::NoActiveTab)?;
        let message = PageMessage::ApplyRewrite(SourcePayload {
            text: text.to_string(),
        });

        match self.host.send_to_tab(tab, message.clone()).await {
            Ok(response) => {
                info!(tab, "rewrite delivered");
                return Ok(response);
            }
            Err(err) => warn!(tab, error = %err, "first delivery failed, re-injecting agent"),
        }

        self.reinject_and_retry(target, message)
            .await
            .map_err(|err| RewriteError::InjectOrSendFailed(err.to_string()))
    }

    async fn reinject_and_retry(
        &self,
        target: TabTarget,
        message: PageMessage,
    ) -> Result<Response, HostError> {
        let tab = self
            .resolve(target)
            .await
            .ok_or_else(|| HostError::Failed("active tab went away".to_string()))?;
        self.host.inject_agent(tab).await?;

        let tab = self
            .resolve(target)
            .await
            .ok_or_else(|| HostError::Failed("active tab went away".to_string()))?;
        let response = self.host.send_to_tab(tab, message).await?;
        info!(tab, "rewrite delivered after re-injection");
        Ok(response)
    }
}
