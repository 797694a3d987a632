use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{info, warn};

use super::config_service::Config;
use super::llm_client::CompletionClient;
use super::relay::{DeliveryRelay, TabTarget};
use super::store::{self, SettingsStore};
use super::prompt;
use crate::error::RewriteError;
use crate::host::{BrowserHost, WindowSpec};
use crate::models::{ApplyPayload, ReviewPayload, RewriteRequest, SourcePayload, DEFAULT_MODEL};

/// Handler layer behind the router: owns the store, the host and the completion client.
pub struct Coordinator {
    store: Arc<dyn SettingsStore>,
    host: Arc<dyn BrowserHost>,
    client: CompletionClient,
    relay: DeliveryRelay,
    config: Config,
}

impl Coordinator {
    pub fn new(
        config: Config,
        store: Arc<dyn SettingsStore>,
        host: Arc<dyn BrowserHost>,
    ) -> Result<Self, RewriteError> {
        let client = CompletionClient::new(
            &config.completions_url()?,
            config.temperature(),
            Duration::from_secs(config.request_timeout_secs()),
        );
        Ok(Self {
            relay: DeliveryRelay::new(host.clone()),
            store,
            host,
            client,
            config,
        })
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    pub async fn request_rewrite(&self, request: RewriteRequest) -> Result<Option<Value>, RewriteError> {
        if request.text.trim().is_empty() {
            return Err(RewriteError::InvalidPayload("source text is empty".to_string()));
        }

        let default_model = self.config.default_model.as_deref().unwrap_or(DEFAULT_MODEL);
        let Some(credentials) = store::load_credentials(self.store(), default_model).await? else {
            if let Err(err) = self.host.open_settings().await {
                warn!(error = %err, "could not open settings after missing key");
            }
            return Err(RewriteError::NoApiKey);
        };

        let tones = if request.compare_tones {
            request.effective_tones(&self.config.compare_tones())?
        } else {
            Vec::new()
        };
        let prompt = prompt::build(&request, &tones);

        let result = self
            .client
            .complete(
                &credentials.api_key,
                &credentials.model,
                &prompt,
                request.compare_tones,
                &tones,
            )
            .await?;
        info!(model = %credentials.model, compare = request.compare_tones, "rewrite completed");

        let data = serde_json::to_value(result)
            .map_err(|e| RewriteError::InvalidPayload(e.to_string()))?;
        Ok(Some(data))
    }

    pub async fn request_apply_rewrite(&self, payload: ApplyPayload) -> Result<Option<Value>, RewriteError> {
        if payload.text.is_empty() {
            return Err(RewriteError::InvalidPayload("nothing to apply".to_string()));
        }
        let target = payload.tab_id.map_or(TabTarget::Active, TabTarget::Tab);
        let response = self.relay.deliver(target, &payload.text).await?;
        if !response.ok {
            let reason = response.error.unwrap_or_else(|| "no reason given".to_string());
            warn!(error = %reason, "page agent rejected the rewrite");
            return Err(RewriteError::Host(format!("page agent rejected the rewrite: {reason}")));
        }
        Ok(None)
    }

    pub async fn save_last_source(&self, payload: SourcePayload) -> Result<Option<Value>, RewriteError> {
        store::set_last_source(self.store(), &payload.text).await?;
        Ok(None)
    }

    pub async fn get_last_source(&self) -> Result<Option<Value>, RewriteError> {
        let text = store::get_last_source(self.store()).await?;
        Ok(Some(json!({ "text": text })))
    }

    pub async fn open_settings(&self) -> Result<Option<Value>, RewriteError> {
        self.host.open_settings().await?;
        Ok(None)
    }

    /// Show the review surface, falling back to a standalone window when the host has no popup.
    pub async fn open_review_surface(&self, payload: ReviewPayload) -> Result<Option<Value>, RewriteError> {
        if let Some(text) = payload.text.as_deref().filter(|t| !t.is_empty()) {
            store::set_last_source(self.store(), text).await?;
        }

        match self.host.open_review_popup().await {
            Ok(()) => Ok(Some(json!({ "presented": "popup" }))),
            Err(err) => {
                warn!(error = %err, "review popup unavailable, opening a window");
                let size = self.config.review_window();
                self.host
                    .open_window(WindowSpec {
                        url: self.config.review_page().to_string(),
                        width: size.width,
                        height: size.height,
                    })
                    .await?;
                Ok(Some(json!({ "presented": "window" })))
            }
        }
    }
}
