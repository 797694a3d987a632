use std::sync::Arc;

use serde_json::Value;

use super::decode;
use crate::error::RewriteError;
use crate::models::ReviewPayload;
use crate::services::coordinator::Coordinator;

pub async fn open_settings(
    coordinator: Arc<Coordinator>,
    _payload: Value,
) -> Result<Option<Value>, RewriteError> {
    coordinator.open_settings().await
}

pub async fn open_review_surface(
    coordinator: Arc<Coordinator>,
    payload: Value,
) -> Result<Option<Value>, RewriteError> {
    let payload: ReviewPayload = decode(payload)?;
    coordinator.open_review_surface(payload).await
}
