use std::sync::Arc;

use serde_json::Value;

use super::decode;
use crate::error::RewriteError;
use crate::models::SourcePayload;
use crate::services::coordinator::Coordinator;

pub async fn save_last_source(
    coordinator: Arc<Coordinator>,
    payload: Value,
) -> Result<Option<Value>, RewriteError> {
    let payload: SourcePayload = decode(payload)?;
    coordinator.save_last_source(payload).await
}

pub async fn get_last_source(
    coordinator: Arc<Coordinator>,
    _payload: Value,
) -> Result<Option<Value>, RewriteError> {
    coordinator.get_last_source().await
}
