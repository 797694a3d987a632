use std::sync::Arc;

use serde_json::Value;

use super::decode;
use crate::error::RewriteError;
use crate::models::{ApplyPayload, RewriteRequest};
use crate::services::coordinator::Coordinator;

pub async fn request_rewrite(
    coordinator: Arc<Coordinator>,
    payload: Value,
) -> Result<Option<Value>, RewriteError> {
    let request: RewriteRequest = decode(payload)?;
    coordinator.request_rewrite(request).await
}

pub async fn request_apply_rewrite(
    coordinator: Arc<Coordinator>,
    payload: Value,
) -> Result<Option<Value>, RewriteError> {
    let payload: ApplyPayload = decode(payload)?;
    coordinator.request_apply_rewrite(payload).await
}
