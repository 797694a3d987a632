//! Protocol router: maps each operation kind to an async handler and always produces exactly one
//! response per request.

mod rewrite;
mod source;
mod surfaces;

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::RewriteError;
use crate::models::{Message, OperationKind, Response};
use crate::services::coordinator::Coordinator;

pub type HandlerResult = Result<Option<Value>, RewriteError>;
pub type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Anything a context can send coordinator requests through.
#[async_trait]
pub trait CoordinatorPort: Send + Sync {
    async fn send(&self, message: Message) -> Response;
}

#[derive(Default)]
pub struct Router {
    handlers: HashMap<OperationKind, Handler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with every operation wired to `coordinator`.
    pub fn with_coordinator(coordinator: Arc<Coordinator>) -> Self {
        let mut router = Self::new();
        router.route(OperationKind::RequestRewrite, &coordinator, rewrite::request_rewrite);
        router.route(
            OperationKind::RequestApplyRewrite,
            &coordinator,
            rewrite::request_apply_rewrite,
        );
        router.route(OperationKind::SaveLastSource, &coordinator, source::save_last_source);
        router.route(OperationKind::GetLastSource, &coordinator, source::get_last_source);
        router.route(OperationKind::OpenSettings, &coordinator, surfaces::open_settings);
        router.route(
            OperationKind::OpenReviewSurface,
            &coordinator,
            surfaces::open_review_surface,
        );
        router
    }

    /// Register (or replace) the handler for `kind`.
    pub fn register<F, Fut>(&mut self, kind: OperationKind, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .insert(kind, Arc::new(move |payload| handler(payload).boxed()));
    }

    fn route<F, Fut>(&mut self, kind: OperationKind, coordinator: &Arc<Coordinator>, handler: F)
    where
        F: Fn(Arc<Coordinator>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let coordinator = coordinator.clone();
        self.register(kind, move |payload| handler(coordinator.clone(), payload));
    }

    /// Handle one wire message. Never fails: errors and panics become failure responses.
    pub async fn dispatch(&self, message: Value) -> Response {
        let name = message
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let Some((kind, handler)) = OperationKind::from_wire(&name)
            .and_then(|kind| self.handlers.get(&kind).map(|h| (kind, h.clone())))
        else {
            warn!(message_type = %name, "unknown message");
            return Response::failure(RewriteError::UnknownMessage(name).to_string());
        };

        let payload = message.get("payload").cloned().unwrap_or(Value::Null);
        let span = info_span!("dispatch", request_id = %Uuid::new_v4(), op = kind.wire_name());

        let outcome = AssertUnwindSafe(handler(payload))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        match outcome {
            Ok(Ok(data)) => {
                debug!(parent: &span, "request handled");
                Response::from(HandlerResult::Ok(data))
            }
            Ok(Err(err)) => {
                warn!(parent: &span, code = err.code(), error = %err, "request failed");
                Response::failure(err.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(parent: &span, reason = %reason, "handler panicked");
                Response::failure(reason)
            }
        }
    }

    /// Start serving requests from a channel. Each request runs on its own task, so independent
    /// requests complete in no particular order.
    pub fn spawn(self: Arc<Self>) -> RouterHandle {
        let (tx, mut rx) = mpsc::channel::<Envelope>(64);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let router = self.clone();
                tokio::spawn(async move {
                    let response = router.dispatch(envelope.message).await;
                    let _ = envelope.reply.send(response);
                });
            }
            debug!("router channel closed");
        });
        RouterHandle { tx }
    }
}

#[async_trait]
impl CoordinatorPort for Router {
    async fn send(&self, message: Message) -> Response {
        self.dispatch(message.to_wire()).await
    }
}

struct Envelope {
    message: Value,
    reply: oneshot::Sender<Response>,
}

/// Cloneable sender side of a spawned router.
#[derive(Clone)]
pub struct RouterHandle {
    tx: mpsc::Sender<Envelope>,
}

impl RouterHandle {
    /// Send a wire message and wait for its reply.
    pub async fn request(&self, message: Value) -> Response {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Envelope { message, reply }).await.is_err() {
            return Response::failure("CHANNEL_CLOSED");
        }
        rx.await
            .unwrap_or_else(|_| Response::failure("CHANNEL_CLOSED"))
    }
}

#[async_trait]
impl CoordinatorPort for RouterHandle {
    async fn send(&self, message: Message) -> Response {
        self.request(message.to_wire()).await
    }
}

/// Decode a payload; a missing payload decodes like an empty object.
fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, RewriteError> {
    let payload = if payload.is_null() {
        Value::Object(Default::default())
    } else {
        payload
    };
    serde_json::from_value(payload).map_err(|e| RewriteError::InvalidPayload(e.to_string()))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let router = Router::new();
        let response = router.dispatch(json!({ "type": "CHAMELEON_NOPE" })).await;
        assert_eq!(response, Response::failure("UNKNOWN_MESSAGE"));

        let response = router.dispatch(json!({ "payload": {} })).await;
        assert_eq!(response.error_code(), Some("UNKNOWN_MESSAGE"));
    }

    #[tokio::test]
    async fn known_kind_without_handler_is_unknown() {
        let router = Router::new();
        let response = router.dispatch(Message::GetLastSource.to_wire()).await;
        assert_eq!(response.error_code(), Some("UNKNOWN_MESSAGE"));
    }

    #[tokio::test]
    async fn handler_errors_become_failures() {
        let mut router = Router::new();
        router.register(OperationKind::OpenSettings, |_| async {
            Err(RewriteError::Host("no settings page".into()))
        });
        let response = router.send(Message::OpenSettings).await;
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("HOST_ERROR: no settings page"));
    }

    #[tokio::test]
    async fn handler_panics_become_failures() {
        let mut router = Router::new();
        router.register(OperationKind::GetLastSource, |_| async {
            if true {
                panic!("store exploded");
            }
            Ok(None)
        });
        let response = router.send(Message::GetLastSource).await;
        assert_eq!(response, Response::failure("store exploded"));
    }

    #[tokio::test]
    async fn payload_is_passed_through() {
        let mut router = Router::new();
        router.register(OperationKind::SaveLastSource, |payload| async move {
            Ok(Some(payload))
        });
        let response = router
            .dispatch(json!({ "type": "CHAMELEON_SAVE_LAST_SOURCE", "payload": { "text": "x" } }))
            .await;
        assert_eq!(response.data, Some(json!({ "text": "x" })));
    }

    #[tokio::test]
    async fn spawned_router_answers_each_request_on_its_own_channel() {
        let mut router = Router::new();
        router.register(OperationKind::SaveLastSource, |payload| async move {
            let delay = payload["delay"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(Some(payload))
        });
        let handle = Arc::new(router).spawn();

        let slow = handle.request(json!({
            "type": "CHAMELEON_SAVE_LAST_SOURCE",
            "payload": { "delay": 50, "id": "slow" }
        }));
        let fast = handle.request(json!({
            "type": "CHAMELEON_SAVE_LAST_SOURCE",
            "payload": { "delay": 0, "id": "fast" }
        }));
        let (slow, fast) = tokio::join!(slow, fast);
        assert_eq!(slow.data.unwrap()["id"], "slow");
        assert_eq!(fast.data.unwrap()["id"], "fast");
    }

    #[test]
    fn decode_treats_null_as_empty_object() {
        let payload: crate::models::SourcePayload = decode(Value::Null).unwrap();
        assert_eq!(payload.text, "");
        let err = decode::<crate::models::RewriteRequest>(Value::Null).unwrap_err();
        assert_eq!(err.code(), "INVALID_PAYLOAD");
    }
}
