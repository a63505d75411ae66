//! Control channel.
//!
//! Pages post JSON messages tagged by `type`; a reply, when the message
//! defines one, goes back over the oneshot port sent with it. Anything not
//! recognized is dropped without a reply.

use offcache_core::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::router::Router;

/// Queue depth between handles and the control loop.
const CONTROL_QUEUE: usize = 32;

/// Administrative messages understood by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Re-fetch and overwrite the static asset list.
    CacheUpdate,
    CacheStatus,
    /// Delete every bucket.
    ClearCache,
}

impl ControlMessage {
    /// `None` for anything that is not one of the known shapes.
    pub fn parse(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

/// Reply to `CACHE_STATUS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    /// Number of buckets present, any version.
    pub caches: usize,
    pub static_cache: bool,
    pub dynamic_cache: bool,
    /// Entry count of the static bucket, when it exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_assets: Option<u64>,
}

/// One-shot reply channel carried with a message.
pub type ReplyPort = oneshot::Sender<Value>;

fn reply(port: Option<ReplyPort>, value: Value) {
    if let Some(port) = port
        && port.send(value).is_err()
    {
        tracing::debug!("control reply dropped, sender went away");
    }
}

impl Router {
    /// Dispatch one control message.
    pub async fn handle_message(&self, message: &Value, port: Option<ReplyPort>) {
        let Some(parsed) = ControlMessage::parse(message) else {
            tracing::debug!(message = %message, "ignoring unknown control message");
            return;
        };

        match parsed {
            ControlMessage::CacheUpdate => match self.update_static_cache().await {
                Ok(cached) => tracing::info!(cached, "static cache updated"),
                Err(e) => tracing::error!(error = %e, "static cache update failed"),
            },
            ControlMessage::CacheStatus => match self.cache_status().await {
                Ok(status) => match serde_json::to_value(&status) {
                    Ok(value) => reply(port, value),
                    Err(e) => tracing::error!(error = %e, "failed to encode cache status"),
                },
                Err(e) => tracing::error!(error = %e, "failed to read cache status"),
            },
            ControlMessage::ClearCache => match self.clear_caches().await {
                Ok(_) => reply(port, json!({ "success": true })),
                Err(e) => {
                    tracing::error!(error = %e, "failed to clear caches");
                    reply(port, json!({ "success": false, "error": e.to_string() }));
                }
            },
        }
    }
}

struct Envelope {
    message: Value,
    port: Option<ReplyPort>,
}

/// Sending side of the control loop.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<Envelope>,
}

impl ControlHandle {
    /// Fire-and-forget.
    pub async fn post_message(&self, message: Value) -> Result<(), Error> {
        self.tx
            .send(Envelope { message, port: None })
            .await
            .map_err(|_| Error::ControlClosed)
    }

    /// Send with a reply port and wait. `Ok(None)` when the message gets no
    /// reply (unknown type, or `CACHE_UPDATE`).
    pub async fn request(&self, message: Value) -> Result<Option<Value>, Error> {
        let (port, rx) = oneshot::channel();
        self.tx
            .send(Envelope { message, port: Some(port) })
            .await
            .map_err(|_| Error::ControlClosed)?;
        Ok(rx.await.ok())
    }
}

/// Start the control loop for `router`. It stops once every handle is dropped.
pub fn spawn_control_loop(router: Router) -> (ControlHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Envelope>(CONTROL_QUEUE);
    let task = tokio::spawn(async move {
        while let Some(Envelope { message, port }) = rx.recv().await {
            router.handle_message(&message, port).await;
        }
        tracing::debug!("control loop stopped");
    });
    (ControlHandle { tx }, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, route_assets, test_config};
    use offcache_core::CacheDb;
    use std::sync::Arc;

    async fn setup() -> (Router, Arc<MockFetcher>, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        route_assets(&fetcher);
        let router = Router::new(&test_config("v1"), fetcher.clone(), db.clone()).unwrap();
        (router, fetcher, db)
    }

    #[test]
    fn test_parse_known_messages() {
        assert_eq!(ControlMessage::parse(&json!({"type": "CACHE_UPDATE"})), Some(ControlMessage::CacheUpdate));
        assert_eq!(ControlMessage::parse(&json!({"type": "CACHE_STATUS"})), Some(ControlMessage::CacheStatus));
        assert_eq!(
            ControlMessage::parse(&json!({"type": "CLEAR_CACHE", "extra": 1})),
            Some(ControlMessage::ClearCache)
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(ControlMessage::parse(&json!({"type": "SKIP_WAITING"})), None);
        assert_eq!(ControlMessage::parse(&json!({"kind": "CACHE_STATUS"})), None);
        assert_eq!(ControlMessage::parse(&json!("CACHE_STATUS")), None);
        assert_eq!(ControlMessage::parse(&Value::Null), None);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = CacheStatus { caches: 2, static_cache: true, dynamic_cache: false, static_assets: Some(4) };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"caches": 2, "staticCache": true, "dynamicCache": false, "staticAssets": 4})
        );

        let status = CacheStatus { caches: 0, static_cache: false, dynamic_cache: false, static_assets: None };
        let value = serde_json::to_value(&status).unwrap();
        assert!(value.get("staticAssets").is_none());
    }

    #[tokio::test]
    async fn test_status_reply() {
        let (router, _fetcher, _db) = setup().await;
        router.install().await;
        router.activate().await.unwrap();
        let (handle, _task) = spawn_control_loop(router);

        let reply = handle.request(json!({"type": "CACHE_STATUS"})).await.unwrap();
        assert_eq!(
            reply,
            Some(json!({"caches": 2, "staticCache": true, "dynamicCache": true, "staticAssets": 3}))
        );
    }

    #[tokio::test]
    async fn test_clear_reply_and_repeat() {
        let (router, _fetcher, db) = setup().await;
        router.install().await;
        router.activate().await.unwrap();
        let (handle, _task) = spawn_control_loop(router);

        let first = handle.request(json!({"type": "CLEAR_CACHE"})).await.unwrap();
        assert_eq!(first, Some(json!({"success": true})));
        let second = handle.request(json!({"type": "CLEAR_CACHE"})).await.unwrap();
        assert_eq!(second, Some(json!({"success": true})));
        assert!(db.list_buckets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_message_gets_no_reply() {
        let (router, fetcher, db) = setup().await;
        let (handle, _task) = spawn_control_loop(router);

        let reply = handle.request(json!({"type": "NOPE"})).await.unwrap();
        assert_eq!(reply, None);
        assert_eq!(fetcher.calls(), 0);
        assert!(db.list_buckets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_update_repopulates_static_bucket() {
        let (router, fetcher, db) = setup().await;
        let (handle, _task) = spawn_control_loop(router);

        let reply = handle.request(json!({"type": "CACHE_UPDATE"})).await.unwrap();
        assert_eq!(reply, None);
        assert_eq!(fetcher.calls(), 3);
        assert_eq!(db.count_entries("site-static-v1").await.unwrap(), 3);

        handle.post_message(json!({"type": "CACHE_UPDATE"})).await.unwrap();
        let status = handle.request(json!({"type": "CACHE_STATUS"})).await.unwrap().unwrap();
        assert_eq!(status["staticAssets"], 3);
        assert_eq!(fetcher.calls(), 6);
    }

    #[tokio::test]
    async fn test_closed_loop_reports_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = ControlHandle { tx };

        let err = handle.post_message(json!({"type": "CACHE_STATUS"})).await.unwrap_err();
        assert!(matches!(err, Error::ControlClosed));
        let err = handle.request(json!({"type": "CACHE_STATUS"})).await.unwrap_err();
        assert!(matches!(err, Error::ControlClosed));
    }
}
