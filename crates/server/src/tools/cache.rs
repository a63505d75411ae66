//! Cache administration tools.
//!
//! These go through the control channel, the same path a page's
//! `postMessage` takes, so the tool sees exactly what a page would.

use offcache_client::{CacheStatus, ControlHandle, ControlMessage};
use offcache_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::json_result;
use crate::error::ToolError;

/// Output from the cache_update tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheUpdateOutput {
    /// Bucket state after the re-population.
    pub status: CacheStatus,
}

async fn request(control: &ControlHandle, message: ControlMessage) -> Result<Option<Value>, McpError> {
    let message = serde_json::to_value(message).map_err(Error::from)?;
    Ok(control.request(message).await?)
}

async fn status(control: &ControlHandle) -> Result<CacheStatus, McpError> {
    let reply = request(control, ControlMessage::CacheStatus)
        .await?
        .ok_or_else(|| ToolError::NoReply("CACHE_STATUS".into()))?;
    Ok(serde_json::from_value(reply).map_err(Error::from)?)
}

/// Implementation of the cache_update tool.
pub async fn update_impl(control: &ControlHandle) -> Result<CallToolResult, McpError> {
    request(control, ControlMessage::CacheUpdate).await?;
    let status = status(control).await?;
    json_result(&CacheUpdateOutput { status })
}

/// Implementation of the cache_status tool.
pub async fn status_impl(control: &ControlHandle) -> Result<CallToolResult, McpError> {
    json_result(&status(control).await?)
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(control: &ControlHandle) -> Result<CallToolResult, McpError> {
    let reply = request(control, ControlMessage::ClearCache)
        .await?
        .ok_or_else(|| ToolError::NoReply("CLEAR_CACHE".into()))?;
    json_result(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::stub::{site_stub, test_router, text_of};
    use offcache_client::spawn_control_loop;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_status_before_install() {
        let router = test_router(Arc::new(site_stub())).await;
        let (control, _task) = spawn_control_loop(router);

        let result = status_impl(&control).await.unwrap();
        let output: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output, serde_json::json!({"caches": 0, "staticCache": false, "dynamicCache": false}));
    }

    #[tokio::test]
    async fn test_update_populates_static_bucket() {
        let router = test_router(Arc::new(site_stub())).await;
        let (control, _task) = spawn_control_loop(router);

        let result = update_impl(&control).await.unwrap();
        let output: CacheUpdateOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert!(output.status.static_cache);
        assert_eq!(output.status.static_assets, Some(2));
    }

    #[tokio::test]
    async fn test_clear_acknowledges() {
        let router = test_router(Arc::new(site_stub())).await;
        router.install().await;
        router.activate().await.unwrap();
        let (control, _task) = spawn_control_loop(router.clone());

        let result = clear_impl(&control).await.unwrap();
        let output: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output["success"], true);
        assert!(router.db().list_buckets().await.unwrap().is_empty());
    }
}
