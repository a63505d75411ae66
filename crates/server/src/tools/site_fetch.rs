//! site_fetch tool implementation.
//!
//! Sends one request through the router, as a page under the worker's
//! control would, and reports where the response came from.

use offcache_client::{Fetcher, Routed, Router, fetch::canonicalize};
use offcache_core::{Destination, Error, RequestRecord};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for the site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchParams {
    /// Absolute URL, or a path resolved against the site origin.
    pub url: String,

    /// HTTP method (default: GET). Anything but GET bypasses the caches.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination; `document` marks a page navigation.
    #[serde(default)]
    pub destination: Destination,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchOutput {
    /// Canonical request URL.
    pub url: String,
    /// Category assigned by the classifier; absent for passthrough.
    pub category: Option<String>,
    /// "cache", "network", "fallback" or "passthrough".
    pub source: String,
    /// Which synthesized response was served, for fallbacks.
    pub fallback: Option<String>,
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
}

/// Implementation of the site_fetch tool.
pub async fn fetch_impl(router: &Router, params: SiteFetchParams) -> Result<CallToolResult, McpError> {
    let url = canonicalize(&params.url, router.origin()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    if params.method.trim().is_empty() {
        return Err(ToolError::InvalidInput("method cannot be empty".into()).into());
    }

    let mut request = RequestRecord::new(params.method.trim(), url).with_destination(params.destination);
    if let Some(accept) = params.accept {
        request = request.with_header("Accept", accept);
    }

    let category = router.classify(&request).map(|c| c.as_str().to_string());
    let url = request.url.to_string();

    let (source, fallback, response) = match router.handle(request.clone()).await {
        Routed::Responded(outcome) => {
            let source = outcome.source().to_string();
            let fallback = outcome.fallback_kind().map(|k| k.as_str().to_string());
            (source, fallback, outcome.into_response())
        }
        Routed::Passthrough => {
            let response = router.fetcher().fetch(&request).await.map_err(Error::from)?;
            ("passthrough".to_string(), None, response)
        }
    };

    let output = SiteFetchOutput {
        url,
        category,
        source,
        fallback,
        status: response.status,
        status_text: response.status_text.clone(),
        content_type: response.content_type().map(str::to_string),
        body: String::from_utf8_lossy(&response.body).to_string(),
        body_bytes: response.body.len(),
    };

    json_result(&output)
}
