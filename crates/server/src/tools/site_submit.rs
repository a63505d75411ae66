//! site_submit tool implementation.
//!
//! Sends a form submission; if the network is down it is queued in the
//! outbox for the next `outbox_sync`.

use offcache_client::{CONTACT_FORM_SYNC, Router, SubmitOutcome, fetch::canonicalize};
use offcache_core::RequestRecord;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for the site_submit tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteSubmitParams {
    /// Form endpoint, absolute or relative to the site origin.
    pub url: String,

    /// HTTP method (default: POST). GET and HEAD are rejected.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request body.
    #[serde(default)]
    pub body: String,

    /// Content-Type of the body (default: application/json).
    #[serde(default)]
    pub content_type: Option<String>,

    /// Sync tag to queue under (default: "contact-form-sync").
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_method() -> String {
    "POST".into()
}

/// Output structure for the site_submit tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteSubmitOutput {
    /// "sent" or "queued".
    pub outcome: String,
    pub tag: String,
    /// Response status when sent.
    pub status: Option<u16>,
    /// Outbox entry id when queued.
    pub outbox_id: Option<i64>,
}

/// Implementation of the site_submit tool.
pub async fn submit_impl(router: &Router, params: SiteSubmitParams) -> Result<CallToolResult, McpError> {
    let url = canonicalize(&params.url, router.origin()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let method = params.method.trim().to_ascii_uppercase();
    if method.is_empty() || method == "GET" || method == "HEAD" {
        return Err(ToolError::InvalidInput(format!("unsupported method for submission: {:?}", params.method)).into());
    }

    let content_type = params.content_type.unwrap_or_else(|| "application/json".into());
    let request = RequestRecord::new(method, url)
        .with_header("Content-Type", content_type)
        .with_body(params.body);
    let tag = params.tag.unwrap_or_else(|| CONTACT_FORM_SYNC.into());

    let output = match router.submit(request, &tag).await? {
        SubmitOutcome::Sent(response) => {
            SiteSubmitOutput { outcome: "sent".into(), tag, status: Some(response.status), outbox_id: None }
        }
        SubmitOutcome::Queued { id } => SiteSubmitOutput { outcome: "queued".into(), tag, status: None, outbox_id: Some(id) },
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::stub::{StubFetcher, test_router, text_of};
    use offcache_core::ResponseRecord;
    use std::sync::Arc;

    fn params(url: &str) -> SiteSubmitParams {
        SiteSubmitParams {
            url: url.into(),
            method: default_method(),
            body: r#"{"name":"Ada"}"#.into(),
            content_type: None,
            tag: None,
        }
    }

    #[tokio::test]
    async fn test_submit_sent_when_online() {
        let fetcher =
            StubFetcher::default().with("https://formspree.io/f/abc", ResponseRecord::ok("application/json", "{}"));
        let router = test_router(Arc::new(fetcher)).await;

        let result = submit_impl(&router, params("https://formspree.io/f/abc")).await.unwrap();
        let output: SiteSubmitOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output.outcome, "sent");
        assert_eq!(output.status, Some(200));
        assert_eq!(output.tag, "contact-form-sync");
    }

    #[tokio::test]
    async fn test_submit_queued_when_offline() {
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.set_offline(true);
        let router = test_router(fetcher).await;

        let mut p = params("/api/contact");
        p.tag = Some("newsletter-sync".into());
        let result = submit_impl(&router, p).await.unwrap();
        let output: SiteSubmitOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output.outcome, "queued");
        assert!(output.outbox_id.is_some());
        assert_eq!(router.db().outbox_len("newsletter-sync").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_get() {
        let router = test_router(Arc::new(StubFetcher::default())).await;
        let mut p = params("/api/contact");
        p.method = "get".into();
        assert!(submit_impl(&router, p).await.is_err());
    }
}
