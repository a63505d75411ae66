//! outbox_sync tool implementation.
//!
//! Replays queued submissions for one sync tag.

use offcache_client::{CONTACT_FORM_SYNC, Router};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the outbox_sync tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OutboxSyncParams {
    /// Sync tag to replay (default: "contact-form-sync").
    #[serde(default)]
    pub tag: Option<String>,
}

/// Output from the outbox_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OutboxSyncOutput {
    pub tag: String,
    /// Entries delivered and removed.
    pub sent: usize,
    /// Entries left in the outbox.
    pub failed: usize,
}

/// Implementation of the outbox_sync tool.
pub async fn sync_impl(router: &Router, params: OutboxSyncParams) -> Result<CallToolResult, McpError> {
    let tag = params.tag.unwrap_or_else(|| CONTACT_FORM_SYNC.into());
    let report = router.sync(&tag).await?;
    json_result(&OutboxSyncOutput { tag, sent: report.sent, failed: report.failed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::stub::{StubFetcher, test_router, text_of};
    use offcache_core::{RequestRecord, ResponseRecord};
    use std::sync::Arc;
    use url::Url;

    #[tokio::test]
    async fn test_sync_empty_outbox() {
        let router = test_router(Arc::new(StubFetcher::default())).await;

        let result = sync_impl(&router, OutboxSyncParams::default()).await.unwrap();
        let output: OutboxSyncOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output.tag, "contact-form-sync");
        assert_eq!((output.sent, output.failed), (0, 0));
    }

    #[tokio::test]
    async fn test_sync_delivers_queued_entry() {
        let fetcher = Arc::new(
            StubFetcher::default().with("https://formspree.io/f/abc", ResponseRecord::ok("application/json", "{}")),
        );
        let router = test_router(fetcher.clone()).await;
        let submission = RequestRecord::new("POST", Url::parse("https://formspree.io/f/abc").unwrap());
        router.db().enqueue_outbox(CONTACT_FORM_SYNC, &submission).await.unwrap();

        fetcher.set_offline(true);
        let result = sync_impl(&router, OutboxSyncParams::default()).await.unwrap();
        let output: OutboxSyncOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!((output.sent, output.failed), (0, 1));

        fetcher.set_offline(false);
        let result = sync_impl(&router, OutboxSyncParams::default()).await.unwrap();
        let output: OutboxSyncOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!((output.sent, output.failed), (1, 0));
        assert_eq!(router.db().outbox_len(CONTACT_FORM_SYNC).await.unwrap(), 0);
    }
}
