//! Background sync of offline submissions.
//!
//! A submission that cannot reach the network is parked in the outbox under
//! a sync tag. `Router::sync` replays the tag's entries oldest first and
//! deletes each one the server accepts with a 2xx.

use offcache_core::{Error, OutboxEntry, RequestRecord, ResponseRecord};
use serde::Serialize;
use url::Url;

use crate::fetch::Fetcher;
use crate::router::Router;

/// Tag used for contact form submissions.
pub const CONTACT_FORM_SYNC: &str = "contact-form-sync";

/// Result of `Router::submit`.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The network answered; the response is returned as-is.
    Sent(ResponseRecord),
    /// The network was unreachable; the submission was queued.
    Queued { id: i64 },
}

/// Result of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Entries delivered and removed.
    pub sent: usize,
    /// Entries still queued.
    pub failed: usize,
}

fn replay_request(entry: &OutboxEntry) -> Result<RequestRecord, Error> {
    let url = Url::parse(&entry.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", entry.url)))?;
    let mut request = RequestRecord::new(entry.method.clone(), url).with_body(entry.body.clone());
    request.headers = entry.headers.clone();
    Ok(request)
}

impl Router {
    /// Send a submission, queueing it under `tag` if the network is down.
    pub async fn submit(&self, request: RequestRecord, tag: &str) -> Result<SubmitOutcome, Error> {
        match self.fetcher().fetch(&request).await {
            Ok(response) => Ok(SubmitOutcome::Sent(response)),
            Err(e) => {
                let id = self.db().enqueue_outbox(tag, &request).await?;
                tracing::info!(id, tag, url = %request.url, error = %e, "submission queued for sync");
                Ok(SubmitOutcome::Queued { id })
            }
        }
    }

    /// Replay every entry queued under `tag`.
    pub async fn sync(&self, tag: &str) -> Result<SyncReport, Error> {
        let mut report = SyncReport::default();

        for entry in self.db().outbox_entries(tag).await? {
            let request = match replay_request(&entry) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(id = entry.id, error = %e, "unreplayable outbox entry");
                    report.failed += 1;
                    continue;
                }
            };

            match self.fetcher().fetch(&request).await {
                Ok(response) if response.is_success() => {
                    self.db().remove_outbox(entry.id).await?;
                    report.sent += 1;
                }
                Ok(response) => {
                    tracing::warn!(id = entry.id, status = response.status, "sync rejected, keeping entry");
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::warn!(id = entry.id, error = %e, "sync failed, keeping entry");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(tag, sent = report.sent, failed = report.failed, "sync finished");
        Ok(report)
    }
}
