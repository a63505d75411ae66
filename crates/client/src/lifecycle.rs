//! Install and activate.
//!
//! Install pre-caches the declared assets into the static bucket as one
//! batch. Activate purges buckets from other versions and takes control.
//! Both run on a spawned task that the caller awaits, so the work finishes
//! even if the caller's future is dropped half-way.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use offcache_core::cache::key::request_key;
use offcache_core::{AppConfig, BucketNames, CacheDb, Error, RequestRecord, ResponseRecord};
use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::Fetcher;

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Constructed, install not started.
    #[default]
    Parsed,
    Installing,
    /// Installed and waiting for activation.
    Installed,
    Activating,
    /// Active and controlling pages.
    Activated,
}

/// Result of an install run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    /// Entries written into the static bucket.
    pub cached: usize,
    /// Assets that could not be fetched; non-empty means nothing was written.
    pub failed: Vec<String>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of an activate run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    /// Buckets deleted because they belong to another version.
    pub deleted: Vec<String>,
}

struct Inner {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    names: BucketNames,
    /// `(bucket key, absolute url)` for each declared asset.
    assets: Vec<(String, Url)>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    claimed: AtomicBool,
}

/// Lifecycle manager for one deployed version.
#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

impl Lifecycle {
    pub fn new(config: &AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let assets = config
            .static_assets
            .iter()
            .map(|asset| {
                let url = origin
                    .join(asset)
                    .map_err(|e| Error::InvalidUrl(format!("{asset}: {e}")))?;
                Ok((request_key(&url, &origin), url))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                fetcher,
                names: config.bucket_names(),
                assets,
                state: RwLock::new(WorkerState::Parsed),
                skip_waiting: AtomicBool::new(false),
                claimed: AtomicBool::new(false),
            }),
        })
    }

    pub async fn state(&self) -> WorkerState {
        *self.inner.state.read().await
    }

    /// Install asked to replace any waiting version immediately.
    pub fn skips_waiting(&self) -> bool {
        self.inner.skip_waiting.load(Ordering::SeqCst)
    }

    /// Activate took control of open clients.
    pub fn has_claimed(&self) -> bool {
        self.inner.claimed.load(Ordering::SeqCst)
    }

    pub fn bucket_names(&self) -> &BucketNames {
        &self.inner.names
    }

    /// Pre-cache the declared assets.
    ///
    /// A failed asset is logged and leaves the static bucket untouched; the
    /// worker still reaches `Installed`.
    pub async fn install(&self) -> InstallReport {
        let this = self.clone();
        let task = tokio::spawn(async move {
            this.set_state(WorkerState::Installing).await;
            let report = match this.precache().await {
                Ok(cached) => {
                    tracing::info!(cached, bucket = %this.inner.names.static_bucket, "static assets cached");
                    InstallReport { cached, failed: Vec::new() }
                }
                Err(failed) => {
                    tracing::error!(failed = ?failed, "failed to cache static assets");
                    InstallReport { cached: 0, failed }
                }
            };
            this.inner.skip_waiting.store(true, Ordering::SeqCst);
            this.set_state(WorkerState::Installed).await;
            report
        });

        match task.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "install task aborted");
                InstallReport { cached: 0, failed: vec![e.to_string()] }
            }
        }
    }

    /// Fetch every declared asset and write them in one transaction.
    ///
    /// Returns the number written, or a description of each failed asset
    /// (in which case nothing is written). Idempotent: later runs overwrite.
    pub async fn precache(&self) -> Result<usize, Vec<String>> {
        let names = &self.inner.names;
        if let Err(e) = self.inner.db.open_bucket(&names.static_bucket).await {
            return Err(vec![e.to_string()]);
        }

        let fetches = self.inner.assets.iter().map(|(key, url)| async move {
            let result = self.inner.fetcher.fetch(&RequestRecord::get(url.clone())).await;
            (key, result)
        });

        let mut entries: Vec<(String, ResponseRecord)> = Vec::with_capacity(self.inner.assets.len());
        let mut failed = Vec::new();
        for (key, result) in join_all(fetches).await {
            match result {
                Ok(response) if response.is_success() => entries.push((key.clone(), response)),
                Ok(response) => failed.push(format!("{key}: status {}", response.status)),
                Err(e) => failed.push(format!("{key}: {e}")),
            }
        }

        if !failed.is_empty() {
            return Err(failed);
        }

        self.inner
            .db
            .put_entries(&names.static_bucket, &entries)
            .await
            .map_err(|e| vec![e.to_string()])
    }

    /// Delete buckets from other versions, ensure this version's buckets
    /// exist, and claim clients.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let this = self.clone();
        let task = tokio::spawn(async move {
            this.set_state(WorkerState::Activating).await;
            let names = &this.inner.names;

            let mut deleted = Vec::new();
            for bucket in this.inner.db.list_buckets().await? {
                if !names.is_current(&bucket) {
                    tracing::info!(bucket = %bucket, "deleting stale bucket");
                    this.inner.db.delete_bucket(&bucket).await?;
                    deleted.push(bucket);
                }
            }

            this.inner.db.open_bucket(&names.static_bucket).await?;
            this.inner.db.open_bucket(&names.dynamic_bucket).await?;

            this.inner.claimed.store(true, Ordering::SeqCst);
            this.set_state(WorkerState::Activated).await;
            tracing::info!(deleted = deleted.len(), "activated");
            Ok::<_, Error>(ActivateReport { deleted })
        });

        task.await.map_err(|e| Error::Lifecycle(e.to_string()))?
    }

    async fn set_state(&self, state: WorkerState) {
        *self.inner.state.write().await = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, route_assets, test_config};

    async fn setup(version: &str) -> (Lifecycle, Arc<MockFetcher>, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        route_assets(&fetcher);
        let lifecycle = Lifecycle::new(&test_config(version), db.clone(), fetcher.clone()).unwrap();
        (lifecycle, fetcher, db)
    }

    #[tokio::test]
    async fn test_install_caches_all_assets() {
        let (lifecycle, fetcher, db) = setup("v1").await;
        assert_eq!(lifecycle.state().await, WorkerState::Parsed);

        let report = lifecycle.install().await;
        assert!(report.is_complete());
        assert_eq!(report.cached, 3);
        assert_eq!(fetcher.calls(), 3);
        assert_eq!(db.count_entries("site-static-v1").await.unwrap(), 3);
        for key in ["/", "/app.js", "/index.html"] {
            assert!(db.match_entry("site-static-v1", key).await.unwrap().is_some());
        }
        assert_eq!(lifecycle.state().await, WorkerState::Installed);
        assert!(lifecycle.skips_waiting());
    }

    #[tokio::test]
    async fn test_install_failure_writes_nothing() {
        let (lifecycle, fetcher, db) = setup("v1").await;
        fetcher.fail("https://site.example/app.js");

        let report = lifecycle.install().await;
        assert!(!report.is_complete());
        assert_eq!(report.cached, 0);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].starts_with("/app.js"));
        assert_eq!(db.count_entries("site-static-v1").await.unwrap(), 0);
        assert_eq!(lifecycle.state().await, WorkerState::Installed);

        lifecycle.activate().await.unwrap();
        assert_eq!(lifecycle.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        let (lifecycle, fetcher, _db) = setup("v1").await;
        fetcher.route("https://site.example/index.html", ResponseRecord::new(500, "Internal Server Error", ""));

        let report = lifecycle.install().await;
        assert_eq!(report.failed, vec!["/index.html: status 500".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_purges_other_versions() {
        let (v1, _fetcher, db) = setup("v1").await;
        v1.install().await;
        v1.activate().await.unwrap();
        db.put_entry("unrelated-cache", "/x", &ResponseRecord::ok("text/plain", "x"))
            .await
            .unwrap();

        let fetcher = Arc::new(MockFetcher::new());
        route_assets(&fetcher);
        let v2 = Lifecycle::new(&test_config("v2"), db.clone(), fetcher).unwrap();
        v2.install().await;
        let report = v2.activate().await.unwrap();

        assert_eq!(report.deleted.len(), 3);
        let buckets = db.list_buckets().await.unwrap();
        assert_eq!(buckets.len(), 2);
        assert!(buckets.iter().all(|b| b.ends_with("-v2")));
        assert!(!buckets.iter().any(|b| b.contains("v1")));
        assert!(v2.has_claimed());
    }

    #[tokio::test]
    async fn test_precache_is_idempotent() {
        let (lifecycle, fetcher, db) = setup("v1").await;
        assert_eq!(lifecycle.precache().await.unwrap(), 3);
        fetcher.route("https://site.example/app.js", ResponseRecord::ok("application/javascript", "v2()"));
        assert_eq!(lifecycle.precache().await.unwrap(), 3);

        assert_eq!(db.count_entries("site-static-v1").await.unwrap(), 3);
        let hit = db.match_entry("site-static-v1", "/app.js").await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"v2()");
    }
}
