//! Request router.
//!
//! Entry point for every intercepted request: classify, pick a strategy,
//! time the whole pipeline. Also owns the lifecycle so the control channel
//! and the server can drive install/activate through one handle.

use std::sync::Arc;
use std::time::Instant;

use offcache_core::cache::key::request_key;
use offcache_core::{AppConfig, BucketNames, CacheDb, Category, Classifier, Error, RequestRecord};
use url::Url;

use crate::control::CacheStatus;
use crate::fetch::Fetcher;
use crate::lifecycle::{ActivateReport, InstallReport, Lifecycle};
use crate::strategy::{StrategyExecutor, StrategyOutcome};

/// What the router did with a request.
#[derive(Debug, Clone)]
pub enum Routed {
    /// Not intercepted; the caller performs the request itself.
    Passthrough,
    Responded(StrategyOutcome),
}

impl Routed {
    pub fn outcome(&self) -> Option<&StrategyOutcome> {
        match self {
            Routed::Passthrough => None,
            Routed::Responded(outcome) => Some(outcome),
        }
    }
}

struct RouterInner {
    classifier: Classifier,
    executor: StrategyExecutor,
    lifecycle: Lifecycle,
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    names: BucketNames,
    slow_request: std::time::Duration,
}

/// Cheaply cloneable handle shared by the control loop and request handlers.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn new(config: &AppConfig, fetcher: Arc<dyn Fetcher>, db: CacheDb) -> Result<Self, Error> {
        let classifier = Classifier::from_config(config)?;
        let origin = classifier.origin().clone();
        let names = config.bucket_names();

        let offline_url = origin
            .join(&config.offline_page)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.offline_page)))?;
        let offline_key = request_key(&offline_url, &origin);

        let executor = StrategyExecutor::new(
            db.clone(),
            fetcher.clone(),
            names.clone(),
            origin,
            config.site_name.clone(),
            offline_key,
        );
        let lifecycle = Lifecycle::new(config, db.clone(), fetcher.clone())?;

        Ok(Self {
            inner: Arc::new(RouterInner {
                classifier,
                executor,
                lifecycle,
                db,
                fetcher,
                names,
                slow_request: config.slow_request_threshold(),
            }),
        })
    }

    /// Route one request.
    ///
    /// Never fails: every intercepted request gets a response, synthesized
    /// if neither the network nor a bucket can supply one.
    pub async fn handle(&self, request: RequestRecord) -> Routed {
        let Some(category) = self.classify(&request) else {
            tracing::trace!(method = %request.method, url = %request.url, "passthrough");
            return Routed::Passthrough;
        };

        let start = Instant::now();
        let outcome = self.inner.executor.execute(category, &request).await;
        let elapsed = start.elapsed();

        if elapsed >= self.inner.slow_request {
            tracing::warn!(
                url = %request.url,
                category = category.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                "slow request"
            );
        } else {
            tracing::debug!(
                url = %request.url,
                category = category.as_str(),
                source = outcome.source(),
                status = outcome.response().status,
                elapsed_ms = elapsed.as_millis() as u64,
                "routed"
            );
        }

        Routed::Responded(outcome)
    }

    pub fn classify(&self, request: &RequestRecord) -> Option<Category> {
        self.inner.classifier.classify(request)
    }

    pub async fn install(&self) -> InstallReport {
        self.inner.lifecycle.install().await
    }

    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.inner.lifecycle.activate().await
    }

    /// Re-run the asset pre-cache on demand.
    pub async fn update_static_cache(&self) -> Result<usize, Error> {
        self.inner
            .lifecycle
            .precache()
            .await
            .map_err(|failed| Error::PrecacheFailed(failed.join("; ")))
    }

    /// Wait for background bucket writes to land.
    pub async fn flush_writes(&self) {
        self.inner.executor.flush().await;
    }

    /// Snapshot of bucket presence for the status control message.
    pub async fn cache_status(&self) -> Result<CacheStatus, Error> {
        let db = &self.inner.db;
        let names = &self.inner.names;
        let caches = db.list_buckets().await?;
        let static_cache = caches.contains(&names.static_bucket);
        let dynamic_cache = caches.contains(&names.dynamic_bucket);
        let static_assets = if static_cache { Some(db.count_entries(&names.static_bucket).await?) } else { None };

        Ok(CacheStatus { caches: caches.len(), static_cache, dynamic_cache, static_assets })
    }

    /// Delete every bucket. Returns how many were removed.
    pub async fn clear_caches(&self) -> Result<u64, Error> {
        let removed = self.inner.db.delete_all_buckets().await?;
        tracing::info!(removed, "all caches cleared");
        Ok(removed)
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.inner.fetcher
    }

    pub fn origin(&self) -> &Url {
        self.inner.classifier.origin()
    }

    pub fn bucket_names(&self) -> &BucketNames {
        &self.inner.names
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.lifecycle
    }

    pub fn db(&self) -> &CacheDb {
        &self.inner.db
    }
}
