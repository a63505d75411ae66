//! Per-category caching strategies.
//!
//! | category       | policy        | stored into    | on network failure            |
//! |----------------|---------------|----------------|-------------------------------|
//! | Static         | cache-first   | static bucket  | offline page / 503 text (*)   |
//! | Image          | cache-first   | dynamic bucket | placeholder SVG (200)         |
//! | Font           | cache-first   | dynamic bucket | empty 404                     |
//! | Api            | network-first | dynamic bucket | cached copy / 503 JSON        |
//! | Other          | network-first | not stored     | cached copy / offline page    |
//!
//! (*) A static request that is an image or a font by destination or
//! extension gets the image or font fallback instead.
//!
//! Only 2xx network responses are stored. Writes run as background tasks so
//! the response is returned without waiting on the store; a failed write is
//! logged and dropped.

use std::sync::{Arc, Mutex};

use offcache_core::cache::key::request_key;
use offcache_core::classify::{FONT_EXTENSIONS, IMAGE_EXTENSIONS, WEB_FONT_EXTENSIONS, has_extension};
use offcache_core::{BucketNames, CacheDb, Category, Destination, RequestRecord, ResponseRecord, fallback};
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::Fetcher;

/// Which synthesized response was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    /// Generated offline document.
    OfflinePage,
    /// The site's own offline document, served from a bucket.
    CachedOfflinePage,
    PlaceholderImage,
    EmptyFont,
    ApiError,
    /// Plain 503 for non-document requests.
    Unavailable,
}

impl FallbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackKind::OfflinePage => "offline_page",
            FallbackKind::CachedOfflinePage => "cached_offline_page",
            FallbackKind::PlaceholderImage => "placeholder_image",
            FallbackKind::EmptyFont => "empty_font",
            FallbackKind::ApiError => "api_error",
            FallbackKind::Unavailable => "unavailable",
        }
    }
}

/// The response ultimately returned for a routed request.
#[derive(Debug, Clone)]
pub enum StrategyOutcome {
    CacheHit(ResponseRecord),
    Network { response: ResponseRecord, stored: bool },
    Fallback { response: ResponseRecord, kind: FallbackKind },
}

impl StrategyOutcome {
    pub fn response(&self) -> &ResponseRecord {
        match self {
            StrategyOutcome::CacheHit(response)
            | StrategyOutcome::Network { response, .. }
            | StrategyOutcome::Fallback { response, .. } => response,
        }
    }

    pub fn into_response(self) -> ResponseRecord {
        match self {
            StrategyOutcome::CacheHit(response)
            | StrategyOutcome::Network { response, .. }
            | StrategyOutcome::Fallback { response, .. } => response,
        }
    }

    pub fn fallback_kind(&self) -> Option<FallbackKind> {
        match self {
            StrategyOutcome::Fallback { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Short label for logs and tool output.
    pub fn source(&self) -> &'static str {
        match self {
            StrategyOutcome::CacheHit(_) => "cache",
            StrategyOutcome::Network { .. } => "network",
            StrategyOutcome::Fallback { .. } => "fallback",
        }
    }
}

/// Runs the policy for a classified request.
pub struct StrategyExecutor {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    names: BucketNames,
    origin: Url,
    site_name: String,
    offline_key: String,
    writes: Mutex<JoinSet<()>>,
}

impl StrategyExecutor {
    pub fn new(
        db: CacheDb, fetcher: Arc<dyn Fetcher>, names: BucketNames, origin: Url, site_name: String,
        offline_key: String,
    ) -> Self {
        Self { db, fetcher, names, origin, site_name, offline_key, writes: Mutex::new(JoinSet::new()) }
    }

    pub async fn execute(&self, category: Category, request: &RequestRecord) -> StrategyOutcome {
        let key = request_key(&request.url, &self.origin);
        if category.is_cache_first() {
            self.cache_first(category, request, key).await
        } else {
            self.network_first(category, request, key).await
        }
    }

    async fn cache_first(&self, category: Category, request: &RequestRecord, key: String) -> StrategyOutcome {
        if let Some(hit) = self.lookup(&key).await {
            tracing::debug!(key = %key, category = category.as_str(), "cache hit");
            return StrategyOutcome::CacheHit(hit);
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                let stored = response.is_success();
                if stored {
                    let bucket = match category {
                        Category::Static => &self.names.static_bucket,
                        _ => &self.names.dynamic_bucket,
                    };
                    self.store_in_background(bucket, key, response.clone());
                }
                StrategyOutcome::Network { response, stored }
            }
            Err(e) => {
                tracing::warn!(url = %request.url, category = category.as_str(), error = %e, "fetch failed, no cached copy");
                if is_image(category, request) {
                    StrategyOutcome::Fallback { response: fallback::placeholder_image(), kind: FallbackKind::PlaceholderImage }
                } else if is_font(category, request) {
                    StrategyOutcome::Fallback { response: fallback::empty_font(), kind: FallbackKind::EmptyFont }
                } else {
                    self.offline_fallback(request).await
                }
            }
        }
    }

    async fn network_first(&self, category: Category, request: &RequestRecord, key: String) -> StrategyOutcome {
        let error = match self.fetcher.fetch(request).await {
            Ok(response) => {
                let stored = category == Category::Api && response.is_success();
                if stored {
                    self.store_in_background(&self.names.dynamic_bucket, key, response.clone());
                }
                return StrategyOutcome::Network { response, stored };
            }
            Err(e) => e,
        };

        tracing::warn!(url = %request.url, category = category.as_str(), error = %error, "network failed, trying cache");

        if let Some(hit) = self.lookup(&key).await {
            return StrategyOutcome::CacheHit(hit);
        }

        match category {
            Category::Api => StrategyOutcome::Fallback { response: fallback::api_error(), kind: FallbackKind::ApiError },
            _ => self.offline_fallback(request).await,
        }
    }

    /// Offline document for navigations, plain 503 for everything else.
    async fn offline_fallback(&self, request: &RequestRecord) -> StrategyOutcome {
        if !request.is_navigation() {
            return StrategyOutcome::Fallback { response: fallback::unavailable(), kind: FallbackKind::Unavailable };
        }
        if let Some(page) = self.lookup(&self.offline_key).await {
            return StrategyOutcome::Fallback { response: page, kind: FallbackKind::CachedOfflinePage };
        }
        StrategyOutcome::Fallback { response: fallback::offline_page(&self.site_name), kind: FallbackKind::OfflinePage }
    }

    /// Read failures count as misses.
    async fn lookup(&self, key: &str) -> Option<ResponseRecord> {
        match self.db.match_any(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed");
                None
            }
        }
    }

    fn store_in_background(&self, bucket: &str, key: String, response: ResponseRecord) {
        let db = self.db.clone();
        let bucket = bucket.to_string();
        let mut writes = self.writes.lock().unwrap_or_else(|e| e.into_inner());
        while writes.try_join_next().is_some() {}
        writes.spawn(async move {
            if let Err(e) = db.put_entry(&bucket, &key, &response).await {
                tracing::warn!(bucket = %bucket, key = %key, error = %e, "cache write failed");
            }
        });
    }

    /// Wait for every write spawned so far.
    pub async fn flush(&self) {
        let mut pending = std::mem::take(&mut *self.writes.lock().unwrap_or_else(|e| e.into_inner()));
        while pending.join_next().await.is_some() {}
    }
}

/// Declared images are classified static but still want the placeholder.
fn is_image(category: Category, request: &RequestRecord) -> bool {
    category == Category::Image
        || request.destination == Destination::Image
        || has_extension(&request.url, IMAGE_EXTENSIONS)
}

fn is_font(category: Category, request: &RequestRecord) -> bool {
    category == Category::Font
        || request.destination == Destination::Font
        || has_extension(&request.url, FONT_EXTENSIONS)
        || has_extension(&request.url, WEB_FONT_EXTENSIONS)
}
