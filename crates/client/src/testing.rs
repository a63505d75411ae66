//! Test doubles shared by the router, lifecycle and sync tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use offcache_core::{AppConfig, RequestRecord, ResponseRecord};

use crate::fetch::{FetchError, Fetcher};

/// In-memory network: canned responses by URL, a call counter, and an offline switch.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, ResponseRecord>>,
    failing: Mutex<Vec<String>>,
    seen: Mutex<Vec<String>>,
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for the absolute `url`.
    pub fn route(&self, url: &str, response: ResponseRecord) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    /// Make one URL fail with a connection error.
    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().push(url.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `METHOD url` of every request seen, in order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &RequestRecord) -> Result<ResponseRecord, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.url.to_string();
        self.seen.lock().unwrap().push(format!("{} {}", request.method, url));

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&url) {
            return Err(FetchError::Network("connection refused".into()));
        }

        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| ResponseRecord::new(404, "Not Found", "")))
    }
}

/// Small config for tests: three declared assets on a fixed origin.
pub fn test_config(version: &str) -> AppConfig {
    AppConfig {
        version: version.into(),
        cache_prefix: "site".into(),
        origin: "https://site.example".into(),
        site_name: "Test Site".into(),
        static_assets: vec!["/".into(), "/index.html".into(), "/app.js".into()],
        slow_request_ms: 60_000,
        ..Default::default()
    }
}

/// Route every declared asset of `test_config` to a 200 response.
pub fn route_assets(fetcher: &MockFetcher) {
    fetcher.route("https://site.example/", ResponseRecord::ok("text/html", "<h1>home</h1>"));
    fetcher.route("https://site.example/index.html", ResponseRecord::ok("text/html", "<h1>index</h1>"));
    fetcher.route("https://site.example/app.js", ResponseRecord::ok("application/javascript", "init()"));
}
