//! Request classification.
//!
//! A classifier is an ordered list of `(Matcher, Category)` rules built once
//! from configuration. The first matching rule wins; a request no rule claims
//! is `Category::Other`. Classification looks at the URL only and never
//! touches the network or the bucket store.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::key::request_key;
use crate::config::AppConfig;
use crate::{Error, RequestRecord};

/// Stylesheet, script and web-font extensions served cache-first from the static bucket.
pub const STATIC_EXTENSIONS: &[&str] = &["css", "js", "mjs", "woff", "woff2"];

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "avif", "ico"];

pub const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "eot"];

/// Web fonts, which the static rule claims before the font rule sees them.
pub const WEB_FONT_EXTENSIONS: &[&str] = &["woff", "woff2"];

/// Request category driving the caching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Static,
    Api,
    Image,
    Font,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Static => "static",
            Category::Api => "api",
            Category::Image => "image",
            Category::Font => "font",
            Category::Other => "other",
        }
    }

    /// Static, image and font requests consult the buckets before the network.
    pub fn is_cache_first(&self) -> bool {
        matches!(self, Category::Static | Category::Image | Category::Font)
    }
}

/// A single URL predicate.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Cache key is one of the declared assets.
    AssetList(HashSet<String>),
    /// Last path segment ends in one of these extensions (case-insensitive, no dot).
    Extension(&'static [&'static str]),
    /// Path contains one of these fragments.
    PathContains(Vec<String>),
    /// Host equals or is a subdomain of a pattern; a pattern ending in `.` is a host prefix.
    Host(Vec<String>),
}

impl Matcher {
    pub fn matches(&self, url: &Url, origin: &Url) -> bool {
        match self {
            Matcher::AssetList(keys) => keys.contains(&request_key(url, origin)),
            Matcher::Extension(exts) => has_extension(url, exts),
            Matcher::PathContains(fragments) => fragments.iter().any(|f| url.path().contains(f.as_str())),
            Matcher::Host(patterns) => url
                .host_str()
                .is_some_and(|host| patterns.iter().any(|p| host_matches(host, p))),
        }
    }
}

/// Last path segment ends in one of `exts` (case-insensitive, no dot).
pub fn has_extension(url: &Url, exts: &[&str]) -> bool {
    path_extension(url).is_some_and(|ext| exts.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
}

fn path_extension(url: &Url) -> Option<String> {
    let segment = url.path().rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() { None } else { Some(ext.to_ascii_lowercase()) }
}

fn host_matches(host: &str, pattern: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    if pattern.ends_with('.') {
        return host.starts_with(&pattern);
    }
    host == pattern || host.strip_suffix(pattern.as_str()).is_some_and(|rest| rest.ends_with('.'))
}

/// Ordered rule list mapping URLs to categories.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    rules: Vec<(Matcher, Category)>,
}

impl Classifier {
    pub fn new(origin: Url, rules: Vec<(Matcher, Category)>) -> Self {
        Self { origin, rules }
    }

    /// Build the standard rule list from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;

        let mut assets = HashSet::new();
        for asset in &config.static_assets {
            let url = origin
                .join(asset)
                .map_err(|e| Error::InvalidUrl(format!("{asset}: {e}")))?;
            assets.insert(request_key(&url, &origin));
        }

        let rules = vec![
            (Matcher::AssetList(assets), Category::Static),
            (Matcher::Extension(STATIC_EXTENSIONS), Category::Static),
            (Matcher::PathContains(config.api_prefixes.clone()), Category::Api),
            (Matcher::Host(config.form_hosts.clone()), Category::Api),
            (Matcher::Extension(IMAGE_EXTENSIONS), Category::Image),
            (Matcher::Extension(FONT_EXTENSIONS), Category::Font),
            (Matcher::Host(config.font_hosts.clone()), Category::Font),
        ];

        Ok(Self::new(origin, rules))
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Classify a request, or `None` if the router must leave it alone.
    ///
    /// Non-GET requests and non-http(s) schemes pass through.
    pub fn classify(&self, request: &RequestRecord) -> Option<Category> {
        if !request.is_get() {
            return None;
        }
        if !matches!(request.url.scheme(), "http" | "https") {
            return None;
        }
        Some(self.classify_url(&request.url))
    }

    pub fn classify_url(&self, url: &Url) -> Category {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.matches(url, &self.origin))
            .map(|(_, category)| *category)
            .unwrap_or(Category::Other)
    }
}
