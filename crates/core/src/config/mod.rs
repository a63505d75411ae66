//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFCACHE_*)
//! 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::BucketNames;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFCACHE_*)
/// 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment version embedded in bucket names.
    ///
    /// Bumping it is the only way stale entries are invalidated.
    #[serde(default = "default_version")]
    pub version: String,

    /// Prefix for bucket names.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Origin the site is served from. Same-origin requests are keyed by path.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Site name shown on the offline page.
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Assets pre-cached at install time, relative to `origin` or absolute.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Cached document served to navigations when offline, if present.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Path fragments marking API calls.
    #[serde(default = "default_api_prefixes")]
    pub api_prefixes: Vec<String>,

    /// Hosts receiving form submissions. A trailing dot matches as a prefix.
    #[serde(default = "default_form_hosts")]
    pub form_hosts: Vec<String>,

    /// Hosts serving web fonts.
    #[serde(default = "default_font_hosts")]
    pub font_hosts: Vec<String>,

    /// Path to SQLite bucket database.
    ///
    /// Set via OFFCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Requests slower than this are logged at warn level.
    #[serde(default = "default_slow_request_ms")]
    pub slow_request_ms: u64,
}

fn default_version() -> String {
    "v1".into()
}

fn default_cache_prefix() -> String {
    "offcache".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_site_name() -> String {
    "The Silk Road Global".into()
}

fn default_static_assets() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/style.css",
        "/script.js",
        "/config.js",
        "/advanced-features.js",
        "/manifest.json",
        "/assets/images/logo.png",
        "/assets/images/hero-bg.jpg",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_api_prefixes() -> Vec<String> {
    vec!["/api/".into()]
}

fn default_form_hosts() -> Vec<String> {
    vec!["formspree.io".into(), "emailjs.com".into(), "api.".into()]
}

fn default_font_hosts() -> Vec<String> {
    vec!["fonts.gstatic.com".into(), "fonts.googleapis.com".into()]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offcache.sqlite")
}

fn default_user_agent() -> String {
    "offcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_slow_request_ms() -> u64 {
    1_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            origin: default_origin(),
            site_name: default_site_name(),
            static_assets: default_static_assets(),
            offline_page: default_offline_page(),
            api_prefixes: default_api_prefixes(),
            form_hosts: default_form_hosts(),
            font_hosts: default_font_hosts(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            slow_request_ms: default_slow_request_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn slow_request_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_request_ms)
    }

    /// Parsed site origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {scheme}") }),
        }
    }

    /// Bucket names for the configured version.
    pub fn bucket_names(&self) -> BucketNames {
        BucketNames::new(&self.cache_prefix, &self.version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFCACHE_`
    /// 2. TOML file from `OFFCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFCACHE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.version, "v1");
        assert_eq!(config.cache_prefix, "offcache");
        assert_eq!(config.db_path, PathBuf::from("./offcache.sqlite"));
        assert_eq!(config.user_agent, "offcache/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.slow_request_ms, 1_000);
        assert!(config.static_assets.contains(&"/style.css".to_string()));
        assert_eq!(config.api_prefixes, vec!["/api/".to_string()]);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.slow_request_threshold(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_origin_url() {
        let config = AppConfig::default();
        assert_eq!(config.origin_url().unwrap().as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_origin_url_rejects_other_schemes() {
        let config = AppConfig { origin: "file:///srv/site".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_bucket_names_follow_version() {
        let config = AppConfig { version: "v7".into(), ..Default::default() };
        let names = config.bucket_names();
        assert_eq!(names.static_bucket, "offcache-static-v7");
        assert_eq!(names.dynamic_bucket, "offcache-dynamic-v7");
    }
}
