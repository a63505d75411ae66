//! Request and response records passed through the router.
//!
//! Both are plain owned values. Response bodies are `Bytes`, so the copy
//! written into a bucket shares the buffer with the copy returned to the
//! caller instead of re-reading a body stream.

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// What the page intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation.
    Document,
    Style,
    Script,
    Image,
    Font,
    /// `fetch()` / XHR with no particular destination.
    #[default]
    Empty,
    Other,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub method: String,
    pub url: Url,
    pub destination: Destination,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RequestRecord {
    /// A bodiless GET with no particular destination.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".into(), url, destination: Destination::Empty, headers: Vec::new(), body: Bytes::new() }
    }

    /// A request with an arbitrary method.
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self { method: method.into(), ..Self::get(url) }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Only GET requests are routed.
    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }
}

/// A response snapshot, either fresh from the network, read from a bucket,
/// or synthesized as fallback content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseRecord {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: status_text.into(), headers: Vec::new(), body: body.into() }
    }

    /// A 200 response with the given content type.
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self::new(200, "OK", body).with_header("Content-Type", content_type)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup; first value wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Status in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_get_defaults() {
        let req = RequestRecord::get(url("https://example.com/style.css"));
        assert!(req.is_get());
        assert!(!req.is_navigation());
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_method_case_insensitive() {
        assert!(RequestRecord::new("get", url("https://example.com/")).is_get());
        assert!(!RequestRecord::new("POST", url("https://example.com/")).is_get());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let resp = ResponseRecord::ok("text/css", "body{}");
        assert_eq!(resp.header("content-type"), Some("text/css"));
        assert_eq!(resp.content_type(), Some("text/css"));
        assert_eq!(resp.header("etag"), None);
    }

    #[test]
    fn test_success_range() {
        assert!(ResponseRecord::new(200, "OK", "").is_success());
        assert!(ResponseRecord::new(204, "No Content", "").is_success());
        assert!(!ResponseRecord::new(304, "Not Modified", "").is_success());
        assert!(!ResponseRecord::new(503, "Service Unavailable", "").is_success());
    }

    #[test]
    fn test_destination_serde() {
        let d: Destination = serde_json::from_str("\"document\"").unwrap();
        assert_eq!(d, Destination::Document);
        assert_eq!(serde_json::to_string(&Destination::Font).unwrap(), "\"font\"");
    }
}
