//! Synthesized responses for requests neither the network nor a bucket can answer.
//!
//! Every generator is pure: same input, same bytes.

use crate::ResponseRecord;

pub const PLACEHOLDER_WIDTH: u32 = 300;
pub const PLACEHOLDER_HEIGHT: u32 = 200;
pub const PLACEHOLDER_LABEL: &str = "Image Unavailable";

pub const API_ERROR: &str = "Network unavailable";
pub const API_ERROR_MESSAGE: &str = "Please check your internet connection and try again.";

const UNAVAILABLE_TEXT: &str = "Offline - Content not available";

/// Escape text for inclusion in HTML or SVG markup.
pub fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Self-contained offline document with a retry button.
pub fn offline_html(site_name: &str) -> String {
    let site = escape_markup(site_name);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Offline - {site}</title>
<style>
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
body {{ font-family: Arial, sans-serif; background: linear-gradient(135deg, #1B2951, #2C3E50); color: #fff;
       min-height: 100vh; display: flex; align-items: center; justify-content: center; text-align: center; padding: 20px; }}
.offline-container {{ max-width: 500px; }}
h1 {{ font-size: 2rem; margin-bottom: 1rem; color: #D4AF37; }}
p {{ font-size: 1.1rem; line-height: 1.6; margin-bottom: 2rem; opacity: 0.9; }}
.retry-btn {{ background: #D4AF37; color: #fff; border: none; padding: 1rem 2rem; border-radius: 50px;
             font-size: 1rem; font-weight: 600; cursor: pointer; }}
</style>
</head>
<body>
<div class="offline-container">
<h1>You're Offline</h1>
<p>It looks like you've lost your internet connection. Previously visited pages of {site} may still be available.</p>
<button class="retry-btn" onclick="window.location.reload()">Try Again</button>
</div>
</body>
</html>
"#
    )
}

/// Fixed-size SVG placeholder with a centered label.
pub fn placeholder_svg(width: u32, height: u32, label: &str) -> String {
    let label = escape_markup(label);
    format!(
        r##"<svg width="{width}" height="{height}" xmlns="http://www.w3.org/2000/svg"><rect width="100%" height="100%" fill="#f0f0f0"/><text x="50%" y="50%" font-family="Arial, sans-serif" font-size="16" fill="#999" text-anchor="middle" dy=".3em">{label}</text></svg>"##
    )
}

pub fn offline_page(site_name: &str) -> ResponseRecord {
    ResponseRecord::ok("text/html; charset=utf-8", offline_html(site_name))
}

pub fn placeholder_image() -> ResponseRecord {
    ResponseRecord::ok("image/svg+xml", placeholder_svg(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, PLACEHOLDER_LABEL))
}

/// 503 JSON body for API calls made while offline.
pub fn api_error() -> ResponseRecord {
    let body = serde_json::json!({ "error": API_ERROR, "message": API_ERROR_MESSAGE }).to_string();
    ResponseRecord::new(503, "Service Unavailable", body).with_header("Content-Type", "application/json")
}

/// 503 plain-text response for non-document requests with nothing cached.
pub fn unavailable() -> ResponseRecord {
    ResponseRecord::new(503, "Service Unavailable", UNAVAILABLE_TEXT).with_header("Content-Type", "text/plain")
}

/// Empty font response; the page's font stack takes over.
pub fn empty_font() -> ResponseRecord {
    ResponseRecord::new(404, "Not Found", "")
}
