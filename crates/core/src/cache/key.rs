//! Request identity used as the bucket key.

use url::Url;

/// Compute the bucket key for a request URL.
///
/// Same-origin URLs key by `path[?query]`, so `/style.css` is stored under
/// `/style.css`. Cross-origin URLs key by the full URL. Fragments never take
/// part in the key.
pub fn request_key(url: &Url, origin: &Url) -> String {
    if url.origin() == origin.origin() {
        match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        }
    } else {
        let mut url = url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}
