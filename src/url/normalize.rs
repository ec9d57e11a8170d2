use crate::UrlError;
use url::Url;

/// Query parameter carrying the region hint
pub const REGION_PARAM: &str = "region";

/// Fragment that makes post pages open on their comment section
pub const COMMENTS_FRAGMENT: &str = "comments";

/// Normalizes a post URL so it opens on the comment section
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Append `region=<region>` unless a `region` parameter is present
///    (any case, any value)
/// 3. Set the fragment to `#comments`, replacing any other fragment
///
/// Both steps leave an already-normalized URL untouched, so applying the
/// function twice yields the same string as applying it once.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
/// * `region` - Region code used when no region hint is present
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse the URL
///
/// # Examples
///
/// ```
/// use comment_sentry::url::normalize_post_url;
///
/// let url = normalize_post_url("https://example.com/post/42", "US").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/post/42?region=US#comments");
/// ```
pub fn normalize_post_url(url_str: &str, region: &str) -> Result<Url, UrlError> {
    let mut url = with_region_hint(url_str, region)?;

    if url.fragment() != Some(COMMENTS_FRAGMENT) {
        url.set_fragment(Some(COMMENTS_FRAGMENT));
    }

    Ok(url)
}

/// Adds a region hint query parameter when none is present
///
/// Used on its own for profile pages that time out without a region hint.
pub fn with_region_hint(url_str: &str, region: &str) -> Result<Url, UrlError> {
    let mut url = parse_http_url(url_str)?;

    if !has_region_hint(&url) {
        url.query_pairs_mut().append_pair(REGION_PARAM, region);
    }

    Ok(url)
}

/// Returns true if the URL already carries a region parameter
pub fn has_region_hint(url: &Url) -> bool {
    url.query_pairs()
        .any(|(key, _)| key.eq_ignore_ascii_case(REGION_PARAM))
}

/// Returns the deduplication key of a post URL: its path alone
///
/// Query string, fragment and host are ignored, so the mobile and desktop
/// hosts of the same post collapse to one key. A trailing slash is
/// dropped except for the root path.
pub fn post_path_key(url: &Url) -> String {
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        path[..path.len() - 1].to_string()
    } else {
        path.to_string()
    }
}

fn parse_http_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adds_region_and_fragment() {
        let result = normalize_post_url("https://example.com/post/1", "US").unwrap();
        assert_eq!(result.as_str(), "https://example.com/post/1?region=US#comments");
    }

    #[test]
    fn test_appends_to_existing_query() {
        let result = normalize_post_url("https://example.com/post/1?lang=en", "US").unwrap();
        assert_eq!(
            result.as_str(),
            "https://example.com/post/1?lang=en&region=US#comments"
        );
    }

    #[test]
    fn test_keeps_existing_region() {
        let result = normalize_post_url("https://example.com/post/1?Region=GB", "US").unwrap();
        assert_eq!(result.as_str(), "https://example.com/post/1?Region=GB#comments");
    }

    #[test]
    fn test_replaces_other_fragment() {
        let result = normalize_post_url("https://example.com/post/1#top", "US").unwrap();
        assert_eq!(result.as_str(), "https://example.com/post/1?region=US#comments");
    }

    #[test]
    fn test_region_goes_before_existing_fragment() {
        let result = normalize_post_url("https://example.com/post/1#comments", "US").unwrap();
        assert_eq!(result.as_str(), "https://example.com/post/1?region=US#comments");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            "https://example.com/post/1",
            "https://example.com/@user/7312?foo=bar#x",
            "http://m.example.com/article/abc?region=JP",
            "https://example.com/share/post/9#comments",
        ];

        for input in inputs {
            let once = normalize_post_url(input, "US").unwrap();
            let twice = normalize_post_url(once.as_str(), "US").unwrap();
            assert_eq!(once, twice, "Not idempotent for {}", input);
        }
    }

    #[test]
    fn test_region_hint_leaves_fragment_alone() {
        let result = with_region_hint("https://example.com/@user", "US").unwrap();
        assert_eq!(result.as_str(), "https://example.com/@user?region=US");
    }

    #[test]
    fn test_path_key_ignores_query_and_fragment() {
        let a = Url::parse("https://example.com/post/1?region=US#comments").unwrap();
        let b = Url::parse("https://example.com/post/1?utm=x").unwrap();
        let c = Url::parse("https://m.example.com/post/1/").unwrap();
        assert_eq!(post_path_key(&a), "/post/1");
        assert_eq!(post_path_key(&a), post_path_key(&b));
        assert_eq!(post_path_key(&a), post_path_key(&c));
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_post_url("ftp://example.com/post/1", "US");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(normalize_post_url("not a url", "US").is_err());
    }
}
