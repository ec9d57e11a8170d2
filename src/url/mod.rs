//! URL handling module for Comment Sentry
//!
//! This module provides post URL normalization, the path-based identity
//! used to deduplicate posts, and recognition of post-shaped links.

mod normalize;
mod patterns;

// Re-export main functions
pub use normalize::{
    has_region_hint, normalize_post_url, post_path_key, with_region_hint, COMMENTS_FRAGMENT,
    REGION_PARAM,
};
pub use patterns::{find_post_links, is_post_link, script_mentions_posts};

use crate::UrlResult;

/// A post discovered on a profile page
///
/// Built once by the link harvester and never mutated afterwards. Both
/// fields are pure functions of the raw link and the region hint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostReference {
    /// Normalized URL (region hint and comment anchor applied)
    pub url: String,

    /// Path identity used for deduplication
    pub path_key: Option<String>,
}

impl PostReference {
    /// Creates a post reference from a raw link
    ///
    /// # Arguments
    ///
    /// * `raw` - The link as found on the page
    /// * `region` - Region code for the region hint
    ///
    /// # Returns
    ///
    /// * `Ok(PostReference)` - The normalized reference
    /// * `Err(UrlError)` - The link is not a valid HTTP(S) URL
    pub fn from_raw(raw: &str, region: &str) -> UrlResult<Self> {
        let url = normalize_post_url(raw, region)?;
        Ok(Self {
            path_key: Some(post_path_key(&url)),
            url: url.into(),
        })
    }
}

impl std::fmt::Display for PostReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_reference_from_raw() {
        let post = PostReference::from_raw("https://example.com/post/1?x=1#top", "US").unwrap();
        assert_eq!(post.url, "https://example.com/post/1?x=1&region=US#comments");
        assert_eq!(post.path_key.as_deref(), Some("/post/1"));
    }

    #[test]
    fn test_post_reference_is_deterministic() {
        let a = PostReference::from_raw("https://example.com/post/1", "US").unwrap();
        let b = PostReference::from_raw("https://example.com/post/1", "US").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_post_reference_rejects_garbage() {
        assert!(PostReference::from_raw("javascript:void(0)", "US").is_err());
    }
}
