//! Post URL shape patterns
//!
//! Profile pages mix post links with navigation, ads and app-download
//! links. A candidate is a post link when it matches one of four shapes:
//! `/post/…`, `/article/…`, `/share/post/…`, or `/@user/<numeric id>`.

use regex::Regex;
use std::sync::OnceLock;

const POST_SHAPES: &[&str] = &[
    r#"https?://[^\s"'<>\\]+/post/[^\s"'<>\\]+"#,
    r#"https?://[^\s"'<>\\]+/article/[^\s"'<>\\]+"#,
    r#"https?://[^\s"'<>\\]+/share/post/[^\s"'<>\\]+"#,
    r#"https?://[^\s"'<>\\]+/@[^\s"'<>\\]+/\d+"#,
];

/// Keywords an inline script must mention before it is scanned for links
const SCRIPT_KEYWORDS: &[&str] = &["post", "article", "share"];

fn shapes() -> &'static [Regex] {
    static SHAPES: OnceLock<Vec<Regex>> = OnceLock::new();
    SHAPES.get_or_init(|| {
        POST_SHAPES
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Returns true if the URL has one of the post shapes
pub fn is_post_link(candidate: &str) -> bool {
    shapes().iter().any(|re| re.is_match(candidate))
}

/// Returns true if an inline script is worth scanning for post links
pub fn script_mentions_posts(text: &str) -> bool {
    SCRIPT_KEYWORDS.iter().any(|kw| text.contains(kw))
}

/// Finds every post-shaped URL embedded in free text
///
/// JSON-escaped slashes (`https:\/\/…`) are unescaped first. Results keep
/// first-seen order without duplicates.
pub fn find_post_links(text: &str) -> Vec<String> {
    let unescaped = text.replace("\\/", "/").replace("\\u002F", "/");
    let mut found: Vec<String> = Vec::new();

    for re in shapes() {
        for m in re.find_iter(&unescaped) {
            let link = m.as_str().to_string();
            if !found.contains(&link) {
                found.push(link);
            }
        }
    }

    found
}
