//! URL handling module
//!
//! This module provides content classification of forum URLs, same-host checks,
//! link resolution, and filename slugs for archived pages. Everything here is
//! pure and deterministic.

mod domain;
mod normalize;

use std::fmt;

// Re-export main functions
pub use domain::{extract_host, is_same_host, is_same_site};
pub use normalize::{parse_target_url, resolve_link, safe_filename, DEFAULT_SLUG_LEN};

/// Path markers of single posts, in the live forum and the archive namespaces
const POST_MARKERS: &[&str] = &["/Forums/p=", "/Archives/p="];

/// Path markers of topic threads
const TOPIC_MARKERS: &[&str] = &["/Forums/t=", "/Archives/t="];

/// Query markers carried by listing/search result pages
const SEARCH_MARKERS: &[&str] = &["/search_id=", "/search_author=", "search_id=startedtopics"];

/// What kind of forum content a URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentKind {
    /// A single post
    Post,
    /// A topic thread (possibly one page of it)
    Topic,
    /// One page of a search/listing result set
    SearchPage,
    /// Anything else
    Unclassified,
}

impl ContentKind {
    /// The name used for this kind in output paths and result logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "posts",
            Self::Topic => "topics",
            Self::SearchPage => "search",
            Self::Unclassified => "unclassified",
        }
    }

    /// Returns true for the kinds that get archived from listings
    pub fn is_content(&self) -> bool {
        matches!(self, Self::Post | Self::Topic)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a URL as a post, a topic, or neither
///
/// Post markers are checked before topic markers.
///
/// # Examples
///
/// ```
/// use forum_archiver::url::{classify_content_url, ContentKind};
///
/// assert_eq!(
///     classify_content_url("https://www.thetechgame.com/Forums/p=123/reply.html"),
///     ContentKind::Post
/// );
/// assert_eq!(
///     classify_content_url("https://www.thetechgame.com/Archives/t=9/old-thread.html"),
///     ContentKind::Topic
/// );
/// assert_eq!(
///     classify_content_url("https://www.thetechgame.com/bob"),
///     ContentKind::Unclassified
/// );
/// ```
pub fn classify_content_url(url: &str) -> ContentKind {
    if POST_MARKERS.iter().any(|m| url.contains(m)) {
        return ContentKind::Post;
    }
    if TOPIC_MARKERS.iter().any(|m| url.contains(m)) {
        return ContentKind::Topic;
    }
    ContentKind::Unclassified
}

/// Returns true if `url` is a pagination page of the listing rooted at `root_search_url`
///
/// The URL must be an `.html` page under the same `.../search/` prefix as the
/// root and carry one of the known search-parameter markers.
pub fn looks_like_search_page(url: &str, root_search_url: &str) -> bool {
    if !url.ends_with(".html") {
        return false;
    }

    let Some((prefix, _)) = root_search_url.split_once("/search/") else {
        return false;
    };
    let base_path = format!("{}/search/", prefix);

    url.starts_with(&base_path) && SEARCH_MARKERS.iter().any(|m| url.contains(m))
}

/// Full classification, including listing pages relative to a root search URL
///
/// Content markers win over listing detection.
pub fn classify_url(url: &str, root_search_url: Option<&str>) -> ContentKind {
    match classify_content_url(url) {
        ContentKind::Unclassified => match root_search_url {
            Some(root) if looks_like_search_page(url, root) => ContentKind::SearchPage,
            _ => ContentKind::Unclassified,
        },
        kind => kind,
    }
}
