use crate::UrlError;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Default maximum length of a filename slug, in characters
pub const DEFAULT_SLUG_LEN: usize = 120;

/// Parses a target URL supplied by the user, accepting only absolute HTTP(S)
///
/// # Examples
///
/// ```
/// use forum_archiver::url::parse_target_url;
///
/// let url = parse_target_url("  https://example.com/Forums/t=1/x.html ").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/Forums/t=1/x.html");
/// assert!(parse_target_url("ftp://example.com/").is_err());
/// ```
pub fn parse_target_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Resolves an anchor href against the page it was found on
///
/// Returns None for empty hrefs, fragment-only links (`#...`), and hrefs that do
/// not resolve to an absolute URL.
pub fn resolve_link(href: &str, page_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    page_url.join(href).ok()
}

fn unsafe_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^\w\-.]+").expect("valid slug regex"))
}

/// Turns a page title into a filesystem-safe slug
///
/// Runs of characters outside `[\w.-]` collapse to a single `_`, the result is
/// cut to `max_len` characters and stripped of leading/trailing underscores.
/// An empty result becomes `"page"`.
///
/// # Examples
///
/// ```
/// use forum_archiver::url::safe_filename;
///
/// assert_eq!(safe_filename("Hello, World! | TTG", 120), "Hello_World_TTG");
/// assert_eq!(safe_filename("   ", 120), "page");
/// ```
pub fn safe_filename(title: &str, max_len: usize) -> String {
    let replaced = unsafe_chars().replace_all(title.trim(), "_");
    let truncated: String = replaced.chars().take(max_len).collect();
    let slug = truncated.trim_matches('_');

    if slug.is_empty() {
        "page".to_string()
    } else {
        slug.to_string()
    }
}
