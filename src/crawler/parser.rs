//! HTML parser for rendered forum pages
//!
//! This module handles parsing rendered markup to extract:
//! - Same-host links to follow
//! - Anchor text (used as pagination evidence)
//! - Page title and visible text

use crate::url::{is_same_host, resolve_link};
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// One `<a href>` as written in the markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Raw `href` attribute
    pub href: String,
    /// Anchor text, trimmed
    pub text: String,
}

/// Extracted information from a rendered page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Every anchor with an `href`, in document order
    pub anchors: Vec<Anchor>,

    /// Concatenated text of the document
    pub text: String,
}

/// Parses rendered markup into title, anchors and text
///
/// # Example
///
/// ```
/// use forum_archiver::crawler::parse_html;
///
/// let html = r#"<html><head><title>Topic</title></head>
///     <body><a href="/Forums/t=1/x/start=10.html">2</a> Page 1 of 2</body></html>"#;
/// let parsed = parse_html(html);
/// assert_eq!(parsed.title.as_deref(), Some("Topic"));
/// assert_eq!(parsed.anchors[0].text, "2");
/// assert!(parsed.text.contains("Page 1 of 2"));
/// ```
pub fn parse_html(html: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        anchors: extract_anchors(&document),
        text: document.root_element().text().collect::<String>(),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_anchors(document: &Html) -> Vec<Anchor> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            Some(Anchor {
                href: href.to_string(),
                text: element.text().collect::<String>().trim().to_string(),
            })
        })
        .collect()
}

/// Collects the absolute same-host URLs linked from a rendered page
///
/// Hrefs are resolved against `page_url` (the URL the tab actually ended on).
/// Empty and fragment-only hrefs are skipped, as is anything that resolves to
/// a different host than `site`.
pub fn extract_site_links(html: &str, page_url: &Url, site: &Url) -> BTreeSet<String> {
    parse_html(html)
        .anchors
        .iter()
        .filter_map(|anchor| resolve_link(&anchor.href, page_url))
        .filter(|url| is_same_host(url, site))
        .map(String::from)
        .collect()
}
