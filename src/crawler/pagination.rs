//! Pagination reconstruction
//!
//! Listing (search result) pages are discovered by breadth-first traversal
//! because their URLs follow no formula. Topic pages are generated from an
//! inferred page count instead of being followed link by link.

use super::navigator::{NavigationError, Navigator};
use super::parser::{extract_site_links, parse_html};
use crate::config::PaginationConfig;
use crate::context::RunContext;
use crate::url::{classify_content_url, looks_like_search_page, ContentKind};
use regex::Regex;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::OnceLock;
use url::Url;

fn start_param() -> &'static Regex {
    static START: OnceLock<Regex> = OnceLock::new();
    START.get_or_init(|| Regex::new(r"/start=(\d+)").expect("valid start regex"))
}

fn page_of_total() -> &'static Regex {
    static PAGE_OF: OnceLock<Regex> = OnceLock::new();
    PAGE_OF.get_or_init(|| Regex::new(r"(?i)Page\s+\d+\s+of\s+(\d+)").expect("valid page regex"))
}

/// Post and topic links found across a set of listing pages, each sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentLinks {
    pub posts: Vec<String>,
    pub topics: Vec<String>,
}

/// Infers how many pages a topic has from its first rendered page
///
/// Evidence is the largest of: an anchor whose text is a page number, a
/// `/start=N` offset in any href (page `N / page_size + 1`), and a
/// "Page X of Y" marker in the document text. Defaults to 1. Values too
/// large for a `u32` saturate at `u32::MAX`.
pub fn infer_max_page(html: &str, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let parsed = parse_html(html);
    let mut max_page = 1u64;

    for anchor in &parsed.anchors {
        if let Some(start) = start_param()
            .captures(&anchor.href)
            .and_then(|c| c[1].parse::<u64>().ok())
        {
            max_page = max_page.max((start / page_size).saturating_add(1));
        }

        if !anchor.text.is_empty() && anchor.text.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(page) = anchor.text.parse::<u64>() {
                max_page = max_page.max(page);
            }
        }
    }

    if let Some(total) = page_of_total()
        .captures(&parsed.text)
        .and_then(|c| c[1].parse::<u64>().ok())
    {
        max_page = max_page.max(total);
    }

    u32::try_from(max_page).unwrap_or(u32::MAX)
}

/// Generates the URL of every page of a topic
///
/// Page 1 is `root` with any `/start=N` removed; page `k > 1` injects
/// `/start=(k-1)*page_size` before the trailing `.html`.
///
/// # Examples
///
/// ```
/// use forum_archiver::crawler::generate_topic_pages;
///
/// let pages = generate_topic_pages("https://x.com/Forums/t=1/a/start=20.html", 3, 10);
/// assert_eq!(pages, vec![
///     "https://x.com/Forums/t=1/a.html",
///     "https://x.com/Forums/t=1/a/start=10.html",
///     "https://x.com/Forums/t=1/a/start=20.html",
/// ]);
/// ```
pub fn generate_topic_pages(root: &str, max_page: u32, page_size: u32) -> Vec<String> {
    let clean = start_param().replace_all(root, "").into_owned();

    let mut pages = vec![clean.clone()];
    for page in 2..=max_page.max(1) {
        let start = u64::from(page - 1) * u64::from(page_size);
        let url = match clean.rfind(".html") {
            Some(pos) => format!("{}/start={}{}", &clean[..pos], start, &clean[pos..]),
            None => format!("{}/start={}", clean.trim_end_matches('/'), start),
        };
        pages.push(url);
    }
    pages
}

/// Infers the page count from `html` and generates every page URL of `root`
///
/// The count is capped at `limits.max_topic_pages`.
pub fn extract_topic_pages(html: &str, root: &str, limits: &PaginationConfig) -> Vec<String> {
    let inferred = infer_max_page(html, limits.topic_page_size);
    let max_page = inferred.min(limits.max_topic_pages.max(1));
    if max_page < inferred {
        tracing::warn!(
            "{} claims {} pages, archiving the first {}",
            root,
            inferred,
            max_page
        );
    }
    generate_topic_pages(root, max_page, limits.topic_page_size)
}

/// Discovers every pagination page of a listing by breadth-first traversal
///
/// Stops when the frontier is empty, `max_search_pages` pages have been
/// visited, or the run is cancelled. Pages that fail to load count as
/// visited. Only a closed session is reported as an error.
pub async fn collect_search_pages(
    nav: &mut Navigator,
    ctx: &RunContext,
    site: &Url,
    root: &str,
    limits: &PaginationConfig,
) -> Result<Vec<String>, NavigationError> {
    ctx.log("Collecting pagination pages...");

    let mut frontier = VecDeque::from([root.to_string()]);
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let delay = nav.timing().request_delay();

    while visited.len() < limits.max_search_pages && !ctx.is_cancelled() {
        let Some(current) = frontier.pop_front() else {
            break;
        };
        if !visited.insert(current.clone()) {
            continue;
        }

        let Some((html, final_url)) = load_page(nav, ctx, &current).await? else {
            continue;
        };

        for link in extract_site_links(&html, &final_url, site) {
            if looks_like_search_page(&link, root) && !visited.contains(&link) {
                frontier.push_back(link);
            }
        }

        ctx.sleep(delay).await;
    }

    ctx.log(format!("Found {} pagination pages", visited.len()));
    Ok(visited.into_iter().collect())
}

/// Visits each listing page again and sorts its links into posts and topics
pub async fn collect_content_links(
    nav: &mut Navigator,
    ctx: &RunContext,
    site: &Url,
    search_pages: &[String],
) -> Result<ContentLinks, NavigationError> {
    let mut posts = HashSet::new();
    let mut topics = HashSet::new();
    let delay = nav.timing().request_delay();

    for (i, page) in search_pages.iter().enumerate() {
        if ctx.is_cancelled() {
            break;
        }
        ctx.log(format!("Scanning page {}/{}...", i + 1, search_pages.len()));

        let Some((html, final_url)) = load_page(nav, ctx, page).await? else {
            continue;
        };

        for link in extract_site_links(&html, &final_url, site) {
            match classify_content_url(&link) {
                ContentKind::Post => {
                    posts.insert(link);
                }
                ContentKind::Topic => {
                    topics.insert(link);
                }
                _ => {}
            }
        }

        ctx.sleep(delay).await;
    }

    let mut links = ContentLinks {
        posts: posts.into_iter().collect(),
        topics: topics.into_iter().collect(),
    };
    links.posts.sort();
    links.topics.sort();

    ctx.log(format!(
        "Found {} posts and {} topics",
        links.posts.len(),
        links.topics.len()
    ));
    Ok(links)
}

/// Navigates and reads the rendered page
///
/// `Ok(None)` means the page should be skipped: it failed to load, could not
/// be read, or the run was stopped.
async fn load_page(
    nav: &mut Navigator,
    ctx: &RunContext,
    url: &str,
) -> Result<Option<(String, Url)>, NavigationError> {
    let outcome = match nav.goto(ctx, url).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_fatal() => return Err(e),
        Err(_) => return Ok(None),
    };

    let html = match nav.browser().content().await {
        Ok(html) => html,
        Err(e) if e.is_session_closed() => {
            return Err(NavigationError::SessionClosed(e.to_string()))
        }
        Err(e) => {
            ctx.warn(format!("Could not read {}: {}", url, e));
            return Ok(None);
        }
    };

    let final_url = Url::parse(&outcome.final_url).or_else(|_| Url::parse(url));
    match final_url {
        Ok(final_url) => Ok(Some((html, final_url))),
        Err(e) => {
            ctx.warn(format!("Skipping unparseable page URL {}: {}", url, e));
            Ok(None)
        }
    }
}
