//! In-memory [`Browser`] driven by a script of pages
//!
//! Used by the test suites to exercise the crawler without Chromium. Clones
//! share state, so a test can keep one clone for inspection after handing
//! another to the crawler.

use super::{Browser, BrowserError, BrowserResult, LoadResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Markup served while a challenge is pending
const CHALLENGE_HTML: &str =
    "<html><head><title>Just a moment...</title></head><body>Verifying you are human</body></html>";

type ContentHook = Box<dyn Fn(usize) + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct ScriptedPage {
    title: String,
    html: String,
    redirect: Option<String>,
    challenge_reads: usize,
    collapsed: usize,
}

#[derive(Default)]
struct ScriptState {
    pages: HashMap<String, ScriptedPage>,
    failures: HashMap<String, VecDeque<BrowserError>>,
    current: Option<String>,
    navigations: Vec<String>,
    content_reads: usize,
    clicks: usize,
    screenshots: Vec<PathBuf>,
    fail_screenshots: bool,
    close_after: Option<usize>,
    closed: bool,
    on_content: Option<ContentHook>,
}

impl ScriptState {
    fn check_open(&self) -> BrowserResult<()> {
        if self.closed {
            Err(BrowserError::SessionClosed("Target page, context or browser has been closed".into()))
        } else {
            Ok(())
        }
    }

    fn current_page_mut(&mut self) -> Option<&mut ScriptedPage> {
        let url = self.current.clone()?;
        self.pages.get_mut(&url)
    }
}

/// Scripted browsing session
///
/// Unknown URLs load as an empty page.
#[derive(Clone, Default)]
pub struct ScriptedBrowser {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Serves `body` (wrapped in a document titled `title`) at `url`
    pub fn add_page(&self, url: &str, title: &str, body: &str) {
        let html = format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        );
        let mut state = self.lock();
        let page = state.pages.entry(url.to_string()).or_default();
        page.title = title.to_string();
        page.html = html;
    }

    /// Makes `url` end up at `final_url` after loading
    pub fn redirect(&self, url: &str, final_url: &str) {
        self.lock()
            .pages
            .entry(url.to_string())
            .or_default()
            .redirect = Some(final_url.to_string());
    }

    /// Fails the next `times` navigations to `url` with `error`
    pub fn fail_next(&self, url: &str, times: usize, error: BrowserError) {
        let mut state = self.lock();
        let queue = state.failures.entry(url.to_string()).or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    /// Shows a challenge interstitial for the next `reads` content reads of `url`
    pub fn challenge(&self, url: &str, reads: usize) {
        self.lock()
            .pages
            .entry(url.to_string())
            .or_default()
            .challenge_reads = reads;
    }

    /// Hides `count` pieces of content behind "Click to View Content"
    pub fn collapsed(&self, url: &str, count: usize) {
        self.lock().pages.entry(url.to_string()).or_default().collapsed = count;
    }

    /// Closes the session once `count` navigations have completed
    pub fn close_after(&self, count: usize) {
        self.lock().close_after = Some(count);
    }

    /// Makes every screenshot fail
    pub fn fail_screenshots(&self) {
        self.lock().fail_screenshots = true;
    }

    /// Calls `hook` with the running count after every content read
    pub fn on_content(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        self.lock().on_content = Some(Box::new(hook));
    }

    /// Every navigation issued, in order, including failed ones
    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn clicks(&self) -> usize {
        self.lock().clicks
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.lock().screenshots.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<LoadResult> {
        let mut state = self.lock();
        state.check_open()?;
        state.navigations.push(url.to_string());

        if let Some(error) = state.failures.get_mut(url).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        if timeout.is_zero() {
            return Err(BrowserError::Timeout(timeout));
        }

        let final_url = state
            .pages
            .get(url)
            .and_then(|p| p.redirect.clone())
            .unwrap_or_else(|| url.to_string());
        state.current = Some(url.to_string());

        if let Some(limit) = state.close_after {
            if state.navigations.len() > limit {
                state.closed = true;
                state.check_open()?;
            }
        }

        Ok(LoadResult {
            final_url,
            load_time_ms: 1,
        })
    }

    async fn content(&mut self) -> BrowserResult<String> {
        let (html, reads, hook) = {
            let mut state = self.lock();
            state.check_open()?;
            state.content_reads += 1;
            let reads = state.content_reads;

            let html = match state.current_page_mut() {
                Some(page) if page.challenge_reads > 0 => {
                    page.challenge_reads = page.challenge_reads.saturating_sub(1);
                    CHALLENGE_HTML.to_string()
                }
                Some(page) => page.html.clone(),
                None => "<html><head></head><body></body></html>".to_string(),
            };
            (html, reads, state.on_content.take())
        };

        // Run the hook outside the lock so it may call back into the browser
        if let Some(hook) = hook {
            hook(reads);
            let mut state = self.lock();
            if state.on_content.is_none() {
                state.on_content = Some(hook);
            }
        }
        Ok(html)
    }

    async fn title(&mut self) -> BrowserResult<String> {
        let mut state = self.lock();
        state.check_open()?;
        Ok(state
            .current_page_mut()
            .map(|p| p.title.clone())
            .unwrap_or_default())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        let state = self.lock();
        state.check_open()?;
        let Some(url) = state.current.clone() else {
            return Ok("about:blank".to_string());
        };
        Ok(state
            .pages
            .get(&url)
            .and_then(|p| p.redirect.clone())
            .unwrap_or(url))
    }

    async fn wait_fixed(&mut self, _duration: Duration) -> BrowserResult<()> {
        self.lock().check_open()
    }

    async fn wait_for_images(&mut self, _timeout: Duration) -> BrowserResult<()> {
        self.lock().check_open()
    }

    async fn capture_full_page_image(&mut self, path: &Path) -> BrowserResult<()> {
        let mut state = self.lock();
        state.check_open()?;
        if state.fail_screenshots {
            return Err(BrowserError::Capture("screenshot failed".into()));
        }
        std::fs::write(path, b"\x89PNG\r\n\x1a\n")
            .map_err(|e| BrowserError::Capture(e.to_string()))?;
        state.screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn count_visible(&mut self, trigger: &str) -> BrowserResult<usize> {
        let mut state = self.lock();
        state.check_open()?;
        if trigger != "Click to View Content" {
            return Ok(0);
        }
        Ok(state.current_page_mut().map(|p| p.collapsed).unwrap_or(0))
    }

    async fn click_visible(
        &mut self,
        trigger: &str,
        index: usize,
        _timeout: Duration,
    ) -> BrowserResult<()> {
        let mut state = self.lock();
        state.check_open()?;
        let clicked = match state.current_page_mut() {
            Some(page) if index < page.collapsed => {
                page.collapsed -= 1;
                true
            }
            _ => false,
        };
        if !clicked {
            return Err(BrowserError::Script(format!(
                "no visible '{}' element at index {}",
                trigger, index
            )));
        }
        state.clicks += 1;
        Ok(())
    }

    async fn close(&mut self) -> BrowserResult<()> {
        self.lock().closed = true;
        Ok(())
    }
}
