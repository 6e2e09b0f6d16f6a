//! Browser abstraction for render-and-capture
//!
//! The crawler only ever talks to a [`Browser`]: a single tab that can load a
//! URL, report what it rendered, capture it, and click things. The Chromium
//! adapter lives behind the `browser` feature; tests drive the crawler with
//! the scripted one, built only for tests and the `test-util` feature.

#[cfg(feature = "browser")]
pub mod chromium;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a browsing session
///
/// `SessionClosed` is the only variant the crawler treats as fatal for a run;
/// adapters must map "tab/browser is gone" conditions onto it.
#[derive(Debug, Clone, Error)]
pub enum BrowserError {
    #[error("navigation timed out after {0:?}")]
    Timeout(Duration),

    #[error("browser session closed: {0}")]
    SessionClosed(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("script failed: {0}")]
    Script(String),

    #[error("failed to launch browser: {0}")]
    Launch(String),
}

impl BrowserError {
    /// Returns true if no session remains to retry against
    pub fn is_session_closed(&self) -> bool {
        matches!(self, Self::SessionClosed(_))
    }
}

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Result of a completed page load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    /// The URL the tab ended on after redirects
    pub final_url: String,
    /// Time taken by the load itself, in milliseconds
    pub load_time_ms: u64,
}

/// A single render-capable browsing session (one tab)
#[async_trait]
pub trait Browser: Send {
    /// Load `url`, failing with [`BrowserError::Timeout`] after `timeout`
    async fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<LoadResult>;

    /// Current rendered markup
    async fn content(&mut self) -> BrowserResult<String>;

    /// Current document title
    async fn title(&mut self) -> BrowserResult<String>;

    /// URL the tab is currently showing
    async fn current_url(&mut self) -> BrowserResult<String>;

    /// Let the page run for a fixed time
    async fn wait_fixed(&mut self, duration: Duration) -> BrowserResult<()>;

    /// Wait until embedded images finish loading, up to `timeout`
    async fn wait_for_images(&mut self, timeout: Duration) -> BrowserResult<()>;

    /// Write a full-page PNG screenshot to `path`
    async fn capture_full_page_image(&mut self, path: &Path) -> BrowserResult<()>;

    /// Serialized markup to archive; defaults to [`Browser::content`]
    async fn capture_markup(&mut self) -> BrowserResult<String> {
        self.content().await
    }

    /// Number of visible elements whose text contains `trigger`
    async fn count_visible(&mut self, trigger: &str) -> BrowserResult<usize>;

    /// Click the `index`-th visible element whose text contains `trigger`
    async fn click_visible(
        &mut self,
        trigger: &str,
        index: usize,
        timeout: Duration,
    ) -> BrowserResult<()>;

    /// Close the session
    async fn close(&mut self) -> BrowserResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_session_closed_is_fatal() {
        assert!(BrowserError::SessionClosed("tab crashed".into()).is_session_closed());

        assert!(!BrowserError::Timeout(Duration::from_secs(1)).is_session_closed());
        assert!(!BrowserError::Navigation("net::ERR_FAILED".into()).is_session_closed());
        assert!(!BrowserError::Capture("closed".into()).is_session_closed());
        assert!(!BrowserError::Script("x".into()).is_session_closed());
    }

    #[test]
    fn test_error_messages() {
        let err = BrowserError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "navigation timed out after 1.5s");

        let err = BrowserError::SessionClosed("target detached".into());
        assert_eq!(err.to_string(), "browser session closed: target detached");
    }
}
