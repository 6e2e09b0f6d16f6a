//! Navigation controller for the single browsing session
//!
//! Each [`Navigator::goto`] issues a page load, lets dynamic content settle,
//! waits out bot-verification challenges and retries transient failures with
//! backoff. A closed session is never retried.

use crate::browser::{Browser, BrowserError, BrowserResult, LoadResult};
use crate::config::{ChallengeConfig, TimingConfig};
use crate::context::RunContext;
use crate::state::NavigationState;
use std::time::Duration;
use thiserror::Error;

/// Why a navigation produced no page
#[derive(Debug, Clone, Error)]
pub enum NavigationError {
    /// The run was stopped before or during the navigation
    #[error("navigation cancelled")]
    Cancelled,

    /// No browsing session remains
    #[error("browser session closed: {0}")]
    SessionClosed(String),

    /// Every attempt failed with a transient error
    #[error("failed to load {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

impl NavigationError {
    /// Returns true if the whole run must halt
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionClosed(_))
    }
}

/// How a challenge interstitial played out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeStatus {
    NotDetected,
    Resolved,
    /// Still showing after the maximum wait; the page is used as rendered
    Unresolved,
}

/// A page that finished loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOutcome {
    pub url: String,
    pub final_url: String,
    pub attempts: u32,
    pub load_time_ms: u64,
    pub challenge: ChallengeStatus,
}

/// Returns true if the rendered page looks like a bot-verification interstitial
///
/// Pages whose URL contains one of the exempt markers never count as a
/// challenge. Matching is case-insensitive.
pub fn looks_like_challenge(content: &str, title: &str, url: &str, policy: &ChallengeConfig) -> bool {
    let url = url.to_lowercase();
    if policy
        .exempt_markers
        .iter()
        .any(|marker| url.contains(&marker.to_lowercase()))
    {
        return false;
    }

    let content = content.to_lowercase();
    let title = title.to_lowercase();
    policy.phrases.iter().any(|phrase| {
        let phrase = phrase.to_lowercase();
        content.contains(&phrase) || title.contains(&phrase)
    })
}

/// Drives one browsing session through navigation attempts
pub struct Navigator {
    browser: Box<dyn Browser>,
    timing: TimingConfig,
    challenge: ChallengeConfig,
    state: NavigationState,
}

impl Navigator {
    pub fn new(browser: Box<dyn Browser>, timing: TimingConfig, challenge: ChallengeConfig) -> Self {
        Self {
            browser,
            timing,
            challenge,
            state: NavigationState::Idle,
        }
    }

    /// The underlying session, for reading and capturing the current page
    pub fn browser(&mut self) -> &mut dyn Browser {
        self.browser.as_mut()
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Loads `url`, retrying transient failures
    ///
    /// # Returns
    ///
    /// * `Ok(NavigationOutcome)` - The page rendered (a challenge may still be showing)
    /// * `Err(NavigationError::Cancelled)` - The run was stopped
    /// * `Err(NavigationError::SessionClosed)` - The browser is gone
    /// * `Err(NavigationError::Exhausted)` - Every attempt failed
    pub async fn goto(
        &mut self,
        ctx: &RunContext,
        url: &str,
    ) -> Result<NavigationOutcome, NavigationError> {
        let attempts = self.timing.retry_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if ctx.is_cancelled() {
                return Err(NavigationError::Cancelled);
            }

            ctx.log(format!("Loading: {}", url));
            self.transition(NavigationState::Navigating);

            match self.load(url).await {
                Ok(load) => {
                    let challenge = self.handle_challenge(ctx).await?;
                    self.transition(NavigationState::ContentReady);
                    return Ok(NavigationOutcome {
                        url: url.to_string(),
                        final_url: load.final_url,
                        attempts: attempt,
                        load_time_ms: load.load_time_ms,
                        challenge,
                    });
                }
                Err(e) if e.is_session_closed() => {
                    self.transition(NavigationState::Failed);
                    ctx.warn("Browser or page was closed - cannot continue");
                    return Err(NavigationError::SessionClosed(e.to_string()));
                }
                Err(e) => {
                    self.transition(NavigationState::Failed);
                    ctx.warn(format!(
                        "Navigation error (attempt {}/{}): {}",
                        attempt, attempts, e
                    ));
                    last_error = e.to_string();

                    if attempt < attempts {
                        ctx.sleep(Duration::from_millis(self.timing.retry_backoff_ms))
                            .await;
                    }
                }
            }
        }

        ctx.warn(format!("Failed to load after {} attempts: {}", attempts, url));
        Err(NavigationError::Exhausted {
            url: url.to_string(),
            attempts,
            last_error,
        })
    }

    /// One load plus the settle waits
    async fn load(&mut self, url: &str) -> BrowserResult<LoadResult> {
        let timing = &self.timing;
        let load = self
            .browser
            .navigate(url, Duration::from_millis(timing.navigation_timeout_ms))
            .await?;

        self.browser
            .wait_fixed(Duration::from_millis(timing.settle_ms))
            .await?;

        match self
            .browser
            .wait_for_images(Duration::from_millis(timing.image_wait_ms))
            .await
        {
            Ok(()) => tracing::debug!("Images loaded"),
            Err(e) if e.is_session_closed() => return Err(e),
            Err(e) => tracing::debug!("Image wait gave up: {}", e),
        }

        self.browser
            .wait_fixed(Duration::from_millis(timing.final_settle_ms))
            .await?;

        tracing::debug!("Loaded {} in {}ms", load.final_url, load.load_time_ms);
        Ok(load)
    }

    /// Polls a challenge until it clears, the wait runs out, or the run stops
    async fn handle_challenge(&mut self, ctx: &RunContext) -> Result<ChallengeStatus, NavigationError> {
        if !self.challenge_showing().await? {
            return Ok(ChallengeStatus::NotDetected);
        }

        self.transition(NavigationState::ChallengeDetected);
        ctx.warn("Challenge detected - waiting for resolution...");

        let poll = Duration::from_millis(self.timing.challenge_poll_ms);
        let max_wait = Duration::from_millis(self.timing.challenge_max_wait_ms);
        let mut waited = Duration::ZERO;

        while waited < max_wait {
            if ctx.is_cancelled() {
                self.transition(NavigationState::Failed);
                return Err(NavigationError::Cancelled);
            }

            ctx.sleep(poll).await;
            waited += poll;

            if !self.challenge_showing().await? {
                ctx.log("Challenge resolved, continuing with archival");
                let settle = Duration::from_millis(self.timing.challenge_settle_ms);
                if let Err(e) = self.browser.wait_fixed(settle).await {
                    self.fail_on_closed(e)?;
                }
                return Ok(ChallengeStatus::Resolved);
            }
        }

        ctx.warn("Challenge not resolved automatically - manual intervention may be needed");
        Ok(ChallengeStatus::Unresolved)
    }

    /// Inspects the current page; unreadable pages do not count as challenges
    async fn challenge_showing(&mut self) -> Result<bool, NavigationError> {
        let page = async {
            let content = self.browser.content().await?;
            let title = self.browser.title().await?;
            let url = self.browser.current_url().await?;
            Ok::<_, BrowserError>((content, title, url))
        }
        .await;

        match page {
            Ok((content, title, url)) => {
                Ok(looks_like_challenge(&content, &title, &url, &self.challenge))
            }
            Err(e) => {
                self.fail_on_closed(e)?;
                Ok(false)
            }
        }
    }

    fn fail_on_closed(&mut self, err: BrowserError) -> Result<(), NavigationError> {
        if err.is_session_closed() {
            self.transition(NavigationState::Failed);
            return Err(NavigationError::SessionClosed(err.to_string()));
        }
        tracing::debug!("Ignoring browser error while checking page: {}", err);
        Ok(())
    }

    fn transition(&mut self, next: NavigationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid navigation transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!("Navigation state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Closes the browsing session
    pub async fn close(&mut self) -> BrowserResult<()> {
        self.browser.close().await
    }
}
