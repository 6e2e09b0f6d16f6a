use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the archiver
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub timing: TimingConfig,
    pub challenge: ChallengeConfig,
    pub pagination: PaginationConfig,
    pub expand: ExpandConfig,
    pub output: OutputConfig,
    pub browser: BrowserConfig,
}

/// The single forum host this archiver works against
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Site root, e.g. "https://www.thetechgame.com/"
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.thetechgame.com/".to_string(),
        }
    }
}

/// Timing policy for navigation, retries and politeness
///
/// All values are milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TimingConfig {
    /// Fixed delay after each target and each listing page
    pub request_delay_ms: u64,

    /// Timeout handed to the browser for a single page load
    pub navigation_timeout_ms: u64,

    /// Wait after load for dynamic content to render
    pub settle_ms: u64,

    /// Ceiling for the best-effort image load wait
    pub image_wait_ms: u64,

    /// Short wait after images for lazy content
    pub final_settle_ms: u64,

    /// Navigation attempts before giving up on a URL
    pub retry_attempts: u32,

    /// Sleep between failed attempts
    pub retry_backoff_ms: u64,

    /// Interval between challenge re-checks
    pub challenge_poll_ms: u64,

    /// Longest time to wait for a challenge to clear
    pub challenge_max_wait_ms: u64,

    /// Extra settle once a challenge clears
    pub challenge_settle_ms: u64,

    /// Poll interval of the "ready to continue" gate
    pub continue_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 2500,
            navigation_timeout_ms: 120_000,
            settle_ms: 3000,
            image_wait_ms: 10_000,
            final_settle_ms: 1000,
            retry_attempts: 3,
            retry_backoff_ms: 5000,
            challenge_poll_ms: 3000,
            challenge_max_wait_ms: 300_000,
            challenge_settle_ms: 2000,
            continue_poll_ms: 500,
        }
    }
}

impl TimingConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn continue_poll(&self) -> Duration {
        Duration::from_millis(self.continue_poll_ms)
    }
}

/// Anti-bot challenge detection heuristics
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChallengeConfig {
    /// Lowercase phrases that indicate a verification interstitial
    pub phrases: Vec<String>,

    /// URL substrings for which challenge detection is skipped
    pub exempt_markers: Vec<String>,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            phrases: vec![
                "verifying you are human".to_string(),
                "verify you are human".to_string(),
                "checking your browser before accessing".to_string(),
                "just a moment".to_string(),
                "cf-browser-verification".to_string(),
            ],
            exempt_markers: vec!["forums".to_string(), "archives".to_string()],
        }
    }
}

/// Pagination limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PaginationConfig {
    /// Hard ceiling on listing pages visited per search group
    pub max_search_pages: usize,

    /// Items per topic page, used to translate `start=` offsets
    pub topic_page_size: u32,

    /// Ceiling on pages generated for one topic in all-pages mode
    pub max_topic_pages: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_search_pages: 400,
            topic_page_size: 10,
            max_topic_pages: 1000,
        }
    }
}

/// The "expand collapsed content" interaction
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExpandConfig {
    /// Visible text of clickable triggers
    pub triggers: Vec<String>,

    /// Passes over the trigger set; stops early once nothing was clicked
    pub max_rounds: u32,

    pub click_timeout_ms: u64,

    pub click_settle_ms: u64,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            triggers: vec!["Click to View Content".to_string()],
            max_rounds: 5,
            click_timeout_ms: 1500,
            click_settle_ms: 200,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root of screenshots/, html/ and meta/
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./ttg_archive"),
        }
    }
}

/// Browser session settings used by the Chromium adapter
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Persistent profile directory, relative to the output directory
    pub profile_dir: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            viewport_width: 1400,
            viewport_height: 900,
            profile_dir: PathBuf::from("browser_profile"),
        }
    }
}
