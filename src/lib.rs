//! Forum Archiver: a resumable snapshot archiver for JavaScript-rendered forums
//!
//! This crate discovers profile, listing and topic pages on a single forum host,
//! reconstructs their pagination, and captures each page as rendered HTML plus a
//! full-page screenshot. Runs are strictly sequential, rate limited, tolerant of
//! anti-bot challenges, and resumable through a persisted archive ledger.

pub mod browser;
pub mod config;
pub mod context;
pub mod crawler;
pub mod ledger;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for archiver operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] crawler::NavigationError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Browser session closed: {0}")]
    SessionClosed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ArchiveError {
    /// Returns true if the run cannot continue because the browsing session is gone
    pub fn is_session_closed(&self) -> bool {
        match self {
            Self::SessionClosed(_) => true,
            Self::Navigation(e) => e.is_fatal(),
            Self::Browser(e) => e.is_session_closed(),
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for archiver operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use context::{RunContext, RunHandle};
pub use crawler::{Archiver, JobSpec, ProfileJob, UrlListJob, UrlListMode};
pub use ledger::{ArchiveRecord, Ledger};
pub use state::NavigationState;
pub use url::{classify_content_url, ContentKind};
