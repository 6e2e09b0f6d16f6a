//! Configuration module for the archiver
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so the archiver also runs with no config file at all.
//!
//! # Example
//!
//! ```no_run
//! use forum_archiver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("archiver.toml")).unwrap();
//! println!("Archiving into: {}", config.output.directory.display());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, ChallengeConfig, Config, ExpandConfig, OutputConfig, PaginationConfig,
    SiteConfig, TimingConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
