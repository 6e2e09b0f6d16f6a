use crate::config::types::{
    ChallengeConfig, Config, ExpandConfig, OutputConfig, PaginationConfig, SiteConfig,
    TimingConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_timing_config(&config.timing)?;
    validate_challenge_config(&config.challenge)?;
    validate_pagination_config(&config.pagination)?;
    validate_expand_config(&config.expand)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the site root
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' has no host",
            config.base_url
        )));
    }

    Ok(())
}

/// Validates timing policy
fn validate_timing_config(config: &TimingConfig) -> Result<(), ConfigError> {
    if config.retry_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "retry_attempts must be >= 1, got {}",
            config.retry_attempts
        )));
    }

    if config.navigation_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "navigation_timeout_ms must be > 0".to_string(),
        ));
    }

    // Zero-length poll intervals would spin
    for (name, value) in [
        ("challenge_poll_ms", config.challenge_poll_ms),
        ("continue_poll_ms", config.continue_poll_ms),
    ] {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{} must be > 0", name)));
        }
    }

    Ok(())
}

/// Validates challenge heuristics
fn validate_challenge_config(config: &ChallengeConfig) -> Result<(), ConfigError> {
    if config.phrases.is_empty() {
        return Err(ConfigError::Validation(
            "challenge phrases cannot be empty".to_string(),
        ));
    }

    if config.phrases.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "challenge phrases cannot contain blank entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates pagination limits
fn validate_pagination_config(config: &PaginationConfig) -> Result<(), ConfigError> {
    if config.max_search_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_search_pages must be >= 1, got {}",
            config.max_search_pages
        )));
    }

    if config.topic_page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "topic_page_size must be >= 1, got {}",
            config.topic_page_size
        )));
    }

    if config.max_topic_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_topic_pages must be >= 1, got {}",
            config.max_topic_pages
        )));
    }

    Ok(())
}

fn validate_expand_config(config: &ExpandConfig) -> Result<(), ConfigError> {
    if config.triggers.iter().any(|t| t.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "expand triggers cannot contain blank entries".to_string(),
        ));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}
