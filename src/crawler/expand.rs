//! Best-effort expansion of collapsed post content

use crate::browser::{Browser, BrowserError};
use crate::config::ExpandConfig;
use std::time::Duration;

/// Clicks every visible expand trigger, for up to `max_rounds` rounds
///
/// A round that clicks nothing ends the interaction. Missing triggers and
/// failed clicks are tolerated; only a closed session is returned as an error.
/// Returns the number of successful clicks.
pub async fn expand_collapsed_content(
    browser: &mut dyn Browser,
    config: &ExpandConfig,
) -> Result<usize, BrowserError> {
    let click_timeout = Duration::from_millis(config.click_timeout_ms);
    let click_settle = Duration::from_millis(config.click_settle_ms);
    let mut total = 0;

    for round in 1..=config.max_rounds {
        let mut clicked = false;

        for trigger in &config.triggers {
            let count = match browser.count_visible(trigger).await {
                Ok(count) => count,
                Err(e) if e.is_session_closed() => return Err(e),
                Err(e) => {
                    tracing::debug!("Could not look up '{}': {}", trigger, e);
                    continue;
                }
            };

            for index in 0..count {
                match browser.click_visible(trigger, index, click_timeout).await {
                    Ok(()) => {
                        clicked = true;
                        total += 1;
                        tolerate(browser.wait_fixed(click_settle).await)?;
                    }
                    Err(e) if e.is_session_closed() => return Err(e),
                    Err(e) => tracing::debug!("Click on '{}' #{} failed: {}", trigger, index, e),
                }
            }
        }

        if !clicked {
            break;
        }
        tracing::debug!("Expand round {} clicked {} trigger(s) so far", round, total);
    }

    Ok(total)
}

fn tolerate(result: Result<(), BrowserError>) -> Result<(), BrowserError> {
    match result {
        Err(e) if e.is_session_closed() => Err(e),
        _ => Ok(()),
    }
}
