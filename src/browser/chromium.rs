//! Chromium-backed [`Browser`] using chromiumoxide (CDP).
//!
//! Launches a persistent-profile Chromium so logins survive between runs, and
//! drives its first tab.

use super::{Browser, BrowserError, BrowserResult, LoadResult};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Waits for every incomplete `<img>` to load or error, bounded by a deadline.
const WAIT_FOR_IMAGES_JS: &str = r#"
(() => {
    const timeout = __TIMEOUT__;
    const start = Date.now();
    return Promise.all(
        Array.from(document.images)
            .filter(img => !img.complete)
            .map(img => new Promise(resolve => {
                const check = () => {
                    if (img.complete || Date.now() - start > timeout) {
                        resolve();
                    } else {
                        setTimeout(check, 100);
                    }
                };
                img.onload = img.onerror = resolve;
                check();
            }))
    ).then(() => true);
})()
"#;

/// Collects visible elements whose own text contains the trigger.
const VISIBLE_TRIGGERS_JS: &str = r#"
(() => {
    const needle = __TRIGGER__;
    const visible = el => {
        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        return style.visibility !== 'hidden' && style.display !== 'none'
            && rect.width > 0 && rect.height > 0;
    };
    const all = Array.from(document.querySelectorAll('a, button, span, div'))
        .filter(el => el.textContent && el.textContent.includes(needle))
        .filter(el => !Array.from(el.children).some(c => c.textContent.includes(needle)))
        .filter(visible);
    __ACTION__
})()
"#;

/// Chromium browser session.
pub struct ChromiumBrowser {
    browser: CdpBrowser,
    page: Page,
    handler: JoinHandle<()>,
    closed: bool,
}

impl ChromiumBrowser {
    /// Launch Chromium with a persistent profile under `output_dir`.
    pub async fn launch(config: &BrowserConfig, output_dir: &Path) -> BrowserResult<Self> {
        let profile_dir = output_dir.join(&config.profile_dir);
        std::fs::create_dir_all(&profile_dir)
            .map_err(|e| BrowserError::Launch(format!("profile dir: {e}")))?;

        info!(
            "Launching browser (headless={}, profile={})",
            config.headless,
            profile_dir.display()
        );

        let mut builder = CdpBrowserConfig::builder()
            .user_data_dir(profile_dir)
            .window_size(config.viewport_width, config.viewport_height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        if !config.headless {
            builder = builder.with_head();
        }

        let cdp_config = builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {}", e);
                }
            }
        });

        let existing = browser.pages().await.map_err(map_cdp_error)?;
        let page = match existing.into_iter().next() {
            Some(page) => page,
            None => browser
                .new_page("about:blank")
                .await
                .map_err(map_cdp_error)?,
        };

        Ok(Self {
            browser,
            page,
            handler,
            closed: false,
        })
    }

    fn ensure_open(&self) -> BrowserResult<()> {
        if self.closed {
            Err(BrowserError::SessionClosed("session already closed".to_string()))
        } else {
            Ok(())
        }
    }

    /// Records a fatal error so later calls fail fast.
    fn track<T>(&mut self, result: BrowserResult<T>) -> BrowserResult<T> {
        if let Err(e) = &result {
            if e.is_session_closed() {
                self.closed = true;
            }
        }
        result
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(&mut self, script: String) -> BrowserResult<T> {
        self.ensure_open()?;
        let result = match self.page.evaluate(script).await {
            Ok(value) => value
                .into_value::<T>()
                .map_err(|e| BrowserError::Script(format!("{e:?}"))),
            Err(e) => Err(map_cdp_error(e)),
        };
        self.track(result)
    }
}

/// Maps CDP errors onto the crawler's taxonomy.
///
/// A dropped websocket or a dead command channel means the browser or its tab
/// is gone.
fn map_cdp_error(err: CdpError) -> BrowserError {
    match err {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            BrowserError::SessionClosed(err.to_string())
        }
        other => BrowserError::Navigation(other.to_string()),
    }
}

fn trigger_script(trigger: &str, action: &str) -> String {
    let needle = serde_json::to_string(trigger).unwrap_or_else(|_| "\"\"".to_string());
    VISIBLE_TRIGGERS_JS
        .replace("__TRIGGER__", &needle)
        .replace("__ACTION__", action)
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<LoadResult> {
        self.ensure_open()?;
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(map_cdp_error(e)),
            Err(_) => Err(BrowserError::Timeout(timeout)),
        };
        self.track(result)?;

        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        Ok(LoadResult {
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn content(&mut self) -> BrowserResult<String> {
        self.ensure_open()?;
        let result = self.page.content().await.map_err(map_cdp_error);
        self.track(result)
    }

    async fn title(&mut self) -> BrowserResult<String> {
        self.ensure_open()?;
        let result = self
            .page
            .get_title()
            .await
            .map(|t| t.unwrap_or_default())
            .map_err(map_cdp_error);
        self.track(result)
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        self.ensure_open()?;
        let result = self
            .page
            .url()
            .await
            .map(|u| u.map(|u| u.to_string()).unwrap_or_default())
            .map_err(map_cdp_error);
        self.track(result)
    }

    async fn wait_fixed(&mut self, duration: Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn wait_for_images(&mut self, timeout: Duration) -> BrowserResult<()> {
        let script = WAIT_FOR_IMAGES_JS.replace("__TIMEOUT__", &timeout.as_millis().to_string());
        // The script bounds itself; the outer timeout only guards a hung CDP call
        match tokio::time::timeout(timeout + Duration::from_secs(2), self.evaluate::<bool>(script))
            .await
        {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(BrowserError::Timeout(timeout)),
        }
    }

    async fn capture_full_page_image(&mut self, path: &Path) -> BrowserResult<()> {
        self.ensure_open()?;
        let params = ScreenshotParams::builder().full_page(true).build();
        let result = match self.page.save_screenshot(params, path).await {
            Ok(_) => Ok(()),
            Err(e) => match map_cdp_error(e) {
                BrowserError::Navigation(msg) => Err(BrowserError::Capture(msg)),
                other => Err(other),
            },
        };
        self.track(result)
    }

    async fn count_visible(&mut self, trigger: &str) -> BrowserResult<usize> {
        let script = trigger_script(trigger, "return all.length;");
        self.evaluate::<usize>(script).await
    }

    async fn click_visible(
        &mut self,
        trigger: &str,
        index: usize,
        timeout: Duration,
    ) -> BrowserResult<()> {
        let action = format!(
            "const el = all[{index}]; if (!el) {{ return false; }} el.click(); return true;"
        );
        let script = trigger_script(trigger, &action);

        match tokio::time::timeout(timeout, self.evaluate::<bool>(script)).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(BrowserError::Script(format!(
                "no visible '{trigger}' element at index {index}"
            ))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BrowserError::Timeout(timeout)),
        }
    }

    async fn close(&mut self) -> BrowserResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let _ = self.page.clone().close().await;
        let _ = self.browser.close().await;
        self.handler.abort();
        Ok(())
    }
}
