use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use browzee_core::{
    traits::BrowserSession,
    types::{BrowserAction, ScrollDirection},
    Error, Result,
};

/// Page text returned by `extract_content` is cut to this many characters.
const MAX_CONTENT_CHARS: usize = 8_000;
const DEFAULT_SCROLL_PX: i64 = 800;
const MAX_SCROLL_PX: i64 = 100_000;

struct Live {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

/// A running Chromium instance and the page the agent drives.
pub struct ChromiumSession {
    live: Mutex<Option<Live>>,
    temp_profile: std::sync::Mutex<Option<PathBuf>>,
}

impl ChromiumSession {
    pub(crate) fn new(
        browser: Browser,
        page: Page,
        handler: JoinHandle<()>,
        temp_profile: Option<PathBuf>,
    ) -> Self {
        Self {
            live: Mutex::new(Some(Live {
                browser,
                page,
                handler,
            })),
            temp_profile: std::sync::Mutex::new(temp_profile),
        }
    }

    async fn page(&self) -> Result<Page> {
        self.live
            .lock()
            .await
            .as_ref()
            .map(|l| l.page.clone())
            .ok_or_else(|| Error::browser("browser session is closed"))
    }

    async fn evaluate_string(page: &Page, script: &str) -> Result<String> {
        page.evaluate(script)
            .await
            .map_err(|e| Error::browser(format!("script failed: {}", e)))?
            .into_value::<String>()
            .map_err(|e| Error::browser(format!("unexpected script result: {}", e)))
    }

    fn cleanup_profile(&self) {
        let taken = self
            .temp_profile
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(path) = taken {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!("Failed to clean up profile {}: {}", path.display(), e);
            }
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn execute(&self, action: &BrowserAction) -> Result<String> {
        let page = self.page().await?;
        debug!(action = action.name(), "Executing browser action");

        match action {
            BrowserAction::Navigate { url } => {
                page.goto(url.as_str())
                    .await
                    .map_err(|e| Error::browser(format!("navigation to {} failed: {}", url, e)))?;
                let _ = page.wait_for_navigation().await;
                let title = page.get_title().await.ok().flatten().unwrap_or_default();
                Ok(format!("Navigated to {} ({})", url, title))
            }
            BrowserAction::Click { selector } => {
                let element = page
                    .find_element(selector.as_str())
                    .await
                    .map_err(|e| Error::browser(format!("element '{}' not found: {}", selector, e)))?;
                element
                    .click()
                    .await
                    .map_err(|e| Error::browser(format!("click on '{}' failed: {}", selector, e)))?;
                Ok(format!("Clicked {}", selector))
            }
            BrowserAction::InputText { selector, text } => {
                let element = page
                    .find_element(selector.as_str())
                    .await
                    .map_err(|e| Error::browser(format!("element '{}' not found: {}", selector, e)))?;
                element
                    .click()
                    .await
                    .map_err(|e| Error::browser(format!("focus on '{}' failed: {}", selector, e)))?;
                element
                    .type_str(text.as_str())
                    .await
                    .map_err(|e| Error::browser(format!("typing into '{}' failed: {}", selector, e)))?;
                Ok(format!("Typed {} characters into {}", text.chars().count(), selector))
            }
            BrowserAction::Scroll { direction, amount } => {
                let px = scroll_distance(*amount);
                let dy = match direction {
                    ScrollDirection::Down => px,
                    ScrollDirection::Up => -px,
                };
                page.evaluate(format!("window.scrollBy(0, {})", dy))
                    .await
                    .map_err(|e| Error::browser(format!("scroll failed: {}", e)))?;
                Ok(format!("Scrolled {:?} by {}px", direction, px))
            }
            BrowserAction::GoBack => {
                page.evaluate("window.history.back()")
                    .await
                    .map_err(|e| Error::browser(format!("go back failed: {}", e)))?;
                let _ = page.wait_for_navigation().await;
                let url = page.url().await.ok().flatten().unwrap_or_default();
                Ok(format!("Went back to {}", url))
            }
            BrowserAction::ExtractContent => {
                let text = Self::evaluate_string(&page, "document.body ? document.body.innerText : ''").await?;
                let truncated: String = text.chars().take(MAX_CONTENT_CHARS).collect();
                Ok(format!("Page content:\n{}", truncated))
            }
            BrowserAction::Wait { millis } => {
                tokio::time::sleep(Duration::from_millis(*millis)).await;
                Ok(format!("Waited {}ms", millis))
            }
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let page = self.page().await?;
        page.screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
        )
        .await
        .map_err(|e| Error::browser(format!("screenshot failed: {}", e)))
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page().await?;
        page.url()
            .await
            .map_err(|e| Error::browser(format!("could not read url: {}", e)))
            .map(|u| u.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn close(&self) -> Result<()> {
        let Some(mut live) = self.live.lock().await.take() else {
            return Ok(());
        };

        info!("Closing browser session");
        if let Err(e) = live.browser.close().await {
            warn!(error = %e, "Browser did not close cleanly");
        }
        let _ = live.browser.wait().await;
        live.handler.abort();
        self.cleanup_profile();
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Browser::drop kills the process; the handler must not outlive it
        if let Some(live) = self.live.get_mut().take() {
            live.handler.abort();
        }
    }
}

/// Pixel distance for a scroll, clamped to a sane page range.
fn scroll_distance(amount: Option<i64>) -> i64 {
    amount
        .unwrap_or(DEFAULT_SCROLL_PX)
        .saturating_abs()
        .min(MAX_SCROLL_PX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_distance_is_bounded() {
        assert_eq!(scroll_distance(None), DEFAULT_SCROLL_PX);
        assert_eq!(scroll_distance(Some(-300)), 300);
        assert_eq!(scroll_distance(Some(i64::MIN)), MAX_SCROLL_PX);
        assert_eq!(scroll_distance(Some(i64::MAX)), MAX_SCROLL_PX);
    }
}
