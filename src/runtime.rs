//! Chromiumoxide-based rendering backend.
//!
//! Implements [`BrowserLauncher`](crate::browser::BrowserLauncher) by spawning
//! a local Chrome process over CDP. Each launch yields an isolated
//! [`ChromiumSession`] that owns the browser process and its event handler
//! task; closing the session tears both down.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::page::{EventDomContentEventFired, EventLoadEventFired, NavigateParams},
    page::Page,
};
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;

use crate::browser::{
    BrowserLauncher, BrowserPage, BrowserRuntimeError, BrowserSession, LaunchOptions,
    WaitCondition,
};

/// Launches local Chrome instances through chromiumoxide.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumoxideLauncher;

impl ChromiumoxideLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumoxideLauncher {
    async fn launch(
        &self,
        options: &LaunchOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserRuntimeError> {
        let config = build_config(options)?;
        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserRuntimeError::Launch(err.to_string()))?;
        let handler = spawn_handler(handler);
        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            handler: Some(handler),
        }))
    }
}

/// A launched Chrome process plus the task draining its CDP handler.
pub struct ChromiumSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, BrowserRuntimeError> {
        let browser = self.browser.as_ref().ok_or(BrowserRuntimeError::Closed)?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(map_chromiumoxide_error)?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&mut self) -> Result<(), BrowserRuntimeError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let closed = browser.close().await.map_err(map_chromiumoxide_error);
        if closed.is_ok() {
            if let Err(err) = browser.wait().await {
                log::debug!(target: "wayfinder", "chrome process wait failed: {err}");
            }
        } else if let Err(err) = browser.kill().await.transpose() {
            log::debug!(target: "wayfinder", "chrome process kill failed: {err}");
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        closed.map(|_| ())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

/// A single chromiumoxide tab.
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    async fn navigate_and_wait(&self, url: &str, wait: WaitCondition) -> Result<(), BrowserRuntimeError> {
        // Subscribe before navigating so the lifecycle event cannot be missed.
        let navigation = match wait {
            WaitCondition::DomContentLoaded => {
                let mut events = self
                    .page
                    .event_listener::<EventDomContentEventFired>()
                    .await
                    .map_err(map_chromiumoxide_error)?;
                self.issue_navigate(url).await?;
                events.next().await.is_some()
            }
            WaitCondition::Load => {
                let mut events = self
                    .page
                    .event_listener::<EventLoadEventFired>()
                    .await
                    .map_err(map_chromiumoxide_error)?;
                self.issue_navigate(url).await?;
                events.next().await.is_some()
            }
        };

        if navigation {
            Ok(())
        } else {
            Err(BrowserRuntimeError::Navigation {
                url: url.to_string(),
                reason: "page event stream ended before the page loaded".to_string(),
            })
        }
    }

    async fn issue_navigate(&self, url: &str) -> Result<(), BrowserRuntimeError> {
        let response = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|err| BrowserRuntimeError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            })?;

        match response.result.error_text.as_deref() {
            Some(reason) if !reason.is_empty() => Err(BrowserRuntimeError::Navigation {
                url: url.to_string(),
                reason: reason.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(
        &self,
        url: &str,
        wait: WaitCondition,
        timeout: Duration,
    ) -> Result<(), BrowserRuntimeError> {
        match tokio::time::timeout(timeout, self.navigate_and_wait(url, wait)).await {
            Ok(result) => result,
            Err(_) => Err(BrowserRuntimeError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<JsonValue, BrowserRuntimeError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|err| BrowserRuntimeError::Script(err.to_string()))?;
        match result.value() {
            Some(value) => Ok(value.clone()),
            None => Ok(JsonValue::Null),
        }
    }

    async fn current_url(&self) -> Result<String, BrowserRuntimeError> {
        let url = self.page.url().await.map_err(map_chromiumoxide_error)?;
        Ok(url.unwrap_or_default())
    }
}

fn build_config(options: &LaunchOptions) -> Result<BrowserConfig, BrowserRuntimeError> {
    let viewport = chromiumoxide::handler::viewport::Viewport {
        width: options.viewport.width,
        height: options.viewport.height,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: options.viewport.width >= options.viewport.height,
        has_touch: false,
    };

    let mut builder = BrowserConfig::builder();

    if let Some(path) = &options.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    let builder = builder.viewport(viewport).args(options.args.clone());

    let builder = if options.headless {
        builder
    } else {
        builder.with_head()
    };

    let builder = if options.ignore_https_errors {
        builder
    } else {
        builder.respect_https_errors()
    };

    let builder = match &options.user_data_dir {
        Some(dir) => builder.user_data_dir(dir),
        None => builder,
    };

    let builder = if options.locale.is_empty() {
        builder
    } else {
        builder.arg(format!("--lang={}", options.locale))
    };

    let builder = if options.timezone_id.is_empty() {
        builder
    } else {
        builder.arg(format!("--timezone={}", options.timezone_id))
    };

    builder.build().map_err(BrowserRuntimeError::Launch)
}

fn map_chromiumoxide_error<E: std::fmt::Display>(err: E) -> BrowserRuntimeError {
    BrowserRuntimeError::Message(err.to_string())
}

fn spawn_handler(mut handler: chromiumoxide::handler::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = handler.next().await {
            if let Err(err) = result {
                log::debug!(target: "wayfinder", "chromiumoxide handler error: {err}");
            }
        }
    })
}
