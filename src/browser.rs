//! Rendering capability consumed by the page loader.
//!
//! The loader never talks to a browser directly: it goes through the
//! [`BrowserLauncher`] / [`BrowserSession`] / [`BrowserPage`] traits so that
//! the retry and session-scoping logic can be exercised without Chrome. This
//! module also turns the JSON launch options from the configuration into a
//! typed [`LaunchOptions`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

use crate::config::WayfinderConfig;

type JsonObject = JsonMap<String, JsonValue>;

/// Error surfaced while constructing launch options.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to parse browser launch options: {source}")]
    InvalidLaunchOptions {
        #[source]
        source: serde_json::Error,
    },
}

/// Errors reported by a rendering backend.
#[derive(Debug, Error)]
pub enum BrowserRuntimeError {
    #[error("browser runtime error: {0}")]
    Message(String),
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("browser session already closed")]
    Closed,
}

/// Page lifecycle milestone that ends a navigation wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitCondition {
    /// `DOMContentLoaded`; trailing resources may still be loading.
    #[default]
    DomContentLoaded,
    /// The window `load` event.
    Load,
}

/// Launches isolated browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(
        &self,
        options: &LaunchOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserRuntimeError>;
}

/// A live browser process or connection.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, BrowserRuntimeError>;

    /// Release every resource held by the session. Must be safe to call once
    /// after any failure.
    async fn close(&mut self) -> Result<(), BrowserRuntimeError>;
}

/// A single tab within a [`BrowserSession`].
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(
        &self,
        url: &str,
        wait: WaitCondition,
        timeout: Duration,
    ) -> Result<(), BrowserRuntimeError>;

    async fn evaluate(&self, script: &str) -> Result<JsonValue, BrowserRuntimeError>;

    async fn current_url(&self) -> Result<String, BrowserRuntimeError>;
}

/// Typed browser launch options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchOptions {
    pub headless: bool,
    pub args: Vec<String>,
    pub viewport: Viewport,
    pub locale: String,
    #[serde(rename = "timezoneId")]
    pub timezone_id: String,
    #[serde(rename = "ignoreHTTPSErrors")]
    pub ignore_https_errors: bool,
    #[serde(rename = "chromeExecutable")]
    pub chrome_executable: Option<PathBuf>,
    #[serde(rename = "userDataDir")]
    pub user_data_dir: Option<PathBuf>,
}

/// Overrides accepted in the `browser_launch_options` JSON object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LaunchOverrides {
    pub headless: Option<bool>,
    pub args: Option<Vec<String>>,
    pub viewport: Option<Viewport>,
    pub locale: Option<String>,
    #[serde(alias = "timezone_id")]
    pub timezone_id: Option<String>,
    #[serde(alias = "ignore_https_errors", rename = "ignoreHTTPSErrors")]
    pub ignore_https_errors: Option<bool>,
    #[serde(alias = "chrome_executable")]
    pub chrome_executable: Option<String>,
    #[serde(alias = "user_data_dir")]
    pub user_data_dir: Option<String>,
}

/// Viewport dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 1288,
            height: 711,
        }
    }
}

impl Default for LaunchOptions {
    fn default() -> Self {
        LaunchOptions {
            headless: true,
            args: default_args(),
            viewport: Viewport::default(),
            locale: "en-US".to_string(),
            timezone_id: "America/New_York".to_string(),
            ignore_https_errors: true,
            chrome_executable: None,
            user_data_dir: None,
        }
    }
}

impl LaunchOptions {
    /// Build launch options from the configuration's headless flag and JSON
    /// overrides.
    pub fn from_config(config: &WayfinderConfig) -> Result<Self, BrowserError> {
        let overrides: LaunchOverrides =
            serde_json::from_value(JsonValue::Object(config.browser_launch_options.clone()))
                .map_err(|source| BrowserError::InvalidLaunchOptions { source })?;
        Ok(Self::with_overrides(config.headless, overrides))
    }

    pub fn with_overrides(headless: bool, overrides: LaunchOverrides) -> Self {
        let defaults = LaunchOptions::default();
        LaunchOptions {
            headless: overrides.headless.unwrap_or(headless),
            args: overrides.args.unwrap_or(defaults.args),
            viewport: overrides.viewport.unwrap_or_default(),
            locale: overrides.locale.unwrap_or(defaults.locale),
            timezone_id: overrides.timezone_id.unwrap_or(defaults.timezone_id),
            ignore_https_errors: overrides
                .ignore_https_errors
                .unwrap_or(defaults.ignore_https_errors),
            chrome_executable: overrides.chrome_executable.map(PathBuf::from),
            user_data_dir: overrides.user_data_dir.map(PathBuf::from),
        }
    }
}

fn default_args() -> Vec<String> {
    vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
    ]
}
