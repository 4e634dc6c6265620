//! Page loader: render a URL, tag its interactive elements and extract a
//! [`PageSnapshot`], retrying transient rendering failures.
//!
//! Every `load` call owns at most one browser session at a time. A failed
//! attempt closes its session and the next attempt launches a fresh one; the
//! session left at the end is closed before `load` returns. If the `load`
//! future is dropped mid-flight, [`SessionScope`] schedules the close on the
//! current runtime.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value as JsonValue, json};
use thiserror::Error;

use crate::browser::{
    BrowserError, BrowserLauncher, BrowserRuntimeError, BrowserSession, LaunchOptions,
    WaitCondition,
};
use crate::config::WayfinderConfig;
use crate::dom_scripts::{SCROLL_HALF_SCRIPT, TAG_ELEMENTS_SCRIPT};
use crate::extractor;
use crate::logging::WayfinderLogger;
use crate::types::PageSnapshot;

const LOG_CATEGORY: &str = "loader";

/// Terminal load failure after the retry budget is spent.
#[derive(Debug, Error)]
#[error("failed to load {url} after {attempts} attempt(s): {source}")]
pub struct LoadError {
    pub url: String,
    pub attempts: u32,
    #[source]
    pub source: BrowserRuntimeError,
}

/// Timing and retry knobs for [`PageLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSettings {
    pub navigation_timeout: Duration,
    pub settle_delay: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub wait_condition: WaitCondition,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self::from_config(&WayfinderConfig::default())
    }
}

impl LoadSettings {
    pub fn from_config(config: &WayfinderConfig) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout(),
            settle_delay: config.settle_delay(),
            max_attempts: config.max_load_attempts.max(1),
            retry_backoff: config.retry_backoff(),
            wait_condition: WaitCondition::DomContentLoaded,
        }
    }
}

/// Loads pages through a [`BrowserLauncher`].
pub struct PageLoader<L> {
    launcher: L,
    launch_options: LaunchOptions,
    settings: LoadSettings,
    logger: Arc<WayfinderLogger>,
}

impl<L: BrowserLauncher> PageLoader<L> {
    pub fn new(
        launcher: L,
        launch_options: LaunchOptions,
        settings: LoadSettings,
        logger: Arc<WayfinderLogger>,
    ) -> Self {
        Self {
            launcher,
            launch_options,
            settings,
            logger,
        }
    }

    pub fn from_config(
        launcher: L,
        config: &WayfinderConfig,
        logger: Arc<WayfinderLogger>,
    ) -> Result<Self, BrowserError> {
        Ok(Self::new(
            launcher,
            LaunchOptions::from_config(config)?,
            LoadSettings::from_config(config),
            logger,
        ))
    }

    pub fn settings(&self) -> &LoadSettings {
        &self.settings
    }

    pub fn launch_options(&self) -> &LaunchOptions {
        &self.launch_options
    }

    /// Render `url` and return its snapshot, retrying up to the configured
    /// number of attempts.
    pub async fn load(&self, url: &str) -> Result<PageSnapshot, LoadError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut scope = SessionScope::new(&self.launcher, &self.launch_options);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.logger.info(
                format!("loading {url}"),
                Some(LOG_CATEGORY),
                Some(json!({ "attempt": attempt, "maxAttempts": max_attempts })),
            );

            match self.attempt(&mut scope, url).await {
                Ok(snapshot) => {
                    scope.release(&self.logger).await;
                    self.logger.info(
                        format!("loaded {}", snapshot.current_url),
                        Some(LOG_CATEGORY),
                        Some(json!({ "elements": snapshot.elements.len(), "attempt": attempt })),
                    );
                    return Ok(snapshot);
                }
                Err(err) => {
                    self.logger.error(
                        format!("attempt {attempt} for {url} failed: {err}"),
                        Some(LOG_CATEGORY),
                        None,
                    );
                    scope.release(&self.logger).await;

                    if attempt >= max_attempts {
                        return Err(LoadError {
                            url: url.to_string(),
                            attempts: attempt,
                            source: err,
                        });
                    }
                    if !self.settings.retry_backoff.is_zero() {
                        tokio::time::sleep(self.settings.retry_backoff).await;
                    }
                }
            }
        }
    }

    async fn attempt(
        &self,
        scope: &mut SessionScope<'_, L>,
        url: &str,
    ) -> Result<PageSnapshot, BrowserRuntimeError> {
        let session = scope.session().await?;
        let page = session.new_page().await?;

        page.goto(
            url,
            self.settings.wait_condition,
            self.settings.navigation_timeout,
        )
        .await?;
        page.evaluate(SCROLL_HALF_SCRIPT).await?;
        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        let html = match page.evaluate(TAG_ELEMENTS_SCRIPT).await? {
            JsonValue::String(html) => html,
            other => {
                return Err(BrowserRuntimeError::Script(format!(
                    "tagging script returned {} instead of a string",
                    json_kind(&other)
                )));
            }
        };

        let current_url = page.current_url().await?;
        let current_url = if current_url.is_empty() {
            url.to_string()
        } else {
            current_url
        };

        let extracted = extractor::extract(&html, &current_url);
        Ok(PageSnapshot {
            current_url,
            title: extracted.title,
            elements: extracted.elements,
            html,
        })
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Owns the browser session of one `load` call.
///
/// The session is launched lazily, closed by [`SessionScope::release`], and
/// closed in the background if the scope is dropped while still holding it.
pub(crate) struct SessionScope<'a, L: ?Sized> {
    launcher: &'a L,
    options: &'a LaunchOptions,
    session: Option<Box<dyn BrowserSession>>,
}

impl<'a, L: BrowserLauncher + ?Sized> SessionScope<'a, L> {
    pub(crate) fn new(launcher: &'a L, options: &'a LaunchOptions) -> Self {
        Self {
            launcher,
            options,
            session: None,
        }
    }

    async fn session(&mut self) -> Result<&mut Box<dyn BrowserSession>, BrowserRuntimeError> {
        if self.session.is_none() {
            let session = self.launcher.launch(self.options).await?;
            self.session = Some(session);
        }
        self.session.as_mut().ok_or(BrowserRuntimeError::Closed)
    }

    async fn release(&mut self, logger: &WayfinderLogger) {
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.close().await {
                logger.debug(
                    format!("closing browser session failed: {err}"),
                    Some(LOG_CATEGORY),
                    None,
                );
            }
        }
    }
}

impl<L: ?Sized> Drop for SessionScope<'_, L> {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = session.close().await {
                        log::debug!(target: "wayfinder", "background session close failed: {err}");
                    }
                });
            }
            Err(_) => {
                log::warn!(target: "wayfinder", "no runtime available to close abandoned browser session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserPage;
    use crate::config::Verbosity;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum GotoOutcome {
        Ok,
        Fail,
        Hang,
    }

    #[derive(Default)]
    struct Recorded {
        launches: usize,
        closes: usize,
        gotos: Vec<String>,
        outcomes: VecDeque<GotoOutcome>,
    }

    #[derive(Clone)]
    struct FakeLauncher {
        state: Arc<Mutex<Recorded>>,
        html: String,
        final_url: String,
    }

    impl FakeLauncher {
        fn new(outcomes: &[GotoOutcome]) -> Self {
            let state = Recorded {
                outcomes: outcomes.iter().copied().collect(),
                ..Default::default()
            };
            Self {
                state: Arc::new(Mutex::new(state)),
                html: r#"<html><head><title>Home</title></head><body>
                    <a data-ai-id="ai-id-0" href="/contact">Contact</a>
                </body></html>"#
                    .to_string(),
                final_url: "https://example.com/".to_string(),
            }
        }

        fn launches(&self) -> usize {
            self.state.lock().unwrap().launches
        }

        fn closes(&self) -> usize {
            self.state.lock().unwrap().closes
        }

        fn gotos(&self) -> usize {
            self.state.lock().unwrap().gotos.len()
        }
    }

    struct FakeSession {
        launcher: FakeLauncher,
        closed: bool,
    }

    struct FakePage {
        launcher: FakeLauncher,
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(
            &self,
            _options: &LaunchOptions,
        ) -> Result<Box<dyn BrowserSession>, BrowserRuntimeError> {
            self.state.lock().unwrap().launches += 1;
            Ok(Box::new(FakeSession {
                launcher: self.clone(),
                closed: false,
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, BrowserRuntimeError> {
            Ok(Box::new(FakePage {
                launcher: self.launcher.clone(),
            }))
        }

        async fn close(&mut self) -> Result<(), BrowserRuntimeError> {
            if !self.closed {
                self.closed = true;
                self.launcher.state.lock().unwrap().closes += 1;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserPage for FakePage {
        async fn goto(
            &self,
            url: &str,
            _wait: WaitCondition,
            _timeout: Duration,
        ) -> Result<(), BrowserRuntimeError> {
            let outcome = {
                let mut state = self.launcher.state.lock().unwrap();
                state.gotos.push(url.to_string());
                state.outcomes.pop_front().unwrap_or(GotoOutcome::Ok)
            };
            match outcome {
                GotoOutcome::Ok => Ok(()),
                GotoOutcome::Fail => Err(BrowserRuntimeError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_CONNECTION_RESET".to_string(),
                }),
                GotoOutcome::Hang => std::future::pending::<Result<(), BrowserRuntimeError>>().await,
            }
        }

        async fn evaluate(&self, script: &str) -> Result<JsonValue, BrowserRuntimeError> {
            if script == TAG_ELEMENTS_SCRIPT {
                Ok(JsonValue::String(self.launcher.html.clone()))
            } else {
                Ok(JsonValue::Bool(true))
            }
        }

        async fn current_url(&self) -> Result<String, BrowserRuntimeError> {
            Ok(self.launcher.final_url.clone())
        }
    }

    fn loader(launcher: FakeLauncher) -> PageLoader<FakeLauncher> {
        let settings = LoadSettings {
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::ZERO,
            max_attempts: 3,
            retry_backoff: Duration::ZERO,
            wait_condition: WaitCondition::DomContentLoaded,
        };
        PageLoader::new(
            launcher,
            LaunchOptions::default(),
            settings,
            Arc::new(WayfinderLogger::new(Verbosity::Minimal)),
        )
    }

    #[tokio::test]
    async fn two_failures_then_success_uses_three_attempts() {
        let launcher = FakeLauncher::new(&[GotoOutcome::Fail, GotoOutcome::Fail, GotoOutcome::Ok]);
        let snapshot = loader(launcher.clone())
            .load("https://example.com")
            .await
            .expect("third attempt succeeds");

        assert_eq!(launcher.gotos(), 3);
        assert_eq!(launcher.launches(), 3);
        assert_eq!(launcher.closes(), 3);
        assert_eq!(snapshot.current_url, "https://example.com/");
        assert_eq!(snapshot.title, "Home");
        assert_eq!(snapshot.elements.len(), 1);
        assert_eq!(
            snapshot.elements[0].href.as_deref(),
            Some("https://example.com/contact")
        );
        assert!(snapshot.html.contains("data-ai-id"));
    }

    #[tokio::test]
    async fn exhausting_attempts_returns_load_error_without_extra_attempt() {
        let launcher = FakeLauncher::new(&[
            GotoOutcome::Fail,
            GotoOutcome::Fail,
            GotoOutcome::Fail,
            GotoOutcome::Ok,
        ]);
        let err = loader(launcher.clone())
            .load("https://example.com")
            .await
            .expect_err("all attempts fail");

        assert_eq!(err.attempts, 3);
        assert_eq!(err.url, "https://example.com");
        assert!(matches!(err.source, BrowserRuntimeError::Navigation { .. }));
        assert_eq!(launcher.gotos(), 3);
        assert_eq!(launcher.closes(), launcher.launches());
    }

    #[tokio::test]
    async fn first_try_success_launches_one_session() {
        let launcher = FakeLauncher::new(&[]);
        loader(launcher.clone())
            .load("https://example.com")
            .await
            .expect("success");
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn cancelled_load_still_closes_its_session() {
        let launcher = FakeLauncher::new(&[GotoOutcome::Hang]);
        let loader = loader(launcher.clone());

        let result =
            tokio::time::timeout(Duration::from_millis(50), loader.load("https://example.com"))
                .await;
        assert!(result.is_err(), "load should still be pending");

        for _ in 0..10 {
            if launcher.closes() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn non_string_tagging_result_is_an_attempt_failure() {
        struct NullPage;

        #[async_trait]
        impl BrowserPage for NullPage {
            async fn goto(
                &self,
                _url: &str,
                _wait: WaitCondition,
                _timeout: Duration,
            ) -> Result<(), BrowserRuntimeError> {
                Ok(())
            }

            async fn evaluate(&self, _script: &str) -> Result<JsonValue, BrowserRuntimeError> {
                Ok(JsonValue::Null)
            }

            async fn current_url(&self) -> Result<String, BrowserRuntimeError> {
                Ok(String::new())
            }
        }

        struct NullSession;

        #[async_trait]
        impl BrowserSession for NullSession {
            async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, BrowserRuntimeError> {
                Ok(Box::new(NullPage))
            }

            async fn close(&mut self) -> Result<(), BrowserRuntimeError> {
                Ok(())
            }
        }

        struct NullLauncher;

        #[async_trait]
        impl BrowserLauncher for NullLauncher {
            async fn launch(
                &self,
                _options: &LaunchOptions,
            ) -> Result<Box<dyn BrowserSession>, BrowserRuntimeError> {
                Ok(Box::new(NullSession))
            }
        }

        let loader = PageLoader::new(
            NullLauncher,
            LaunchOptions::default(),
            LoadSettings {
                settle_delay: Duration::ZERO,
                retry_backoff: Duration::ZERO,
                max_attempts: 1,
                ..LoadSettings::default()
            },
            Arc::new(WayfinderLogger::new(Verbosity::Minimal)),
        );
        let err = loader.load("https://example.com").await.expect_err("null html");
        assert_eq!(err.attempts, 1);
        assert!(err.source.to_string().contains("null"));
    }
}
