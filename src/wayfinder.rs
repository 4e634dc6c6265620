//! High-level Wayfinder facade.
//!
//! [`Wayfinder`] owns the immutable configuration, the page loader and both
//! oracles, and exposes the entry points callers use: load a page, ask for a
//! next action, extract data, or run the whole navigation loop.

use std::sync::{Arc, Mutex};

use crate::browser::{BrowserError, BrowserLauncher};
use crate::config::{ConfigError, WayfinderConfig};
use crate::llm::{ChatCompletionProvider, LlmClient, LlmError, MetricsCallback, OpenAiChatProvider};
use crate::loader::{LoadError, PageLoader};
use crate::logging::WayfinderLogger;
use crate::metrics::{OracleFunction, OracleMetrics};
use crate::navigator::{NavigationOutcome, Navigator, RunLimits};
use crate::oracle::{DecisionOracle, ExtractionError, ExtractionOracle, OracleSettings};
use crate::runtime::ChromiumoxideLauncher;
use crate::types::{
    ApiEnvelope, Decision, ElementDescriptor, ExtractionResult, HealthStatus, NavigateRequest,
    PageSnapshot, ScrapeRequest, SuggestActionRequest,
};

/// Convenience error type surfaced by the [`Wayfinder`] facade.
#[derive(Debug, thiserror::Error)]
pub enum WayfinderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Goal-directed navigation agent.
pub struct Wayfinder<L, P: ChatCompletionProvider> {
    config: WayfinderConfig,
    logger: Arc<WayfinderLogger>,
    loader: PageLoader<L>,
    decision_oracle: DecisionOracle<P>,
    extraction_oracle: ExtractionOracle<P>,
    metrics: Arc<Mutex<OracleMetrics>>,
}

impl Wayfinder<ChromiumoxideLauncher, OpenAiChatProvider> {
    /// Build an agent backed by a local Chrome and the configured
    /// OpenAI-compatible endpoint. Fails when no credential is configured.
    pub fn from_config(config: WayfinderConfig) -> Result<Self, WayfinderError> {
        config.validate()?;
        let provider = OpenAiChatProvider::from_config(&config)?;
        Self::new(config, ChromiumoxideLauncher::new(), provider)
    }
}

impl<L, P> Wayfinder<L, P>
where
    L: BrowserLauncher,
    P: ChatCompletionProvider,
{
    /// Assemble an agent from explicit rendering and reasoning backends.
    pub fn new(config: WayfinderConfig, launcher: L, provider: P) -> Result<Self, WayfinderError> {
        config.validate()?;

        let logger = Arc::new(WayfinderLogger::from_config(&config));
        let metrics = Arc::new(Mutex::new(OracleMetrics::default()));
        let llm = Arc::new(
            LlmClient::new(config.model_name.as_str(), provider)
                .with_logger(config.logger.clone())
                .with_metrics_callback(Some(metrics_recorder(Arc::clone(&metrics)))),
        );
        let settings = OracleSettings::from_config(&config);

        let loader = PageLoader::from_config(launcher, &config, Arc::clone(&logger))?;
        let decision_oracle =
            DecisionOracle::new(Arc::clone(&llm), settings.clone(), Arc::clone(&logger));
        let extraction_oracle = ExtractionOracle::new(
            llm,
            settings,
            config.extraction_html_limit,
            Arc::clone(&logger),
        );

        Ok(Self {
            config,
            logger,
            loader,
            decision_oracle,
            extraction_oracle,
            metrics,
        })
    }

    pub fn config(&self) -> &WayfinderConfig {
        &self.config
    }

    pub fn logger(&self) -> &WayfinderLogger {
        &self.logger
    }

    /// Render `url` and return its snapshot.
    pub async fn navigate(&self, url: &str) -> Result<PageSnapshot, WayfinderError> {
        Ok(self.loader.load(url).await?)
    }

    /// Ask the decision oracle for the next action. Never fails.
    pub async fn suggest_action(
        &self,
        goal: &str,
        current_url: &str,
        elements: &[ElementDescriptor],
    ) -> Decision {
        self.decision_oracle
            .decide(goal, current_url, elements)
            .await
    }

    /// Extract goal-relevant data from `html`.
    pub async fn scrape(&self, goal: &str, html: &str) -> Result<ExtractionResult, WayfinderError> {
        Ok(self.extraction_oracle.extract_data(goal, html).await?)
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus::ok()
    }

    /// Run the full navigation loop from `start_url` until it reaches a
    /// terminal state.
    pub async fn run(&self, goal: &str, start_url: &str) -> NavigationOutcome {
        let limits = RunLimits {
            max_steps: self.config.max_steps,
            deadline: self.config.run_timeout(),
        };
        Navigator::new(
            &self.loader,
            &self.decision_oracle,
            &self.extraction_oracle,
            limits,
            &self.logger,
        )
        .run(goal, start_url)
        .await
    }

    /// Snapshot of the token and latency counters collected so far.
    pub fn metrics(&self) -> OracleMetrics {
        match self.metrics.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn handle_navigate(&self, request: NavigateRequest) -> ApiEnvelope<PageSnapshot> {
        ApiEnvelope::from_result(self.navigate(&request.url).await)
    }

    pub async fn handle_suggest_action(&self, request: SuggestActionRequest) -> ApiEnvelope<Decision> {
        ApiEnvelope::success(
            self.suggest_action(&request.goal, &request.current_url, &request.elements)
                .await,
        )
    }

    pub async fn handle_scrape(&self, request: ScrapeRequest) -> ApiEnvelope<ExtractionResult> {
        ApiEnvelope::from_result(self.scrape(&request.goal, &request.html_content).await)
    }
}

fn metrics_recorder(metrics: Arc<Mutex<OracleMetrics>>) -> MetricsCallback {
    Arc::new(move |response, elapsed, function| {
        let Some(function) = function.and_then(OracleFunction::parse) else {
            return;
        };
        let (prompt_tokens, completion_tokens) = response
            .usage
            .as_ref()
            .map(|usage| (u64::from(usage.prompt_tokens), u64::from(usage.completion_tokens)))
            .unwrap_or_default();
        if let Ok(mut guard) = metrics.lock() {
            guard.record(function, prompt_tokens, completion_tokens, elapsed);
        }
    })
}
