//! The decide/act loop.
//!
//! A run alternates between loading a page and asking the decision oracle
//! what to do with it until the oracle asks for extraction (`Done`) or the
//! run cannot continue (`Failed`). Every run ends in one of those two states.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::browser::BrowserLauncher;
use crate::llm::ChatCompletionProvider;
use crate::loader::PageLoader;
use crate::logging::WayfinderLogger;
use crate::oracle::{DecisionOracle, ExtractionOracle};
use crate::types::{Decision, ExtractionResult, NavigateDetails, PageSnapshot};

const LOG_CATEGORY: &str = "navigator";

/// Terminal result of a navigation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NavigationOutcome {
    Done {
        url: String,
        data: ExtractionResult,
        steps: Vec<NavigationStep>,
    },
    Failed {
        reason: String,
        steps: Vec<NavigationStep>,
    },
}

impl NavigationOutcome {
    pub fn steps(&self) -> &[NavigationStep] {
        match self {
            NavigationOutcome::Done { steps, .. } | NavigationOutcome::Failed { steps, .. } => {
                steps
            }
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, NavigationOutcome::Done { .. })
    }
}

/// One page visited during a run and what the oracle decided there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NavigationStep {
    pub requested_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub element_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NavigationStep {
    fn loaded(requested_url: &str, snapshot: &PageSnapshot) -> Self {
        Self {
            requested_url: requested_url.to_string(),
            current_url: Some(snapshot.current_url.clone()),
            title: Some(snapshot.title.clone()),
            element_count: snapshot.elements.len(),
            decision: None,
            error: None,
        }
    }

    fn load_failed(requested_url: &str, error: String) -> Self {
        Self {
            requested_url: requested_url.to_string(),
            current_url: None,
            title: None,
            element_count: 0,
            decision: None,
            error: Some(error),
        }
    }
}

/// Bounds applied to a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Maximum number of page loads.
    pub max_steps: u32,
    /// End-to-end deadline; `None` disables it.
    pub deadline: Option<Duration>,
}

enum LoopState {
    Loading(String),
    Deciding(PageSnapshot),
    Scraping(PageSnapshot),
    Failed(String),
}

enum Terminal {
    Done { url: String, data: ExtractionResult },
    Failed(String),
}

/// Drives one goal from a start URL to a terminal state.
pub struct Navigator<'a, L, P: ChatCompletionProvider> {
    loader: &'a PageLoader<L>,
    decision_oracle: &'a DecisionOracle<P>,
    extraction_oracle: &'a ExtractionOracle<P>,
    limits: RunLimits,
    logger: &'a WayfinderLogger,
}

impl<'a, L, P> Navigator<'a, L, P>
where
    L: BrowserLauncher,
    P: ChatCompletionProvider,
{
    pub fn new(
        loader: &'a PageLoader<L>,
        decision_oracle: &'a DecisionOracle<P>,
        extraction_oracle: &'a ExtractionOracle<P>,
        limits: RunLimits,
        logger: &'a WayfinderLogger,
    ) -> Self {
        Self {
            loader,
            decision_oracle,
            extraction_oracle,
            limits,
            logger,
        }
    }

    pub async fn run(&self, goal: &str, start_url: &str) -> NavigationOutcome {
        self.logger.info(
            format!("starting run for goal: {goal}"),
            Some(LOG_CATEGORY),
            Some(json!({ "startUrl": start_url, "maxSteps": self.limits.max_steps })),
        );

        let mut steps = Vec::new();
        let terminal = match self.limits.deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.drive(goal, start_url, &mut steps)).await
                {
                    Ok(terminal) => terminal,
                    Err(_) => Terminal::Failed(format!(
                        "run exceeded its deadline of {}ms",
                        deadline.as_millis()
                    )),
                }
            }
            None => self.drive(goal, start_url, &mut steps).await,
        };

        match terminal {
            Terminal::Done { url, data } => {
                self.logger.info(
                    format!("run finished at {url}"),
                    Some(LOG_CATEGORY),
                    Some(json!({ "pages": steps.len() })),
                );
                NavigationOutcome::Done { url, data, steps }
            }
            Terminal::Failed(reason) => {
                self.logger.error(
                    format!("run failed: {reason}"),
                    Some(LOG_CATEGORY),
                    Some(json!({ "pages": steps.len() })),
                );
                NavigationOutcome::Failed { reason, steps }
            }
        }
    }

    async fn drive(&self, goal: &str, start_url: &str, steps: &mut Vec<NavigationStep>) -> Terminal {
        let mut state = LoopState::Loading(start_url.to_string());
        let mut loads = 0u32;

        loop {
            state = match state {
                LoopState::Loading(url) => {
                    if loads >= self.limits.max_steps {
                        LoopState::Failed(format!(
                            "step limit of {} page loads reached before reaching the goal",
                            self.limits.max_steps
                        ))
                    } else {
                        loads += 1;
                        match self.loader.load(&url).await {
                            Ok(snapshot) => {
                                steps.push(NavigationStep::loaded(&url, &snapshot));
                                LoopState::Deciding(snapshot)
                            }
                            Err(err) => {
                                let reason = err.to_string();
                                steps.push(NavigationStep::load_failed(&url, reason.clone()));
                                LoopState::Failed(reason)
                            }
                        }
                    }
                }
                LoopState::Deciding(snapshot) => {
                    let decision = self
                        .decision_oracle
                        .decide(goal, &snapshot.current_url, &snapshot.elements)
                        .await;
                    if let Some(step) = steps.last_mut() {
                        step.decision = Some(decision.clone());
                    }

                    match decision {
                        Decision::Navigate(details) => match resolve_target(&details, &snapshot) {
                            Ok(next) => {
                                self.logger.debug(
                                    format!("following {next}"),
                                    Some(LOG_CATEGORY),
                                    None,
                                );
                                LoopState::Loading(next)
                            }
                            Err(reason) => LoopState::Failed(reason),
                        },
                        Decision::Scrape(_) => LoopState::Scraping(snapshot),
                        Decision::Fail(details) if details.reason.trim().is_empty() => {
                            LoopState::Failed("decision oracle gave up without a reason".into())
                        }
                        Decision::Fail(details) => LoopState::Failed(details.reason),
                    }
                }
                LoopState::Scraping(snapshot) => {
                    match self
                        .extraction_oracle
                        .extract_data(goal, &snapshot.html)
                        .await
                    {
                        Ok(data) => {
                            return Terminal::Done {
                                url: snapshot.current_url,
                                data,
                            };
                        }
                        Err(err) => LoopState::Failed(err.to_string()),
                    }
                }
                LoopState::Failed(reason) => return Terminal::Failed(reason),
            };
        }
    }
}

/// Work out the next URL for a navigate decision: an explicit target URL
/// (joined against the current page) wins over the href of the named element.
pub fn resolve_target(details: &NavigateDetails, snapshot: &PageSnapshot) -> Result<String, String> {
    if let Some(target) = details
        .target_url
        .as_deref()
        .map(str::trim)
        .filter(|target| !target.is_empty())
    {
        let resolved = Url::parse(&snapshot.current_url)
            .and_then(|base| base.join(target))
            .or_else(|_| Url::parse(target));
        return resolved
            .map(|url| url.to_string())
            .map_err(|err| format!("cannot resolve navigation target {target}: {err}"));
    }

    let Some(id) = details.target_id.as_deref() else {
        return Err("navigate decision names neither an element nor a url".to_string());
    };
    let element = snapshot
        .element(id)
        .ok_or_else(|| format!("navigate decision references unknown element {id}"))?;
    element
        .href
        .clone()
        .filter(|href| !href.trim().is_empty())
        .ok_or_else(|| format!("element {id} ({}) has no link to follow", element.tag))
}
