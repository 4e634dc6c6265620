use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::llm::prompts::{build_extract_system_prompt, build_extract_user_message};
use crate::llm::{ChatCompletionProvider, LlmClient, LlmError};
use crate::logging::WayfinderLogger;
use crate::metrics::OracleFunction;
use crate::types::ExtractionResult;

use super::{OracleSettings, parse_json_reply};

const LOG_CATEGORY: &str = "extract";

/// Default number of HTML characters sent to the backend.
pub const DEFAULT_HTML_LIMIT: usize = 50_000;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction backend failed: {0}")]
    Backend(#[from] LlmError),
    #[error("extraction reply is not valid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

/// Extracts goal-relevant data from a final page.
pub struct ExtractionOracle<P: ChatCompletionProvider> {
    llm: Arc<LlmClient<P>>,
    settings: OracleSettings,
    html_limit: usize,
    logger: Arc<WayfinderLogger>,
}

impl<P: ChatCompletionProvider> ExtractionOracle<P> {
    pub fn new(
        llm: Arc<LlmClient<P>>,
        settings: OracleSettings,
        html_limit: usize,
        logger: Arc<WayfinderLogger>,
    ) -> Self {
        Self {
            llm,
            settings,
            html_limit,
            logger,
        }
    }

    pub fn html_limit(&self) -> usize {
        self.html_limit
    }

    /// Extract goal-relevant JSON from `html`, sending at most the
    /// first `html_limit` characters.
    pub async fn extract_data(
        &self,
        goal: &str,
        html: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let excerpt = truncate_chars(html, self.html_limit);
        self.logger.info(
            format!("extracting data for goal: {goal}"),
            Some(LOG_CATEGORY),
            Some(json!({
                "htmlChars": excerpt.chars().count(),
                "truncated": excerpt.len() < html.len(),
            })),
        );

        let system_prompt =
            build_extract_system_prompt(self.settings.user_instructions.as_deref());
        let user_message = build_extract_user_message(goal, excerpt);

        let reply = self
            .llm
            .complete_text(
                &system_prompt,
                &user_message,
                self.settings.completion_options(),
                Some(OracleFunction::Extract.as_str()),
            )
            .await
            .inspect_err(|err| {
                self.logger
                    .error(format!("extraction backend failed: {err}"), Some(LOG_CATEGORY), None)
            })?;

        let parsed = parse_extraction(&reply);
        if let Err(err) = &parsed {
            self.logger.error(err.to_string(), Some(LOG_CATEGORY), None);
        }
        parsed
    }
}

/// Parse a raw extraction reply. Any syntactically valid JSON is returned
/// unchanged; the shape is left to the caller's goal.
pub fn parse_extraction(reply: &str) -> Result<ExtractionResult, ExtractionError> {
    parse_json_reply(reply).map_err(|source| ExtractionError::InvalidJson { source })
}

/// Return the prefix of `text` holding at most `limit` characters.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
