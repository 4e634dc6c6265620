//! Reasoning oracles: the decision oracle picks the next navigation step and
//! the extraction oracle turns a final page into JSON.
//!
//! Both share the same reply discipline: markdown code fences are stripped
//! and the remainder must parse as JSON.

pub mod decision;
pub mod extraction;

use serde_json::Value;

use crate::config::WayfinderConfig;
use crate::llm::ChatCompletionOptions;

pub use decision::{DecisionOracle, parse_decision};
pub use extraction::{ExtractionError, ExtractionOracle, truncate_chars};

/// Remove every `` ```json `` and `` ``` `` marker and trim the result.
pub fn strip_code_fences(reply: &str) -> String {
    reply
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Strip fences and parse the reply as JSON.
pub fn parse_json_reply(reply: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(&strip_code_fences(reply))
}

/// Request settings shared by both oracles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OracleSettings {
    pub json_mode: bool,
    pub user_instructions: Option<String>,
}

impl OracleSettings {
    pub fn from_config(config: &WayfinderConfig) -> Self {
        Self {
            json_mode: config.json_mode,
            user_instructions: config.system_prompt.clone(),
        }
    }

    pub(crate) fn completion_options(&self) -> ChatCompletionOptions {
        if self.json_mode {
            ChatCompletionOptions::json_object()
        } else {
            ChatCompletionOptions::default()
        }
    }
}
