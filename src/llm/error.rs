use thiserror::Error;

use async_openai::error::OpenAIError;

use crate::config::ConfigError;

/// Errors surfaced by the LLM client layer.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("missing default model configuration")]
    MissingDefaultModel,
    #[error("invalid chat completion request: {0}")]
    InvalidRequest(String),
    #[error("model returned no message content")]
    EmptyResponse,
    #[error(transparent)]
    OpenAi(#[from] OpenAIError),
}
