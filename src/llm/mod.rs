//! Language model client abstractions.
//!
//! This module houses the provider-agnostic client interface along with an
//! OpenAI-compatible implementation powered by the `async-openai` crate. The
//! default endpoint is Gemini's OpenAI-compatible API.

pub mod client;
pub mod error;
pub mod openai;
pub mod prompts;
pub mod provider;

pub use client::{ChatCompletionOptions, LlmClient, MetricsCallback};
pub use error::LlmError;
pub use openai::OpenAiChatProvider;
pub use provider::ChatCompletionProvider;
