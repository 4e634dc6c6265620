use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse, ResponseFormat,
};

use crate::config::{LoggerCallback, WayfinderConfig};

use super::error::LlmError;
use super::openai::OpenAiChatProvider;
use super::provider::ChatCompletionProvider;

/// Callback invoked after a successful completion to capture metrics.
pub type MetricsCallback =
    Arc<dyn Fn(&CreateChatCompletionResponse, Duration, Option<&str>) + Send + Sync + 'static>;

/// Optional parameters that influence chat completion requests.
#[derive(Debug, Default, Clone)]
pub struct ChatCompletionOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_completion_tokens: Option<u32>,
    pub response_format: Option<ResponseFormat>,
}

impl ChatCompletionOptions {
    /// Options requesting a bare JSON object reply.
    pub fn json_object() -> Self {
        Self {
            response_format: Some(ResponseFormat::JsonObject),
            ..Default::default()
        }
    }
}

/// Provider-neutral LLM client.
pub struct LlmClient<P: ChatCompletionProvider> {
    provider: P,
    default_model: String,
    logger: Option<LoggerCallback>,
    metrics_callback: Option<MetricsCallback>,
}

impl<P> fmt::Debug for LlmClient<P>
where
    P: ChatCompletionProvider + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider)
            .field("default_model", &self.default_model)
            .field("logger_attached", &self.logger.is_some())
            .field("metrics_callback", &self.metrics_callback.is_some())
            .finish()
    }
}

impl<P: ChatCompletionProvider> LlmClient<P> {
    /// Create a new client with the supplied provider and default model.
    pub fn new(default_model: impl Into<String>, provider: P) -> Self {
        Self {
            provider,
            default_model: default_model.into(),
            logger: None,
            metrics_callback: None,
        }
    }

    /// Attach a logger callback for request/response debug lines.
    pub fn with_logger(mut self, logger: Option<LoggerCallback>) -> Self {
        self.logger = logger;
        self
    }

    /// Attach a metrics callback invoked after successful completions.
    pub fn with_metrics_callback(mut self, callback: Option<MetricsCallback>) -> Self {
        self.metrics_callback = callback;
        self
    }

    pub fn set_logger(&mut self, logger: Option<LoggerCallback>) {
        self.logger = logger;
    }

    pub fn set_metrics_callback(&mut self, callback: Option<MetricsCallback>) {
        self.metrics_callback = callback;
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Access the underlying provider (primarily for testing).
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Construct an [`async_openai`] chat completion request using the provided messages and options.
    pub fn build_request(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        options: ChatCompletionOptions,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let ChatCompletionOptions {
            model,
            temperature,
            max_completion_tokens,
            response_format,
        } = options;
        let model = model.unwrap_or_else(|| self.default_model.clone());

        if model.trim().is_empty() {
            return Err(LlmError::MissingDefaultModel);
        }

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(model);
        builder.messages(messages);
        if let Some(temperature) = temperature {
            builder.temperature(temperature);
        }
        if let Some(max_completion_tokens) = max_completion_tokens {
            builder.max_completion_tokens(max_completion_tokens);
        }
        if let Some(response_format) = response_format {
            builder.response_format(response_format);
        }

        builder
            .build()
            .map_err(|err| LlmError::InvalidRequest(err.to_string()))
    }

    /// Create a chat completion from raw messages.
    pub async fn create_chat_completion(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        options: ChatCompletionOptions,
        function_name: Option<&str>,
    ) -> Result<CreateChatCompletionResponse, LlmError> {
        let request = self.build_request(messages, options)?;
        self.execute_request(request, function_name).await
    }

    /// Send a system + user prompt pair and return the text of the first choice.
    pub async fn complete_text(
        &self,
        system_prompt: &str,
        user_message: &str,
        options: ChatCompletionOptions,
        function_name: Option<&str>,
    ) -> Result<String, LlmError> {
        let messages = vec![system_message(system_prompt)?, user_message_of(user_message)?];
        let response = self
            .create_chat_completion(messages, options, function_name)
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    async fn execute_request(
        &self,
        request: CreateChatCompletionRequest,
        function_name: Option<&str>,
    ) -> Result<CreateChatCompletionResponse, LlmError> {
        let model = request.model.clone();
        self.log_debug(&format!(
            "Sending chat completion request to model={} function={}",
            model,
            function_name.unwrap_or("n/a")
        ));

        let start = Instant::now();
        match self.provider.create_chat_completion(request).await {
            Ok(response) => {
                let elapsed = start.elapsed();
                if let Some(callback) = &self.metrics_callback {
                    callback(&response, elapsed, function_name);
                }
                self.log_debug(&format!(
                    "Chat completion succeeded: model={} duration={}ms",
                    model,
                    elapsed.as_millis()
                ));
                Ok(response)
            }
            Err(err) => {
                self.log_error(&format!(
                    "Chat completion failed for model={}: {}",
                    model, err
                ));
                Err(LlmError::OpenAi(err))
            }
        }
    }

    fn log_debug(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger(&format!("[llm][debug] {message}"));
        }
    }

    fn log_error(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger(&format!("[llm][error] {message}"));
        }
    }
}

impl LlmClient<OpenAiChatProvider> {
    /// Convenience constructor that wires the OpenAI-compatible provider from
    /// configuration.
    pub fn from_config(
        config: &WayfinderConfig,
        metrics_callback: Option<MetricsCallback>,
    ) -> Result<Self, LlmError> {
        let provider = OpenAiChatProvider::from_config(config)?;
        let mut client = LlmClient::new(config.model_name.as_str(), provider);
        client.set_logger(config.logger.clone());
        client.set_metrics_callback(metrics_callback);
        Ok(client)
    }
}

fn system_message(content: &str) -> Result<ChatCompletionRequestMessage, LlmError> {
    let message = ChatCompletionRequestSystemMessageArgs::default()
        .content(ChatCompletionRequestSystemMessageContent::Text(
            content.to_string(),
        ))
        .build()
        .map_err(|err| LlmError::InvalidRequest(err.to_string()))?;
    Ok(ChatCompletionRequestMessage::System(message))
}

fn user_message_of(content: &str) -> Result<ChatCompletionRequestMessage, LlmError> {
    let message = ChatCompletionRequestUserMessageArgs::default()
        .content(ChatCompletionRequestUserMessageContent::Text(
            content.to_string(),
        ))
        .build()
        .map_err(|err| LlmError::InvalidRequest(err.to_string()))?;
    Ok(ChatCompletionRequestMessage::User(message))
}
