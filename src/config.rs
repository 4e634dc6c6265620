//! Strongly-typed configuration for the Wayfinder navigation agent.
//!
//! Configuration values can be constructed from defaults, loaded from
//! environment variables (with optional `.env` support), or merged with
//! explicit overrides. The resulting [`WayfinderConfig`] is built once at
//! process start and passed by reference to every component that needs it.

use std::env;
use std::fmt;
use std::num::ParseIntError;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use serde::de::{Deserialize, Deserializer, Error as DeError};
use serde::ser::{Serialize, Serializer};
use serde::{Deserialize as DeriveDeserialize, Serialize as DeriveSerialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

type JsonObject = JsonMap<String, JsonValue>;

/// Default reasoning model.
pub const DEFAULT_MODEL_NAME: &str = "gemini-1.5-flash";

/// OpenAI-compatible endpoint of the default model family.
pub const DEFAULT_MODEL_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Environment variables probed, in order, for the reasoning-backend credential.
pub const MODEL_API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "MODEL_API_KEY", "OPENAI_API_KEY"];

/// Shared logger callback signature used by the configuration.
pub type LoggerCallback = Arc<dyn Fn(&str) + Send + Sync + 'static>;

/// Verbosity level for Wayfinder logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Minimal,
    Medium,
    Detailed,
}

impl Verbosity {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Verbosity::Minimal => 0,
            Verbosity::Medium => 1,
            Verbosity::Detailed => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Verbosity::Minimal),
            1 => Some(Verbosity::Medium),
            2 => Some(Verbosity::Detailed),
            _ => None,
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Medium
    }
}

impl Serialize for Verbosity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Verbosity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Verbosity::from_u8(value).ok_or_else(|| {
            DeError::custom(format!(
                "invalid verbosity value {value}; expected 0, 1, or 2"
            ))
        })
    }
}

/// Configuration values for the Wayfinder agent.
#[derive(DeriveSerialize, DeriveDeserialize, Clone)]
#[serde(default)]
pub struct WayfinderConfig {
    #[serde(alias = "modelApiKey")]
    pub model_api_key: Option<String>,
    #[serde(alias = "modelName")]
    pub model_name: String,
    #[serde(alias = "modelApiBase")]
    pub model_api_base: Option<String>,
    #[serde(alias = "modelClientOptions")]
    pub model_client_options: Option<JsonObject>,
    #[serde(skip_serializing, skip_deserializing)]
    pub logger: Option<LoggerCallback>,
    pub verbose: Verbosity,
    pub headless: bool,
    #[serde(alias = "browserLaunchOptions")]
    pub browser_launch_options: JsonObject,
    #[serde(alias = "navigationTimeoutMs")]
    pub navigation_timeout_ms: u64,
    #[serde(alias = "settleDelayMs")]
    pub settle_delay_ms: u64,
    #[serde(alias = "maxLoadAttempts")]
    pub max_load_attempts: u32,
    #[serde(alias = "retryBackoffMs")]
    pub retry_backoff_ms: u64,
    #[serde(alias = "maxSteps")]
    pub max_steps: u32,
    #[serde(alias = "runTimeoutMs")]
    pub run_timeout_ms: Option<u64>,
    #[serde(alias = "extractionHtmlLimit")]
    pub extraction_html_limit: usize,
    #[serde(alias = "jsonMode")]
    pub json_mode: bool,
    #[serde(alias = "systemPrompt")]
    pub system_prompt: Option<String>,
}

impl Default for WayfinderConfig {
    fn default() -> Self {
        WayfinderConfig {
            model_api_key: None,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_api_base: Some(DEFAULT_MODEL_API_BASE.to_string()),
            model_client_options: None,
            logger: None,
            verbose: Verbosity::default(),
            headless: true,
            browser_launch_options: JsonObject::new(),
            navigation_timeout_ms: 30_000,
            settle_delay_ms: 1_000,
            max_load_attempts: 3,
            retry_backoff_ms: 2_000,
            max_steps: 10,
            run_timeout_ms: Some(300_000),
            extraction_html_limit: 50_000,
            json_mode: true,
            system_prompt: None,
        }
    }
}

impl WayfinderConfig {
    /// Construct a configuration by reading relevant environment variables, after
    /// loading a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv();
        let mut config = WayfinderConfig::default();

        if let Some(value) = MODEL_API_KEY_VARS.iter().find_map(|key| env_var(key)) {
            config.model_api_key = Some(value);
        }

        if let Some(value) = env_var("AI_MODEL_NAME").or_else(|| env_var("MODEL_NAME")) {
            config.model_name = value;
        }

        if let Some(value) = env_var("MODEL_API_BASE") {
            config.model_api_base = Some(value);
        }

        if let Some(value) = env_var("WAYFINDER_VERBOSE") {
            let parsed = parse_u8("WAYFINDER_VERBOSE", &value)?;
            config.verbose = Verbosity::from_u8(parsed).ok_or_else(|| {
                ConfigError::invalid_enum("WAYFINDER_VERBOSE", parsed.to_string())
            })?;
        }

        if let Some(value) = env_var("WAYFINDER_HEADLESS") {
            config.headless = parse_bool("WAYFINDER_HEADLESS", &value)?;
        }

        if let Some(value) = env_var("WAYFINDER_BROWSER_LAUNCH_OPTIONS") {
            config.browser_launch_options =
                parse_json_object("WAYFINDER_BROWSER_LAUNCH_OPTIONS", &value)?;
        }

        if let Some(value) = env_var("WAYFINDER_CHROME_BIN") {
            config
                .browser_launch_options
                .insert("chromeExecutable".to_string(), JsonValue::String(value));
        }

        if let Some(value) = env_var("WAYFINDER_NAVIGATION_TIMEOUT_MS") {
            config.navigation_timeout_ms = parse_u64("WAYFINDER_NAVIGATION_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = env_var("WAYFINDER_SETTLE_DELAY_MS") {
            config.settle_delay_ms = parse_u64("WAYFINDER_SETTLE_DELAY_MS", &value)?;
        }

        if let Some(value) = env_var("WAYFINDER_MAX_LOAD_ATTEMPTS") {
            config.max_load_attempts = parse_u32("WAYFINDER_MAX_LOAD_ATTEMPTS", &value)?;
        }

        if let Some(value) = env_var("WAYFINDER_RETRY_BACKOFF_MS") {
            config.retry_backoff_ms = parse_u64("WAYFINDER_RETRY_BACKOFF_MS", &value)?;
        }

        if let Some(value) = env_var("WAYFINDER_MAX_STEPS") {
            config.max_steps = parse_u32("WAYFINDER_MAX_STEPS", &value)?;
        }

        if let Some(value) = env_var("WAYFINDER_RUN_TIMEOUT_MS") {
            // 0 disables the end-to-end deadline.
            let parsed = parse_u64("WAYFINDER_RUN_TIMEOUT_MS", &value)?;
            config.run_timeout_ms = (parsed > 0).then_some(parsed);
        }

        if let Some(value) = env_var("WAYFINDER_EXTRACTION_HTML_LIMIT") {
            config.extraction_html_limit =
                parse_u64("WAYFINDER_EXTRACTION_HTML_LIMIT", &value)? as usize;
        }

        if let Some(value) = env_var("WAYFINDER_JSON_MODE") {
            config.json_mode = parse_bool("WAYFINDER_JSON_MODE", &value)?;
        }

        if let Some(value) = env_var("WAYFINDER_SYSTEM_PROMPT") {
            config.system_prompt = Some(value);
        }

        if let Some(value) = env_var("WAYFINDER_MODEL_CLIENT_OPTIONS") {
            config.model_client_options =
                Some(parse_json_object("WAYFINDER_MODEL_CLIENT_OPTIONS", &value)?);
        }

        Ok(config)
    }

    /// Return the reasoning-backend credential, failing when none was supplied.
    ///
    /// A missing credential is a startup condition: callers should check it
    /// once while building the process-wide configuration.
    pub fn require_model_api_key(&self) -> Result<&str, ConfigError> {
        self.model_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingCredential {
                vars: MODEL_API_KEY_VARS.join(", "),
            })
    }

    /// Validate settings that would otherwise fail deep inside a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.require_model_api_key()?;
        if self.model_name.trim().is_empty() {
            return Err(ConfigError::MissingModelName);
        }
        if self.max_load_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_load_attempts",
                value: 0,
            });
        }
        if self.max_steps == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_steps",
                value: 0,
            });
        }
        Ok(())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }

    /// Create a new configuration with explicit field overrides applied.
    pub fn with_overrides(&self, overrides: WayfinderConfigOverrides) -> WayfinderConfig {
        let mut next = self.clone();

        if let Some(value) = overrides.model_api_key {
            next.model_api_key = value;
        }
        if let Some(value) = overrides.model_name {
            next.model_name = value;
        }
        if let Some(value) = overrides.model_api_base {
            next.model_api_base = value;
        }
        if let Some(value) = overrides.logger {
            next.logger = value;
        }
        if let Some(value) = overrides.verbose {
            next.verbose = value;
        }
        if let Some(value) = overrides.headless {
            next.headless = value;
        }
        if let Some(value) = overrides.max_steps {
            next.max_steps = value;
        }
        if let Some(value) = overrides.run_timeout_ms {
            next.run_timeout_ms = value;
        }
        if let Some(value) = overrides.system_prompt {
            next.system_prompt = value;
        }

        next
    }
}

/// Field-level overrides for [`WayfinderConfig::with_overrides`].
#[derive(Default, Clone)]
pub struct WayfinderConfigOverrides {
    pub model_api_key: Option<Option<String>>,
    pub model_name: Option<String>,
    pub model_api_base: Option<Option<String>>,
    pub logger: Option<Option<LoggerCallback>>,
    pub verbose: Option<Verbosity>,
    pub headless: Option<bool>,
    pub max_steps: Option<u32>,
    pub run_timeout_ms: Option<Option<u64>>,
    pub system_prompt: Option<Option<String>>,
}

impl WayfinderConfigOverrides {
    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    pub fn max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = Some(max_steps);
        self
    }
}

impl fmt::Debug for WayfinderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WayfinderConfig")
            .field("model_api_key", &self.model_api_key.as_ref().map(|_| "<redacted>"))
            .field("model_name", &self.model_name)
            .field("model_api_base", &self.model_api_base)
            .field("model_client_options", &self.model_client_options)
            .field("verbose", &self.verbose)
            .field("headless", &self.headless)
            .field("browser_launch_options", &self.browser_launch_options)
            .field("navigation_timeout_ms", &self.navigation_timeout_ms)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("max_load_attempts", &self.max_load_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_steps", &self.max_steps)
            .field("run_timeout_ms", &self.run_timeout_ms)
            .field("extraction_html_limit", &self.extraction_html_limit)
            .field("json_mode", &self.json_mode)
            .field("system_prompt", &self.system_prompt)
            .field("logger_present", &self.logger.is_some())
            .finish()
    }
}

impl fmt::Debug for WayfinderConfigOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WayfinderConfigOverrides")
            .field(
                "model_api_key",
                &self.model_api_key.as_ref().map(|inner| inner.is_some()),
            )
            .field("model_name", &self.model_name)
            .field("model_api_base", &self.model_api_base)
            .field("logger", &self.logger.as_ref().map(|inner| inner.is_some()))
            .field("verbose", &self.verbose)
            .field("headless", &self.headless)
            .field("max_steps", &self.max_steps)
            .field("run_timeout_ms", &self.run_timeout_ms)
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

/// Errors that can arise while constructing a [`WayfinderConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing reasoning backend credential; set one of {vars}")]
    MissingCredential { vars: String },
    #[error("missing reasoning model name")]
    MissingModelName,
    #[error("{field} must be greater than zero (got {value})")]
    OutOfRange { field: &'static str, value: u64 },
    #[error("invalid value '{value}' for {field}")]
    InvalidEnumVariant { field: &'static str, value: String },
    #[error("invalid boolean '{value}' for {field}")]
    InvalidBool { field: &'static str, value: String },
    #[error("invalid number '{value}' for {field}: {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("{field} must be a JSON object")]
    InvalidJsonType { field: &'static str },
    #[error("invalid JSON for {field}: {source}")]
    InvalidJson {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    fn invalid_enum(field: &'static str, value: String) -> Self {
        ConfigError::InvalidEnumVariant { field, value }
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_u8(field: &'static str, value: &str) -> Result<u8, ConfigError> {
    value
        .trim()
        .parse::<u8>()
        .map_err(|source| ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|source| ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|source| ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_json_object(field: &'static str, value: &str) -> Result<JsonObject, ConfigError> {
    let parsed: JsonValue = serde_json::from_str(value)
        .map_err(|source| ConfigError::InvalidJson { field, source })?;
    match parsed {
        JsonValue::Object(map) => Ok(map),
        _ => Err(ConfigError::InvalidJsonType { field }),
    }
}
