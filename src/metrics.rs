//! Token accounting and inference latency for oracle calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Oracle functions tracked when collecting metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleFunction {
    Decide,
    Extract,
}

impl OracleFunction {
    pub fn as_str(self) -> &'static str {
        match self {
            OracleFunction::Decide => "decide",
            OracleFunction::Extract => "extract",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "decide" => Some(OracleFunction::Decide),
            "extract" => Some(OracleFunction::Extract),
            _ => None,
        }
    }
}

/// Aggregated metrics for token usage and latency across oracle functions.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OracleMetrics {
    pub decide_calls: u64,
    pub decide_prompt_tokens: u64,
    pub decide_completion_tokens: u64,
    pub decide_inference_time_ms: u64,

    pub extract_calls: u64,
    pub extract_prompt_tokens: u64,
    pub extract_completion_tokens: u64,
    pub extract_inference_time_ms: u64,

    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_inference_time_ms: u64,
}

impl OracleMetrics {
    /// Record one completed call and update cumulative totals.
    pub fn record(
        &mut self,
        function: OracleFunction,
        prompt_tokens: u64,
        completion_tokens: u64,
        elapsed: Duration,
    ) {
        let inference_time_ms = elapsed.as_millis() as u64;
        match function {
            OracleFunction::Decide => {
                self.decide_calls += 1;
                self.decide_prompt_tokens += prompt_tokens;
                self.decide_completion_tokens += completion_tokens;
                self.decide_inference_time_ms += inference_time_ms;
            }
            OracleFunction::Extract => {
                self.extract_calls += 1;
                self.extract_prompt_tokens += prompt_tokens;
                self.extract_completion_tokens += completion_tokens;
                self.extract_inference_time_ms += inference_time_ms;
            }
        }

        self.total_prompt_tokens += prompt_tokens;
        self.total_completion_tokens += completion_tokens;
        self.total_inference_time_ms += inference_time_ms;
    }
}
