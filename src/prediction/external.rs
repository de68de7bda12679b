// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prediction through an external generative text service
//!
//! The service receives a prompt describing recent history, the pack's
//! specifications and summary statistics, and is asked to answer with a
//! JSON object. The text between the first `{` and the last `}` of its
//! answer is parsed; missing numeric keys read as zero.

use super::{Estimate, HistorySummary, Prediction, PredictionSource, PredictionStrategy};
use crate::config::BatterySpecs;
use crate::error::PredictionError;
use crate::history::History;
use crate::protocol::ExtendedReading;
use crate::recovery::{CircuitBreaker, CircuitConfig};
use serde_json::Value;
use tracing::debug;

/// Readings quoted verbatim in the prompt
pub const PROMPT_RECENT_READINGS: usize = 10;

/// Confidence assumed when the service does not report one
pub const DEFAULT_EXTERNAL_CONFIDENCE: f64 = 0.5;

/// A text generation service
pub trait GenerativeBackend: Send {
    /// Send a prompt and return the generated text
    fn generate(&self, prompt: &str) -> Result<String, PredictionError>;
}

/// Build the analysis prompt
pub fn build_prompt(history: &History<ExtendedReading>, specs: &BatterySpecs) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are an expert battery systems engineer. Analyze the following battery \
         performance data and provide predictions for battery life and health.\n\n",
    );

    prompt.push_str("Battery Performance Analysis Data:\n\n");
    prompt.push_str("Recent Performance (last 10 readings):\n");
    for entry in history.last_n(PROMPT_RECENT_READINGS) {
        prompt.push_str(&format!(
            "Time: {}s, Voltage: {}V, Current: {}A, Temp: {}°C, Health: {}%, Cycles: {}\n",
            entry.reading.timestamp,
            entry.reading.pack_voltage,
            entry.reading.pack_current,
            entry.reading.cell_temp,
            entry.health_score,
            entry.cycle_count
        ));
    }

    prompt.push_str("\nBattery Specifications:\n");
    prompt.push_str(&format!("Nominal Capacity: {} Ah\n", specs.nominal_capacity_ah));
    prompt.push_str(&format!("Nominal Voltage: {} V\n", specs.nominal_voltage));
    prompt.push_str(&format!("Max Cycles: {}\n", specs.max_cycles));
    prompt.push_str(&format!("Max Temperature: {}°C\n", specs.max_temp));
    prompt.push_str(&format!("Min Temperature: {}°C\n", specs.min_temp));
    prompt.push_str(&format!("Max Current: {} A\n", specs.max_current));

    if let Some(summary) = HistorySummary::from_history(history) {
        prompt.push_str("\nPerformance Statistics:\n");
        prompt.push_str(&format!("Total Data Points: {}\n", summary.count));
        prompt.push_str(&format!("Average Health: {:.2}%\n", summary.avg_health));
        prompt.push_str(&format!("Average Voltage: {:.2}V\n", summary.avg_voltage));
        prompt.push_str(&format!("Average Temperature: {:.2}°C\n", summary.avg_temp));
        prompt.push_str(&format!("Temperature Range: {:.2}°C\n", summary.temp_range()));
    }

    prompt.push_str(
        "\nPlease provide a detailed analysis including:\n\
         1. Predicted remaining battery life in hours\n\
         2. Estimated remaining charge cycles\n\
         3. Current degradation rate\n\
         4. Maintenance recommendations\n\
         Format your response as JSON with the following structure:\n\
         {\n\
         \x20 \"remaining_life_hours\": <float>,\n\
         \x20 \"remaining_cycles\": <float>,\n\
         \x20 \"degradation_rate\": <float>,\n\
         \x20 \"confidence_score\": <float between 0 and 1>,\n\
         \x20 \"recommendations\": [<string>, ...]\n\
         }\n\n\
         Consider factors like temperature effects, cycle count, voltage patterns, \
         and aging when making your predictions.",
    );
    prompt
}

/// Parse the JSON object embedded in generated text
pub fn extract_estimate(text: &str) -> Result<Estimate, PredictionError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(PredictionError::ParseFailure(
            "no JSON object in response".to_string(),
        ));
    };
    if end < start {
        return Err(PredictionError::ParseFailure(
            "no JSON object in response".to_string(),
        ));
    }

    let object: Value = serde_json::from_str(&text[start..=end])
        .map_err(|e| PredictionError::ParseFailure(e.to_string()))?;
    if !object.is_object() {
        return Err(PredictionError::ParseFailure(
            "response JSON is not an object".to_string(),
        ));
    }

    let number = |key: &str| object.get(key).and_then(Value::as_f64);
    let recommendations = object
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Estimate {
        prediction: Prediction {
            remaining_life_hours: number("remaining_life_hours").unwrap_or(0.0),
            remaining_cycles: number("remaining_cycles").unwrap_or(0.0),
            degradation_rate: number("degradation_rate").unwrap_or(0.0),
        },
        confidence: number("confidence_score")
            .unwrap_or(DEFAULT_EXTERNAL_CONFIDENCE)
            .clamp(0.0, 1.0),
        recommendations,
    })
}

/// Prediction strategy backed by a [`GenerativeBackend`]
///
/// Consecutive service failures open a circuit breaker; while it is open
/// the strategy fails immediately and the engine falls back.
pub struct ExternalStrategy<B> {
    backend: B,
    breaker: CircuitBreaker,
}

impl<B: GenerativeBackend> ExternalStrategy<B> {
    /// Wrap a backend with the default circuit configuration
    pub fn new(backend: B) -> Self {
        Self::with_circuit(backend, CircuitConfig::default())
    }

    /// Wrap a backend with a custom circuit configuration
    pub fn with_circuit(backend: B, config: CircuitConfig) -> Self {
        Self {
            backend,
            breaker: CircuitBreaker::with_config(config),
        }
    }

    /// Circuit breaker guarding the backend
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<B: GenerativeBackend> PredictionStrategy for ExternalStrategy<B> {
    fn source(&self) -> PredictionSource {
        PredictionSource::External
    }

    fn predict(
        &mut self,
        history: &History<ExtendedReading>,
        specs: &BatterySpecs,
    ) -> Result<Estimate, PredictionError> {
        if !self.breaker.should_allow() {
            return Err(PredictionError::ExternalServiceFailure(
                "circuit open after repeated failures".to_string(),
            ));
        }

        let prompt = build_prompt(history, specs);
        debug!("Requesting external prediction ({} byte prompt)", prompt.len());
        let text = match self.backend.generate(&prompt) {
            Ok(text) => {
                self.breaker.record_success();
                text
            }
            Err(e) => {
                // An unusable answer still proves the service is up
                match e {
                    PredictionError::ExternalServiceFailure(_) => self.breaker.record_failure(),
                    _ => self.breaker.record_success(),
                }
                return Err(e);
            }
        };
        extract_estimate(&text)
    }
}

#[cfg(feature = "http")]
pub use self::gemini::{GeminiBackend, DEFAULT_GEMINI_URL};

#[cfg(feature = "http")]
mod gemini {
    use super::GenerativeBackend;
    use crate::error::PredictionError;
    use serde_json::{json, Value};
    use std::time::Duration;

    /// Default generateContent endpoint
    pub const DEFAULT_GEMINI_URL: &str =
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";

    /// Google Gemini `generateContent` client
    pub struct GeminiBackend {
        agent: ureq::Agent,
        url: String,
        api_key: String,
    }

    impl GeminiBackend {
        /// Client for the default endpoint with a 30 s timeout
        pub fn new(api_key: impl Into<String>) -> Self {
            Self::with_endpoint(api_key, DEFAULT_GEMINI_URL, Duration::from_secs(30))
        }

        /// Client for a custom endpoint
        pub fn with_endpoint(
            api_key: impl Into<String>,
            url: impl Into<String>,
            timeout: Duration,
        ) -> Self {
            let agent = ureq::AgentBuilder::new()
                .timeout(timeout)
                .user_agent(concat!("packwatch/", env!("CARGO_PKG_VERSION")))
                .build();
            Self {
                agent,
                url: url.into(),
                api_key: api_key.into(),
            }
        }

        /// Pull `candidates[0].content.parts[0].text` out of a response body
        pub fn response_text(body: &str) -> Result<String, PredictionError> {
            let response: Value = serde_json::from_str(body)
                .map_err(|e| PredictionError::ParseFailure(e.to_string()))?;
            response
                .pointer("/candidates/0/content/parts/0/text")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    PredictionError::ParseFailure("response has no candidate text".to_string())
                })
        }
    }

    impl GenerativeBackend for GeminiBackend {
        fn generate(&self, prompt: &str) -> Result<String, PredictionError> {
            if self.api_key.is_empty() {
                return Err(PredictionError::ExternalServiceFailure(
                    "API key not provided".to_string(),
                ));
            }

            let request = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
            let response = self
                .agent
                .post(&self.url)
                .set("Content-Type", "application/json")
                .set("Authorization", &format!("Bearer {}", self.api_key))
                .send_string(&request.to_string());

            match response {
                Ok(resp) => {
                    let body = resp
                        .into_string()
                        .map_err(|e| PredictionError::ExternalServiceFailure(e.to_string()))?;
                    Self::response_text(&body)
                }
                Err(ureq::Error::Status(code, _)) => Err(PredictionError::ExternalServiceFailure(
                    format!("service answered HTTP {}", code),
                )),
                Err(ureq::Error::Transport(e)) => {
                    Err(PredictionError::ExternalServiceFailure(e.to_string()))
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_response_text() {
            let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"remaining_cycles\": 5}"}]}}]}"#;
            assert_eq!(
                GeminiBackend::response_text(body).unwrap(),
                r#"{"remaining_cycles": 5}"#
            );
            assert!(GeminiBackend::response_text(r#"{"candidates":[]}"#).is_err());
            assert!(GeminiBackend::response_text("<html>").is_err());
        }

        #[test]
        fn test_missing_key_fails_without_request() {
            let backend = GeminiBackend::new("");
            assert!(matches!(
                backend.generate("hello"),
                Err(PredictionError::ExternalServiceFailure(_))
            ));
        }
    }
}
