//! Gemini `generateContent` client over blocking HTTP.
use super::prompt::{build_prompt, response_schema};
use super::response::parse_enrichment_response;
use super::{EnrichedFields, EnrichmentClient};
use crate::config::{Instruction, DEFAULT_MODEL};
use crate::error::EnrichError;
use crate::model::IdentityRecord;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Environment variables checked for the API key, in priority order.
pub const API_KEY_ENVS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];
/// Overrides the service base URL, e.g. to point at a local stub.
pub const ENDPOINT_ENV: &str = "PENRICH_GEMINI_ENDPOINT";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Config with the credential resolved from `explicit_key` or the environment.
    pub fn resolve(explicit_key: Option<&str>, model: &str) -> Self {
        let model = if model.trim().is_empty() {
            DEFAULT_MODEL
        } else {
            model
        };
        GeminiConfig {
            api_key: resolve_api_key(explicit_key),
            model: model.to_string(),
            endpoint: std::env::var(ENDPOINT_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| GEMINI_ENDPOINT.to_string()),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Resolve the API key: explicit value > `GEMINI_API_KEY` > `API_KEY`.
pub fn resolve_api_key(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| API_KEY_ENVS.iter().find_map(|name| std::env::var(name).ok()))
        .filter(|key| !key.trim().is_empty())
}

pub struct GeminiClient {
    config: GeminiConfig,
    agent: ureq::Agent,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { config, agent }
    }

    fn api_key(&self) -> Result<&str, EnrichError> {
        self.config.api_key.as_deref().ok_or_else(|| {
            EnrichError::Configuration(format!(
                "Gemini API key is not configured. Set {} in the environment or pass --api-key.",
                API_KEY_ENVS[0]
            ))
        })
    }

    /// Send one `generateContent` request and return the concatenated reply text.
    fn generate(&self, prompt: &str, generation_config: Value) -> Result<String, EnrichError> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        });

        let start = Instant::now();
        let mut response = self
            .agent
            .post(&url)
            .header("x-goog-api-key", api_key)
            .send_json(&body)
            .map_err(|err| EnrichError::remote(err.to_string()))?;
        let status = response.status();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|err| EnrichError::remote(format!("read response body: {err}")))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            status = status.as_u16(),
            prompt_bytes = prompt.len(),
            response_bytes = text.len(),
            "lm invoke complete"
        );

        if !status.is_success() {
            return Err(EnrichError::remote(service_error_message(
                status.as_u16(),
                &text,
            )));
        }
        reply_text(&text)
    }
}

impl EnrichmentClient for GeminiClient {
    fn preflight(&self) -> Result<(), EnrichError> {
        self.api_key().map(|_| ())
    }

    fn enrich(
        &self,
        identity: &IdentityRecord,
        fields: &[String],
        instructions: &[Instruction],
    ) -> Result<EnrichedFields, EnrichError> {
        let prompt = build_prompt(identity, instructions);
        let generation_config = json!({
            "responseMimeType": "application/json",
            "responseSchema": response_schema(fields, instructions),
        });
        let text = self.generate(&prompt, generation_config)?;
        parse_enrichment_response(&text, fields)
    }

    fn test_connection(&self) -> Result<(), EnrichError> {
        self.generate("hello", json!({ "thinkingConfig": { "thinkingBudget": 0 } }))
            .map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(default, rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Human-readable message for a non-success reply.
///
/// The service wraps errors as `{"error": {"message", "status"}}`; the status
/// is kept alongside the message so quota exhaustion stays recognisable.
fn service_error_message(code: u16, body: &str) -> String {
    let mut message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) if !envelope.error.message.is_empty() => {
                format!("{} ({status})", envelope.error.message)
            }
            Some(status) => status,
            None => envelope.error.message,
        },
        Err(_) => format!("HTTP {code}: {}", body.trim()),
    };
    if code == 429 && !message.to_lowercase().contains("too many requests") {
        message.push_str(" [HTTP 429 Too Many Requests]");
    }
    message
}

/// Pull the reply text out of a successful `generateContent` envelope.
fn reply_text(body: &str) -> Result<String, EnrichError> {
    let envelope: GenerateResponse = serde_json::from_str(body)
        .map_err(|err| EnrichError::Parse(format!("unexpected response envelope: {err}")))?;
    let text: String = envelope
        .candidates
        .iter()
        .filter_map(|candidate| candidate.content.as_ref())
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect();
    if !text.trim().is_empty() {
        return Ok(text);
    }
    if let Some(reason) = envelope.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(EnrichError::remote(format!("request blocked: {reason}")));
    }
    Err(EnrichError::Parse("response contained no text".to_string()))
}
