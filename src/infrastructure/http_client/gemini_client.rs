//! Hosted generative model client speaking the Gemini `generateContent` REST API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::services::ModelClient;
use crate::domain::{ModelError, ModelErrorKind};

use super::ErrorResponse;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    /// Reasoning parts emitted by thinking models; never shown to users.
    #[serde(default)]
    thought: bool,
}

/// Blocking client for a single hosted model.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    agent: ureq::Agent,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout(timeout)
            .build();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            agent,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            urlencoding::encode(&self.model)
        )
    }
}

impl ModelClient for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<Option<String>, ModelError> {
        if self.api_key.trim().is_empty() {
            return Err(ModelError::new(
                ModelErrorKind::Credential,
                "API key is missing",
            ));
        }

        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
        };

        debug!(target: "finsight::http", model = %self.model, "calling generateContent");

        let response = self
            .agent
            .post(&self.endpoint())
            .set("x-goog-api-key", &self.api_key)
            .send_json(&body)
            .map_err(map_ureq_error)?;

        let parsed: GenerateResponse = response.into_json().map_err(|err| {
            ModelError::new(
                ModelErrorKind::Generic,
                format!("failed to parse model response: {err}"),
            )
        })?;

        Ok(extract_text(&parsed))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Concatenated visible text of the first candidate, or `None` when there is none.
pub(crate) fn extract_text(response: &GenerateResponse) -> Option<String> {
    let parts = &response.candidates.first()?.content.as_ref()?.parts;
    let text: String = parts
        .iter()
        .filter(|part| !part.thought)
        .filter_map(|part| part.text.as_deref())
        .collect();

    (!text.trim().is_empty()).then_some(text)
}

/// Tag an HTTP failure, falling back to the message text when the status is ambiguous.
pub(crate) fn classify_status(status: u16, message: &str) -> ModelErrorKind {
    match status {
        401 | 403 => ModelErrorKind::Credential,
        429 => ModelErrorKind::Quota,
        _ => ModelErrorKind::classify(message),
    }
}

fn map_ureq_error(error: ureq::Error) -> ModelError {
    match error {
        ureq::Error::Status(code, response) => {
            let message = response
                .into_json::<ErrorResponse>()
                .map(|body| body.error.message)
                .unwrap_or_else(|_| format!("HTTP {code}"));
            ModelError::new(classify_status(code, &message), message)
        }
        ureq::Error::Transport(transport) => ModelError::new(
            ModelErrorKind::Connectivity,
            format!("network error: {transport}"),
        ),
    }
}
