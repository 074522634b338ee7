//! Gemini `generateContent` client.

use crate::config::GeminiConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Reply used when the response carries no text at the expected path.
pub const NO_RESPONSE: &str = "No response from Gemini";

/// Finish reasons that mean the candidate was withheld.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("request to Gemini failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Gemini API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to parse Gemini response: {0}")]
    Decode(String),
    #[error("Gemini blocked the response: {0}")]
    Blocked(String),
}

/// Gemini client for single-turn text generation.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` and return the first candidate's text.
    pub async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        debug!(
            "Sending request to Gemini: model={} prompt_chars={}",
            self.model,
            prompt.len()
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status { status, body });
        }

        let body = response.text().await?;
        let parsed: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| InferenceError::Decode(e.to_string()))?;

        if let Some(usage) = &parsed.usage_metadata {
            info!(
                "Gemini response: {} tokens (prompt: {}, completion: {})",
                usage.total_token_count, usage.prompt_token_count, usage.candidates_token_count
            );
        }

        reply_text(parsed)
    }
}

/// Pull `candidates[0].content.parts[0].text` out of the envelope.
fn reply_text(response: GenerateContentResponse) -> Result<String, InferenceError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(InferenceError::Blocked(reason));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(NO_RESPONSE.to_string());
    };

    let text = candidate
        .content
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .filter(|text| !text.is_empty());

    match (text, candidate.finish_reason) {
        (Some(text), _) => Ok(text),
        (None, Some(reason)) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
            Err(InferenceError::Blocked(reason))
        }
        (None, _) => Ok(NO_RESPONSE.to_string()),
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
