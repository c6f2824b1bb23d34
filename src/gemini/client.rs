//! Gemini client for celebration messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use super::fallback_message;
use crate::config::GeminiConfig;

/// Errors that can occur while generating a message.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("GEMINI_API_KEY not set")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gemini returned no text")]
    EmptyResponse,
}

/// What is known about a kudos when asking for a celebration line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KudosContext {
    pub receiver_name: Option<String>,
    pub giver_name: Option<String>,
    pub message: Option<String>,
    pub count: Option<i64>,
}

/// Builds the generation prompt for a kudos.
#[must_use]
pub fn build_prompt(context: &KudosContext) -> String {
    let mut parts = Vec::new();
    if let Some(giver) = &context.giver_name {
        parts.push(format!("from {giver}"));
    }
    if let Some(receiver) = &context.receiver_name {
        parts.push(format!("to {receiver}"));
    }
    if let Some(message) = &context.message {
        parts.push(format!("with the message: '{message}'"));
    }
    if let Some(count) = context.count.filter(|&c| c > 0) {
        parts.push(format!("bringing their total to {count} kudos"));
    }

    let details = if parts.is_empty() {
        "for great work".to_owned()
    } else {
        parts.join(" ")
    };

    format!(
        "Generate a short, encouraging, positive, and witty message (1-2 sentences max) \n\
         to celebrate someone receiving kudos {details}. \n\
         \n\
         The message should be:\n\
         - Uplifting and celebratory\n\
         - Professional but friendly\n\
         - Include an appropriate emoji\n\
         - Be concise (under 100 characters if possible)\n\
         - Witty or clever when appropriate\n\
         \n\
         Just return the message itself, nothing else."
    )
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
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
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate that has any.
    fn into_text(self) -> Option<String> {
        self.candidates.into_iter().find_map(|candidate| {
            let text: String = candidate
                .content?
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect();
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_owned())
        })
    }
}

/// Generates celebration lines with Gemini, falling back to canned lines.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Creates a client for the given configuration.
    pub fn new(config: &GeminiConfig) -> Result<Self, GeminiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Returns the model used for generation.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Produces a celebration line for a kudos.
    ///
    /// Never fails: any problem is logged and a fallback line is returned.
    pub async fn generate(&self, context: &KudosContext) -> String {
        match self.request(&build_prompt(context)).await {
            Ok(text) => text,
            Err(GeminiError::MissingApiKey) => {
                warn!("GEMINI_API_KEY not set, using fallback message");
                fallback_message().to_owned()
            }
            Err(e) => {
                error!(error = %e, "Error generating Gemini message");
                fallback_message().to_owned()
            }
        }
    }

    async fn request(&self, prompt: &str) -> Result<String, GeminiError> {
        let api_key = self.api_key.as_deref().ok_or(GeminiError::MissingApiKey)?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        debug!(model = %self.model, "Requesting celebration message");

        let response: GenerateResponse = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_text().ok_or(GeminiError::EmptyResponse)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("enabled", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}
