//! Grammar checking before send.
//!
//! [`TextValidator`] is the seam: given free text it answers "fine as is" or
//! "here is a corrected version". [`GeminiValidator`] implements it on top of
//! the generative-language REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ConfigError, ValidationError};

/// A validator's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub approved: bool,
    pub suggestion: Option<String>,
}

impl Verdict {
    pub fn approved() -> Self {
        Self {
            approved: true,
            suggestion: None,
        }
    }

    pub fn revise(suggestion: impl Into<String>) -> Self {
        Self {
            approved: false,
            suggestion: Some(suggestion.into()),
        }
    }
}

#[async_trait]
pub trait TextValidator: Send + Sync {
    async fn check(&self, text: &str) -> Result<Verdict, ValidationError>;
}

// ---------------------------------------------------------------------------
// Generative-language client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

pub struct GeminiValidator {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    timeout: Duration,
}

impl GeminiValidator {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.validator_timeout)
            .build()?;

        if config.validator_api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY not set, grammar checks will always ask to retry");
        }

        Ok(Self {
            http,
            api_key: config.validator_api_key.clone(),
            timeout: config.validator_timeout,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.validator_base_url.trim_end_matches('/'),
                config.validator_model
            ),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TextValidator for GeminiValidator {
    async fn check(&self, text: &str) -> Result<Verdict, ValidationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ValidationError::NotConfigured("GEMINI_API_KEY"))?;

        let prompt = grammar_prompt(text);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: &prompt }],
            }],
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ValidationError::Timeout(self.timeout)
                } else {
                    ValidationError::Transport(e)
                }
            })?;

        if !resp.status().is_success() {
            return Err(ValidationError::Status(resp.status().as_u16()));
        }

        let reply: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        let text = reply_text(&reply)?;
        debug!(len = text.len(), "validator replied");
        interpret_reply(&text)
    }
}

/// Prompt sent for a casual-chat grammar check.
pub fn grammar_prompt(message: &str) -> String {
    format!(
        "Check this message for grammar errors suitable for casual chat.\n\
         - If correct, just reply 'correct'.\n\
         - If incorrect, provide only the corrected version.\n\
         Message: \"{message}\""
    )
}

fn reply_text(reply: &GenerateResponse) -> Result<String, ValidationError> {
    let candidate = reply
        .candidates
        .first()
        .ok_or_else(|| ValidationError::Malformed("no candidates".into()))?;

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();
    Ok(text)
}

/// Turn the model's free-text reply into a verdict.
///
/// `correct` (any case, optionally quoted or followed by a period) approves.
/// Anything else non-empty is the suggested correction.
pub fn interpret_reply(reply: &str) -> Result<Verdict, ValidationError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Malformed("empty reply".into()));
    }

    let bare = trimmed
        .trim_matches(|c: char| c == '\'' || c == '"' || c == '`')
        .trim_end_matches('.')
        .trim();
    if bare.eq_ignore_ascii_case("correct") {
        return Ok(Verdict::approved());
    }

    Ok(Verdict::revise(trimmed))
}
