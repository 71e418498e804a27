use crate::config::OpenAIConfig;
use crate::consts::SYSTEM_PROMPT;
use crate::error::CompletionError;
use crate::openai_types::{OpenAIBatchResponse, OpenAIMessage, OpenAIPayload};

use async_trait::async_trait;
use http::StatusCode;
use tracing::{debug, error};

/// Something that turns a caller transcript into reply text.
#[async_trait]
pub trait Completion: Send + Sync {
    /// `transcript` must be non-empty.  Returns the first candidate, at most `max_tokens` long.
    async fn complete(&self, transcript: &str, max_tokens: u32) -> Result<String, CompletionError>;
}

pub struct OpenAICompletion {
    http_client: reqwest::Client,
    config: OpenAIConfig,
}

impl OpenAICompletion {
    pub fn new(http_client: reqwest::Client, config: OpenAIConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    fn payload(&self, transcript: &str, max_tokens: u32) -> OpenAIPayload {
        OpenAIPayload {
            model: self.config.model.clone(),
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: transcript.to_string(),
                },
            ],
            max_tokens: Some(max_tokens),
        }
    }
}

#[async_trait]
impl Completion for OpenAICompletion {
    async fn complete(&self, transcript: &str, max_tokens: u32) -> Result<String, CompletionError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let key = self.config.api_key.as_str();
        let resp = self
            .http_client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {key}"))
            .json(&self.payload(transcript, max_tokens))
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send request to OpenAI");
                CompletionError::Network(e.to_string())
            })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CompletionError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status=%status, body=%body, "OpenAI returned an error status");
            return Err(CompletionError::Upstream { status });
        }

        let body = resp.text().await.map_err(|e| {
            error!(error=%e, "failed to read OpenAI response body");
            CompletionError::Network(e.to_string())
        })?;
        reply_from_body(&body)
    }
}

/// Pull the first choice's text out of a chat completion response body.
pub fn reply_from_body(body: &str) -> Result<String, CompletionError> {
    let resp = serde_json::from_str::<OpenAIBatchResponse>(body).map_err(|e| {
        error!(error=%e, "failed to deserialize OpenAI completion response");
        CompletionError::Malformed(e.to_string())
    })?;
    let usage = resp.usage.as_ref();
    debug!(
        id=%resp.id,
        model=%resp.model,
        prompt_tokens=usage.map(|u| u.prompt_tokens),
        completion_tokens=usage.map(|u| u.completion_tokens),
        total_tokens=usage.map(|u| u.total_tokens),
        "got openai completion"
    );
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::Malformed("no choices in response".to_string()))?;
    if choice.finish_reason.as_deref() == Some("length") {
        debug!("reply was cut off at the token limit");
    }
    let text = choice.message.content.trim();
    if text.is_empty() {
        return Err(CompletionError::Malformed(
            "first choice has no content".to_string(),
        ));
    }
    Ok(text.to_string())
}
