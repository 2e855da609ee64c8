//! OpenRouter-backed `LlmClient` implementation.
//!
//! One HTTP POST per chat completion, with transient failures retried under
//! a [`RetryPolicy`] before the error is surfaced to the caller.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{LlmError, RetryPolicy};
use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient, TokenUsage, ToolCall, ToolDefinition};

const API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Client for the OpenRouter chat-completions API.
pub struct OpenRouterClient {
    http: Client,
    api_key: String,
    retry: RetryPolicy,
}

impl OpenRouterClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(api_key: String, retry: RetryPolicy) -> Self {
        Self {
            http: Client::new(),
            api_key,
            retry,
        }
    }

    /// One request attempt, no retry.
    async fn attempt(&self, request: &CompletionRequest) -> Result<ChatResponse, LlmError> {
        let sent = self
            .http
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("request timed out: {}", e))
                } else {
                    LlmError::network(format!("request failed: {}", e))
                }
            })?;

        let status = sent.status();
        let retry_after = sent
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = sent.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body, retry_after));
        }

        let completion: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::parse(format!("{} (body: {})", e, body)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::parse("response contained no choices"))?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
            finish_reason: choice.finish_reason,
            usage: completion
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
            model: completion.model.or_else(|| Some(request.model.clone())),
        })
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> anyhow::Result<ChatResponse> {
        self.chat_completion_with_options(model, messages, tools, ChatOptions::default())
            .await
    }

    async fn chat_completion_with_options(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: ChatOptions,
    ) -> anyhow::Result<ChatResponse> {
        let request = CompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            tools: tools.map(<[ToolDefinition]>::to_vec),
            tool_choice: tools.map(|_| "auto".to_string()),
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
        };

        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            tracing::debug!("OpenRouter call: model={} attempt={}", model, attempt + 1);

            match self.attempt(&request).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!("Call succeeded after {} retries", attempt);
                    }
                    return Ok(response);
                }
                Err(error) => {
                    if !self.retry.allows_retry(&error, attempt, started.elapsed()) {
                        tracing::error!("Call failed after {} attempts: {}", attempt + 1, error);
                        return Err(error.into());
                    }

                    let delay = error
                        .retry_delay(attempt)
                        .min(self.retry.max_elapsed.saturating_sub(started.elapsed()));
                    tracing::warn!(
                        "Transient failure ({}), retrying in {:?}",
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Request body (OpenAI-compatible chat completions).
#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
