use crate::circuit_breaker::{create_judge_circuit_breaker, JudgeCircuitBreaker};
use crate::models::Judgement;
use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single judge call.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("judge request failed: {0}")]
    Transport(String),

    #[error("judge returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("judge response has no message content")]
    EmptyResponse,

    #[error("malformed judge output: {0}")]
    Malformed(String),

    #[error("judge circuit is open, call rejected")]
    Unavailable,
}

impl JudgeError {
    /// Transport failures, rate limiting and server errors are worth another
    /// attempt; anything the model actually said is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            JudgeError::Transport(_) => true,
            JudgeError::Status { status, .. } => *status == 429 || *status >= 500,
            JudgeError::EmptyResponse | JudgeError::Malformed(_) | JudgeError::Unavailable => {
                false
            }
        }
    }
}

/// Scoring oracle consulted once per (company, tender) prompt.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn evaluate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<Judgement, JudgeError>;
}

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("code fence pattern is valid")
});

/// Strips a surrounding Markdown code fence, if any.
pub(crate) fn unfence(raw: &str) -> &str {
    match CODE_FENCE.captures(raw) {
        Some(caps) => caps.get(1).map_or(raw, |m| m.as_str()).trim(),
        None => raw.trim(),
    }
}

/// Parses the raw text the model produced into a [`Judgement`].
///
/// A surrounding Markdown code fence is tolerated. Missing fields and match
/// levels outside the four known values are rejected.
pub fn parse_judgement(raw: &str) -> Result<Judgement, JudgeError> {
    serde_json::from_str(unfence(raw)).map_err(|e| JudgeError::Malformed(e.to_string()))
}

/// Connection settings for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct JudgeSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

/// Judge backed by an OpenAI-compatible chat completions API.
///
/// The same client also extracts company profiles, see
/// [`crate::extraction::ProfileExtractor`].
#[derive(Clone)]
pub struct OpenAiJudge {
    client: reqwest::Client,
    settings: JudgeSettings,
    breaker: JudgeCircuitBreaker,
}

impl OpenAiJudge {
    /// Creates a new `OpenAiJudge`.
    pub fn new(settings: JudgeSettings) -> Result<Self, JudgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| JudgeError::Transport(format!("Failed to create judge client: {}", e)))?;

        Ok(Self {
            client,
            settings,
            breaker: create_judge_circuit_breaker(),
        })
    }

    /// Sends one chat completion request and returns the message content.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, JudgeError> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );

        let body = json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| JudgeError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(JudgeError::Status {
                status,
                body: error_text,
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| JudgeError::Malformed(format!("response is not JSON: {}", e)))?;

        data.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(JudgeError::EmptyResponse)
    }

    /// Chat completion with bounded exponential retry on retryable errors.
    pub async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String, JudgeError> {
        let mut attempt = 0;
        loop {
            match self.attempt(system_prompt, user_prompt).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    let delay = self.settings.retry_backoff * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        "Judge call failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.settings.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt through the circuit breaker.
    ///
    /// Only endpoint-level failures count against the breaker. A rejected or
    /// unparseable answer for one prompt says nothing about the other tenders.
    async fn attempt(&self, system_prompt: &str, user_prompt: &str) -> Result<String, JudgeError> {
        match self
            .breaker
            .call_with(
                |e: &JudgeError| e.is_retryable(),
                Box::pin(self.complete(system_prompt, user_prompt)),
            )
            .await
        {
            Ok(content) => Ok(content),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(JudgeError::Unavailable),
        }
    }
}

#[async_trait]
impl Judge for OpenAiJudge {
    async fn evaluate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Judgement, JudgeError> {
        let content = self.chat(system_prompt, user_prompt).await?;
        parse_judgement(&content)
    }
}
