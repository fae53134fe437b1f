use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::LlmClient;
use super::ExternalError;

/// Sampling temperature for analysis calls.
const TEMPERATURE: f32 = 0.2;

/// OpenAI-compatible chat completions client.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, ExternalError> {
        if api_key.trim().is_empty() {
            return Err(ExternalError::NotConfigured);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExternalError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Request body for /chat/completions
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

/// Response body from /chat/completions (only the fields we read)
#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl LlmClient for OpenAiClient {
    fn generate(&self, system: &str, prompt: &str) -> Result<String, ExternalError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            temperature: TEMPERATURE,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: prompt },
            ],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    ExternalError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    ExternalError::Timeout(self.timeout_secs)
                } else {
                    ExternalError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExternalError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| ExternalError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExternalError::MalformedResponse("No message content in reply".into()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock LLM client for testing. Replays queued replies in order and keeps
/// returning the last one once the queue is drained.
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, ExternalError>>>,
    last: Mutex<Result<String, ExternalError>>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self::sequence(vec![Ok(response.to_string())])
    }

    pub fn failing(error: ExternalError) -> Self {
        Self::sequence(vec![Err(error)])
    }

    pub fn sequence(replies: Vec<Result<String, ExternalError>>) -> Self {
        let last = replies
            .last()
            .cloned()
            .unwrap_or(Err(ExternalError::NotConfigured));
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `generate` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, _system: &str, _prompt: &str) -> Result<String, ExternalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .replies
            .lock()
            .map_err(|_| ExternalError::HttpClient("mock lock poisoned".into()))?
            .pop_front();
        match next {
            Some(reply) => reply,
            None => self
                .last
                .lock()
                .map_err(|_| ExternalError::HttpClient("mock lock poisoned".into()))?
                .clone(),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
