use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::stream::{TokenStream, token_stream};
use super::types::{ChatMessage, ChatRequest, ChatResponse, ErrorBody, TagsResponse};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound for a single non-streaming generation.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

#[derive(Debug, thiserror::Error)]
pub enum OllamaError {
    #[error("cannot reach Ollama: {0}")]
    Unreachable(String),

    #[error("model '{0}' not found. Pull it with `ollama pull {0}`")]
    ModelNotFound(String),

    #[error("Ollama API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// A language model that can answer a single-turn prompt.
/// Implemented by `OllamaClient`; mocked in pipeline tests.
pub trait ChatClient {
    async fn chat(&self, prompt: &str) -> Result<String, OllamaError>;
    async fn chat_stream(&self, prompt: &str) -> Result<TokenStream, OllamaError>;
}

#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
    max_retries: u32,
    initial_backoff: Duration,
}

impl OllamaClient {
    pub fn new(http: Client, base_url: &str, model: &str, max_retries: u32) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_retries: max_retries.max(1),
            initial_backoff: INITIAL_BACKOFF,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Installed model names. Doubles as the server health check.
    pub async fn list_models(&self) -> Result<Vec<String>, OllamaError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .http
            .get(&url)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let tags: TagsResponse = response.json().await.map_err(transport_error)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn send_chat(
        &self,
        prompt: &str,
        stream: bool,
    ) -> Result<reqwest::Response, OllamaError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::user(prompt)],
            stream,
        };

        let mut builder = self.http.post(&url).json(&request);
        if !stream {
            builder = builder.timeout(GENERATE_TIMEOUT);
        }
        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(OllamaError::ModelNotFound(self.model.clone()));
        }
        if !status.is_success() {
            let err = api_error(status, response).await;
            warn!(error = %err, "Ollama API error");
            return Err(err);
        }
        Ok(response)
    }

    async fn chat_once(&self, prompt: &str) -> Result<String, OllamaError> {
        let response = self.send_chat(prompt, false).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| OllamaError::Decode(e.to_string()))?;

        if let Some(message) = body.error {
            return Err(OllamaError::Api { code: 200, message });
        }
        let message = body
            .message
            .ok_or_else(|| OllamaError::Decode("response has no message".to_string()))?;
        debug!(model = %self.model, chars = message.content.len(), "chat complete");
        Ok(message.content)
    }
}

impl ChatClient for OllamaClient {
    async fn chat(&self, prompt: &str) -> Result<String, OllamaError> {
        let mut last_err = None;
        for attempt in 0..self.max_retries {
            match self.chat_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if is_retriable(&e) => {
                    warn!(attempt = attempt + 1, error = %e, "model request failed");
                    last_err = Some(e);
                    if attempt + 1 < self.max_retries {
                        let delay = jittered_backoff(self.initial_backoff, attempt);
                        debug!(delay_ms = delay.as_millis() as u64, "retrying model request");
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| OllamaError::Decode("no attempts made".to_string())))
    }

    async fn chat_stream(&self, prompt: &str) -> Result<TokenStream, OllamaError> {
        let response = self.send_chat(prompt, true).await?;
        Ok(token_stream(response))
    }
}

fn is_retriable(e: &OllamaError) -> bool {
    match e {
        OllamaError::ModelNotFound(_) => false,
        OllamaError::Api { code, .. } => !(400..500).contains(code) || *code == 429,
        _ => true,
    }
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(initial: Duration, attempt: u32) -> Duration {
    let base = initial.as_millis() as u64 * 2u64.pow(attempt);
    let half = base / 2;
    Duration::from_millis(half + fastrand::u64(..half.max(1)))
}

fn transport_error(e: reqwest::Error) -> OllamaError {
    if e.is_connect() {
        OllamaError::Unreachable(e.to_string())
    } else {
        OllamaError::Network(e)
    }
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> OllamaError {
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| {
            let end = text.char_indices().nth(200).map_or(text.len(), |(i, _)| i);
            format!("HTTP {status}: {}", &text[..end])
        });
    OllamaError::Api {
        code: status.as_u16(),
        message,
    }
}
