use promptfs_adapters::config::{LlmSettings, API_KEY_ENV, TOGETHER_API_KEY_ENV};
use promptfs_core::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum length for error content in error messages
const MAX_ERROR_CONTENT_LEN: usize = 200;

/// One chat completion round trip. Implementations must not retry; the
/// translator owns the retry policy.
pub trait ChatBackend: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        max_tokens: Option<u32>,
    ) -> BoxFuture<'a, anyhow::Result<String>>;

    /// Model identifier, for logs
    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat backend for any OpenAI-compatible `/chat/completions` endpoint
/// (Together AI by default).
pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatibleBackend {
    /// `Ok(None)` when no credential is configured.
    pub fn from_settings(settings: &LlmSettings) -> anyhow::Result<Option<Self>> {
        if !settings.has_api_key() {
            return Ok(None);
        }
        let api_key = settings.api_key.as_deref().unwrap_or_default().trim();

        Ok(Some(Self {
            client: create_http_client(settings.timeout())?,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key: api_key.to_string(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }))
    }

    async fn send(&self, prompt: &str, max_tokens: Option<u32>) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: max_tokens.unwrap_or(self.max_tokens),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            let error_msg = match status.as_u16() {
                401 => format!(
                    "Invalid API key. Set {} or {} to a valid key.",
                    API_KEY_ENV, TOGETHER_API_KEY_ENV
                ),
                429 => "Rate limited by the model provider.".to_string(),
                500..=599 => format!(
                    "Model provider server error ({}). The service may be temporarily unavailable.",
                    status
                ),
                _ => format!("API error {}: {}", status, sanitize_api_response(&text)),
            };
            return Err(anyhow::anyhow!("{}", error_msg));
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            anyhow::anyhow!(
                "Failed to parse model response: {}\n{}",
                e,
                sanitize_api_response(&text)
            )
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(anyhow::anyhow!("API returned empty response"));
        }
        Ok(content)
    }
}

impl ChatBackend for OpenAiCompatibleBackend {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        max_tokens: Option<u32>,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(self.send(prompt, max_tokens))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Create a configured HTTP client for model requests
pub(crate) fn create_http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))
}

fn map_transport_error(err: reqwest::Error) -> anyhow::Error {
    if err.is_timeout() {
        anyhow::anyhow!("Request to the model provider timed out")
    } else if err.is_connect() {
        anyhow::anyhow!("Could not connect to the model provider. Check your network and try again.")
    } else {
        err.into()
    }
}

/// Sanitize API response content for error messages to prevent credential leakage.
fn sanitize_api_response(content: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "api_key",
        "apikey",
        "secret",
        "password",
        "credential",
        "bearer",
        "sk-",
    ];

    let truncated = truncate_str(content, MAX_ERROR_CONTENT_LEN);
    let lower = truncated.to_lowercase();
    if SECRET_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
        return "(response details redacted - may contain sensitive data)".to_string();
    }
    truncated.to_string()
}

/// Truncate a string for display (Unicode-safe)
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
