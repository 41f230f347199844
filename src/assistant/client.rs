use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::utils::text::truncate_chars;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Upstream error bodies are cut to this many characters before logging
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl AssistantConfig {
    /// Config for `base_url` and `api_key` with default model and limits
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Read the assistant configuration from the environment.
    ///
    /// Returns `None` when neither `EMS_AI_API_KEY` nor `OPENAI_API_KEY` is
    /// set, which disables the assistant.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let api_key = lookup("EMS_AI_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY"))
            .filter(|k| !k.trim().is_empty())?;

        let base_url = lookup("EMS_AI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(base_url, api_key);

        if let Some(model) = lookup("EMS_AI_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        if let Some(secs) = lookup("EMS_AI_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(max) = lookup("EMS_AI_MAX_TOKENS").and_then(|s| s.parse::<u32>().ok()) {
            config.max_tokens = max;
        }
        Some(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("assistant is not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("response contained no completion")]
    EmptyCompletion,

    #[error("streaming response ended without a completion")]
    StreamEnded,

    #[error("assistant did not answer within {0:?}")]
    Timeout(Duration),
}

/// Why a reply fell back to local content, safe to return to clients.
///
/// The full [`AssistantError`] can carry upstream bodies and the configured
/// endpoint URL; it is logged, and only this value leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NotConfigured,
    UpstreamError,
    Timeout,
    InvalidResponse,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "assistant is not configured"),
            Self::UpstreamError => write!(f, "assistant service returned an error"),
            Self::Timeout => write!(f, "assistant did not answer in time"),
            Self::InvalidResponse => write!(f, "assistant response was not usable"),
        }
    }
}

impl AssistantError {
    /// Client-facing classification of this error
    pub fn reason(&self) -> FallbackReason {
        match self {
            Self::NotConfigured => FallbackReason::NotConfigured,
            Self::Request(e) if e.is_timeout() => FallbackReason::Timeout,
            Self::Timeout(_) => FallbackReason::Timeout,
            Self::Request(_) | Self::Upstream { .. } => FallbackReason::UpstreamError,
            Self::InvalidJson(_) | Self::EmptyCompletion | Self::StreamEnded => {
                FallbackReason::InvalidResponse
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Client for an OpenAI-compatible chat completions endpoint.
///
/// Every call is a single attempt bounded by the configured timeout.
#[derive(Clone)]
pub struct AssistantClient {
    config: AssistantConfig,
    http: reqwest::Client,
}

impl AssistantClient {
    pub fn new(config: AssistantConfig) -> Result<Self, AssistantError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ems-protocols/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    /// Build a client from the environment, `None` if no API key is set
    pub fn from_env() -> Result<Option<Self>, AssistantError> {
        AssistantConfig::from_env().map(Self::new).transpose()
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn request(&self, messages: &[ChatMessage], stream: bool) -> reqwest::RequestBuilder {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            stream,
        };
        self.http
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(&body)
    }

    /// Request a full completion and return its text
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AssistantError> {
        let response = self.request(messages, false).send().await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let body: ChatCompletionResponse = serde_json::from_slice(&response.bytes().await?)?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(AssistantError::EmptyCompletion)
    }

    /// Request a streamed completion. Yields text deltas in order; a stream
    /// that closes before `[DONE]` ends with `AssistantError::StreamEnded`.
    pub fn stream(&self, messages: &[ChatMessage]) -> BoxStream<'static, Result<String, AssistantError>> {
        let request = self.request(messages, true);

        let stream = async_stream::stream! {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(AssistantError::Request(e));
                    return;
                }
            };
            if !response.status().is_success() {
                yield Err(upstream_error(response).await);
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => buffer.extend_from_slice(&chunk),
                    Err(e) => {
                        yield Err(AssistantError::Request(e));
                        return;
                    }
                }

                for data in drain_sse_data(&mut buffer) {
                    if data == "[DONE]" {
                        return;
                    }
                    match parse_stream_delta(&data) {
                        Ok(Some(text)) => yield Ok(text),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(AssistantError::InvalidJson(e));
                            return;
                        }
                    }
                }
            }
            yield Err(AssistantError::StreamEnded);
        };

        stream.boxed()
    }
}

async fn upstream_error(response: reqwest::Response) -> AssistantError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| truncate_chars(&body, MAX_ERROR_BODY_CHARS));
    AssistantError::Upstream { status, message }
}

/// Position and separator length of the first complete SSE event
fn find_event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Remove every complete event from `buffer` and return the payloads of
/// their `data:` lines. A trailing partial event stays in the buffer.
pub fn drain_sse_data(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut out = Vec::new();
    while let Some((end, sep)) = find_event_end(buffer) {
        let event: Vec<u8> = buffer.drain(..end + sep).collect();
        let event = String::from_utf8_lossy(&event[..end]);
        for line in event.lines() {
            if let Some(rest) = line.trim_end_matches('\r').strip_prefix("data:") {
                let data = rest.trim();
                if !data.is_empty() {
                    out.push(data.to_string());
                }
            }
        }
    }
    out
}

/// Text delta carried by one streamed chunk, if any
pub fn parse_stream_delta(data: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty()))
}
