
pub mod retry;
pub mod stream;

pub use retry::RetryPolicy;
pub use stream::CompletionStream;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::OpenAiConfig;
use crate::{RagChatError, Result};

const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 30;

/// Blocking client for an OpenAI-compatible completion and embedding API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    agent: ureq::Agent,
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
    #[inline]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Optional sampling caps for a single completion request
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let base_url = config.api_url()?;

        let agent = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            agent,
        })
    }

    #[inline]
    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Embed a batch of texts; the result has one vector per input, in input order
    #[inline]
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting embeddings for {} texts", texts.len());

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let response_text = self.post_json("embeddings", &request)?;

        let response: EmbeddingResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagChatError::Service(format!("Failed to parse embedding response: {}", e))
        })?;

        if response.data.len() != texts.len() {
            return Err(RagChatError::Service(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|item| item.index);

        debug!("Received {} embeddings", data.len());
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }

    /// Run a non-streaming completion and return the reply text
    #[inline]
    pub fn complete(&self, messages: &[ChatMessage], options: CompletionOptions) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages,
            stream: false,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };
        let response_text = self.post_json("chat/completions", &request)?;

        let response: ChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagChatError::Service(format!("Failed to parse completion response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagChatError::Service("Completion returned no choices".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    /// Open a streaming completion over the given history
    #[inline]
    pub fn stream_completion(&self, messages: &[ChatMessage]) -> Result<CompletionStream> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages,
            stream: true,
            temperature: None,
            max_tokens: None,
        };
        let url = self.endpoint("chat/completions")?;
        let body = serialize_request(&request)?;

        debug!(
            "Opening completion stream with {} messages at {}",
            messages.len(),
            url
        );

        let response = self
            .agent
            .post(url.as_str())
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .send(&body)
            .map_err(|e| service_error("Failed to open completion stream", &e))?;

        Ok(CompletionStream::new(response.into_body().into_reader()))
    }

    fn post_json<T: Serialize>(&self, endpoint: &str, request: &T) -> Result<String> {
        let url = self.endpoint(endpoint)?;
        let body = serialize_request(request)?;

        debug!("POST {}", url);

        self.agent
            .post(url.as_str())
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| service_error(&format!("Request to {} failed", endpoint), &e))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RagChatError::Service(format!("Failed to build {} URL: {}", path, e)))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

fn serialize_request<T: Serialize>(request: &T) -> Result<String> {
    serde_json::to_string(request)
        .map_err(|e| RagChatError::Service(format!("Failed to serialize request: {}", e)))
}

fn service_error(context: &str, error: &ureq::Error) -> RagChatError {
    match error {
        ureq::Error::StatusCode(status) => {
            warn!("{}: HTTP {}", context, status);
            RagChatError::Service(format!("{}: HTTP {}", context, status))
        }
        _ => {
            warn!("{}: {}", context, error);
            RagChatError::Service(format!("{}: {}", context, error))
        }
    }
}
