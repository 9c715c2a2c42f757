//! Chat-completion client for the extraction and synthesis stages.
//!
//! The LLM is used **only** for:
//! - Decomposing a question into themes or triplets
//! - Synthesizing the final answer from retrieved graph facts
//!
//! Identifier resolution and fact retrieval never touch the LLM.

pub mod json;

use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;
use crate::error::{ConfigError, ConfigResult};

/// Errors from the LLM subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("LLM endpoint {url} is unreachable: {message}")]
    #[diagnostic(
        code(factcards::llm::unavailable),
        help("Check your network connection and `llm.api_url` in the config.")
    )]
    Unavailable { url: String, message: String },

    #[error("LLM request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(factcards::llm::timeout),
        help("Increase `llm.timeout_secs` or use a faster model.")
    )]
    Timeout { timeout_secs: u64 },

    #[error("LLM endpoint returned HTTP {status}: {body}")]
    #[diagnostic(
        code(factcards::llm::status),
        help("HTTP 401 means the API key was rejected; 402/429 mean the account is out of credit or rate limited.")
    )]
    Status { status: u16, body: String },

    #[error("failed to parse LLM response: {message}")]
    #[diagnostic(
        code(factcards::llm::parse_error),
        help("The endpoint returned something other than a chat-completions payload.")
    )]
    ParseError { message: String },

    #[error("LLM returned an empty completion")]
    #[diagnostic(code(factcards::llm::empty))]
    EmptyCompletion,
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One chat-completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Ask the service for a JSON object response.
    pub json_mode: bool,
}

impl ChatRequest {
    /// A system instruction followed by one user turn.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            json_mode: false,
        }
    }

    pub fn json(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    /// Content of the last user message.
    pub fn user_content(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Anything that can answer a chat-completion request with text.
pub trait ChatBackend: Send + Sync {
    /// Return the assistant message content, trimmed and non-empty.
    fn complete(&self, request: &ChatRequest) -> LlmResult<String>;
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint
/// (OpenRouter by default).
pub struct ChatClient {
    config: LlmConfig,
    api_key: String,
    agent: ureq::Agent,
}

impl ChatClient {
    /// Build a client. Fails when no API key is configured.
    pub fn new(config: LlmConfig) -> ConfigResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("factcards/", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self {
            config,
            api_key,
            agent,
        })
    }

    /// Get the model name being used.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn map_error(&self, err: ureq::Error) -> LlmError {
        match err {
            ureq::Error::Status(status, response) => {
                let body = response.into_string().unwrap_or_default();
                LlmError::Status {
                    status,
                    body: preview(&body, 300),
                }
            }
            ureq::Error::Transport(transport) => {
                if is_timeout(&transport) {
                    LlmError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else {
                    LlmError::Unavailable {
                        url: self.config.api_url.clone(),
                        message: transport.to_string(),
                    }
                }
            }
        }
    }
}

impl ChatBackend for ChatClient {
    fn complete(&self, request: &ChatRequest) -> LlmResult<String> {
        let body = CompletionBody {
            model: &self.config.model,
            messages: &request.messages,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };
        tracing::debug!(
            model = %self.config.model,
            json_mode = request.json_mode,
            messages = request.messages.len(),
            "sending chat completion"
        );

        let response = self
            .agent
            .post(&self.config.api_url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Content-Type", "application/json")
            .send_json(&body)
            .map_err(|e| self.map_error(e))?;

        let parsed: CompletionResponse =
            response.into_json().map_err(|e| LlmError::ParseError {
                message: e.to_string(),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError {
                message: "response has no choices".into(),
            })?
            .message
            .content
            .unwrap_or_default();

        let content = content.trim();
        if content.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        Ok(content.to_string())
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("api_url", &self.config.api_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Whether a ureq transport failure was a read/connect timeout.
pub(crate) fn is_timeout(transport: &ureq::Transport) -> bool {
    let mut source = std::error::Error::source(transport);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            );
        }
        source = err.source();
    }
    false
}

/// Truncate a response body for error messages, on a char boundary.
pub(crate) fn preview(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
