//! Completion-service capability
//!
//! The pipeline talks to language models only through [`CompletionProvider`]:
//! one request in, one text completion out. Which provider answers is
//! configuration (see [`providers::LLMConfig`]), not pipeline logic.

use std::time::Duration;

use async_trait::async_trait;

pub mod offline;
pub mod providers;

pub use offline::OfflineProvider;
pub use providers::{ConfigError, LLMConfig, Provider, UnifiedClient};

// ============================================================================
// LLM Provider Interface
// ============================================================================

/// Trait for completion providers
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate completion
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError>;

    /// Get model info
    fn model_info(&self) -> ModelInfo;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    /// Ask the provider for a JSON object response where supported.
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            max_tokens: None,
            temperature: None,
            json_mode: false,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Content of the last user message.
    pub fn user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: Provider,
    pub name: String,
    pub max_tokens: usize,
    pub supports_json_mode: bool,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LLMError {
    #[error("API error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Api {
        status: Option<u16>,
        message: String,
    },
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LLMError {
    /// Network trouble, timeouts, throttling and server-side errors may
    /// succeed on a later attempt; everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            LLMError::Network(_) | LLMError::Timeout { .. } | LLMError::RateLimited { .. } => true,
            LLMError::Api {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 408,
            LLMError::Api { status: None, .. } | LLMError::Auth(_) | LLMError::InvalidResponse(_) => {
                false
            }
        }
    }

    pub fn api(message: impl Into<String>) -> Self {
        LLMError::Api {
            status: None,
            message: message.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
