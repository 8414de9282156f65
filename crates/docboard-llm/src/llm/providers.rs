//! LLM API Providers
//!
//! Concrete implementations for OpenAI-compatible services (OpenAI, Groq,
//! local servers), Anthropic, Gemini, and the built-in offline provider.

use super::*;
use reqwest::{Client, Response, StatusCode};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

// ============================================================================
// Configuration
// ============================================================================

/// LLM configuration loaded from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LLMConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Groq,
    Anthropic,
    Gemini,
    Local,
    Offline,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Groq => "groq",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::Local => "local",
            Provider::Offline => "offline",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Groq => "llama-3.3-70b-versatile",
            Provider::Anthropic => "claude-3-5-sonnet-latest",
            Provider::Gemini => "gemini-1.5-flash",
            Provider::Local => "default",
            Provider::Offline => "offline-heuristic",
        }
    }

    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Provider::OpenAI => Some("https://api.openai.com/v1"),
            Provider::Groq => Some("https://api.groq.com/openai/v1"),
            Provider::Anthropic => Some("https://api.anthropic.com/v1"),
            Provider::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
            Provider::Local | Provider::Offline => None,
        }
    }

    /// Environment variable holding the credential (or URL for local).
    fn credential_var(self) -> Option<&'static str> {
        match self {
            Provider::OpenAI => Some("OPENAI_API_KEY"),
            Provider::Groq => Some("GROQ_API_KEY"),
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::Local => Some("LOCAL_LLM_URL"),
            Provider::Offline => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "groq" => Ok(Provider::Groq),
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" | "google" => Ok(Provider::Gemini),
            "local" | "ollama" => Ok(Provider::Local),
            "offline" | "none" => Ok(Provider::Offline),
            other => Err(ConfigError::Invalid(format!("unknown provider `{other}`"))),
        }
    }
}

/// Auto-detection order when no provider is named explicitly.
const DETECTION_ORDER: [Provider; 5] = [
    Provider::Groq,
    Provider::OpenAI,
    Provider::Anthropic,
    Provider::Gemini,
    Provider::Local,
];

impl LLMConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match var("DOCBOARD_PROVIDER") {
            Some(name) => name.parse::<Provider>()?,
            None => DETECTION_ORDER
                .into_iter()
                .find(|p| p.credential_var().and_then(&var).is_some())
                .ok_or(ConfigError::NoProviderConfigured)?,
        };

        let credential = provider.credential_var().and_then(&var);
        let (api_key, base_url) = match provider {
            Provider::Offline => (String::new(), None),
            Provider::Local => {
                let url = var("DOCBOARD_BASE_URL").or(credential).ok_or_else(|| {
                    ConfigError::Invalid("local provider needs LOCAL_LLM_URL".to_string())
                })?;
                (String::new(), Some(url))
            }
            _ => {
                let key = credential.ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "provider {provider} needs {}",
                        provider.credential_var().unwrap_or_default()
                    ))
                })?;
                (key, var("DOCBOARD_BASE_URL"))
            }
        };

        let timeout_secs = match var("DOCBOARD_LLM_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "DOCBOARD_LLM_TIMEOUT_SECS must be a positive integer, got `{raw}`"
                    )))
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };
        let max_retries = match var("DOCBOARD_LLM_MAX_RETRIES") {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                ConfigError::Invalid(format!(
                    "DOCBOARD_LLM_MAX_RETRIES must be a non-negative integer, got `{raw}`"
                ))
            })?,
            None => DEFAULT_MAX_RETRIES,
        };

        Ok(Self {
            provider,
            api_key,
            model: var("DOCBOARD_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            base_url,
            timeout_secs,
            max_retries,
        })
    }

    pub fn offline() -> Self {
        Self {
            provider: Provider::Offline,
            api_key: String::new(),
            model: Provider::Offline.default_model().to_string(),
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 0,
        }
    }

    /// Hosted provider with its default model.
    pub fn hosted(provider: Provider, api_key: &str) -> Self {
        Self {
            provider,
            api_key: api_key.to_string(),
            model: provider.default_model().to_string(),
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Create local config
    pub fn local(url: &str, model: &str) -> Self {
        Self {
            provider: Provider::Local,
            api_key: String::new(),
            model: model.to_string(),
            base_url: Some(url.to_string()),
            timeout_secs: 120,
            max_retries: 1,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn endpoint(&self) -> Result<String, LLMError> {
        self.base_url
            .as_deref()
            .or(self.provider.default_base_url())
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| LLMError::api("No base URL configured"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "No LLM provider configured. Set GROQ_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, \
         GEMINI_API_KEY, LOCAL_LLM_URL, or DOCBOARD_PROVIDER=offline"
    )]
    NoProviderConfigured,
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Shared HTTP plumbing
// ============================================================================

fn http_client(timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::Invalid(format!("failed to create HTTP client: {e}")))
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> LLMError {
    if err.is_timeout() {
        LLMError::Timeout { after: timeout }
    } else {
        LLMError::Network(err.to_string())
    }
}

/// Map non-success statuses onto [`LLMError`].
async fn check_status(response: Response) -> Result<Response, LLMError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(LLMError::RateLimited {
            retry_after_ms: retry_after * 1000,
        });
    }
    let error_text = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(LLMError::Auth(error_text));
    }
    Err(LLMError::Api {
        status: Some(status.as_u16()),
        message: error_text,
    })
}

async fn read_json(response: Response) -> Result<serde_json::Value, LLMError> {
    response
        .json()
        .await
        .map_err(|e| LLMError::InvalidResponse(e.to_string()))
}

fn usage_field(value: &serde_json::Value) -> usize {
    value.as_u64().unwrap_or(0) as usize
}

/// Request body for `/chat/completions` style endpoints.
fn chat_body(model: &str, request: &CompletionRequest, json_mode: bool) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
        .collect();

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    if json_mode && request.json_mode {
        body["response_format"] = serde_json::json!({"type": "json_object"});
    }
    body
}

fn parse_chat_response(data: &serde_json::Value, model: &str) -> Result<CompletionResponse, LLMError> {
    let content = data["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| LLMError::InvalidResponse("missing choices[0].message.content".to_string()))?
        .to_string();

    let finish_reason = match data["choices"][0]["finish_reason"].as_str() {
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    };

    Ok(CompletionResponse {
        content,
        finish_reason,
        usage: Usage {
            prompt_tokens: usage_field(&data["usage"]["prompt_tokens"]),
            completion_tokens: usage_field(&data["usage"]["completion_tokens"]),
        },
        model: data["model"].as_str().unwrap_or(model).to_string(),
    })
}

// ============================================================================
// OpenAI-compatible Provider (OpenAI, Groq)
// ============================================================================

pub struct OpenAIClient {
    client: Client,
    config: LLMConfig,
}

impl OpenAIClient {
    pub fn new(config: LLMConfig) -> Result<Self, ConfigError> {
        let client = http_client(config.timeout())?;
        Ok(Self { client, config })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let url = format!("{}/chat/completions", self.config.endpoint()?);
        let body = chat_body(&self.config.model, request, true);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.timeout()))?;

        let data = read_json(check_status(response).await?).await?;
        parse_chat_response(&data, &self.config.model)
    }
}

// ============================================================================
// Anthropic Provider
// ============================================================================

pub struct AnthropicClient {
    client: Client,
    config: LLMConfig,
}

impl AnthropicClient {
    pub fn new(config: LLMConfig) -> Result<Self, ConfigError> {
        let client = http_client(config.timeout())?;
        Ok(Self { client, config })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let url = format!("{}/messages", self.config.endpoint()?);

        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });
        if let Some(sys) = request.system_prompt() {
            body["system"] = serde_json::json!(sys);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.timeout()))?;

        let data = read_json(check_status(response).await?).await?;

        let content: String = data["content"]
            .as_array()
            .ok_or_else(|| LLMError::InvalidResponse("missing content blocks".to_string()))?
            .iter()
            .filter_map(|block| block["text"].as_str())
            .collect();

        let finish_reason = match data["stop_reason"].as_str() {
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        Ok(CompletionResponse {
            content,
            finish_reason,
            usage: Usage {
                prompt_tokens: usage_field(&data["usage"]["input_tokens"]),
                completion_tokens: usage_field(&data["usage"]["output_tokens"]),
            },
            model: self.config.model.clone(),
        })
    }
}

// ============================================================================
// Gemini Provider
// ============================================================================

pub struct GeminiClient {
    client: Client,
    config: LLMConfig,
}

impl GeminiClient {
    pub fn new(config: LLMConfig) -> Result<Self, ConfigError> {
        let client = http_client(config.timeout())?;
        Ok(Self { client, config })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint()?,
            self.config.model
        );

        let contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = if m.role == Role::Assistant { "model" } else { "user" };
                serde_json::json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut generation = serde_json::json!({});
        if let Some(max_tokens) = request.max_tokens {
            generation["maxOutputTokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            generation["temperature"] = serde_json::json!(temp);
        }
        if request.json_mode {
            generation["responseMimeType"] = serde_json::json!("application/json");
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": generation,
        });
        if let Some(sys) = request.system_prompt() {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": sys }] });
        }

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.timeout()))?;

        let data = read_json(check_status(response).await?).await?;

        let candidate = &data["candidates"][0];
        let content: String = candidate["content"]["parts"]
            .as_array()
            .ok_or_else(|| LLMError::InvalidResponse("missing candidates[0].content".to_string()))?
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect();

        let finish_reason = match candidate["finishReason"].as_str() {
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        Ok(CompletionResponse {
            content,
            finish_reason,
            usage: Usage {
                prompt_tokens: usage_field(&data["usageMetadata"]["promptTokenCount"]),
                completion_tokens: usage_field(&data["usageMetadata"]["candidatesTokenCount"]),
            },
            model: self.config.model.clone(),
        })
    }
}

// ============================================================================
// Local Provider (Ollama, vLLM, etc.)
// ============================================================================

pub struct LocalClient {
    client: Client,
    config: LLMConfig,
}

impl LocalClient {
    pub fn new(config: LLMConfig) -> Result<Self, ConfigError> {
        let client = http_client(config.timeout())?;
        Ok(Self { client, config })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        // OpenAI-compatible API (vLLM, Ollama in OpenAI mode)
        let url = format!("{}/v1/chat/completions", self.config.endpoint()?);
        let body = chat_body(&self.config.model, request, false);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.timeout()))?;

        let data = read_json(check_status(response).await?).await?;
        parse_chat_response(&data, &self.config.model)
    }
}

// ============================================================================
// Unified Client
// ============================================================================

/// Unified LLM client that dispatches to the configured provider
pub enum UnifiedClient {
    OpenAI(OpenAIClient),
    Anthropic(AnthropicClient),
    Gemini(GeminiClient),
    Local(LocalClient),
    Offline(OfflineProvider),
}

impl UnifiedClient {
    /// Create from configuration
    pub fn from_config(config: LLMConfig) -> Result<Self, ConfigError> {
        tracing::debug!(provider = %config.provider, model = %config.model, "building LLM client");
        Ok(match config.provider {
            Provider::OpenAI | Provider::Groq => Self::OpenAI(OpenAIClient::new(config)?),
            Provider::Anthropic => Self::Anthropic(AnthropicClient::new(config)?),
            Provider::Gemini => Self::Gemini(GeminiClient::new(config)?),
            Provider::Local => Self::Local(LocalClient::new(config)?),
            Provider::Offline => Self::Offline(OfflineProvider::new()),
        })
    }

    /// Create from environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_config(LLMConfig::from_env()?)
    }

    fn config(&self) -> Option<&LLMConfig> {
        match self {
            Self::OpenAI(c) => Some(&c.config),
            Self::Anthropic(c) => Some(&c.config),
            Self::Gemini(c) => Some(&c.config),
            Self::Local(c) => Some(&c.config),
            Self::Offline(_) => None,
        }
    }
}

#[async_trait]
impl CompletionProvider for UnifiedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        match self {
            Self::OpenAI(c) => c.complete(request).await,
            Self::Anthropic(c) => c.complete(request).await,
            Self::Gemini(c) => c.complete(request).await,
            Self::Local(c) => c.complete(request).await,
            Self::Offline(c) => c.complete(request).await,
        }
    }

    fn model_info(&self) -> ModelInfo {
        match (self, self.config()) {
            (Self::Offline(c), _) => c.model_info(),
            (_, Some(config)) => ModelInfo {
                provider: config.provider,
                name: config.model.clone(),
                max_tokens: 8000,
                supports_json_mode: matches!(
                    config.provider,
                    Provider::OpenAI | Provider::Groq | Provider::Gemini
                ),
            },
            (_, None) => OfflineProvider::new().model_info(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
