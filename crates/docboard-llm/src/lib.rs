//! Docboard LLM: insight synthesis behind a swappable completion capability
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        INSIGHT SYNTHESIS                             │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  Sections ─┐                                                         │
//! │  Series  ──┼──► PromptBuilder ──► RetryPolicy ──► CompletionProvider │
//! │  Facts   ──┘    (token budget)    (transient      (OpenAI, Groq,     │
//! │  Instruction                        errors only)   Anthropic, Gemini,│
//! │                                        │           Local, Offline)   │
//! │                                        ▼                             │
//! │                               parse_response ──► Insight[]           │
//! │                                                                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - One completion call per document, bounded by a timeout
//! - Provider selection is configuration ([`LLMConfig::from_env`])
//! - Partial responses keep their readable statements
//! - [`DocumentChat`] answers follow-up questions from the stored text

pub mod chat;
pub mod llm;
pub mod prompt;
pub mod response;
pub mod retry;
pub mod synthesis;

pub use chat::{chat_request, DocumentChat, CHAT_CONTEXT_CHARS};
pub use llm::{
    CompletionProvider, CompletionRequest, CompletionResponse, ConfigError, FinishReason,
    LLMConfig, LLMError, Message, ModelInfo, OfflineProvider, Provider, Role, UnifiedClient, Usage,
};
pub use prompt::{estimate_tokens, Prompt, PromptBuilder, SummaryLength, DEFAULT_TOKEN_BUDGET};
pub use response::{parse_response, ParsedResponse, RawInsight};
pub use retry::{Outcome, RetryPolicy};
pub use synthesis::{InsightSynthesizer, Synthesis, SynthesisError, SynthesisRequest};
