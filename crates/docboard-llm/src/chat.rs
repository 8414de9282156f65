//! Questions about an already analysed document.

use std::sync::Arc;
use std::time::Duration;

use crate::llm::{CompletionProvider, CompletionRequest, Message};
use crate::synthesis::{complete_within, SynthesisError, DEFAULT_TIMEOUT};

/// Characters of document text sent as context.
pub const CHAT_CONTEXT_CHARS: usize = 20_000;
const CHAT_TEMPERATURE: f32 = 0.3;
const CHAT_MAX_TOKENS: usize = 1000;

pub(crate) const DOCUMENT_HEADER: &str = "## Document";
pub(crate) const QUESTION_HEADER: &str = "## Question";

const CHAT_SYSTEM: &str = "You answer questions about a document. Use only the document text \
provided. If the document does not contain the answer, say so plainly.";

/// Build the grounded request for `question`.
pub fn chat_request(document_text: &str, question: &str) -> CompletionRequest {
    let context: String = document_text.chars().take(CHAT_CONTEXT_CHARS).collect();
    CompletionRequest::new(vec![
        Message::system(CHAT_SYSTEM),
        Message::user(format!(
            "{DOCUMENT_HEADER}\n{}\n\n{QUESTION_HEADER}\n{}",
            context.trim(),
            question.trim()
        )),
    ])
    .with_max_tokens(CHAT_MAX_TOKENS)
    .with_temperature(CHAT_TEMPERATURE)
}

pub struct DocumentChat {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
}

impl DocumentChat {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn ask(&self, document_text: &str, question: &str) -> Result<String, SynthesisError> {
        let request = chat_request(document_text, question);
        tracing::debug!(question_chars = question.len(), "asking about document");
        let response = complete_within(self.provider.as_ref(), &request, self.timeout).await?;
        let answer = response.content.trim();
        if answer.is_empty() {
            return Err(SynthesisError::ModelResponseInvalid {
                reason: "empty answer".to_string(),
            });
        }
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_truncated() {
        let text = "x".repeat(CHAT_CONTEXT_CHARS + 500);
        let request = chat_request(&text, " Why? ");
        let user = request.user_prompt().unwrap();
        assert!(user.ends_with("## Question\nWhy?"));
        assert_eq!(user.matches('x').count(), CHAT_CONTEXT_CHARS);
        assert_eq!(request.temperature, Some(CHAT_TEMPERATURE));
    }
}
