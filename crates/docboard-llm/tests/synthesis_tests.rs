//! Behavioural tests for the Insight Synthesizer
//!
//! Scripted providers stand in for the completion service:
//! 1. Well-formed responses become resolved insights
//! 2. Timeouts and transport failures surface as ModelUnavailable
//! 3. Retries happen only for transient failures and only when enabled
//! 4. Unreadable responses surface as ModelResponseInvalid

use async_trait::async_trait;
use docboard_dashboard::{InsightCategory, InsightRef};
use docboard_ingest::{DataPoint, MetricSeries, Section, SectionLabel, SeriesSource};
use docboard_llm::*;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Providers
// ============================================================================

/// Replays a fixed script of replies and records every request.
#[derive(Default)]
struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, LLMError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<String, LLMError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        self.requests.lock().push(request.clone());
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::api("script exhausted")))?;
        Ok(CompletionResponse {
            content: reply,
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            model: "scripted".to_string(),
        })
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: Provider::Local,
            name: "scripted".to_string(),
            max_tokens: 8000,
            supports_json_mode: true,
        }
    }
}

/// Never answers within any reasonable timeout.
struct StalledProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionProvider for StalledProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(LLMError::api("unreachable"))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: Provider::Local,
            name: "stalled".to_string(),
            max_tokens: 8000,
            supports_json_mode: false,
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn sections() -> Vec<Section> {
    vec![
        Section {
            label: SectionLabel::Abstract,
            heading: Some("Abstract".to_string()),
            blocks: 0..2,
            text: "Abstract\nWe evaluate a new ranking model.".to_string(),
        },
        Section {
            label: SectionLabel::Results,
            heading: Some("Results".to_string()),
            blocks: 2..4,
            text: "Results\nAccuracy improved from 72% to 91%.".to_string(),
        },
    ]
}

fn series() -> Vec<MetricSeries> {
    vec![MetricSeries {
        name: "accuracy".to_string(),
        unit: Some("%".to_string()),
        points: [("before", 72.0), ("after", 91.0)]
            .into_iter()
            .map(|(label, value)| DataPoint {
                label: label.to_string(),
                value,
                y: None,
            })
            .collect(),
        section: 1,
        section_label: SectionLabel::Results,
        source: SeriesSource::Transition,
    }]
}

fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy::with_retries(max_retries).with_delays(Duration::from_millis(1), Duration::from_millis(5))
}

const GOOD_REPLY: &str = r#"{"insights": [
    {"statement": "Accuracy rose by 19 points.", "category": "trend", "confidence": 0.9, "series": "accuracy"},
    {"statement": "The study evaluates a ranking model.", "category": "summary", "section": "abstract"}
], "emphasis": ["91% accuracy"]}"#;

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_well_formed_response_becomes_insights() {
    let provider = ScriptedProvider::new(vec![Ok(GOOD_REPLY.to_string())]);
    let synthesizer = InsightSynthesizer::new(provider.clone());
    let sections = sections();
    let series = series();

    let synthesis = synthesizer
        .synthesize(SynthesisRequest {
            sections: &sections,
            series: &series,
            custom_prompt: Some("Keep it short, focus on accuracy."),
            summary_length: SummaryLength::Short,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(synthesis.attempts, 1);
    assert_eq!(synthesis.insights.len(), 2);
    assert_eq!(synthesis.insights[0].category, InsightCategory::Trend);
    assert_eq!(
        synthesis.insights[0].supports,
        Some(InsightRef::Series {
            name: "accuracy".to_string()
        })
    );
    assert_eq!(
        synthesis.insights[1].supports,
        Some(InsightRef::Section {
            index: 0,
            label: SectionLabel::Abstract
        })
    );
    assert_eq!(synthesis.emphases, vec!["91% accuracy".to_string()]);

    let request = provider.requests.lock()[0].clone();
    let user = request.user_prompt().unwrap();
    assert!(user.contains("Keep it short, focus on accuracy."));
    assert!(user.contains("produce 3 insight statements"));
    assert!(user.contains("- accuracy [%]: 2 points"));
    assert!(request.json_mode);
}

#[tokio::test]
async fn test_timeout_is_model_unavailable() {
    let provider = Arc::new(StalledProvider {
        calls: AtomicUsize::new(0),
    });
    let synthesizer =
        InsightSynthesizer::new(provider.clone()).with_timeout(Duration::from_millis(20));
    let sections = sections();

    let err = synthesizer
        .synthesize(SynthesisRequest {
            sections: &sections,
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SynthesisError::ModelUnavailable(LLMError::Timeout { .. })
    ));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_retry_by_default() {
    let provider = ScriptedProvider::new(vec![
        Err(LLMError::Network("connection reset".to_string())),
        Ok(GOOD_REPLY.to_string()),
    ]);
    let err = InsightSynthesizer::new(provider.clone())
        .synthesize(SynthesisRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::ModelUnavailable(LLMError::Network(_))));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_transient_failures_retry_with_backoff() {
    let provider = ScriptedProvider::new(vec![
        Err(LLMError::Network("connection reset".to_string())),
        Err(LLMError::Api {
            status: Some(503),
            message: "overloaded".to_string(),
        }),
        Ok(GOOD_REPLY.to_string()),
    ]);
    let synthesis = InsightSynthesizer::new(provider.clone())
        .with_retry(fast_retries(2))
        .synthesize(SynthesisRequest::default())
        .await
        .unwrap();
    assert_eq!(synthesis.attempts, 3);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_permanent_failures_are_not_retried() {
    let provider = ScriptedProvider::new(vec![
        Err(LLMError::Auth("invalid key".to_string())),
        Ok(GOOD_REPLY.to_string()),
    ]);
    let err = InsightSynthesizer::new(provider.clone())
        .with_retry(fast_retries(3))
        .synthesize(SynthesisRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::ModelUnavailable(LLMError::Auth(_))));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_unreadable_response_is_invalid() {
    let provider = ScriptedProvider::new(vec![Ok("I'm sorry, I can't do that.".to_string())]);
    let err = InsightSynthesizer::new(provider)
        .synthesize(SynthesisRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::ModelResponseInvalid { .. }));
}

#[tokio::test]
async fn test_partial_response_keeps_parseable_subset() {
    let provider = ScriptedProvider::new(vec![Ok(
        r#"{"insights": [{"statement": "Kept."}, {"confidence": 0.4}, 17]}"#.to_string(),
    )]);
    let synthesis = InsightSynthesizer::new(provider)
        .synthesize(SynthesisRequest::default())
        .await
        .unwrap();
    assert_eq!(synthesis.insights.len(), 1);
    assert_eq!(synthesis.insights[0].statement, "Kept.");
    assert_eq!(synthesis.insights[0].category, InsightCategory::Finding);
    assert_eq!(synthesis.rejected, 2);
}

#[tokio::test]
async fn test_offline_provider_end_to_end() {
    let client = UnifiedClient::from_config(LLMConfig::offline()).unwrap();
    let sections = sections();
    let series = series();
    let synthesis = InsightSynthesizer::new(Arc::new(client))
        .synthesize(SynthesisRequest {
            sections: &sections,
            series: &series,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(synthesis.insights.len(), 3);
    assert_eq!(synthesis.insights[0].category, InsightCategory::Trend);
    assert!(synthesis.insights[2].statement.starts_with("Results: Accuracy improved"));
    assert_eq!(
        synthesis.insights[2].supports,
        Some(InsightRef::Section {
            index: 1,
            label: SectionLabel::Results
        })
    );
}

#[tokio::test]
async fn test_chat_answers_and_rejects_empty_answers() {
    let provider = ScriptedProvider::new(vec![Ok("  Revenue was $5M.  ".to_string()), Ok("   ".to_string())]);
    let chat = DocumentChat::new(provider.clone());

    let answer = chat.ask("Revenue was $5M in 2023.", "What was revenue?").await.unwrap();
    assert_eq!(answer, "Revenue was $5M.");
    let request = provider.requests.lock()[0].clone();
    assert_eq!(request.temperature, Some(0.3));

    let err = chat.ask("Revenue was $5M in 2023.", "Again?").await.unwrap_err();
    assert!(matches!(err, SynthesisError::ModelResponseInvalid { .. }));
}
