//! Pipeline behaviour around the model call
//!
//! 1. Model failures abort the run and persist nothing
//! 2. Unreadable model output degrades to a dashboard without insights
//! 3. Follow-up questions read the stored document text

use async_trait::async_trait;
use docboard_llm::*;
use docboard_pipeline::*;
use docboard_storage::{DashboardStore, MemoryStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const REPORT: &str = "Quarterly Review

Results

Revenue grew from $4M to $5M.

Conclusion

We will expand next year.
";

/// Answers every request with the same text after an optional delay.
struct FixedProvider {
    reply: Result<String, LLMError>,
    delay: Duration,
}

impl FixedProvider {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
        })
    }
}

#[async_trait]
impl CompletionProvider for FixedProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        tokio::time::sleep(self.delay).await;
        let content = self.reply.clone()?;
        Ok(CompletionResponse {
            content,
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            model: "fixed".to_string(),
        })
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: Provider::Local,
            name: "fixed".to_string(),
            max_tokens: 8000,
            supports_json_mode: false,
        }
    }
}

fn pipeline_with(provider: Arc<dyn CompletionProvider>, store: Arc<MemoryStore>) -> Pipeline {
    Pipeline::new(PipelineConfig::default(), provider, store)
}

fn report() -> AnalysisRequest {
    AnalysisRequest::new(REPORT.as_bytes().to_vec(), "text/plain").file_name("review.txt")
}

#[tokio::test]
async fn test_timeout_persists_nothing() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(FixedProvider {
        reply: Ok("{\"insights\": [\"late\"]}".to_string()),
        delay: Duration::from_secs(30),
    });
    let pipeline = pipeline_with(provider, store.clone()).with_timeout(Duration::from_millis(20));

    let err = pipeline.run(report()).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ModelUnavailable(LLMError::Timeout { .. })
    ));
    assert!(store.is_empty());
    assert!(store.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_auth_failure_persists_nothing() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(FixedProvider {
        reply: Err(LLMError::Auth("invalid key".to_string())),
        delay: Duration::ZERO,
    });
    let pipeline = pipeline_with(provider, store.clone()).with_retry(RetryPolicy::with_retries(3));

    let err = pipeline.run(report()).await.unwrap_err();
    assert!(matches!(err, PipelineError::ModelUnavailable(LLMError::Auth(_))));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_invalid_response_still_assembles() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline_with(FixedProvider::replying("no structure here"), store.clone());

    let dashboard = pipeline.run(report()).await.unwrap();
    assert!(dashboard.insights.is_empty());
    assert!(dashboard
        .warnings
        .iter()
        .any(|w| w.starts_with("model response invalid")));
    assert_eq!(dashboard.title, "Quarterly Review");
    assert_eq!(dashboard.charts.len(), 1);
    assert_eq!(store.get(dashboard.id).unwrap(), dashboard);
}

#[tokio::test]
async fn test_unsupported_upload_never_reaches_the_model() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(FixedProvider {
        reply: Err(LLMError::api("must not be called")),
        delay: Duration::ZERO,
    });
    let pipeline = pipeline_with(provider, store.clone());

    let err = pipeline
        .run(AnalysisRequest::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Ingest(docboard_ingest::IngestError::UnsupportedFormat(_))
    ));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_ask_uses_stored_text() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline_with(Arc::new(OfflineProvider::new()), store.clone());

    let dashboard = pipeline.run(report()).await.unwrap();
    assert!(!dashboard.insights.is_empty());

    let answer = pipeline.ask(dashboard.id, "How did revenue change?").await.unwrap();
    assert_eq!(answer, "Revenue grew from $4M to $5M.");

    let missing = Uuid::new_v4();
    assert!(matches!(
        pipeline.ask(missing, "Anything?").await,
        Err(PipelineError::Store(StoreError::NotFound(id))) if id == missing
    ));
}
