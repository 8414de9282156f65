//! Integration tests for the complete Docboard pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Parser → Segmenter → Metric Extractor → Chart Mapper
//! - Insight Synthesizer (offline provider) → Assembler → FileStore
//! - Stored dashboard → HTML / JSON export
//!
//! Run with: cargo test --test integration_tests

use async_trait::async_trait;
use docboard_dashboard::{from_json, render_html, to_json, ChartType, Layout, Theme};
use docboard_ingest::{MediaType, SectionLabel};
use docboard_llm::{
    CompletionProvider, CompletionRequest, CompletionResponse, LLMError, ModelInfo,
    OfflineProvider, Provider, SummaryLength,
};
use docboard_pipeline::{AnalysisRequest, Pipeline, PipelineConfig, PipelineError};
use docboard_storage::{open_store, DashboardStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const STUDY: &str = "Adaptive Caching for Edge Inference

Abstract

We study request caching on edge devices.

Methodology

We replayed 10,000 requests across three device classes.

Results

Accuracy improved from 72% in 2021 to 91% in 2023.

Conclusion

Caching improves accuracy and latency on every device class.
";

fn offline_pipeline(store: Arc<dyn DashboardStore>) -> Pipeline {
    Pipeline::new(PipelineConfig::default(), Arc::new(OfflineProvider::new()), store)
}

fn study() -> AnalysisRequest {
    AnalysisRequest::new(STUDY.as_bytes().to_vec(), "text/plain").file_name("edge-caching.txt")
}

// ============================================================================
// Analysis without a model
// ============================================================================

#[test]
fn test_analysis_segments_and_extracts() {
    let dir = tempdir().unwrap();
    let pipeline = offline_pipeline(Arc::new(open_store(dir.path()).unwrap()));
    let analysis = pipeline.analyze(STUDY.as_bytes(), MediaType::Txt).unwrap();

    let labels: Vec<SectionLabel> = analysis.sections.iter().map(|s| s.label).collect();
    assert!(labels.contains(&SectionLabel::Abstract));
    assert!(labels.contains(&SectionLabel::Methodology));
    assert!(labels.contains(&SectionLabel::Results));
    assert!(labels.contains(&SectionLabel::Conclusion));

    let series = analysis.chart_series();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].name, "accuracy");
    assert_eq!(series[0].values(), vec![72.0, 91.0]);
    assert_eq!(series[0].labels(), vec!["2021", "2023"]);
    assert_eq!(series[0].section_label, SectionLabel::Results);

    // Nothing was persisted by a model-free analysis.
    assert!(pipeline.store().list().unwrap().is_empty());
}

// ============================================================================
// Full run
// ============================================================================

#[tokio::test]
async fn test_full_run_persists_dashboard() {
    let dir = tempdir().unwrap();
    let store: Arc<dyn DashboardStore> = Arc::new(open_store(dir.path()).unwrap());
    let pipeline = offline_pipeline(Arc::clone(&store));

    let dashboard = pipeline
        .run(study().summary_length(SummaryLength::Short))
        .await
        .unwrap();

    assert_eq!(dashboard.title, "Adaptive Caching for Edge Inference");
    assert!(!dashboard.insights.is_empty());
    assert!(dashboard.insights.len() <= SummaryLength::Short.target_sentences());
    assert!(dashboard
        .charts
        .iter()
        .any(|c| c.chart_type == ChartType::Line && c.values == vec![72.0, 91.0]));

    let source = dashboard.source.as_ref().unwrap();
    assert_eq!(source.media_type, MediaType::Txt);
    assert_eq!(source.size_bytes, STUDY.len() as u64);
    assert_eq!(source.sha256.len(), 64);

    // Reopening the directory sees the same dashboard.
    let reopened = open_store(dir.path()).unwrap();
    assert_eq!(reopened.get(dashboard.id).unwrap(), dashboard);
    assert_eq!(reopened.list().unwrap()[0].id, dashboard.id);
}

#[tokio::test]
async fn test_requested_theme_wins() {
    let dir = tempdir().unwrap();
    let pipeline = offline_pipeline(Arc::new(open_store(dir.path()).unwrap()));
    let dashboard = pipeline
        .run(study().theme(Theme::with_layout(Layout::Corporate)))
        .await
        .unwrap();
    assert_eq!(dashboard.theme.layout, Layout::Corporate);
}

#[tokio::test]
async fn test_separate_runs_get_distinct_ids() {
    let dir = tempdir().unwrap();
    let pipeline = offline_pipeline(Arc::new(open_store(dir.path()).unwrap()));
    let first = pipeline.run(study()).await.unwrap();
    let second = pipeline.run(study()).await.unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(pipeline.store().list().unwrap().len(), 2);
}

// ============================================================================
// Failure paths
// ============================================================================

struct SlowProvider;

#[async_trait]
impl CompletionProvider for SlowProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(LLMError::InvalidResponse("unreachable".to_string()))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: Provider::Local,
            name: "slow".to_string(),
            max_tokens: 8000,
            supports_json_mode: false,
        }
    }
}

#[tokio::test]
async fn test_model_timeout_leaves_store_empty() {
    let dir = tempdir().unwrap();
    let store: Arc<dyn DashboardStore> = Arc::new(open_store(dir.path()).unwrap());
    let pipeline = Pipeline::new(PipelineConfig::default(), Arc::new(SlowProvider), store)
        .with_timeout(Duration::from_millis(50));

    let err = pipeline.run(study()).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ModelUnavailable(LLMError::Timeout { .. })
    ));
    assert!(pipeline.store().list().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_corrupt_docx_is_rejected() {
    let dir = tempdir().unwrap();
    let pipeline = offline_pipeline(Arc::new(open_store(dir.path()).unwrap()));
    let request = AnalysisRequest::new(b"not a zip archive".to_vec(), "docx");
    assert!(matches!(
        pipeline.run(request).await,
        Err(PipelineError::Ingest(
            docboard_ingest::IngestError::CorruptDocument(_)
        ))
    ));
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        max_file_bytes: 64,
        ..Default::default()
    };
    let pipeline = Pipeline::new(
        config,
        Arc::new(OfflineProvider::new()),
        Arc::new(open_store(dir.path()).unwrap()),
    );
    assert!(matches!(
        pipeline.run(study()).await,
        Err(PipelineError::Rejected(_))
    ));
}

// ============================================================================
// Export
// ============================================================================

#[tokio::test]
async fn test_exports_round_trip_and_render() {
    let dir = tempdir().unwrap();
    let pipeline = offline_pipeline(Arc::new(open_store(dir.path()).unwrap()));
    let dashboard = pipeline.run(study()).await.unwrap();

    let json = to_json(&dashboard).unwrap();
    assert_eq!(from_json(&json).unwrap(), dashboard);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["id"], dashboard.id.to_string());

    let html = render_html(&dashboard);
    assert!(html.contains("<title>Adaptive Caching for Edge Inference</title>"));
    for insight in &dashboard.insights {
        let escaped = docboard_dashboard::export::escape_html(&insight.statement);
        assert!(html.contains(&escaped), "missing insight: {}", insight.statement);
    }
}
