//! Docboard analysis pipeline
//!
//! One sequential run per uploaded document:
//!
//! ```text
//! bytes ─► validate ─► Parser ─► Segmenter ─┬─► Metric Extractor ─► Chart Mapper ─┐
//!                                           └─► Insight Synthesizer ─────────────┼─► Assembler ─► Store
//!                                                (the only suspension point)     │
//!                          tables, keywords, provenance ─────────────────────────┘
//! ```
//!
//! Fatal errors abort before assembly, so a failed run never persists a
//! dashboard. An unreadable model response is not fatal: the dashboard is
//! assembled without insights and the problem is recorded as a warning.

pub mod config;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use docboard_dashboard::{Assembler, ChartMapper, Dashboard, DashboardParts, SourceInfo, Theme};
use docboard_ingest::{
    extract_tables, keyword_frequencies, IngestError, MediaType, MetricExtraction, MetricExtractor,
    MetricSeries, ParsedText, Section, Segmenter,
};
use docboard_llm::{
    CompletionProvider, DocumentChat, InsightSynthesizer, LLMError, PromptBuilder, RetryPolicy,
    SummaryLength, SynthesisError, SynthesisRequest,
};
use docboard_storage::{DashboardStore, StoreError};
use uuid::Uuid;

pub use config::PipelineConfig;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Caller-side rejection (size limits, empty upload).
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("completion service unavailable: {0}")]
    ModelUnavailable(#[source] LLMError),
    /// Only follow-up questions surface this; synthesis degrades instead.
    #[error("model response invalid: {0}")]
    ModelResponseInvalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SynthesisError> for PipelineError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::ModelUnavailable(inner) => PipelineError::ModelUnavailable(inner),
            SynthesisError::ModelResponseInvalid { reason } => {
                PipelineError::ModelResponseInvalid(reason)
            }
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub bytes: Vec<u8>,
    /// MIME type, extension, or empty to infer from `file_name`.
    pub media_type: String,
    pub file_name: Option<String>,
    pub custom_prompt: Option<String>,
    pub summary_length: SummaryLength,
    /// `None` picks a layout from the document's composition.
    pub theme: Option<Theme>,
}

impl AnalysisRequest {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
            ..Default::default()
        }
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = Some(prompt.into());
        self
    }

    pub fn summary_length(mut self, length: SummaryLength) -> Self {
        self.summary_length = length;
        self
    }

    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = Some(theme);
        self
    }
}

/// Model-free view of a document: everything before synthesis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub parsed: ParsedText,
    pub sections: Vec<Section>,
    pub extraction: MetricExtraction,
}

impl Analysis {
    pub fn chart_series(&self) -> Vec<MetricSeries> {
        self.extraction.chart_eligible().cloned().collect()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline {
    config: PipelineConfig,
    segmenter: Segmenter,
    extractor: MetricExtractor,
    mapper: ChartMapper,
    synthesizer: InsightSynthesizer,
    chat: DocumentChat,
    store: Arc<dyn DashboardStore>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn CompletionProvider>,
        store: Arc<dyn DashboardStore>,
    ) -> Self {
        let synthesizer = InsightSynthesizer::new(Arc::clone(&provider))
            .with_prompt_builder(PromptBuilder::new(config.prompt_token_budget));
        Self {
            config,
            segmenter: Segmenter::default(),
            extractor: MetricExtractor::default(),
            mapper: ChartMapper::default(),
            synthesizer,
            chat: DocumentChat::new(provider),
            store,
        }
    }

    /// Bound every completion call; expiry is treated as the model being unavailable.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.synthesizer = self.synthesizer.with_timeout(timeout);
        self.chat = self.chat.with_timeout(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.synthesizer = self.synthesizer.with_retry(retry);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DashboardStore> {
        &self.store
    }

    /// Ingress checks that happen before any parsing work.
    pub fn validate(&self, request: &AnalysisRequest) -> Result<MediaType, PipelineError> {
        let declared = request.media_type.trim();
        let media_type = if !declared.is_empty() {
            MediaType::resolve(declared)?
        } else if let Some(name) = request.file_name.as_deref() {
            MediaType::resolve(name)?
        } else {
            return Err(PipelineError::Rejected("no media type declared".to_string()));
        };

        if request.bytes.is_empty() {
            return Err(PipelineError::Rejected("empty upload".to_string()));
        }
        if request.bytes.len() > self.config.max_file_bytes {
            return Err(PipelineError::Rejected(format!(
                "{} bytes exceeds the {} byte limit",
                request.bytes.len(),
                self.config.max_file_bytes
            )));
        }
        Ok(media_type)
    }

    /// Parse, segment and extract. Pure; no model call.
    pub fn analyze(&self, bytes: &[u8], media_type: MediaType) -> Result<Analysis, IngestError> {
        let parsed = docboard_ingest::parse(bytes, media_type)?;
        let sections = self.segmenter.segment(&parsed);
        let extraction = self.extractor.extract(&sections);
        Ok(Analysis {
            parsed,
            sections,
            extraction,
        })
    }

    /// Run the whole pipeline and persist the resulting dashboard.
    pub async fn run(&self, request: AnalysisRequest) -> Result<Dashboard, PipelineError> {
        let media_type = self.validate(&request)?;
        let analysis = self.analyze(&request.bytes, media_type)?;
        let series = analysis.chart_series();
        tracing::info!(
            media_type = %media_type,
            blocks = analysis.parsed.blocks.len(),
            sections = analysis.sections.len(),
            series = series.len(),
            facts = analysis.extraction.facts.len(),
            "document analysed"
        );

        let mut warnings = analysis.parsed.warnings.clone();
        let synthesis = self
            .synthesizer
            .synthesize(SynthesisRequest {
                sections: &analysis.sections,
                series: &series,
                facts: &analysis.extraction.facts,
                custom_prompt: request.custom_prompt.as_deref(),
                summary_length: request.summary_length,
            })
            .await;
        let (insights, emphases) = match synthesis {
            Ok(synthesis) => {
                if synthesis.rejected > 0 {
                    warnings.push(format!(
                        "{} model response entries could not be read",
                        synthesis.rejected
                    ));
                }
                (synthesis.insights, synthesis.emphases)
            }
            Err(SynthesisError::ModelResponseInvalid { reason }) => {
                tracing::warn!(%reason, "continuing without insights");
                warnings.push(format!("model response invalid: {reason}"));
                (Vec::new(), Vec::new())
            }
            Err(SynthesisError::ModelUnavailable(err)) => {
                return Err(PipelineError::ModelUnavailable(err));
            }
        };

        let charts = series.iter().map(|s| self.mapper.map(s)).collect();
        let text = analysis.parsed.text();
        let source = SourceInfo {
            file_name: request.file_name.clone(),
            media_type,
            size_bytes: request.bytes.len() as u64,
            sha256: format!("{:x}", Sha256::digest(&request.bytes)),
            block_count: analysis.parsed.blocks.len(),
        };
        let title = analysis
            .parsed
            .title()
            .or_else(|| request.file_name.as_deref().and_then(file_stem));

        let dashboard = Assembler::new().assemble(DashboardParts {
            title,
            theme: request.theme,
            tables: extract_tables(&analysis.parsed),
            keywords: keyword_frequencies(&text, self.config.keyword_limit),
            sections: analysis.sections,
            charts,
            insights,
            emphases,
            facts: analysis.extraction.facts,
            source: Some(source),
            warnings,
        });

        // Context first; the dashboard itself is published last.
        self.store.save_document_text(dashboard.id, &text)?;
        self.store.save(&dashboard)?;
        Ok(dashboard)
    }

    /// Answer a question about a stored dashboard's document.
    pub async fn ask(&self, id: Uuid, question: &str) -> Result<String, PipelineError> {
        let dashboard = self.store.get(id)?;
        let text = self.store.document_text(dashboard.id)?;
        Ok(self.chat.ask(&text, question).await?)
    }
}

fn file_stem(name: &str) -> Option<String> {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
