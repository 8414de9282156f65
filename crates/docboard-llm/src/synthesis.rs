//! Insight Synthesizer: one bounded prompt in, ordered insights out.

use std::sync::Arc;
use std::time::Duration;

use docboard_dashboard::{Insight, InsightCategory, InsightRef};
use docboard_ingest::{MetricSeries, ScalarFact, Section};

use crate::llm::{CompletionProvider, CompletionRequest, LLMError, Message};
use crate::prompt::{PromptBuilder, SummaryLength};
use crate::response::{parse_response, RawInsight};
use crate::retry::RetryPolicy;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const SYNTHESIS_TEMPERATURE: f32 = 0.5;
const SYNTHESIS_MAX_TOKENS: usize = 8000;

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("completion service unavailable: {0}")]
    ModelUnavailable(#[source] LLMError),
    #[error("model response invalid: {reason}")]
    ModelResponseInvalid { reason: String },
}

impl From<LLMError> for SynthesisError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::InvalidResponse(reason) => SynthesisError::ModelResponseInvalid { reason },
            other => SynthesisError::ModelUnavailable(other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesisRequest<'a> {
    pub sections: &'a [Section],
    pub series: &'a [MetricSeries],
    pub facts: &'a [ScalarFact],
    pub custom_prompt: Option<&'a str>,
    pub summary_length: SummaryLength,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub insights: Vec<Insight>,
    pub emphases: Vec<String>,
    /// Response entries that could not be read as statements.
    pub rejected: usize,
    pub prompt_tokens: usize,
    pub attempts: u32,
}

pub struct InsightSynthesizer {
    provider: Arc<dyn CompletionProvider>,
    prompts: PromptBuilder,
    retry: RetryPolicy,
    timeout: Duration,
}

impl InsightSynthesizer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            prompts: PromptBuilder::default(),
            retry: RetryPolicy::none(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<Synthesis, SynthesisError> {
        let prompt = self.prompts.build(
            request.sections,
            request.series,
            request.facts,
            request.custom_prompt,
            request.summary_length,
        );
        let completion = CompletionRequest::new(vec![
            Message::system(prompt.system),
            Message::user(prompt.user),
        ])
        .with_max_tokens(SYNTHESIS_MAX_TOKENS)
        .with_temperature(SYNTHESIS_TEMPERATURE)
        .json();

        let model = self.provider.model_info();
        tracing::info!(
            provider = %model.provider,
            model = %model.name,
            prompt_tokens = prompt.estimated_tokens,
            truncated_sections = prompt.truncated_sections.len(),
            "requesting insights"
        );

        let outcome = self
            .retry
            .run(|attempt| {
                let completion = &completion;
                async move {
                    tracing::debug!(attempt, "completion attempt");
                    complete_within(self.provider.as_ref(), completion, self.timeout).await
                }
            })
            .await;
        let response = outcome.result.map_err(|err| {
            tracing::warn!(error = %err, attempts = outcome.attempts, "completion failed");
            SynthesisError::from(err)
        })?;

        let parsed = parse_response(&response.content).map_err(|reason| {
            tracing::warn!(%reason, "unparseable model response");
            SynthesisError::ModelResponseInvalid { reason }
        })?;
        if parsed.rejected > 0 {
            tracing::warn!(
                rejected = parsed.rejected,
                kept = parsed.items.len(),
                "dropped unreadable insight entries"
            );
        }

        let insights: Vec<Insight> = parsed
            .items
            .into_iter()
            .map(|raw| resolve(raw, request.sections, request.series))
            .collect();
        tracing::info!(insights = insights.len(), attempts = outcome.attempts, "insights synthesized");

        Ok(Synthesis {
            insights,
            emphases: parsed.emphases,
            rejected: parsed.rejected,
            prompt_tokens: prompt.estimated_tokens,
            attempts: outcome.attempts,
        })
    }
}

/// One completion call bounded by `timeout`; expiry is [`LLMError::Timeout`].
pub(crate) async fn complete_within(
    provider: &dyn CompletionProvider,
    request: &CompletionRequest,
    timeout: Duration,
) -> Result<crate::llm::CompletionResponse, LLMError> {
    match tokio::time::timeout(timeout, provider.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(LLMError::Timeout { after: timeout }),
    }
}

fn resolve(raw: RawInsight, sections: &[Section], series: &[MetricSeries]) -> Insight {
    let category = raw
        .category
        .as_deref()
        .and_then(|c| c.parse::<InsightCategory>().ok())
        .unwrap_or_default();
    let mut insight = Insight::new(raw.statement, category);
    if let Some(confidence) = raw.confidence {
        insight = insight.with_confidence(confidence);
    }

    let target = raw
        .series
        .as_deref()
        .and_then(|name| resolve_series(name, series))
        .or_else(|| raw.section.as_deref().and_then(|name| resolve_section(name, sections)));
    if let Some(target) = target {
        insight = insight.supporting(target);
    }
    insight
}

fn resolve_series(name: &str, series: &[MetricSeries]) -> Option<InsightRef> {
    let name = name.trim();
    series
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .map(|s| InsightRef::Series {
            name: s.name.clone(),
        })
}

/// Sections are referenced by index (`2`, `[2]`), label, or title.
fn resolve_section(name: &str, sections: &[Section]) -> Option<InsightRef> {
    let name = name.trim();
    let by_index = name
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<usize>()
        .ok()
        .filter(|i| *i < sections.len());
    let index = by_index
        .or_else(|| {
            sections
                .iter()
                .position(|s| s.label.as_str().eq_ignore_ascii_case(name))
        })
        .or_else(|| {
            sections
                .iter()
                .position(|s| s.title().eq_ignore_ascii_case(name))
        })?;
    Some(InsightRef::Section {
        index,
        label: sections[index].label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docboard_ingest::{DataPoint, SectionLabel, SeriesSource};

    fn sections() -> Vec<Section> {
        vec![
            Section {
                label: SectionLabel::Other,
                heading: Some("Market Outlook".to_string()),
                blocks: 0..1,
                text: "Market Outlook\nDemand is steady.".to_string(),
            },
            Section {
                label: SectionLabel::Results,
                heading: Some("Findings".to_string()),
                blocks: 1..2,
                text: "Findings\nAccuracy improved.".to_string(),
            },
        ]
    }

    fn series() -> Vec<MetricSeries> {
        vec![MetricSeries {
            name: "accuracy".to_string(),
            unit: Some("%".to_string()),
            points: vec![
                DataPoint {
                    label: "before".to_string(),
                    value: 72.0,
                    y: None,
                },
                DataPoint {
                    label: "after".to_string(),
                    value: 91.0,
                    y: None,
                },
            ],
            section: 1,
            section_label: SectionLabel::Results,
            source: SeriesSource::Transition,
        }]
    }

    #[test]
    fn test_section_references() {
        let sections = sections();
        let results = Some(InsightRef::Section {
            index: 1,
            label: SectionLabel::Results,
        });
        assert_eq!(resolve_section("results", &sections), results);
        assert_eq!(resolve_section("[1]", &sections), results);
        assert_eq!(resolve_section("findings", &sections), results);
        assert_eq!(
            resolve_section("Market outlook", &sections),
            Some(InsightRef::Section {
                index: 0,
                label: SectionLabel::Other
            })
        );
        assert_eq!(resolve_section("7", &sections), None);
        assert_eq!(resolve_section("appendix", &sections), None);
    }

    #[test]
    fn test_resolve_prefers_series_and_defaults_category() {
        let raw = RawInsight {
            statement: "Accuracy rose.".to_string(),
            category: Some("nonsense".to_string()),
            confidence: Some(3.0),
            section: Some("results".to_string()),
            series: Some("Accuracy".to_string()),
        };
        let insight = resolve(raw, &sections(), &series());
        assert_eq!(insight.category, InsightCategory::Finding);
        assert_eq!(insight.confidence, Some(1.0));
        assert_eq!(
            insight.supports,
            Some(InsightRef::Series {
                name: "accuracy".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_references_are_dropped() {
        let raw = RawInsight {
            statement: "Something.".to_string(),
            series: Some("churn".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve(raw, &sections(), &series()).supports, None);
    }

    #[test]
    fn test_invalid_provider_payload_is_response_invalid() {
        let err = SynthesisError::from(LLMError::InvalidResponse("no content".to_string()));
        assert!(matches!(err, SynthesisError::ModelResponseInvalid { .. }));
        let err = SynthesisError::from(LLMError::Auth("denied".to_string()));
        assert!(matches!(err, SynthesisError::ModelUnavailable(LLMError::Auth(_))));
    }
}
