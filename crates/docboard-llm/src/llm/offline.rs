//! Rule-based provider used when no model service is configured.
//!
//! It reads the same prompt a remote model would receive and answers in the
//! same JSON shape, so the rest of the pipeline cannot tell the difference.
//! Nothing leaves the process.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use docboard_ingest::text::split_sentences;

use super::*;
use crate::chat::{DOCUMENT_HEADER, QUESTION_HEADER};
use crate::prompt::{SECTIONS_HEADER, SERIES_HEADER, TRUNCATION_MARK};

const MAX_SUMMARY_CHARS: usize = 200;
const MAX_EMPHASES: usize = 3;
const CHAT_ANSWER_SENTENCES: usize = 2;

static TARGET_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"produce (\d+) insight statements").expect("valid regex"));

static SECTION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^### \[(\d+)\] ([a-z]+): (.+)$").expect("valid regex"));

static SERIES_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^- (?P<name>.+?)(?: \[(?P<unit>[^\]]+)\])?: (?P<n>\d+) points, (?P<first>\S+) -> (?P<last>\S+) \(min (?P<min>\S+), max (?P<max>\S+)\)$",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProvider;

impl OfflineProvider {
    pub fn new() -> Self {
        Self
    }

    fn insights_json(&self, prompt: &str) -> String {
        let target = TARGET_COUNT
            .captures(prompt)
            .and_then(|c| c[1].parse::<usize>().ok())
            .unwrap_or(6)
            .max(1);

        let series = listed_series(prompt);
        let sections = listed_sections(prompt);

        let mut insights: Vec<serde_json::Value> = Vec::new();
        for s in &series {
            insights.push(serde_json::json!({
                "statement": s.describe(),
                "category": "trend",
                "confidence": 0.6,
                "series": s.name,
            }));
        }
        for section in sections.iter().filter(|s| s.label != "other") {
            if let Some(sentence) = section.lead_sentence() {
                insights.push(serde_json::json!({
                    "statement": format!("{}: {}", section.title, sentence),
                    "category": "summary",
                    "confidence": 0.5,
                    "section": section.label,
                }));
            }
        }
        if insights.is_empty() {
            let statement = match sections.first().and_then(|s| s.lead_sentence()) {
                Some(sentence) => sentence,
                None => "The document contains no recognisable sections or figures.".to_string(),
            };
            insights.push(serde_json::json!({
                "statement": statement,
                "category": "summary",
                "confidence": 0.3,
            }));
        }
        insights.truncate(target);

        let emphasis: Vec<String> = series
            .iter()
            .take(MAX_EMPHASES)
            .map(|s| format!("{}: {} -> {}", s.name, s.first, s.last))
            .collect();

        serde_json::json!({ "insights": insights, "emphasis": emphasis }).to_string()
    }

    fn answer(&self, prompt: &str) -> String {
        let document = between(prompt, DOCUMENT_HEADER, Some(QUESTION_HEADER)).unwrap_or_default();
        let question = between(prompt, QUESTION_HEADER, None).unwrap_or_default();
        let wanted = content_words(question);

        let sentences: Vec<&str> = document
            .lines()
            .flat_map(split_sentences)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let mut scored: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| (i, content_words(s).intersection(&wanted).count()))
            .filter(|(_, score)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(CHAT_ANSWER_SENTENCES);
        scored.sort_by_key(|(i, _)| *i);

        if scored.is_empty() {
            return "The document does not appear to address that question.".to_string();
        }
        scored
            .iter()
            .map(|(i, _)| sentences[*i])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl CompletionProvider for OfflineProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let prompt = request
            .user_prompt()
            .ok_or_else(|| LLMError::InvalidResponse("request has no user message".to_string()))?;

        let content = if prompt.contains(QUESTION_HEADER) {
            self.answer(prompt)
        } else {
            self.insights_json(prompt)
        };

        Ok(CompletionResponse {
            usage: Usage {
                prompt_tokens: crate::prompt::estimate_tokens(prompt),
                completion_tokens: crate::prompt::estimate_tokens(&content),
            },
            content,
            finish_reason: FinishReason::Stop,
            model: Provider::Offline.default_model().to_string(),
        })
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: Provider::Offline,
            name: Provider::Offline.default_model().to_string(),
            max_tokens: 8000,
            supports_json_mode: true,
        }
    }
}

// ============================================================================
// Prompt reading
// ============================================================================

struct ListedSeries {
    name: String,
    unit: Option<String>,
    points: usize,
    first: String,
    last: String,
    min: String,
    max: String,
}

impl ListedSeries {
    fn describe(&self) -> String {
        let first: f64 = self.first.parse().unwrap_or_default();
        let last: f64 = self.last.parse().unwrap_or_default();
        let direction = if last > first {
            "rose"
        } else if last < first {
            "fell"
        } else {
            "held steady"
        };
        let mut name = self.name.clone();
        if let Some(c) = name.get_mut(0..1) {
            c.make_ascii_uppercase();
        }
        format!(
            "{name} {direction} from {} to {} across {} points (range {} to {}).",
            self.with_unit(&self.first),
            self.with_unit(&self.last),
            self.points,
            self.with_unit(&self.min),
            self.with_unit(&self.max),
        )
    }

    fn with_unit(&self, value: &str) -> String {
        match self.unit.as_deref() {
            Some("%") => format!("{value}%"),
            Some(unit) => format!("{value} {unit}"),
            None => value.to_string(),
        }
    }
}

struct ListedSection {
    label: String,
    title: String,
    body: String,
}

impl ListedSection {
    fn lead_sentence(&self) -> Option<String> {
        let line = self.body.lines().map(str::trim).find(|l| !l.is_empty())?;
        let line = line.strip_suffix(TRUNCATION_MARK.trim()).unwrap_or(line).trim();
        let sentence = split_sentences(line).into_iter().next()?.trim();
        if sentence.is_empty() {
            return None;
        }
        let mut out: String = sentence.chars().take(MAX_SUMMARY_CHARS).collect();
        if out.chars().count() < sentence.chars().count() {
            out.push_str("...");
        }
        Some(out)
    }
}

fn listed_series(prompt: &str) -> Vec<ListedSeries> {
    let Some(block) = between(prompt, SERIES_HEADER, Some("\n## ")) else {
        return Vec::new();
    };
    block
        .lines()
        .filter_map(|line| SERIES_LINE.captures(line.trim()))
        .map(|c| ListedSeries {
            name: c["name"].to_string(),
            unit: c.name("unit").map(|m| m.as_str().to_string()),
            points: c["n"].parse().unwrap_or_default(),
            first: c["first"].to_string(),
            last: c["last"].to_string(),
            min: c["min"].to_string(),
            max: c["max"].to_string(),
        })
        .collect()
}

fn listed_sections(prompt: &str) -> Vec<ListedSection> {
    let Some(block) = between(prompt, SECTIONS_HEADER, None) else {
        return Vec::new();
    };
    let mut sections: Vec<ListedSection> = Vec::new();
    for line in block.lines() {
        if let Some(c) = SECTION_HEADER.captures(line) {
            sections.push(ListedSection {
                label: c[2].to_string(),
                title: c[3].to_string(),
                body: String::new(),
            });
        } else if let Some(current) = sections.last_mut() {
            current.body.push_str(line);
            current.body.push('\n');
        }
    }
    sections
}

/// Text after `start` up to `end` (or the end of the prompt).
fn between<'a>(prompt: &'a str, start: &str, end: Option<&str>) -> Option<&'a str> {
    let from = prompt.find(start)? + start.len();
    let rest = &prompt[from..];
    let to = end.and_then(|e| rest.find(e)).unwrap_or(rest.len());
    Some(&rest[..to])
}

fn content_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|w| !matches!(w.as_str(), "what" | "which" | "that" | "this" | "with" | "does" | "from" | "were" | "have" | "about"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::chat_request;
    use crate::prompt::{PromptBuilder, SummaryLength};
    use crate::response::parse_response;
    use docboard_ingest::{DataPoint, MetricSeries, Section, SectionLabel, SeriesSource};

    fn sections() -> Vec<Section> {
        vec![
            Section {
                label: SectionLabel::Results,
                heading: Some("Results".to_string()),
                blocks: 0..2,
                text: "Results\nAccuracy improved from 72% to 91%. Latency was flat.".to_string(),
            },
            Section {
                label: SectionLabel::Other,
                heading: None,
                blocks: 2..3,
                text: "Appendix material.".to_string(),
            },
        ]
    }

    fn accuracy() -> MetricSeries {
        MetricSeries {
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
            section: 0,
            section_label: SectionLabel::Results,
            source: SeriesSource::Transition,
        }
    }

    #[tokio::test]
    async fn test_offline_insights_parse() {
        let prompt = PromptBuilder::default().build(
            &sections(),
            &[accuracy()],
            &[],
            None,
            SummaryLength::Short,
        );
        let request = CompletionRequest::new(vec![
            Message::system(prompt.system),
            Message::user(prompt.user),
        ]);
        let response = OfflineProvider::new().complete(&request).await.unwrap();
        let parsed = parse_response(&response.content).unwrap();

        assert_eq!(parsed.items.len(), 2);
        assert_eq!(
            parsed.items[0].statement,
            "Accuracy rose from 72% to 91% across 2 points (range 72% to 91%)."
        );
        assert_eq!(parsed.items[0].series.as_deref(), Some("accuracy"));
        assert_eq!(
            parsed.items[1].statement,
            "Results: Accuracy improved from 72% to 91%."
        );
        assert_eq!(parsed.items[1].section.as_deref(), Some("results"));
        assert_eq!(parsed.emphases, vec!["accuracy: 72 -> 91".to_string()]);
    }

    #[tokio::test]
    async fn test_offline_never_returns_nothing() {
        let prompt = PromptBuilder::default().build(&[], &[], &[], None, SummaryLength::Medium);
        let request = CompletionRequest::new(vec![Message::user(prompt.user)]);
        let response = OfflineProvider::new().complete(&request).await.unwrap();
        assert_eq!(parse_response(&response.content).unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_chat_picks_overlapping_sentences() {
        let request = chat_request(
            "Revenue grew to $5M in 2023. The team hired ten engineers. Margins narrowed slightly.",
            "How much did revenue grow?",
        );
        let response = OfflineProvider::new().complete(&request).await.unwrap();
        assert_eq!(response.content, "Revenue grew to $5M in 2023.");
    }
}
