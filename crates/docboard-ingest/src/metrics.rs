//! Metric extraction
//!
//! Scans section bodies for labelled numbers and groups them into
//! [`MetricSeries`]. Each sentence is offered to an ordered list of
//! [`MetricRule`]s; the first rule that yields observations wins.
//!
//! Observations then go through two passes:
//! 1. runs of `label: value` lines with distinct labels become one
//!    categorical series named after their lead-in line (or the section);
//! 2. consecutive observations with the same key and unit merge into one
//!    ordered series.
//!
//! Runs that end with a single point are surfaced as [`ScalarFact`]s.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::numeric::{is_year, parse_quantity, QUANTITY_PATTERN};
use crate::segment::{Section, SectionLabel};
use crate::text::split_sentences;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub label: String,
    pub value: f64,
    /// Second numeric dimension for bivariate series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

/// Which rule produced a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesSource {
    Coordinates,
    Dated,
    Transition,
    LabelValue,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub name: String,
    pub unit: Option<String>,
    pub points: Vec<DataPoint>,
    /// Index of the source section.
    pub section: usize,
    pub section_label: SectionLabel,
    pub source: SeriesSource,
}

impl MetricSeries {
    /// At least two points, all finite.
    pub fn is_chart_eligible(&self) -> bool {
        self.points.len() >= 2
            && self
                .points
                .iter()
                .all(|p| p.value.is_finite() && p.y.map_or(true, f64::is_finite))
    }

    /// Every point carries two numeric dimensions.
    pub fn is_bivariate(&self) -> bool {
        !self.points.is_empty() && self.points.iter().all(|p| p.y.is_some())
    }

    pub fn labels(&self) -> Vec<String> {
        self.points.iter().map(|p| p.label.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// A single labelled number; not chartable on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarFact {
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub section: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricExtraction {
    /// Series with at least two points, in document order.
    pub series: Vec<MetricSeries>,
    pub facts: Vec<ScalarFact>,
}

impl MetricExtraction {
    pub fn chart_eligible(&self) -> impl Iterator<Item = &MetricSeries> {
        self.series.iter().filter(|s| s.is_chart_eligible())
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty() && self.facts.is_empty()
    }
}

// ============================================================================
// Rules
// ============================================================================

/// What a rule found in one sentence. A `None` key takes its name from the
/// surrounding context (lead-in line or section).
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub key: Option<String>,
    pub label: Option<String>,
    pub value: f64,
    pub y: Option<f64>,
    pub unit: Option<String>,
}

/// A named sentence matcher.
#[derive(Clone)]
pub struct MetricRule {
    pub name: &'static str,
    pub source: SeriesSource,
    pub apply: fn(&str) -> Vec<RawObservation>,
}

/// Default rules in priority order.
pub fn default_metric_rules() -> Vec<MetricRule> {
    vec![
        MetricRule {
            name: "coordinates",
            source: SeriesSource::Coordinates,
            apply: coordinate_pairs,
        },
        MetricRule {
            name: "dated",
            source: SeriesSource::Dated,
            apply: dated_values,
        },
        MetricRule {
            name: "transition",
            source: SeriesSource::Transition,
            apply: from_to_transition,
        },
        MetricRule {
            name: "label_value",
            source: SeriesSource::LabelValue,
            apply: label_value_line,
        },
        MetricRule {
            name: "inline",
            source: SeriesSource::Inline,
            apply: inline_values,
        },
    ]
}

const DATE_PATTERN: &str = r"(?i:\d{4}-\d{2}(?:-\d{2})?|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{4}|q[1-4]\s*'?\d{2,4}|fy\s?'?\d{2,4}|(?:19|20)\d{2})";

static COORDINATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\s*(?P<x>-?\d+(?:\.\d+)?)\s*,\s*(?P<y>-?\d+(?:\.\d+)?)\s*\)")
        .expect("static coordinate pattern")
});

static DATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?P<date>{DATE_PATTERN})\s*(?:[:=]|\s[-–]\s)\s*(?P<val>{QUANTITY_PATTERN})"
    ))
    .expect("static dated pattern")
});

static TRANSITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<subject>.*?)\b(?i:from)\s+(?P<a>{QUANTITY_PATTERN})(?:\s+(?i:in)\s+(?P<da>{DATE_PATTERN}))?(?:\s+(?i:to)\s+|\s*(?:->|→)\s*)(?P<b>{QUANTITY_PATTERN})(?:\s+(?i:in)\s+(?P<db>{DATE_PATTERN}))?"
    ))
    .expect("static transition pattern")
});

static LABEL_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*(?:[-*•]\s*)?(?P<label>[^\s:=\d][^:=]{{0,59}}?)\s*[:=]\s*(?P<val>{QUANTITY_PATTERN})\s*(?:\([^)]*\))?\s*[.;]?\s*$"
    ))
    .expect("static label/value pattern")
});

static INLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?P<label>[A-Za-z][A-Za-z'&/-]*(?:\s+[A-Za-z][A-Za-z'&/-]*){{0,4}})\s+(?i:was|were|is|are|of|at|reached|hit|totaled|totalled|stood at|amounted to|equals|equaled|came in at)\s+(?:(?i:about|approximately|around|roughly|nearly|almost|over|under)\s+)?(?P<val>{QUANTITY_PATTERN})"
    ))
    .expect("static inline pattern")
});

const CHANGE_WORDS: &[&str] = &[
    "increased", "decreased", "improved", "grew", "rose", "fell", "dropped", "declined",
    "went", "climbed", "jumped", "moved", "changed", "expanded", "shrank", "increase",
    "decrease", "improvement", "growth", "rise", "drop", "decline", "has", "have", "had",
    "was", "were", "is", "are", "significantly", "substantially", "sharply", "steadily",
    "slightly", "dramatically", "overall", "up", "down",
];

const DETERMINERS: &[&str] = &[
    "a", "an", "the", "our", "their", "its", "this", "that", "these", "those", "of", "in",
    "for", "and", "by", "with", "on", "at", "to", "while", "whereas", "but",
];

const MAX_LABEL_WORDS: usize = 3;

/// Short lowercase label from free text: trailing change verbs/adverbs are
/// dropped, then the last few words are kept without leading determiners.
pub fn clean_label(text: &str) -> Option<String> {
    let mut words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '%' && c != '&')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    while words
        .last()
        .is_some_and(|w| CHANGE_WORDS.contains(&w.as_str()))
    {
        words.pop();
    }
    let start = words.len().saturating_sub(MAX_LABEL_WORDS);
    let mut kept: Vec<String> = words.split_off(start);
    while kept
        .first()
        .is_some_and(|w| DETERMINERS.contains(&w.as_str()))
    {
        kept.remove(0);
    }

    if kept.iter().any(|w| w.chars().any(char::is_alphabetic)) {
        Some(kept.join(" "))
    } else {
        None
    }
}

fn quantity_at(caps: &Captures<'_>, name: &str) -> Option<crate::Quantity> {
    caps.name(name).and_then(|m| parse_quantity(m.as_str()))
}

fn bare_year(caps: &Captures<'_>, name: &str, unit: &Option<String>) -> bool {
    unit.is_none() && caps.name(name).is_some_and(|m| is_year(m.as_str()))
}

fn coordinate_pairs(sentence: &str) -> Vec<RawObservation> {
    let pairs: Vec<(f64, f64)> = COORDINATE
        .captures_iter(sentence)
        .filter_map(|caps| {
            let x = caps.name("x")?.as_str().parse::<f64>().ok()?;
            let y = caps.name("y")?.as_str().parse::<f64>().ok()?;
            (x.is_finite() && y.is_finite()).then_some((x, y))
        })
        .collect();
    if pairs.len() < 2 {
        return Vec::new();
    }

    let key = sentence
        .find('(')
        .and_then(|idx| clean_label(&sentence[..idx]));
    pairs
        .into_iter()
        .map(|(x, y)| RawObservation {
            key: key.clone(),
            label: Some(format_number(x)),
            value: x,
            y: Some(y),
            unit: None,
        })
        .collect()
}

fn dated_values(sentence: &str) -> Vec<RawObservation> {
    let mut observations = Vec::new();
    let mut key = None;

    for (i, caps) in DATED.captures_iter(sentence).enumerate() {
        let Some(quantity) = quantity_at(&caps, "val") else {
            continue;
        };
        if bare_year(&caps, "val", &quantity.unit) {
            continue;
        }
        if i == 0 {
            if let Some(whole) = caps.get(0) {
                key = clean_label(&sentence[..whole.start()]);
            }
        }
        let date = caps.name("date").map(|m| m.as_str()).unwrap_or_default();
        observations.push(RawObservation {
            key: None,
            label: Some(normalize_date_label(date)),
            value: quantity.value,
            y: None,
            unit: quantity.unit,
        });
    }

    for observation in &mut observations {
        observation.key = key.clone();
    }
    observations
}

fn from_to_transition(sentence: &str) -> Vec<RawObservation> {
    let Some(caps) = TRANSITION.captures(sentence) else {
        return Vec::new();
    };
    let (Some(before), Some(after)) = (quantity_at(&caps, "a"), quantity_at(&caps, "b")) else {
        return Vec::new();
    };
    if bare_year(&caps, "a", &before.unit) && bare_year(&caps, "b", &after.unit) {
        return Vec::new();
    }
    let unit = match (before.unit, after.unit) {
        (Some(a), Some(b)) if a != b => return Vec::new(),
        (a, b) => a.or(b),
    };

    let key = caps
        .name("subject")
        .and_then(|m| clean_label(m.as_str()));
    let (label_a, label_b) = match (caps.name("da"), caps.name("db")) {
        (Some(da), Some(db)) => (
            normalize_date_label(da.as_str()),
            normalize_date_label(db.as_str()),
        ),
        _ => ("before".to_string(), "after".to_string()),
    };

    vec![
        RawObservation {
            key: key.clone(),
            label: Some(label_a),
            value: before.value,
            y: None,
            unit: unit.clone(),
        },
        RawObservation {
            key,
            label: Some(label_b),
            value: after.value,
            y: None,
            unit,
        },
    ]
}

fn label_value_line(sentence: &str) -> Vec<RawObservation> {
    let Some(caps) = LABEL_VALUE.captures(sentence) else {
        return Vec::new();
    };
    let Some(label) = caps.name("label").map(|m| m.as_str().trim()) else {
        return Vec::new();
    };
    if !label.chars().any(char::is_alphabetic) {
        return Vec::new();
    }
    let Some(quantity) = quantity_at(&caps, "val") else {
        return Vec::new();
    };
    if bare_year(&caps, "val", &quantity.unit) {
        return Vec::new();
    }
    vec![RawObservation {
        key: Some(label.to_string()),
        label: None,
        value: quantity.value,
        y: None,
        unit: quantity.unit,
    }]
}

fn inline_values(sentence: &str) -> Vec<RawObservation> {
    INLINE
        .captures_iter(sentence)
        .filter_map(|caps| {
            let quantity = quantity_at(&caps, "val")?;
            if bare_year(&caps, "val", &quantity.unit) {
                return None;
            }
            let key = clean_label(caps.name("label")?.as_str())?;
            Some(RawObservation {
                key: Some(key),
                label: None,
                value: quantity.value,
                y: None,
                unit: quantity.unit,
            })
        })
        .collect()
}

fn normalize_date_label(date: &str) -> String {
    date.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ============================================================================
// Extractor
// ============================================================================

#[derive(Debug, Clone)]
struct Observation {
    key: String,
    label: Option<String>,
    value: f64,
    y: Option<f64>,
    unit: Option<String>,
    source: SeriesSource,
    line: usize,
    /// Lead-in line or section name at the point of observation.
    context: String,
}

pub struct MetricExtractor {
    rules: Vec<MetricRule>,
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self {
            rules: default_metric_rules(),
        }
    }
}

impl MetricExtractor {
    pub fn new(rules: Vec<MetricRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[MetricRule] {
        &self.rules
    }

    /// Extract series and scalar facts from every section. Never fails.
    pub fn extract(&self, sections: &[Section]) -> MetricExtraction {
        let mut extraction = MetricExtraction::default();
        for (index, section) in sections.iter().enumerate() {
            let observations = group_label_lists(self.observe(section));
            merge_observations(&mut extraction, observations, index, section.label);
        }
        tracing::debug!(
            series = extraction.series.len(),
            facts = extraction.facts.len(),
            "extracted metrics"
        );
        extraction
    }

    fn observe(&self, section: &Section) -> Vec<Observation> {
        let section_name = section_context(section);
        let mut observations = Vec::new();
        let mut lead: Option<String> = None;
        let mut line_no = 0usize;

        for line in section.body().lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            line_no += 1;
            let context = lead.clone().unwrap_or_else(|| section_name.clone());
            let before = observations.len();

            for sentence in split_sentences(line) {
                for rule in &self.rules {
                    let found = (rule.apply)(sentence);
                    if found.is_empty() {
                        continue;
                    }
                    observations.extend(found.into_iter().map(|raw| Observation {
                        key: raw.key.unwrap_or_else(|| context.clone()),
                        label: raw.label,
                        value: raw.value,
                        y: raw.y,
                        unit: raw.unit,
                        source: rule.source,
                        line: line_no,
                        context: context.clone(),
                    }));
                    break;
                }
            }

            if let Some(next_lead) = lead_in(line) {
                lead = Some(next_lead);
            } else if observations.len() == before {
                lead = None;
            }
        }
        observations
    }
}

/// Extract with the default rule set.
pub fn extract(sections: &[Section]) -> MetricExtraction {
    MetricExtractor::default().extract(sections)
}

fn section_context(section: &Section) -> String {
    match (&section.heading, section.label) {
        (Some(heading), _) => heading.clone(),
        (None, SectionLabel::Other) => "values".to_string(),
        (None, label) => label.to_string(),
    }
}

/// `Revenue by segment:` introduces the list that follows.
fn lead_in(line: &str) -> Option<String> {
    let text = line.strip_suffix(':')?.trim();
    if text.is_empty() || text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(text.to_string())
}

/// Rewrite runs of distinct `label: value` lines into one categorical
/// series keyed by the run's context.
fn group_label_lists(mut observations: Vec<Observation>) -> Vec<Observation> {
    let mut start = 0;
    while start < observations.len() {
        let mut end = start + 1;
        if observations[start].source == SeriesSource::LabelValue {
            while end < observations.len()
                && observations[end].source == SeriesSource::LabelValue
                && observations[end].line <= observations[end - 1].line + 1
            {
                end += 1;
            }
            let run = &observations[start..end];
            let first = &run[0];
            let distinct = run
                .iter()
                .any(|o| !o.key.eq_ignore_ascii_case(&first.key));
            let same_unit = run.iter().all(|o| o.unit == first.unit);
            if run.len() >= 2 && distinct && same_unit {
                let context = first.context.clone();
                for observation in &mut observations[start..end] {
                    let item = std::mem::replace(&mut observation.key, context.clone());
                    observation.label = Some(item);
                }
            }
        }
        start = end;
    }
    observations
}

fn merge_observations(
    extraction: &mut MetricExtraction,
    observations: Vec<Observation>,
    section: usize,
    section_label: SectionLabel,
) {
    let mut run: Vec<Observation> = Vec::new();
    for observation in observations {
        let continues = run.last().is_some_and(|last| {
            last.key.eq_ignore_ascii_case(&observation.key) && last.unit == observation.unit
        });
        if !continues {
            flush_run(extraction, std::mem::take(&mut run), section, section_label);
        }
        run.push(observation);
    }
    flush_run(extraction, run, section, section_label);
}

fn flush_run(
    extraction: &mut MetricExtraction,
    run: Vec<Observation>,
    section: usize,
    section_label: SectionLabel,
) {
    let Some(first) = run.first() else {
        return;
    };
    if run.len() == 1 {
        extraction.facts.push(ScalarFact {
            name: first.key.clone(),
            value: first.value,
            unit: first.unit.clone(),
            section,
        });
        return;
    }

    let name = first.key.clone();
    let unit = first.unit.clone();
    let source = first.source;
    let points = run
        .into_iter()
        .enumerate()
        .filter(|(_, o)| o.value.is_finite())
        .map(|(i, o)| DataPoint {
            label: o.label.unwrap_or_else(|| format!("#{}", i + 1)),
            value: o.value,
            y: o.y,
        })
        .collect();
    extraction.series.push(MetricSeries {
        name,
        unit,
        points,
        section,
        section_label,
        source,
    });
}

// ============================================================================
// Tests
// ============================================================================
