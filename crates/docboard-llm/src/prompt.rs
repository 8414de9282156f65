//! Prompt construction for insight synthesis.
//!
//! The prompt is bounded by a token budget. Only the instructions and the
//! custom instruction are included verbatim. The series listing, the key
//! figures and the section headers each get a share of the budget and end
//! with a `(+N more)` line when they overflow it. Section texts share what is
//! left, and the longest sections are cut first so that short sections
//! survive intact.

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use docboard_ingest::{MetricSeries, ScalarFact, Section};

/// Rough characters-per-token ratio used for budgeting.
pub const CHARS_PER_TOKEN: usize = 4;

pub const DEFAULT_TOKEN_BUDGET: usize = 6000;

pub(crate) const TRUNCATION_MARK: &str = " [truncated]";
pub(crate) const SECTIONS_HEADER: &str = "## Sections";
pub(crate) const SERIES_HEADER: &str = "## Extracted series";
pub(crate) const FACTS_HEADER: &str = "## Key figures";
pub(crate) const INSTRUCTION_HEADER: &str = "## Instruction";

/// Fractions of the character budget (1/n) for the bounded listings.
const SERIES_SHARE: usize = 4;
const FACTS_SHARE: usize = 8;
const SECTION_HEADERS_SHARE: usize = 4;

pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

// ============================================================================
// Summary length
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    pub fn as_str(self) -> &'static str {
        match self {
            SummaryLength::Short => "short",
            SummaryLength::Medium => "medium",
            SummaryLength::Long => "long",
        }
    }

    /// Number of insight statements requested from the model.
    pub fn target_sentences(self) -> usize {
        match self {
            SummaryLength::Short => 3,
            SummaryLength::Medium => 6,
            SummaryLength::Long => 10,
        }
    }
}

impl fmt::Display for SummaryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" | "brief" => Ok(SummaryLength::Short),
            "medium" | "standard" => Ok(SummaryLength::Medium),
            "long" | "detailed" => Ok(SummaryLength::Long),
            other => Err(format!("unknown summary length `{other}` (short|medium|long)")),
        }
    }
}

// ============================================================================
// Prompt
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Indices of sections whose text was cut to fit the budget.
    pub truncated_sections: Vec<usize>,
    pub estimated_tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    token_budget: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_BUDGET)
    }
}

impl PromptBuilder {
    pub fn new(token_budget: usize) -> Self {
        Self { token_budget }
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    pub fn build(
        &self,
        sections: &[Section],
        series: &[MetricSeries],
        facts: &[ScalarFact],
        custom_prompt: Option<&str>,
        length: SummaryLength,
    ) -> Prompt {
        let system = system_prompt(length);

        let mut fixed = String::new();
        let _ = writeln!(
            fixed,
            "Analyze the document below and produce {} insight statements.",
            length.target_sentences()
        );
        if let Some(custom) = custom_prompt.map(str::trim).filter(|c| !c.is_empty()) {
            let _ = write!(fixed, "\n{INSTRUCTION_HEADER}\n{custom}\n");
        }
        let budget_chars = self.token_budget * CHARS_PER_TOKEN;
        if !series.is_empty() {
            let lines: Vec<String> = series.iter().map(series_line).collect();
            let _ = write!(fixed, "\n{SERIES_HEADER}\n");
            fixed.push_str(&fit_lines(lines, budget_chars / SERIES_SHARE, "series"));
        }
        if !facts.is_empty() {
            let lines: Vec<String> = facts.iter().map(fact_line).collect();
            let _ = write!(fixed, "\n{FACTS_HEADER}\n");
            fixed.push_str(&fit_lines(lines, budget_chars / FACTS_SHARE, "figures"));
        }

        // Sections whose header does not fit are left out entirely.
        let header_chars = budget_chars / SECTION_HEADERS_SHARE;
        let mut headers: Vec<String> = Vec::new();
        let mut used = 0;
        for (i, section) in sections.iter().enumerate() {
            let header = section_header(i, section);
            let cost = header.chars().count() + 2 + TRUNCATION_MARK.len();
            if used + cost > header_chars {
                break;
            }
            used += cost;
            headers.push(header);
        }
        let omitted = sections.len() - headers.len();
        let omitted_line = (omitted > 0).then(|| more_line(omitted, "sections"));

        let overhead_chars = system.chars().count()
            + fixed.chars().count()
            + SECTIONS_HEADER.len()
            + 2
            + used
            + omitted_line.as_ref().map_or(0, |l| l.chars().count() + 1)
            + 2 * CHARS_PER_TOKEN;
        let section_chars = budget_chars.saturating_sub(overhead_chars);

        let bodies: Vec<&str> = sections[..headers.len()]
            .iter()
            .map(|s| s.body().trim())
            .collect();
        let lengths: Vec<usize> = bodies.iter().map(|b| b.chars().count()).collect();
        let cap = water_fill_cap(&lengths, section_chars);

        let mut user = fixed;
        let mut truncated_sections = Vec::new();
        if !sections.is_empty() {
            let _ = write!(user, "\n{SECTIONS_HEADER}\n");
            for (index, (header, body)) in headers.iter().zip(&bodies).enumerate() {
                let _ = writeln!(user, "{header}");
                match cap {
                    Some(cap) if lengths[index] > cap => {
                        truncated_sections.push(index);
                        let cut: String = body.chars().take(cap).collect();
                        let _ = writeln!(user, "{}{TRUNCATION_MARK}", cut.trim_end());
                    }
                    _ => {
                        let _ = writeln!(user, "{body}");
                    }
                }
            }
            if let Some(line) = &omitted_line {
                let _ = writeln!(user, "{line}");
                truncated_sections.extend(headers.len()..sections.len());
            }
        }

        let estimated_tokens = estimate_tokens(&system) + estimate_tokens(&user);
        if !truncated_sections.is_empty() {
            tracing::debug!(
                truncated = ?truncated_sections,
                budget = self.token_budget,
                "section texts truncated to fit prompt budget"
            );
        }

        Prompt {
            system,
            user,
            truncated_sections,
            estimated_tokens,
        }
    }
}

/// Largest per-section length such that the capped lengths fit in `budget`.
/// `None` when everything already fits.
fn water_fill_cap(lengths: &[usize], budget: usize) -> Option<usize> {
    let total: usize = lengths.iter().sum();
    if total <= budget {
        return None;
    }
    let mut sorted = lengths.to_vec();
    sorted.sort_unstable();
    let mut remaining = budget;
    let mut left = sorted.len();
    for len in sorted {
        // Every remaining section is at least `len` long.
        if len * left <= remaining {
            remaining -= len;
            left -= 1;
        } else {
            return Some(remaining / left);
        }
    }
    None
}

/// Keep whole lines while they fit in `max_chars`, then note how many were
/// dropped. Each returned line ends with a newline.
fn fit_lines(lines: Vec<String>, max_chars: usize, noun: &str) -> String {
    let total_chars: usize = lines.iter().map(|l| l.chars().count() + 1).sum();
    let total = lines.len();
    let mut out = String::new();
    if total_chars <= max_chars {
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
        return out;
    }

    let reserve = more_line(total, noun).chars().count() + 1;
    let mut used = 0;
    let mut kept = 0;
    for line in lines {
        let cost = line.chars().count() + 1;
        if used + cost + reserve > max_chars {
            break;
        }
        used += cost;
        kept += 1;
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(&more_line(total - kept, noun));
    out.push('\n');
    out
}

fn more_line(omitted: usize, noun: &str) -> String {
    format!("- (+{omitted} more {noun})")
}

pub(crate) fn fact_line(fact: &ScalarFact) -> String {
    let unit = fact.unit.as_deref().map(|u| format!(" {u}")).unwrap_or_default();
    format!("- {}: {}{}", fact.name, fact.value, unit)
}

pub(crate) fn section_header(index: usize, section: &Section) -> String {
    format!("### [{index}] {}: {}", section.label, section.title())
}

/// `- name [unit]: n points, first -> last (min .., max ..)`
pub(crate) fn series_line(series: &MetricSeries) -> String {
    let values = series.values();
    let unit = series
        .unit
        .as_deref()
        .map(|u| format!(" [{u}]"))
        .unwrap_or_default();
    let first = values.first().copied().unwrap_or_default();
    let last = values.last().copied().unwrap_or_default();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    format!(
        "- {}{}: {} points, {} -> {} (min {}, max {})",
        series.name,
        unit,
        values.len(),
        first,
        last,
        if min.is_finite() { min } else { 0.0 },
        if max.is_finite() { max } else { 0.0 },
    )
}

fn system_prompt(length: SummaryLength) -> String {
    format!(
        "You are a document analyst building an executive dashboard.\n\
         Respond with a single JSON object and nothing else:\n\
         {{\"insights\": [{{\"statement\": string, \"category\": \"summary|finding|trend|risk|recommendation\", \
         \"confidence\": number between 0 and 1, \"section\": section label or title (optional), \
         \"series\": series name (optional)}}], \"emphasis\": [short phrases worth highlighting]}}\n\
         Write exactly {} insights, each one sentence, grounded only in the supplied text and figures.",
        length.target_sentences()
    )
}

// ============================================================================
// Tests
// ============================================================================
