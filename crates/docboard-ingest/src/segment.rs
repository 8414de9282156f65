//! Section segmentation
//!
//! Splits [`ParsedText`] into labelled [`Section`]s. Only the first line of a
//! block can be a heading; a heading opens a new section that runs until the
//! next heading. Sections always partition the block sequence.
//!
//! Heading text is classified by an ordered list of [`HeadingRule`]s; the
//! first rule that matches wins. Heading-like lines no rule recognises still
//! open a section, labelled `other` with the literal heading as sub-label.

use std::fmt;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{BlockKind, ParsedText, TextBlock};

/// Longest line (in characters) still considered a heading.
pub const MAX_HEADING_CHARS: usize = 60;
/// Most words a heading may have.
pub const MAX_HEADING_WORDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionLabel {
    Abstract,
    Introduction,
    Methodology,
    Results,
    Discussion,
    Conclusion,
    Other,
}

impl SectionLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionLabel::Abstract => "abstract",
            SectionLabel::Introduction => "introduction",
            SectionLabel::Methodology => "methodology",
            SectionLabel::Results => "results",
            SectionLabel::Discussion => "discussion",
            SectionLabel::Conclusion => "conclusion",
            SectionLabel::Other => "other",
        }
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labelled, contiguous span of blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub label: SectionLabel,
    /// Literal heading text; `None` for the untitled preamble.
    pub heading: Option<String>,
    /// Half-open range into [`ParsedText::blocks`].
    pub blocks: Range<usize>,
    /// Raw text of the covered blocks, heading line included.
    pub text: String,
}

impl Section {
    /// Display title: the heading, or the label for an untitled span.
    pub fn title(&self) -> String {
        match &self.heading {
            Some(heading) => heading.clone(),
            None if self.label == SectionLabel::Other => "Overview".to_string(),
            None => capitalize(self.label.as_str()),
        }
    }

    /// Sub-label of an `other` section (its literal heading).
    pub fn sub_label(&self) -> Option<&str> {
        match self.label {
            SectionLabel::Other => self.heading.as_deref(),
            _ => None,
        }
    }

    /// Body text without the heading line.
    pub fn body(&self) -> &str {
        match &self.heading {
            Some(_) => self
                .text
                .split_once('\n')
                .map(|(_, rest)| rest.trim_start())
                .unwrap_or_default(),
            None => &self.text,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Heading rules
// ============================================================================

/// Canonical label dictionary entry.
#[derive(Debug, Clone)]
pub struct HeadingRule {
    pub label: SectionLabel,
    pub pattern: Regex,
}

impl HeadingRule {
    fn new(label: SectionLabel, pattern: &str) -> Self {
        Self {
            label,
            pattern: Regex::new(pattern).expect("static heading pattern"),
        }
    }
}

/// Default rules in priority order.
pub fn default_heading_rules() -> Vec<HeadingRule> {
    use SectionLabel::*;
    vec![
        HeadingRule::new(
            Abstract,
            r"^(?:abstract|executive summary|summary|overview|synopsis)$",
        ),
        HeadingRule::new(
            Introduction,
            r"^(?:introduction|background|motivation|objectives?|research aims?|aims and objectives)$",
        ),
        HeadingRule::new(
            Methodology,
            r"^(?:methodology|methods?|approach|materials and methods|experimental (?:setup|design)|data(?:set)?(?: overview)?)$",
        ),
        HeadingRule::new(
            Results,
            r"^(?:results?|results and discussion|findings|key findings|observations|experiments?|evaluation|outcomes?|key metrics)$",
        ),
        HeadingRule::new(
            Discussion,
            r"^(?:discussion|analysis|limitations|risks?(?: and limitations)?|implications)$",
        ),
        HeadingRule::new(
            Conclusion,
            r"^(?:conclusions?|concluding remarks|recommendations|future work|final thoughts)$",
        ),
    ]
}

static NUMBERING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:#{1,6}\s*|(?:\d+(?:\.\d+)*\.?|[IVXLC]+\.)\s+)").expect("static pattern")
});

const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "of", "on", "or", "the", "to",
    "vs", "with",
];

// ============================================================================
// Segmenter
// ============================================================================

pub struct Segmenter {
    rules: Vec<HeadingRule>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            rules: default_heading_rules(),
        }
    }
}

impl Segmenter {
    pub fn new(rules: Vec<HeadingRule>) -> Self {
        Self { rules }
    }

    /// Label for a heading text; `Other` when no rule matches.
    pub fn classify(&self, heading: &str) -> SectionLabel {
        let key = canonical_key(heading);
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(&key))
            .map(|rule| rule.label)
            .unwrap_or(SectionLabel::Other)
    }

    /// Heading text of a block, if its first line is heading-like.
    pub fn heading_of(&self, block: &TextBlock) -> Option<String> {
        heading_candidate(block.first_line(), block.kind == BlockKind::Heading)
    }

    /// Partition the document into sections. Never fails.
    pub fn segment(&self, parsed: &ParsedText) -> Vec<Section> {
        let blocks = &parsed.blocks;
        let mut sections = Vec::new();
        let mut open: Option<(SectionLabel, Option<String>, usize)> = None;

        for (i, block) in blocks.iter().enumerate() {
            if let Some(heading) = self.heading_of(block) {
                if let Some((label, heading, start)) = open.take() {
                    sections.push(build_section(blocks, label, heading, start..i));
                }
                open = Some((self.classify(&heading), Some(heading), i));
            } else if open.is_none() {
                open = Some((SectionLabel::Other, None, i));
            }
        }
        if let Some((label, heading, start)) = open {
            sections.push(build_section(blocks, label, heading, start..blocks.len()));
        }

        tracing::debug!(
            sections = sections.len(),
            labels = ?sections.iter().map(|s| s.label).collect::<Vec<_>>(),
            "segmented document"
        );
        sections
    }
}

/// Segment with the default rule set.
pub fn segment(parsed: &ParsedText) -> Vec<Section> {
    Segmenter::default().segment(parsed)
}

fn build_section(
    blocks: &[TextBlock],
    label: SectionLabel,
    heading: Option<String>,
    range: Range<usize>,
) -> Section {
    let text = blocks[range.clone()]
        .iter()
        .map(|b| b.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    Section {
        label,
        heading,
        blocks: range,
        text,
    }
}

/// Strip numbering/markdown markers and a trailing colon.
fn strip_heading_markers(line: &str) -> &str {
    let line = line.trim();
    let start = NUMBERING.find(line).map(|m| m.end()).unwrap_or(0);
    line[start..].trim().trim_end_matches(':').trim_end()
}

fn canonical_key(heading: &str) -> String {
    strip_heading_markers(heading)
        .to_lowercase()
        .replace('&', "and")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cleaned heading text when `line` looks like a heading.
///
/// `hinted` marks lines the source format already styled as headings; they
/// skip the casing checks.
pub fn heading_candidate(line: &str, hinted: bool) -> Option<String> {
    let text = strip_heading_markers(line);
    if text.is_empty() || text.chars().count() > MAX_HEADING_CHARS {
        return None;
    }
    if !text.chars().any(char::is_alphabetic) {
        return None;
    }
    if hinted {
        return Some(text.to_string());
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > MAX_HEADING_WORDS {
        return None;
    }
    if text.ends_with(['.', ',', ';', '!', '?']) || text.contains(':') {
        return None;
    }
    if text.contains(['%', '$', '€', '£', '¥', '=']) {
        return None;
    }

    if is_all_caps(text) || is_title_case(&words) {
        Some(text.to_string())
    } else {
        None
    }
}

fn is_all_caps(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase())
}

fn is_title_case(words: &[&str]) -> bool {
    let mut counted = 0;
    for (i, word) in words.iter().enumerate() {
        let Some(first) = word.chars().next() else {
            continue;
        };
        if !first.is_alphabetic() {
            continue;
        }
        counted += 1;
        if first.is_uppercase() {
            continue;
        }
        if i > 0 && SMALL_WORDS.contains(&word.to_lowercase().as_str()) {
            continue;
        }
        return false;
    }
    counted > 0
}

// ============================================================================
// Tests
// ============================================================================
