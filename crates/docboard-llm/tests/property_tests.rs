//! Property-based tests for prompt construction and response parsing
//!
//! 1. Prompts respect the token budget whenever the fixed parts fit
//! 2. Only the sections that were cut are reported as truncated
//! 3. The response parser never panics and never invents statements

use docboard_ingest::{DataPoint, MetricSeries, ScalarFact, Section, SectionLabel, SeriesSource};
use docboard_llm::*;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn label_strategy() -> impl Strategy<Value = SectionLabel> {
    prop_oneof![
        Just(SectionLabel::Abstract),
        Just(SectionLabel::Introduction),
        Just(SectionLabel::Methodology),
        Just(SectionLabel::Results),
        Just(SectionLabel::Discussion),
        Just(SectionLabel::Conclusion),
        Just(SectionLabel::Other),
    ]
}

fn section_strategy() -> impl Strategy<Value = Section> {
    (label_strategy(), "[A-Z][a-z]{2,12}", "[a-z ]{0,3000}").prop_map(|(label, heading, body)| {
        Section {
            label,
            heading: Some(heading.clone()),
            blocks: 0..1,
            text: format!("{heading}\n{body}"),
        }
    })
}

fn series_strategy() -> impl Strategy<Value = MetricSeries> {
    ("[a-z ]{1,40}", prop::collection::vec(-1.0e6f64..1.0e6, 2..12)).prop_map(|(name, values)| {
        MetricSeries {
            name,
            unit: None,
            points: values
                .into_iter()
                .enumerate()
                .map(|(i, value)| DataPoint {
                    label: format!("p{i}"),
                    value,
                    y: None,
                })
                .collect(),
            section: 0,
            section_label: SectionLabel::Results,
            source: SeriesSource::LabelValue,
        }
    })
}

fn fact_strategy() -> impl Strategy<Value = ScalarFact> {
    ("[A-Za-z ]{1,60}", -1.0e9f64..1.0e9, prop::option::of("[A-Z%$]{1,3}")).prop_map(
        |(name, value, unit)| ScalarFact {
            name,
            value,
            unit,
            section: 0,
        },
    )
}

fn length_strategy() -> impl Strategy<Value = SummaryLength> {
    prop_oneof![
        Just(SummaryLength::Short),
        Just(SummaryLength::Medium),
        Just(SummaryLength::Long),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_prompt_fits_budget(
        sections in prop::collection::vec(section_strategy(), 0..8),
        series in prop::collection::vec(series_strategy(), 0..200),
        facts in prop::collection::vec(fact_strategy(), 0..600),
        budget in 600usize..4000,
        length in length_strategy(),
    ) {
        let prompt = PromptBuilder::new(budget).build(&sections, &series, &facts, None, length);
        prop_assert!(
            prompt.estimated_tokens <= budget,
            "{} tokens over a budget of {}",
            prompt.estimated_tokens,
            budget
        );
    }

    #[test]
    fn prop_only_cut_sections_are_reported(
        sections in prop::collection::vec(section_strategy(), 1..6),
        budget in 600usize..4000,
    ) {
        let prompt = PromptBuilder::new(budget).build(&sections, &[], &[], None, SummaryLength::Medium);
        for (index, section) in sections.iter().enumerate() {
            let body = section.body().trim();
            let truncated = prompt.truncated_sections.contains(&index);
            if !truncated {
                prop_assert!(prompt.user.contains(body));
            }
        }
        let untouched = prompt.truncated_sections.is_empty();
        let total: usize = sections.iter().map(|s| s.body().trim().chars().count()).sum();
        prop_assert!(untouched || total > 0);
    }

    #[test]
    fn prop_parser_is_total(text in "\\PC{0,400}") {
        if let Ok(parsed) = parse_response(&text) {
            prop_assert!(!parsed.items.is_empty());
            for item in &parsed.items {
                prop_assert!(!item.statement.trim().is_empty());
            }
        }
    }

    #[test]
    fn prop_string_lists_parse_exactly(statements in prop::collection::vec("[A-Za-z][A-Za-z ,]{0,60}\\.", 1..10)) {
        let json = serde_json::json!({ "insights": statements }).to_string();
        let parsed = parse_response(&json).unwrap();
        let got: Vec<String> = parsed.items.iter().map(|i| i.statement.clone()).collect();
        let want: Vec<String> = statements.iter().map(|s| s.trim().to_string()).collect();
        prop_assert_eq!(got, want);
        prop_assert_eq!(parsed.rejected, 0);
    }
}
