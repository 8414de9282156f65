//! Assembling from fixed parts and passing through the JSON egress format
//! preserves section order and the chart and insight counts.

use chrono::TimeZone;
use docboard_dashboard::{
    from_json, map_to_chart, to_json, Assembler, DashboardParts, Insight, InsightCategory,
    InsightRef, Layout,
};
use docboard_ingest::{extract, parse, segment, MediaType, SectionLabel};
use uuid::Uuid;

const PAPER: &str = "Abstract

We study caching.

Methodology

Two clusters were compared.

Results

Hit rate improved from 61% to 84%.
Latency by quarter:
Q1 2023: 120
Q2 2023: 95
Q3 2023: 80

Conclusion

Caching helps.";

#[test]
fn fixed_parts_survive_json() {
    let parsed = parse(PAPER.as_bytes(), MediaType::Txt).unwrap();
    let sections = segment(&parsed);
    let extraction = extract(&sections);
    let charts: Vec<_> = extraction.chart_eligible().map(map_to_chart).collect();
    assert_eq!(charts.len(), 2);

    let insights = vec![
        Insight::new("Caching raised the hit rate.", InsightCategory::Finding)
            .supporting(InsightRef::Series {
                name: "hit rate".to_string(),
            }),
        Insight::new("Latency fell every quarter.", InsightCategory::Trend)
            .with_confidence(0.8)
            .supporting(InsightRef::Section {
                index: 2,
                label: SectionLabel::Results,
            }),
    ];

    let parts = DashboardParts {
        title: parsed.title(),
        sections: sections.clone(),
        charts,
        insights,
        ..Default::default()
    };
    let created = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let dashboard = Assembler::new().assemble_with(parts, Uuid::new_v4(), created);
    assert_eq!(dashboard.theme.layout, Layout::ScientificPaper);

    let restored = from_json(&to_json(&dashboard).unwrap()).unwrap();
    let labels = |d: &docboard_dashboard::Dashboard| {
        d.sections.iter().map(|s| s.label).collect::<Vec<_>>()
    };
    assert_eq!(labels(&restored), labels(&dashboard));
    assert_eq!(restored.charts.len(), dashboard.charts.len());
    assert_eq!(restored.insights.len(), dashboard.insights.len());
    assert_eq!(restored, dashboard);
}
