//! Property tests for the chart policy.

use docboard_dashboard::{map_to_chart, ChartType};
use docboard_ingest::{DataPoint, MetricSeries, SectionLabel, SeriesSource};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn label_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "(19|20)[0-9]{2}",
        "Q[1-4] 20[0-9]{2}",
        "[A-Z][a-z]{2,9}",
        Just("before".to_string()),
    ]
}

fn series_strategy() -> impl Strategy<Value = MetricSeries> {
    (
        "[a-z]{3,12}",
        proptest::option::of(prop_oneof![Just("%".to_string()), Just("USD".to_string())]),
        proptest::collection::vec(
            (
                label_strategy(),
                -1.0e6f64..1.0e6,
                proptest::option::of(-1.0e3f64..1.0e3),
            ),
            2..10,
        ),
        any::<bool>(),
    )
        .prop_map(|(name, unit, points, bivariate)| MetricSeries {
            name,
            unit,
            points: points
                .into_iter()
                .map(|(label, value, y)| DataPoint {
                    label,
                    value,
                    y: if bivariate { Some(y.unwrap_or(0.0)) } else { None },
                })
                .collect(),
            section: 0,
            section_label: SectionLabel::Results,
            source: SeriesSource::Inline,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn mapping_is_deterministic(series in series_strategy()) {
        let first = serde_json::to_string(&map_to_chart(&series)).unwrap();
        let second = serde_json::to_string(&map_to_chart(&series.clone())).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn chart_mirrors_its_series(series in series_strategy()) {
        let chart = map_to_chart(&series);
        prop_assert_eq!(chart.labels.len(), series.points.len());
        prop_assert_eq!(&chart.values, &series.values());
        prop_assert_eq!(chart.series, series.name.clone());
        prop_assert_eq!(chart.y_values.is_some(), chart.chart_type == ChartType::Scatter);
    }

    #[test]
    fn bivariate_series_are_scatter(series in series_strategy()) {
        if series.is_bivariate() {
            prop_assert_eq!(map_to_chart(&series).chart_type, ChartType::Scatter);
        }
    }

    #[test]
    fn pie_only_for_small_nonnegative_series(series in series_strategy()) {
        if map_to_chart(&series).chart_type == ChartType::Pie {
            prop_assert!(series.points.len() <= 6);
            prop_assert!(series.points.iter().all(|p| p.value >= 0.0));
        }
    }
}
