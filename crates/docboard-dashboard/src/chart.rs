//! Chart mapping
//!
//! `map_to_chart` turns one [`MetricSeries`] into a [`ChartSpec`]. The chart
//! type comes from an ordered list of [`ChartRule`]s evaluated top to bottom;
//! the first predicate that holds wins and `bar` is the fallback. Mapping is a
//! pure function of the series, so identical series always give identical
//! specs (including the id).

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use docboard_ingest::MetricSeries;

use crate::digest::chart_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Pie,
    Radar,
    Scatter,
}

impl ChartType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::Pie => "pie",
            ChartType::Radar => "radar",
            ChartType::Scatter => "scatter",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(ChartType::Line),
            "bar" => Ok(ChartType::Bar),
            "pie" => Ok(ChartType::Pie),
            "radar" => Ok(ChartType::Radar),
            "scatter" => Ok(ChartType::Scatter),
            other => Err(format!("unknown chart type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub label: String,
    pub unit: Option<String>,
}

/// Declarative description of one chart, derived from exactly one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub id: String,
    pub chart_type: ChartType,
    pub title: String,
    /// Name of the source series.
    pub series: String,
    /// Index of the section the series came from.
    pub section: usize,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    /// Second dimension of scatter charts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_values: Option<Vec<f64>>,
    pub x_axis: Axis,
    pub y_axis: Axis,
}

// ============================================================================
// Rules
// ============================================================================

/// One entry of the chart policy.
#[derive(Clone, Copy)]
pub struct ChartRule {
    pub name: &'static str,
    pub chart_type: ChartType,
    pub applies: fn(&MetricSeries) -> bool,
}

impl fmt::Debug for ChartRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartRule")
            .field("name", &self.name)
            .field("chart_type", &self.chart_type)
            .finish()
    }
}

/// Chart policy in priority order; anything else is a bar chart.
pub const DEFAULT_CHART_RULES: [ChartRule; 4] = [
    ChartRule {
        name: "ordinal_labels",
        chart_type: ChartType::Line,
        applies: has_ordinal_labels,
    },
    ChartRule {
        name: "parts_of_whole",
        chart_type: ChartType::Pie,
        applies: is_part_of_whole,
    },
    ChartRule {
        name: "comparable_dimensions",
        chart_type: ChartType::Radar,
        applies: has_comparable_dimensions,
    },
    ChartRule {
        name: "two_numeric_dimensions",
        chart_type: ChartType::Scatter,
        applies: MetricSeries::is_bivariate,
    },
];

pub const FALLBACK_CHART: ChartType = ChartType::Bar;

const PIE_MAX_POINTS: usize = 6;
const PERCENT_TOLERANCE: f64 = 2.0;
const FRACTION_TOLERANCE: f64 = 0.02;
const RADAR_POINTS: std::ops::RangeInclusive<usize> = 3..=8;
const RADAR_MAX_RATIO: f64 = 10.0;

static ORDINAL_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)^(?:
            (?:19|20)\d{2}
          | \d{4}-\d{2}(?:-\d{2})?
          | q[1-4]\s*'?\d{2,4} | \d{4}\s*q[1-4] | fy\s?'?\d{2,4}
          | (?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?
             |sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?(?:\s+\d{4})?
          | \#\d+ | \d+ | before | after
        )$",
    )
    .expect("static ordinal label pattern")
});

fn has_ordinal_labels(series: &MetricSeries) -> bool {
    series.points.len() >= 2
        && !series.is_bivariate()
        && series
            .points
            .iter()
            .all(|p| ORDINAL_LABEL.is_match(p.label.trim()))
}

fn is_part_of_whole(series: &MetricSeries) -> bool {
    let n = series.points.len();
    if !(2..=PIE_MAX_POINTS).contains(&n) || series.is_bivariate() {
        return false;
    }
    if series.points.iter().any(|p| p.value < 0.0) {
        return false;
    }
    let sum: f64 = series.points.iter().map(|p| p.value).sum();
    match series.unit.as_deref() {
        Some("%") => (sum - 100.0).abs() <= PERCENT_TOLERANCE,
        None => {
            series.points.iter().all(|p| p.value <= 1.0)
                && (sum - 1.0).abs() <= FRACTION_TOLERANCE
        }
        Some(_) => false,
    }
}

fn has_comparable_dimensions(series: &MetricSeries) -> bool {
    if !RADAR_POINTS.contains(&series.points.len()) || series.is_bivariate() {
        return false;
    }
    let values = series.values();
    if values.iter().any(|v| *v <= 0.0) {
        return false;
    }
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    max / min <= RADAR_MAX_RATIO
}

// ============================================================================
// Mapper
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChartMapper {
    rules: Vec<ChartRule>,
}

impl Default for ChartMapper {
    fn default() -> Self {
        Self {
            rules: DEFAULT_CHART_RULES.to_vec(),
        }
    }
}

impl ChartMapper {
    pub fn new(rules: Vec<ChartRule>) -> Self {
        Self { rules }
    }

    /// Chart type for a series: first matching rule, else bar.
    pub fn choose(&self, series: &MetricSeries) -> ChartType {
        self.rules
            .iter()
            .find(|rule| (rule.applies)(series))
            .map(|rule| rule.chart_type)
            .unwrap_or(FALLBACK_CHART)
    }

    pub fn map(&self, series: &MetricSeries) -> ChartSpec {
        let chart_type = self.choose(series);
        let bivariate = chart_type == ChartType::Scatter;
        let display_name = title_case(&series.name);

        let (x_axis, y_axis) = if bivariate {
            (
                Axis {
                    label: "x".to_string(),
                    unit: None,
                },
                Axis {
                    label: "y".to_string(),
                    unit: series.unit.clone(),
                },
            )
        } else {
            (
                Axis {
                    label: x_axis_label(series),
                    unit: None,
                },
                Axis {
                    label: display_name.clone(),
                    unit: series.unit.clone(),
                },
            )
        };

        let title = match &series.unit {
            Some(unit) => format!("{display_name} ({unit})"),
            None => display_name,
        };

        ChartSpec {
            id: chart_id(&canonical(series)),
            chart_type,
            title,
            series: series.name.clone(),
            section: series.section,
            labels: series.labels(),
            values: series.values(),
            y_values: bivariate.then(|| series.points.iter().map(|p| p.y.unwrap_or(0.0)).collect()),
            x_axis,
            y_axis,
        }
    }
}

/// Map with the default policy.
pub fn map_to_chart(series: &MetricSeries) -> ChartSpec {
    ChartMapper::default().map(series)
}

/// Identity of a series for chart ids: name, unit and points, not position.
fn canonical(series: &MetricSeries) -> String {
    let mut out = format!(
        "{}\u{1f}{}",
        series.name.to_lowercase(),
        series.unit.as_deref().unwrap_or("")
    );
    for point in &series.points {
        out.push_str(&format!("\u{1e}{}\u{1f}{:?}\u{1f}{:?}", point.label, point.value, point.y));
    }
    out
}

fn x_axis_label(series: &MetricSeries) -> String {
    if series.points.iter().all(|p| ORDINAL_LABEL.is_match(p.label.trim())) {
        "period".to_string()
    } else {
        "category".to_string()
    }
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use docboard_ingest::{DataPoint, SectionLabel, SeriesSource};

    fn series(name: &str, unit: Option<&str>, points: &[(&str, f64)]) -> MetricSeries {
        MetricSeries {
            name: name.to_string(),
            unit: unit.map(str::to_string),
            points: points
                .iter()
                .map(|(label, value)| DataPoint {
                    label: label.to_string(),
                    value: *value,
                    y: None,
                })
                .collect(),
            section: 0,
            section_label: SectionLabel::Results,
            source: SeriesSource::LabelValue,
        }
    }

    #[test]
    fn test_years_are_line() {
        let s = series("revenue", Some("USD"), &[("2021", 1.0), ("2022", 2.0)]);
        assert_eq!(map_to_chart(&s).chart_type, ChartType::Line);
        let s = series("accuracy", Some("%"), &[("before", 72.0), ("after", 91.0)]);
        assert_eq!(map_to_chart(&s).chart_type, ChartType::Line);
        let s = series("visits", None, &[("Jan", 3.0), ("Feb", 4.0), ("Mar 2024", 9.0)]);
        assert_eq!(map_to_chart(&s).chart_type, ChartType::Line);
    }

    #[test]
    fn test_shares_are_pie() {
        let s = series(
            "spend",
            Some("%"),
            &[("Search", 40.0), ("Social", 35.0), ("Email", 24.5)],
        );
        assert_eq!(map_to_chart(&s).chart_type, ChartType::Pie);
        let s = series("mix", None, &[("a", 0.5), ("b", 0.3), ("c", 0.2)]);
        assert_eq!(map_to_chart(&s).chart_type, ChartType::Pie);
    }

    #[test]
    fn test_comparable_dimensions_are_radar() {
        let s = series(
            "scores",
            None,
            &[("Speed", 7.0), ("Quality", 8.5), ("Cost", 4.0), ("Support", 6.0)],
        );
        assert_eq!(map_to_chart(&s).chart_type, ChartType::Radar);
    }

    #[test]
    fn test_bivariate_is_scatter() {
        let mut s = series("latency vs load", None, &[("10", 10.0), ("20", 20.0)]);
        for (p, y) in s.points.iter_mut().zip([120.0, 180.0]) {
            p.y = Some(y);
        }
        let spec = map_to_chart(&s);
        assert_eq!(spec.chart_type, ChartType::Scatter);
        assert_eq!(spec.y_values, Some(vec![120.0, 180.0]));
    }

    #[test]
    fn test_default_is_bar() {
        let s = series(
            "revenue by region",
            Some("USD"),
            &[("North", 4.2e6), ("South", 1.0e5)],
        );
        let spec = map_to_chart(&s);
        assert_eq!(spec.chart_type, ChartType::Bar);
        assert_eq!(spec.title, "Revenue by region (USD)");
        assert_eq!(spec.x_axis.label, "category");
    }

    #[test]
    fn test_rules_are_ordered() {
        // Percent shares over years: the ordinal rule wins over the pie rule.
        let s = series("share", Some("%"), &[("2022", 50.0), ("2023", 50.0)]);
        assert_eq!(map_to_chart(&s).chart_type, ChartType::Line);

        let mapper = ChartMapper::new(DEFAULT_CHART_RULES[1..].to_vec());
        assert_eq!(mapper.choose(&s), ChartType::Pie);
    }

    #[test]
    fn test_id_ignores_position() {
        let a = series("revenue", None, &[("x", 1.0), ("y", 2.0)]);
        let mut b = a.clone();
        b.section = 4;
        assert_eq!(map_to_chart(&a).id, map_to_chart(&b).id);
        b.points[0].value = 1.5;
        assert_ne!(map_to_chart(&a).id, map_to_chart(&b).id);
    }
}
