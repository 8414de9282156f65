//! Layout themes and the default-layout heuristic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use docboard_ingest::{Section, SectionLabel};

use crate::chart::ChartSpec;

pub const DEFAULT_PRIMARY_COLOR: &str = "#0ea5e9";
pub const DEFAULT_ACCENT_COLOR: &str = "#6366f1";

const CARDS_MIN_CHARTS: usize = 3;
const CURRENCY_UNITS: &[&str] = &["USD", "EUR", "GBP", "JPY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    #[default]
    SingleColumn,
    TwoColumn,
    DashboardCards,
    ScientificPaper,
    Corporate,
}

impl Layout {
    pub const ALL: [Layout; 5] = [
        Layout::SingleColumn,
        Layout::TwoColumn,
        Layout::DashboardCards,
        Layout::ScientificPaper,
        Layout::Corporate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Layout::SingleColumn => "single-column",
            Layout::TwoColumn => "two-column",
            Layout::DashboardCards => "dashboard-cards",
            Layout::ScientificPaper => "scientific-paper",
            Layout::Corporate => "corporate",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Layout::ALL
            .into_iter()
            .find(|layout| layout.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown layout '{s}' (expected one of: {})",
                    Layout::ALL.map(Layout::as_str).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub layout: Layout,
    pub primary_color: String,
    pub accent_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self::with_layout(Layout::default())
    }
}

impl Theme {
    pub fn with_layout(layout: Layout) -> Self {
        Self {
            layout,
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            accent_color: DEFAULT_ACCENT_COLOR.to_string(),
        }
    }
}

/// Default layout from section composition and charts.
pub fn choose_layout(sections: &[Section], charts: &[ChartSpec]) -> Layout {
    let has = |label: SectionLabel| sections.iter().any(|s| s.label == label);

    if has(SectionLabel::Methodology)
        && (has(SectionLabel::Abstract) || has(SectionLabel::Results))
    {
        return Layout::ScientificPaper;
    }
    let monetary = charts
        .iter()
        .filter_map(|chart| chart.y_axis.unit.as_deref())
        .any(|unit| CURRENCY_UNITS.contains(&unit));
    if monetary {
        return Layout::Corporate;
    }
    if charts.len() >= CARDS_MIN_CHARTS {
        return Layout::DashboardCards;
    }
    if charts.is_empty() && has(SectionLabel::Discussion) && has(SectionLabel::Conclusion) {
        return Layout::TwoColumn;
    }
    Layout::SingleColumn
}
