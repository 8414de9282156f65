//! Dashboard model and assembly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docboard_ingest::{KeywordCount, MediaType, ScalarFact, Section, Table};

use crate::chart::ChartSpec;
use crate::insight::Insight;
use crate::theme::{choose_layout, Theme};

/// Title used when neither the document nor the upload names one.
pub const DEFAULT_TITLE: &str = "Document Analysis";

/// Provenance of the analysed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub file_name: Option<String>,
    pub media_type: MediaType,
    pub size_bytes: u64,
    /// Hex SHA-256 of the uploaded bytes.
    pub sha256: String,
    pub block_count: usize,
}

/// The assembled, immutable artifact. Field names are part of the export
/// format consumed by the JSON API and the HTML renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: Uuid,
    pub title: String,
    pub theme: Theme,
    pub sections: Vec<Section>,
    pub charts: Vec<ChartSpec>,
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub emphases: Vec<String>,
    #[serde(default)]
    pub facts: Vec<ScalarFact>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub keywords: Vec<KeywordCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing row for stores and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub sections: usize,
    pub charts: usize,
    pub insights: usize,
}

impl Dashboard {
    pub fn summary(&self) -> DashboardSummary {
        DashboardSummary {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
            sections: self.sections.len(),
            charts: self.charts.len(),
            insights: self.insights.len(),
        }
    }

    pub fn chart(&self, id: &str) -> Option<&ChartSpec> {
        self.charts.iter().find(|c| c.id == id)
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// Everything the assembler combines. `theme: None` picks a layout from the
/// section composition.
#[derive(Debug, Clone, Default)]
pub struct DashboardParts {
    pub title: Option<String>,
    pub theme: Option<Theme>,
    pub sections: Vec<Section>,
    pub charts: Vec<ChartSpec>,
    pub insights: Vec<Insight>,
    pub emphases: Vec<String>,
    pub facts: Vec<ScalarFact>,
    pub tables: Vec<Table>,
    pub keywords: Vec<KeywordCount>,
    pub source: Option<SourceInfo>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Assembler;

impl Assembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble with a fresh id and the current time.
    pub fn assemble(&self, parts: DashboardParts) -> Dashboard {
        self.assemble_with(parts, Uuid::new_v4(), Utc::now())
    }

    /// Assemble with a caller-chosen id and timestamp.
    pub fn assemble_with(
        &self,
        parts: DashboardParts,
        id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Dashboard {
        let charts = dedupe_charts(parts.charts);
        let theme = parts
            .theme
            .unwrap_or_else(|| Theme::with_layout(choose_layout(&parts.sections, &charts)));
        let title = parts
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        tracing::info!(
            dashboard = %id,
            sections = parts.sections.len(),
            charts = charts.len(),
            insights = parts.insights.len(),
            layout = %theme.layout,
            "assembled dashboard"
        );

        Dashboard {
            id,
            title,
            theme,
            sections: parts.sections,
            charts,
            insights: parts.insights,
            emphases: parts.emphases,
            facts: parts.facts,
            tables: parts.tables,
            keywords: parts.keywords,
            source: parts.source,
            warnings: parts.warnings,
            created_at,
        }
    }
}

/// Keep the first chart per id, preserving order.
fn dedupe_charts(charts: Vec<ChartSpec>) -> Vec<ChartSpec> {
    let mut seen = std::collections::HashSet::new();
    charts
        .into_iter()
        .filter(|chart| seen.insert(chart.id.clone()))
        .collect()
}
