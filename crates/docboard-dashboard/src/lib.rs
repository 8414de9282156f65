//! Dashboard synthesis for Docboard
//!
//! - [`chart`]: metric series → chart specs (ordered rule policy)
//! - [`insight`]: insight statements and what they support
//! - [`theme`]: layouts and the default-layout heuristic
//! - [`dashboard`]: the immutable artifact and its assembler
//! - [`export`]: JSON and standalone HTML
//! - [`pptx`]: PowerPoint deck

pub mod chart;
pub mod dashboard;
pub mod digest;
pub mod export;
pub mod insight;
pub mod pptx;
pub mod theme;

pub use chart::{map_to_chart, Axis, ChartMapper, ChartRule, ChartSpec, ChartType};
pub use dashboard::{Assembler, Dashboard, DashboardParts, DashboardSummary, SourceInfo};
pub use export::{from_json, render_html, to_json};
pub use insight::{Insight, InsightCategory, InsightRef};
pub use pptx::{render_pptx, PptxError, PPTX_MIME};
pub use theme::{choose_layout, Layout, Theme};
