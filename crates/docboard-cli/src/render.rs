//! Terminal rendering of dashboards and analyses.

use colored::Colorize;
use std::path::Path;

use docboard_dashboard::{Dashboard, DashboardSummary, InsightRef};
use docboard_ingest::{MediaType, MetricSeries};
use docboard_pipeline::Analysis;

const PREVIEW_CHARS: usize = 96;

pub(crate) fn print_dashboard(dashboard: &Dashboard) {
    println!("{} {}", dashboard.title.bold(), format!("({})", dashboard.id).dimmed());
    println!(
        "  {} {}  {} {}",
        "layout".cyan(),
        dashboard.theme.layout,
        "created".cyan(),
        dashboard.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(source) = &dashboard.source {
        println!(
            "  {} {} ({}, {} bytes)",
            "source".cyan(),
            source.file_name.as_deref().unwrap_or("upload"),
            source.media_type,
            source.size_bytes
        );
    }

    println!("\n{}", "Sections".green().bold());
    for (i, section) in dashboard.sections.iter().enumerate() {
        println!("  [{i}] {:<12} {}", section.label.as_str(), section.title());
    }

    if !dashboard.charts.is_empty() {
        println!("\n{}", "Charts".green().bold());
        for chart in &dashboard.charts {
            println!(
                "  {} {:<8} {} ({} points)",
                "→".cyan(),
                chart.chart_type.as_str(),
                chart.title,
                chart.values.len()
            );
        }
    }

    if !dashboard.insights.is_empty() {
        println!("\n{}", "Insights".green().bold());
        for insight in &dashboard.insights {
            let support = match &insight.supports {
                Some(InsightRef::Section { index, .. }) => format!(" [section {index}]"),
                Some(InsightRef::Series { name }) => format!(" [{name}]"),
                None => String::new(),
            };
            println!(
                "  • {} {}{}",
                format!("{}:", insight.category).yellow(),
                insight.statement,
                support.dimmed()
            );
        }
    }

    if !dashboard.emphases.is_empty() {
        println!("\n{}", "Emphasis".green().bold());
        for emphasis in &dashboard.emphases {
            println!("  {emphasis}");
        }
    }

    if !dashboard.facts.is_empty() {
        println!("\n{}", "Key figures".green().bold());
        for fact in &dashboard.facts {
            println!("  {}: {}{}", fact.name, fact.value, fact.unit.as_deref().unwrap_or(""));
        }
    }

    if !dashboard.keywords.is_empty() {
        let words: Vec<String> = dashboard
            .keywords
            .iter()
            .map(|k| format!("{} ({})", k.word, k.count))
            .collect();
        println!("\n{} {}", "Keywords".green().bold(), words.join(", "));
    }

    for warning in &dashboard.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
}

pub(crate) fn print_summaries(summaries: &[DashboardSummary]) {
    for summary in summaries {
        println!(
            "{}  {}  {}  {}",
            summary.id.to_string().dimmed(),
            summary.created_at.format("%Y-%m-%d %H:%M"),
            summary.title.bold(),
            format!(
                "{} sections, {} charts, {} insights",
                summary.sections, summary.charts, summary.insights
            )
            .dimmed()
        );
    }
}

pub(crate) fn print_analysis(input: &Path, media_type: MediaType, analysis: &Analysis) {
    println!("{} {} ({})", "Inspected".green().bold(), input.display(), media_type);
    if let Some(title) = analysis.parsed.title() {
        println!("  {} {}", "title".cyan(), title);
    }
    println!("  {} {}", "blocks".cyan(), analysis.parsed.blocks.len());

    println!("\n{}", "Sections".green().bold());
    for (i, section) in analysis.sections.iter().enumerate() {
        println!(
            "  [{i}] {:<12} {}  {}",
            section.label.as_str(),
            section.title(),
            preview(section.body()).dimmed()
        );
    }

    let series: Vec<&MetricSeries> = analysis.extraction.chart_eligible().collect();
    if !series.is_empty() {
        println!("\n{}", "Series".green().bold());
        for s in series {
            let points: Vec<String> = s
                .points
                .iter()
                .map(|p| format!("{}={}", p.label, p.value))
                .collect();
            println!(
                "  {} {}{} [section {}] {}",
                "→".cyan(),
                s.name,
                s.unit.as_deref().map(|u| format!(" ({u})")).unwrap_or_default(),
                s.section,
                points.join(", ")
            );
        }
    }

    if !analysis.extraction.facts.is_empty() {
        println!("\n{}", "Facts".green().bold());
        for fact in &analysis.extraction.facts {
            println!("  {}: {}{}", fact.name, fact.value, fact.unit.as_deref().unwrap_or(""));
        }
    }

    for warning in &analysis.parsed.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{}…", cut.trim_end())
}
