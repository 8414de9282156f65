//! JSON and standalone-HTML export.
//!
//! Both paths consume the same [`Dashboard`] structure; the HTML page embeds
//! the chart specs as JSON and renders them client-side with Chart.js.

use std::fmt::Write as _;

use crate::chart::{ChartSpec, ChartType};
use crate::dashboard::Dashboard;
use crate::insight::InsightRef;

pub const CHART_JS_CDN: &str = "https://cdn.jsdelivr.net/npm/chart.js@4.4.1/dist/chart.umd.min.js";

pub fn to_json(dashboard: &Dashboard) -> serde_json::Result<String> {
    serde_json::to_string_pretty(dashboard)
}

pub fn from_json(json: &str) -> serde_json::Result<Dashboard> {
    serde_json::from_str(json)
}

/// Escape text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// JSON that is safe inside a `<script>` element.
fn script_json(charts: &[ChartSpec]) -> String {
    serde_json::to_string(charts)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/")
}

/// Render a self-contained HTML page (print-friendly).
pub fn render_html(dashboard: &Dashboard) -> String {
    let mut html = String::new();
    let theme = &dashboard.theme;
    let title = escape_html(&dashboard.title);

    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<script src="{CHART_JS_CDN}"></script>
<style>
:root {{ --primary: {primary}; --accent: {accent}; }}
body {{ font-family: system-ui, sans-serif; margin: 0; color: #1f2937; }}
header {{ background: var(--primary); color: #fff; padding: 1.5rem 2rem; }}
main {{ padding: 1.5rem 2rem; display: grid; gap: 1.5rem; }}
.layout-two-column main, .layout-scientific-paper .sections {{ grid-template-columns: 1fr 1fr; }}
.layout-dashboard-cards .charts {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(320px, 1fr)); gap: 1rem; }}
.card {{ border: 1px solid #e5e7eb; border-radius: 8px; padding: 1rem; }}
.badge {{ background: var(--accent); color: #fff; border-radius: 4px; padding: 0 .4rem; font-size: .75rem; }}
.keywords span {{ margin-right: .5rem; color: var(--accent); }}
table {{ border-collapse: collapse; }} td, th {{ border: 1px solid #e5e7eb; padding: .25rem .5rem; }}
@media print {{ .no-print {{ display: none; }} }}
</style>
</head>
<body class="layout-{layout}">
<header>
<h1>{title}</h1>
<p>Generated {created}</p>
<button class="no-print" onclick="window.print()">Print / Save as PDF</button>
</header>
<main>
"#,
        primary = escape_html(&theme.primary_color),
        accent = escape_html(&theme.accent_color),
        layout = theme.layout,
        created = dashboard.created_at.format("%Y-%m-%d %H:%M UTC"),
    );

    if !dashboard.insights.is_empty() {
        html.push_str("<section class=\"insights card\">\n<h2>Key insights</h2>\n<ul>\n");
        for insight in &dashboard.insights {
            let target = match &insight.supports {
                Some(InsightRef::Section { index, .. }) => dashboard
                    .sections
                    .get(*index)
                    .map(|s| format!(" <small>({})</small>", escape_html(&s.title())))
                    .unwrap_or_default(),
                Some(InsightRef::Series { name }) => {
                    format!(" <small>({})</small>", escape_html(name))
                }
                None => String::new(),
            };
            let _ = writeln!(
                html,
                "<li><span class=\"badge\">{}</span> {}{}</li>",
                insight.category,
                escape_html(&insight.statement),
                target
            );
        }
        html.push_str("</ul>\n");
        if !dashboard.emphases.is_empty() {
            html.push_str("<p><strong>Emphasis:</strong> ");
            let emphases: Vec<String> = dashboard.emphases.iter().map(|e| escape_html(e)).collect();
            html.push_str(&emphases.join(" &middot; "));
            html.push_str("</p>\n");
        }
        html.push_str("</section>\n");
    }

    if !dashboard.facts.is_empty() {
        html.push_str("<section class=\"facts card\">\n<h2>Key figures</h2>\n<ul>\n");
        for fact in &dashboard.facts {
            let unit = fact.unit.as_deref().map(|u| format!(" {u}")).unwrap_or_default();
            let _ = writeln!(
                html,
                "<li>{}: {}{}</li>",
                escape_html(&fact.name),
                fact.value,
                escape_html(&unit)
            );
        }
        html.push_str("</ul>\n</section>\n");
    }

    if !dashboard.charts.is_empty() {
        html.push_str("<section class=\"charts\">\n");
        for chart in &dashboard.charts {
            let _ = writeln!(
                html,
                "<figure class=\"card\"><figcaption>{}</figcaption><canvas id=\"{}\"></canvas></figure>",
                escape_html(&chart.title),
                escape_html(&chart.id)
            );
        }
        html.push_str("</section>\n");
    }

    html.push_str("<section class=\"sections\">\n");
    for section in &dashboard.sections {
        let _ = writeln!(
            html,
            "<article class=\"card section-{}\">\n<h2>{}</h2>",
            section.label,
            escape_html(&section.title())
        );
        for paragraph in section.body().split("\n\n").filter(|p| !p.trim().is_empty()) {
            let _ = writeln!(html, "<p>{}</p>", escape_html(paragraph).replace('\n', "<br>"));
        }
        html.push_str("</article>\n");
    }
    html.push_str("</section>\n");

    for table in &dashboard.tables {
        html.push_str("<section class=\"card\"><table>\n<tr>");
        for header in &table.headers {
            let _ = write!(html, "<th>{}</th>", escape_html(header));
        }
        html.push_str("</tr>\n");
        for row in &table.rows {
            html.push_str("<tr>");
            for cell in row {
                let _ = write!(html, "<td>{}</td>", escape_html(cell));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table></section>\n");
    }

    if let Some(max) = dashboard.keywords.iter().map(|k| k.count).max() {
        html.push_str("<section class=\"keywords card\">\n<h2>Keywords</h2>\n<p>");
        for keyword in &dashboard.keywords {
            let size = 0.8 + 1.2 * keyword.count as f64 / max as f64;
            let _ = write!(
                html,
                "<span style=\"font-size: {size:.2}rem\">{}</span>",
                escape_html(&keyword.word)
            );
        }
        html.push_str("</p>\n</section>\n");
    }

    if !dashboard.warnings.is_empty() {
        html.push_str("<section class=\"warnings card no-print\">\n<h2>Notes</h2>\n<ul>\n");
        for warning in &dashboard.warnings {
            let _ = writeln!(html, "<li>{}</li>", escape_html(warning));
        }
        html.push_str("</ul>\n</section>\n");
    }

    let _ = write!(
        html,
        r#"</main>
<script type="application/json" id="docboard-charts">{charts}</script>
<script>
(function () {{
  if (typeof Chart === "undefined") return;
  const specs = JSON.parse(document.getElementById("docboard-charts").textContent);
  const primary = getComputedStyle(document.documentElement).getPropertyValue("--primary").trim();
  for (const spec of specs) {{
    const canvas = document.getElementById(spec.id);
    if (!canvas) continue;
    const data = spec.chart_type === "{scatter}"
      ? spec.values.map((x, i) => ({{ x: x, y: spec.y_values ? spec.y_values[i] : 0 }}))
      : spec.values;
    new Chart(canvas, {{
      type: spec.chart_type,
      data: {{
        labels: spec.labels,
        datasets: [{{ label: spec.title, data: data, backgroundColor: primary, borderColor: primary }}]
      }},
      options: {{ responsive: true }}
    }});
  }}
}})();
</script>
</body>
</html>
"#,
        charts = script_json(&dashboard.charts),
        scatter = ChartType::Scatter,
    );

    html
}
