//! PowerPoint export.
//!
//! Writes a small PresentationML package by hand: one blank master/layout,
//! and text-only slides for the title, the executive summary, the key
//! findings and (when present) the key figures. Every slide positions its
//! own shapes, so nothing is inherited from placeholders.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::dashboard::Dashboard;
use crate::insight::InsightCategory;

pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Slide bullets are cut to this many characters.
const BULLET_CHARS: usize = 200;
const SUMMARY_BULLETS: usize = 3;
const FINDING_BULLETS: usize = 5;
const FIGURE_BULLETS: usize = 10;

// 10in x 7.5in in EMU.
const SLIDE_CX: u64 = 9_144_000;
const SLIDE_CY: u64 = 6_858_000;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

#[derive(Debug, Error)]
pub enum PptxError {
    #[error("pptx package: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("pptx write: {0}")]
    Io(#[from] std::io::Error),
}

/// A slide as a heading plus bullet lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub title: String,
    pub lead: Option<String>,
    pub bullets: Vec<String>,
}

/// The slide outline for a dashboard, in presentation order.
pub fn outline(dashboard: &Dashboard) -> Vec<Slide> {
    let mut slides = vec![Slide {
        title: dashboard.title.clone(),
        lead: Some("Generated Dashboard Report".to_string()),
        bullets: vec![dashboard.created_at.format("%Y-%m-%d").to_string()],
    }];

    let (summary, findings): (Vec<_>, Vec<_>) = dashboard
        .insights
        .iter()
        .partition(|i| i.category == InsightCategory::Summary);

    // Without model output, fall back to the opening paragraphs of the document.
    let paragraphs: Vec<&str> = dashboard
        .sections
        .iter()
        .map(|s| s.body().trim())
        .filter(|b| !b.is_empty())
        .collect();

    let highlights: Vec<String> = if !summary.is_empty() {
        summary.iter().map(|i| i.statement.clone()).take(SUMMARY_BULLETS).collect()
    } else if !findings.is_empty() {
        findings.iter().map(|i| i.statement.clone()).take(SUMMARY_BULLETS).collect()
    } else {
        paragraphs.iter().map(|p| p.to_string()).take(SUMMARY_BULLETS).collect()
    };
    slides.push(Slide {
        title: "Executive Summary".to_string(),
        lead: Some("Key Highlights:".to_string()),
        bullets: highlights.iter().map(|b| clip(b)).collect(),
    });

    let main: Vec<String> = if !summary.is_empty() && !findings.is_empty() {
        findings
            .iter()
            .map(|i| format!("{}: {}", i.category, i.statement))
            .take(FINDING_BULLETS)
            .collect()
    } else if dashboard.insights.len() > SUMMARY_BULLETS {
        dashboard.insights[SUMMARY_BULLETS..]
            .iter()
            .map(|i| format!("{}: {}", i.category, i.statement))
            .take(FINDING_BULLETS)
            .collect()
    } else if dashboard.insights.is_empty() {
        paragraphs
            .iter()
            .skip(SUMMARY_BULLETS)
            .map(|p| p.to_string())
            .take(FINDING_BULLETS)
            .collect()
    } else {
        Vec::new()
    };
    slides.push(Slide {
        title: "Key Findings".to_string(),
        lead: Some("Main Insights:".to_string()),
        bullets: main.iter().map(|b| clip(b)).collect(),
    });

    if !dashboard.facts.is_empty() || !dashboard.charts.is_empty() {
        let mut figures: Vec<String> = dashboard
            .facts
            .iter()
            .map(|f| format!("{}: {}{}", f.name, f.value, f.unit.as_deref().unwrap_or("")))
            .collect();
        figures.extend(dashboard.charts.iter().map(|c| {
            let first = c.values.first().copied().unwrap_or_default();
            let last = c.values.last().copied().unwrap_or_default();
            format!("{} ({}): {} -> {}", c.title, c.chart_type.as_str(), first, last)
        }));
        figures.truncate(FIGURE_BULLETS);
        slides.push(Slide {
            title: "Key Figures".to_string(),
            lead: None,
            bullets: figures.iter().map(|b| clip(b)).collect(),
        });
    }

    slides
}

fn clip(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= BULLET_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(BULLET_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// Render the dashboard as a `.pptx` package.
pub fn render_pptx(dashboard: &Dashboard) -> Result<Vec<u8>, PptxError> {
    let slides = outline(dashboard);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    put(&mut zip, "[Content_Types].xml", &content_types(slides.len()))?;
    put(
        &mut zip,
        "_rels/.rels",
        &relationships(&[("officeDocument", "ppt/presentation.xml")]),
    )?;
    put(&mut zip, "ppt/presentation.xml", &presentation(slides.len()))?;

    let slide_targets: Vec<String> = (1..=slides.len()).map(|n| format!("slides/slide{n}.xml")).collect();
    let mut rels: Vec<(&str, &str)> = vec![("slideMaster", "slideMasters/slideMaster1.xml")];
    rels.extend(slide_targets.iter().map(|t| ("slide", t.as_str())));
    rels.push(("theme", "theme/theme1.xml"));
    put(&mut zip, "ppt/_rels/presentation.xml.rels", &relationships(&rels))?;

    put(&mut zip, "ppt/slideMasters/slideMaster1.xml", &slide_master())?;
    put(
        &mut zip,
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        &relationships(&[
            ("slideLayout", "../slideLayouts/slideLayout1.xml"),
            ("theme", "../theme/theme1.xml"),
        ]),
    )?;
    put(&mut zip, "ppt/slideLayouts/slideLayout1.xml", &slide_layout())?;
    put(
        &mut zip,
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        &relationships(&[("slideMaster", "../slideMasters/slideMaster1.xml")]),
    )?;
    put(&mut zip, "ppt/theme/theme1.xml", THEME)?;

    for (n, slide) in slides.iter().enumerate() {
        let n = n + 1;
        put(&mut zip, &format!("ppt/slides/slide{n}.xml"), &slide_xml(slide, n == 1))?;
        put(
            &mut zip,
            &format!("ppt/slides/_rels/slide{n}.xml.rels"),
            &relationships(&[("slideLayout", "../slideLayouts/slideLayout1.xml")]),
        )?;
    }

    let bytes = zip.finish()?.into_inner();
    tracing::debug!(slides = slides.len(), bytes = bytes.len(), "rendered pptx");
    Ok(bytes)
}

// ============================================================================
// Package parts
// ============================================================================

fn put(zip: &mut ZipWriter<Cursor<Vec<u8>>>, name: &str, body: &str) -> Result<(), PptxError> {
    zip.start_file(name, SimpleFileOptions::default())?;
    zip.write_all(body.as_bytes())?;
    Ok(())
}

fn content_types(slides: usize) -> String {
    let mut xml = format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#
    );
    for n in 1..=slides {
        let _ = write!(
            xml,
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        );
    }
    xml.push_str("</Types>");
    xml
}

/// Relationship ids are `rId1..` in the order given.
fn relationships(targets: &[(&str, &str)]) -> String {
    let mut xml = format!(r#"{XML_DECL}<Relationships xmlns="{REL_NS}">"#);
    for (i, (kind, target)) in targets.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{}" Type="{REL_TYPE}/{kind}" Target="{target}"/>"#,
            i + 1
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn presentation(slides: usize) -> String {
    let mut ids = String::new();
    for n in 0..slides {
        let _ = write!(ids, r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + n, n + 2);
    }
    format!(
        r#"{XML_DECL}<p:presentation {NS}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="{SLIDE_CX}" cy="{SLIDE_CY}"/><p:notesSz cx="{SLIDE_CY}" cy="{SLIDE_CX}"/></p:presentation>"#
    )
}

const EMPTY_TREE: &str = r#"<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree>"#;

fn slide_master() -> String {
    format!(
        r#"{XML_DECL}<p:sldMaster {NS}><p:cSld>{EMPTY_TREE}</p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#
    )
}

fn slide_layout() -> String {
    format!(
        r#"{XML_DECL}<p:sldLayout {NS} type="blank" preserve="1"><p:cSld name="Blank">{EMPTY_TREE}</p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    )
}

fn slide_xml(slide: &Slide, is_title: bool) -> String {
    let margin = 457_200;
    let width = SLIDE_CX - 2 * margin;
    let (title_y, title_cy, title_size) = if is_title {
        (2_130_425, 1_470_025, 4000)
    } else {
        (274_638, 1_143_000, 3200)
    };

    let mut body = String::new();
    if let Some(lead) = &slide.lead {
        body.push_str(&paragraph(lead, 0, if is_title { 2400 } else { 2000 }, !is_title));
    }
    for bullet in &slide.bullets {
        body.push_str(&paragraph(bullet, if is_title { 0 } else { 1 }, 1800, false));
    }

    let title_shape = shape(2, "Title", (margin, title_y, width, title_cy), &paragraph(&slide.title, 0, title_size, true));
    let body_y = title_y + title_cy;
    let body_shape = shape(3, "Body", (margin, body_y, width, SLIDE_CY - body_y - margin), &body);

    format!(
        r#"{XML_DECL}<p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{title_shape}{body_shape}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn shape(id: u32, name: &str, (x, y, cx, cy): (u64, u64, u64, u64), paragraphs: &str) -> String {
    // A text body needs at least one paragraph.
    let paragraphs = if paragraphs.is_empty() { "<a:p/>" } else { paragraphs };
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr wrap="square"><a:normAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#
    )
}

fn paragraph(text: &str, level: u8, size: u32, bold: bool) -> String {
    let ppr = if level > 0 {
        format!(r#"<a:pPr marL="{}" lvl="{level}" indent="-285750"><a:buChar char="&#8226;"/></a:pPr>"#, 285_750 * u32::from(level) + 171_450)
    } else {
        r#"<a:pPr><a:buNone/></a:pPr>"#.to_string()
    };
    format!(
        r#"<a:p>{ppr}<a:r><a:rPr lang="en-US" sz="{size}" b="{}" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
        u8::from(bold),
        escape(text)
    )
}

const THEME: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Docboard"><a:themeElements><a:clrScheme name="Docboard"><a:dk1><a:srgbClr val="1F2937"/></a:dk1><a:lt1><a:srgbClr val="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="1E3A8A"/></a:dk2><a:lt2><a:srgbClr val="F3F4F6"/></a:lt2><a:accent1><a:srgbClr val="2563EB"/></a:accent1><a:accent2><a:srgbClr val="10B981"/></a:accent2><a:accent3><a:srgbClr val="F59E0B"/></a:accent3><a:accent4><a:srgbClr val="EF4444"/></a:accent4><a:accent5><a:srgbClr val="8B5CF6"/></a:accent5><a:accent6><a:srgbClr val="14B8A6"/></a:accent6><a:hlink><a:srgbClr val="2563EB"/></a:hlink><a:folHlink><a:srgbClr val="7C3AED"/></a:folHlink></a:clrScheme><a:fontScheme name="Docboard"><a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Docboard"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="25400"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="38100"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#;

// ============================================================================
// Tests
// ============================================================================
