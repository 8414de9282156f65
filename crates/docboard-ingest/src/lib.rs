//! Document ingestion for Docboard
//!
//! Turns an uploaded document into structured, chartable content:
//! - PDF / DOCX / DOC / TXT bytes → [`ParsedText`] (ordered, positioned blocks)
//! - [`ParsedText`] → labelled [`Section`]s (heading heuristics)
//! - [`Section`]s → [`MetricSeries`] candidates and scalar facts
//! - auxiliary extraction: pipe/tab tables and keyword frequencies
//!
//! Every stage after parsing is total: segmentation and extraction degrade to
//! coarser output instead of failing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod docx;
pub mod keywords;
pub mod metrics;
pub mod numeric;
pub mod pdf;
pub mod segment;
pub mod tables;
pub mod text;

pub use keywords::{keyword_frequencies, KeywordCount};
pub use metrics::{
    extract, DataPoint, MetricExtraction, MetricExtractor, MetricSeries, ScalarFact, SeriesSource,
};
pub use numeric::{parse_quantity, Quantity};
pub use pdf::{PdfDocument, PdfParser};
pub use segment::{segment, Section, SectionLabel, Segmenter};
pub use tables::{extract_tables, Table};

// ============================================================================
// Errors
// ============================================================================

/// Parse-stage failures. Both are fatal to a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("unsupported format: {0} (allowed: pdf, docx, doc, txt)")]
    UnsupportedFormat(String),
    #[error("corrupt document: {0}")]
    CorruptDocument(String),
}

// ============================================================================
// Media types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Pdf,
    Docx,
    Doc,
    Txt,
}

impl MediaType {
    pub const ALL: [MediaType; 4] = [
        MediaType::Pdf,
        MediaType::Docx,
        MediaType::Doc,
        MediaType::Txt,
    ];

    /// Resolve a declared media type.
    ///
    /// Accepts MIME types (parameters ignored), bare extensions (`pdf`,
    /// `.docx`) and file names (`report.PDF`).
    pub fn resolve(declared: &str) -> Result<Self, IngestError> {
        let lowered = declared.trim().to_ascii_lowercase();
        let essence = lowered.split(';').next().unwrap_or_default().trim();

        let by_mime = match essence {
            "application/pdf" | "application/x-pdf" => Some(MediaType::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(MediaType::Docx)
            }
            "application/msword" => Some(MediaType::Doc),
            "text/plain" => Some(MediaType::Txt),
            _ => None,
        };
        if let Some(media_type) = by_mime {
            return Ok(media_type);
        }

        let extension = essence.rsplit('.').next().unwrap_or(essence);
        match extension {
            "pdf" => Ok(MediaType::Pdf),
            "docx" => Ok(MediaType::Docx),
            "doc" => Ok(MediaType::Doc),
            "txt" | "text" => Ok(MediaType::Txt),
            _ => Err(IngestError::UnsupportedFormat(declared.trim().to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            MediaType::Pdf => "pdf",
            MediaType::Docx => "docx",
            MediaType::Doc => "doc",
            MediaType::Txt => "txt",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            MediaType::Doc => "application/msword",
            MediaType::Txt => "text/plain",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MediaType {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::resolve(s)
    }
}

// ============================================================================
// Raw and parsed documents
// ============================================================================

/// Uploaded bytes plus their declared type. Discarded after parsing.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
}

impl RawDocument {
    pub fn new(bytes: Vec<u8>, declared_type: &str) -> Result<Self, IngestError> {
        Ok(Self {
            bytes,
            media_type: MediaType::resolve(declared_type)?,
        })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn parse(&self) -> Result<ParsedText, IngestError> {
        parse(&self.bytes, self.media_type)
    }
}

/// What a block was before it was flattened to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    /// Paragraph styled as a heading/title by the source format.
    Heading,
    /// Flattened list item (numbering/bullets lost).
    ListItem,
    /// Flattened table row, cells joined with ` | `.
    TableRow,
    /// PDF page without extractable text (scanned/image-only).
    EmptyPage,
}

impl BlockKind {
    /// True when flattening dropped structure the source format had.
    pub fn is_flattened(self) -> bool {
        matches!(self, BlockKind::ListItem | BlockKind::TableRow)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Position in [`ParsedText::blocks`].
    pub index: usize,
    /// 1-based page number (PDF only).
    pub page: Option<usize>,
    /// Paragraph ordinal within the page (PDF) or document (DOCX/TXT).
    pub paragraph: usize,
    pub kind: BlockKind,
    pub text: String,
}

impl TextBlock {
    pub fn first_line(&self) -> &str {
        self.text.lines().next().unwrap_or_default()
    }
}

/// Ordered, positioned text blocks of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedText {
    pub media_type: MediaType,
    pub blocks: Vec<TextBlock>,
    pub warnings: Vec<String>,
}

impl ParsedText {
    /// Full text, blocks separated by blank lines.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn page_count(&self) -> Option<usize> {
        self.blocks.iter().filter_map(|b| b.page).max()
    }

    /// Title heuristic: first non-empty line, capped at 100 characters.
    pub fn title(&self) -> Option<String> {
        self.blocks
            .iter()
            .flat_map(|b| b.text.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(|l| l.chars().take(100).collect())
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse raw bytes of the given type into positioned text blocks.
pub fn parse(bytes: &[u8], media_type: MediaType) -> Result<ParsedText, IngestError> {
    let mut warnings = Vec::new();

    if let Some(sniffed) = sniff(bytes) {
        let compatible = sniffed == media_type
            || (sniffed == MediaType::Docx && media_type == MediaType::Doc);
        if !compatible {
            warnings.push(format!(
                "declared type {media_type} but content looks like {sniffed}; decoding as declared"
            ));
        }
    }

    let blocks = match media_type {
        MediaType::Pdf => PdfParser::new().parse_bytes(bytes)?.into_blocks(),
        MediaType::Docx => docx::parse_docx(bytes)?,
        MediaType::Doc if docx::looks_like_zip(bytes) => docx::parse_docx(bytes)?,
        MediaType::Doc => {
            warnings.push(
                "legacy .doc decoded as plain text; save as .docx to keep structure".to_string(),
            );
            let decoded = text::decode_legacy_doc(bytes);
            text::blocks_from_text(&decoded, None)
        }
        MediaType::Txt => {
            let decoded = text::decode(bytes, &mut warnings);
            text::blocks_from_text(&decoded, None)
        }
    };

    if blocks.iter().all(|b| b.text.trim().is_empty()) {
        return Err(IngestError::CorruptDocument(format!(
            "no extractable text in {media_type} document"
        )));
    }

    let empty_pages = blocks
        .iter()
        .filter(|b| b.kind == BlockKind::EmptyPage)
        .count();
    if empty_pages > 0 {
        warnings.push(format!(
            "{empty_pages} page(s) without extractable text (scanned or image-only)"
        ));
    }

    let blocks: Vec<TextBlock> = blocks
        .into_iter()
        .enumerate()
        .map(|(index, block)| TextBlock { index, ..block })
        .collect();

    tracing::debug!(
        media_type = %media_type,
        blocks = blocks.len(),
        warnings = warnings.len(),
        "parsed document"
    );

    Ok(ParsedText {
        media_type,
        blocks,
        warnings,
    })
}

/// Content sniffing from magic bytes; `None` when nothing obvious matches.
fn sniff(bytes: &[u8]) -> Option<MediaType> {
    if bytes.starts_with(b"%PDF-") {
        Some(MediaType::Pdf)
    } else if docx::looks_like_zip(bytes) {
        Some(MediaType::Docx)
    } else if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        Some(MediaType::Doc)
    } else {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_resolution() {
        assert_eq!(MediaType::resolve("application/pdf").unwrap(), MediaType::Pdf);
        assert_eq!(
            MediaType::resolve("text/plain; charset=utf-8").unwrap(),
            MediaType::Txt
        );
        assert_eq!(MediaType::resolve(".DOCX").unwrap(), MediaType::Docx);
        assert_eq!(MediaType::resolve("Quarterly Report.pdf").unwrap(), MediaType::Pdf);
        assert_eq!(MediaType::resolve("doc").unwrap(), MediaType::Doc);
    }

    #[test]
    fn test_images_are_unsupported() {
        for declared in ["image/png", "photo.jpg", "", "application/zip"] {
            assert!(matches!(
                MediaType::resolve(declared),
                Err(IngestError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn test_txt_parse_blocks() {
        let parsed = parse(b"Title\n\nFirst paragraph.\nStill first.\n\n\nSecond.", MediaType::Txt)
            .unwrap();
        assert_eq!(parsed.blocks.len(), 3);
        assert_eq!(parsed.blocks[1].text, "First paragraph.\nStill first.");
        assert_eq!(parsed.blocks[2].index, 2);
        assert_eq!(parsed.title().as_deref(), Some("Title"));
    }

    #[test]
    fn test_whitespace_only_is_corrupt() {
        let err = parse(b"  \n\n \t\n", MediaType::Txt).unwrap_err();
        assert!(matches!(err, IngestError::CorruptDocument(_)));
    }

    #[test]
    fn test_mismatched_magic_is_a_warning() {
        let parsed = parse(b"%PDF-1.4 not really a pdf", MediaType::Txt).unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].contains("looks like pdf"));
    }

    #[test]
    fn test_legacy_doc_falls_back_to_text() {
        let parsed = parse(b"Plain words in a doc file", MediaType::Doc).unwrap();
        assert_eq!(parsed.blocks.len(), 1);
        assert!(parsed.warnings.iter().any(|w| w.contains("legacy .doc")));
    }
}
