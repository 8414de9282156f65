//! PDF Extraction Module
//!
//! Extracts per-page text from PDF documents. Pages without extractable
//! text (scanned/image-only) are kept as empty blocks so page positions stay
//! stable.

use serde::{Deserialize, Serialize};

use crate::text::{blocks_from_text, normalize};
use crate::{BlockKind, IngestError, TextBlock};

// ============================================================================
// PDF Document Types
// ============================================================================

/// Extracted PDF content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfDocument {
    pub pages: Vec<PdfPage>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfPage {
    pub number: usize,
    pub text: String,
}

impl PdfDocument {
    /// Paragraph blocks per page; an empty page yields one `EmptyPage` block.
    pub fn into_blocks(self) -> Vec<TextBlock> {
        let mut blocks = Vec::new();
        for page in self.pages {
            let page_blocks = blocks_from_text(&page.text, Some(page.number));
            if page_blocks.is_empty() {
                blocks.push(TextBlock {
                    index: 0,
                    page: Some(page.number),
                    paragraph: 0,
                    kind: BlockKind::EmptyPage,
                    text: String::new(),
                });
            } else {
                blocks.extend(page_blocks);
            }
        }
        blocks
    }
}

// ============================================================================
// PDF Parser
// ============================================================================

/// PDF parser using pdf-extract
#[derive(Debug, Default)]
pub struct PdfParser {
    _private: (),
}

impl PdfParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse PDF from bytes, one [`PdfPage`] per page of the document.
    #[cfg(feature = "pdf")]
    pub fn parse_bytes(&self, data: &[u8]) -> Result<PdfDocument, IngestError> {
        use pdf_extract::extract_text_from_mem_by_pages;

        if !data.starts_with(b"%PDF-") {
            return Err(IngestError::CorruptDocument(
                "missing %PDF- header".to_string(),
            ));
        }

        // pdf-extract panics on some malformed inputs; treat that as corrupt.
        let page_texts = std::panic::catch_unwind(|| extract_text_from_mem_by_pages(data))
            .map_err(|_| IngestError::CorruptDocument("PDF decoder panicked".to_string()))?
            .map_err(|e| IngestError::CorruptDocument(format!("PDF extraction failed: {e:?}")))?;

        if page_texts.is_empty() {
            return Err(IngestError::CorruptDocument(
                "PDF has no readable pages".to_string(),
            ));
        }

        Ok(PdfDocument::from_page_texts(page_texts))
    }

    /// Fallback when pdf feature not enabled
    #[cfg(not(feature = "pdf"))]
    pub fn parse_bytes(&self, _data: &[u8]) -> Result<PdfDocument, IngestError> {
        Err(IngestError::UnsupportedFormat(
            "pdf (compile with --features pdf)".to_string(),
        ))
    }
}

impl PdfDocument {
    /// Number pages in order. Every page is kept, including empty trailing ones.
    pub fn from_page_texts<I, S>(page_texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pages: Vec<PdfPage> = page_texts
            .into_iter()
            .enumerate()
            .map(|(i, page_text)| PdfPage {
                number: i + 1,
                text: normalize(page_text.as_ref()),
            })
            .collect();
        let text = pages
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self { pages, text }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_keep_position_and_trailing_empties() {
        let doc = PdfDocument::from_page_texts(["Intro text", "", "Results\n\nAccuracy 91%", "  "]);
        assert_eq!(doc.pages.len(), 4);
        assert_eq!(doc.pages[1].text, "");
        assert_eq!(doc.pages[2].number, 3);
        assert_eq!(doc.pages[3].text, "");

        let blocks = doc.into_blocks();
        let pages: Vec<Option<usize>> = blocks.iter().map(|b| b.page).collect();
        assert_eq!(pages, vec![Some(1), Some(2), Some(3), Some(3), Some(4)]);
        assert_eq!(blocks[4].kind, BlockKind::EmptyPage);
    }

    #[test]
    fn test_empty_page_becomes_marker_block() {
        let doc = PdfDocument {
            pages: vec![
                PdfPage {
                    number: 1,
                    text: "Page one".to_string(),
                },
                PdfPage {
                    number: 2,
                    text: String::new(),
                },
            ],
            text: String::new(),
        };
        let blocks = doc.into_blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].kind, BlockKind::EmptyPage);
        assert_eq!(blocks[1].page, Some(2));
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_garbage_is_corrupt() {
        let err = PdfParser::new().parse_bytes(b"%PDF-1.4\ngarbage").unwrap_err();
        assert!(matches!(err, IngestError::CorruptDocument(_)));
    }
}
