//! DOCX extraction
//!
//! Reads `word/document.xml` from the OOXML package and emits one block per
//! paragraph in document order. List items and table rows are flattened to
//! paragraph-like blocks whose [`BlockKind`] records the structural loss.

use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{BlockKind, IngestError, TextBlock};

const DOCUMENT_PART: &str = "word/document.xml";

pub fn looks_like_zip(data: &[u8]) -> bool {
    data.len() > 4 && data.starts_with(b"PK\x03\x04")
}

/// Parse a DOCX package into paragraph blocks.
pub fn parse_docx(data: &[u8]) -> Result<Vec<TextBlock>, IngestError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| IngestError::CorruptDocument(format!("not a DOCX package: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| IngestError::CorruptDocument(format!("missing {DOCUMENT_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| IngestError::CorruptDocument(format!("unreadable {DOCUMENT_PART}: {e}")))?;

    paragraphs_from_document_xml(&xml)
}

#[derive(Default)]
struct ParagraphState {
    text: String,
    list_item: bool,
    heading: bool,
}

/// Walk WordprocessingML and collect paragraph/table-row blocks.
pub(crate) fn paragraphs_from_document_xml(xml: &str) -> Result<Vec<TextBlock>, IngestError> {
    let mut reader = Reader::from_str(xml);

    let mut blocks = Vec::new();
    let mut paragraph = ParagraphState::default();
    let mut in_text = false;
    let mut table_depth = 0usize;
    let mut cell = String::new();
    let mut row: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => paragraph = ParagraphState::default(),
                b"t" => in_text = true,
                b"tbl" => table_depth += 1,
                b"tr" => row.clear(),
                b"tc" => cell.clear(),
                b"numPr" => paragraph.list_item = true,
                b"pStyle" => paragraph.heading |= is_heading_style(&e),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => paragraph.text.push('\t'),
                b"br" | b"cr" => paragraph.text.push('\n'),
                b"numPr" => paragraph.list_item = true,
                b"pStyle" => paragraph.heading |= is_heading_style(&e),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| {
                    IngestError::CorruptDocument(format!("bad text in {DOCUMENT_PART}: {e}"))
                })?;
                paragraph.text.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let finished = std::mem::take(&mut paragraph);
                    if table_depth > 0 {
                        if !cell.is_empty() && !finished.text.trim().is_empty() {
                            cell.push(' ');
                        }
                        cell.push_str(finished.text.trim());
                    } else {
                        let kind = if finished.heading {
                            BlockKind::Heading
                        } else if finished.list_item {
                            BlockKind::ListItem
                        } else {
                            BlockKind::Paragraph
                        };
                        push_block(&mut blocks, kind, finished.text);
                    }
                }
                b"tc" => row.push(std::mem::take(&mut cell)),
                b"tr" => {
                    let cells: Vec<String> = row
                        .drain(..)
                        .filter(|c| !c.trim().is_empty())
                        .collect();
                    push_block(&mut blocks, BlockKind::TableRow, cells.join(" | "));
                }
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::CorruptDocument(format!(
                    "malformed {DOCUMENT_PART} at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(blocks)
}

fn push_block(blocks: &mut Vec<TextBlock>, kind: BlockKind, text: String) {
    let text = text.trim().to_string();
    if text.is_empty() {
        return;
    }
    let paragraph = blocks.len();
    blocks.push(TextBlock {
        index: 0,
        page: None,
        paragraph,
        kind,
        text,
    });
}

fn is_heading_style(element: &BytesStart<'_>) -> bool {
    element
        .attributes()
        .flatten()
        .filter(|a| a.key.local_name().as_ref() == b"val")
        .any(|a| {
            let value = a.value.as_ref();
            value.starts_with(b"Heading") || value == b"Title"
        })
}
