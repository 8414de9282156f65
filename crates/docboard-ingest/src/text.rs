//! Plain-text decoding, normalisation and paragraph splitting.

use crate::{BlockKind, TextBlock};

/// Decode UTF-8, falling back to lossy decoding with a warning.
pub fn decode(bytes: &[u8], warnings: &mut Vec<String>) -> String {
    let raw = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            warnings.push(
                "document contained invalid UTF-8; some characters were replaced".to_string(),
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    };
    normalize(&raw)
}

/// Best-effort text from a legacy binary Word file: keep printable runs.
pub fn decode_legacy_doc(bytes: &[u8]) -> String {
    let lossy = String::from_utf8_lossy(bytes);
    let cleaned: String = lossy
        .chars()
        .map(|c| match c {
            '\u{FFFD}' => ' ',
            '\n' | '\t' => c,
            '\r' => '\n',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    normalize(&cleaned)
}

/// Strip NUL/BOM, unify line endings, trim trailing whitespace per line.
pub fn normalize(text: &str) -> String {
    let text = text.replace('\u{0000}', "");
    let text = text.trim_start_matches('\u{FEFF}');
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Split on blank-line boundaries. Lines inside a paragraph are kept.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs
}

/// Paragraph blocks for a text (optionally tagged with a page number).
///
/// Indexes are provisional; [`crate::parse`] renumbers the final sequence.
pub(crate) fn blocks_from_text(text: &str, page: Option<usize>) -> Vec<TextBlock> {
    split_paragraphs(text)
        .into_iter()
        .enumerate()
        .map(|(paragraph, text)| TextBlock {
            index: 0,
            page,
            paragraph,
            kind: BlockKind::Paragraph,
            text,
        })
        .collect()
}

/// Split text into sentences; decimal points and abbreviations glued to the
/// next character do not split.
pub fn split_sentences(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = line.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next_idx, next)) = chars.peek() {
                if next.is_whitespace() {
                    let sentence = line[start..idx + c.len_utf8()].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    start = next_idx;
                }
            }
        }
    }

    let rest = line[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}
