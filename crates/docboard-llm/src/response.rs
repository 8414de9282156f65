//! Parsing model output into insight statements.
//!
//! Models wrap JSON in prose or code fences, rename keys, or fall back to a
//! numbered list. Anything that yields at least one statement is accepted;
//! entries that cannot be read are counted, not silently dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const LIST_KEYS: [&str; 5] = ["insights", "items", "statements", "key_insights", "findings"];
const STATEMENT_KEYS: [&str; 4] = ["statement", "text", "insight", "summary"];
const CATEGORY_KEYS: [&str; 3] = ["category", "type", "tag"];
const EMPHASIS_KEYS: [&str; 3] = ["emphasis", "emphases", "highlights"];

static LIST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+(?P<statement>\S.*)$").expect("valid regex")
});

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid regex"));

/// One statement as the model wrote it; references are still unresolved names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawInsight {
    pub statement: String,
    pub category: Option<String>,
    pub confidence: Option<f32>,
    pub section: Option<String>,
    pub series: Option<String>,
}

impl RawInsight {
    fn plain(statement: &str) -> Self {
        Self {
            statement: statement.trim().to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedResponse {
    pub items: Vec<RawInsight>,
    pub emphases: Vec<String>,
    /// Entries present in the response that could not be read as statements.
    pub rejected: usize,
}

/// Parse a completion. `Err` carries the reason when nothing usable was found.
pub fn parse_response(text: &str) -> Result<ParsedResponse, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("empty response".to_string());
    }

    let mut saw_json = false;
    for candidate in json_candidates(trimmed) {
        let Ok(value) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        saw_json = true;
        if let Some(parsed) = interpret(&value) {
            if parsed.items.is_empty() {
                return Err(format!(
                    "response contained no readable insight statements ({} rejected)",
                    parsed.rejected
                ));
            }
            return Ok(parsed);
        }
    }

    let items: Vec<RawInsight> = trimmed
        .lines()
        .filter_map(|line| LIST_LINE.captures(line))
        .map(|c| RawInsight::plain(&c["statement"]))
        .filter(|item| !item.statement.is_empty())
        .collect();
    if !items.is_empty() {
        return Ok(ParsedResponse {
            items,
            ..Default::default()
        });
    }

    if saw_json {
        Err("JSON response does not contain an insight list".to_string())
    } else {
        Err("response is neither JSON nor a list of statements".to_string())
    }
}

/// Whole text, fenced blocks, then the first balanced JSON value.
fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = vec![text];
    candidates.extend(
        CODE_FENCE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim()),
    );
    if let Some(balanced) = balanced_json(text) {
        candidates.push(balanced);
    }
    candidates
}

/// Slice from the first `{` or `[` to its matching close bracket.
fn balanced_json(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c == '{' || c == '[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn interpret(value: &Value) -> Option<ParsedResponse> {
    match value {
        Value::Array(entries) => Some(read_entries(entries, Vec::new())),
        Value::Object(map) => {
            let emphases = EMPHASIS_KEYS
                .iter()
                .find_map(|k| map.get(*k))
                .map(read_emphases)
                .unwrap_or_default();
            if let Some(entries) = LIST_KEYS.iter().find_map(|k| map.get(*k)?.as_array()) {
                return Some(read_entries(entries, emphases));
            }
            read_item(value).map(|item| ParsedResponse {
                items: vec![item],
                emphases,
                rejected: 0,
            })
        }
        _ => None,
    }
}

fn read_entries(entries: &[Value], emphases: Vec<String>) -> ParsedResponse {
    let mut parsed = ParsedResponse {
        emphases,
        ..Default::default()
    };
    for entry in entries {
        match read_item(entry) {
            Some(item) => parsed.items.push(item),
            None => parsed.rejected += 1,
        }
    }
    parsed
}

fn read_item(value: &Value) -> Option<RawInsight> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(RawInsight::plain(s)),
        Value::Object(map) => {
            let statement = STATEMENT_KEYS
                .iter()
                .find_map(|k| map.get(*k)?.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())?;
            let text = |key: &str| -> Option<String> {
                match map.get(key)? {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }
            };
            let confidence = match map.get("confidence") {
                Some(Value::Number(n)) => n.as_f64().map(|f| f as f32),
                Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f32>().ok(),
                _ => None,
            };
            Some(RawInsight {
                statement: statement.to_string(),
                category: CATEGORY_KEYS.iter().find_map(|k| text(k)),
                confidence,
                section: text("section"),
                series: text("series"),
            })
        }
        _ => None,
    }
}

fn read_emphases(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.trim().to_string()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json_object() {
        let parsed = parse_response(
            r#"{"insights":[{"statement":"Revenue rose.","category":"trend","confidence":0.8,"series":"revenue"}],"emphasis":["growth"]}"#,
        )
        .unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].category.as_deref(), Some("trend"));
        assert_eq!(parsed.items[0].confidence, Some(0.8));
        assert_eq!(parsed.items[0].series.as_deref(), Some("revenue"));
        assert_eq!(parsed.emphases, vec!["growth".to_string()]);
    }

    #[test]
    fn test_json_wrapped_in_prose_and_fences() {
        let text = "Sure! Here you go:\n```json\n{\"insights\": [\"A.\", \"B.\"]}\n```\nHope that helps.";
        assert_eq!(parse_response(text).unwrap().items.len(), 2);

        let text = "Result: {\"items\": [{\"text\": \"Braces } in strings are fine.\"}]} trailing";
        let parsed = parse_response(text).unwrap();
        assert_eq!(parsed.items[0].statement, "Braces } in strings are fine.");
    }

    #[test]
    fn test_partial_parse_keeps_readable_subset() {
        let parsed =
            parse_response(r#"[{"statement":"Kept."}, 42, {"note":"no statement"}, "Also kept."]"#)
                .unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.rejected, 2);
    }

    #[test]
    fn test_numbered_list_fallback() {
        let parsed = parse_response("Insights:\n1. Sales doubled.\n2) Costs fell.\n- Churn held.").unwrap();
        let statements: Vec<&str> = parsed.items.iter().map(|i| i.statement.as_str()).collect();
        assert_eq!(statements, vec!["Sales doubled.", "Costs fell.", "Churn held."]);
    }

    #[test]
    fn test_unparseable_responses() {
        assert!(parse_response("   ").is_err());
        assert!(parse_response("I cannot help with that.").is_err());
        assert!(parse_response(r#"{"insights": [1, 2, 3]}"#).is_err());
        assert!(parse_response(r#"{"answer": 42}"#).is_err());
    }

    #[test]
    fn test_balanced_json_handles_multibyte_prefix() {
        assert_eq!(balanced_json("é → {\"a\": [1]} x"), Some("{\"a\": [1]}"));
    }
}
