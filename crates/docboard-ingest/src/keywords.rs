//! Keyword frequencies for word-cloud style widgets.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default number of keywords kept on a dashboard.
pub const DEFAULT_KEYWORD_LIMIT: usize = 30;

const MIN_WORD_CHARS: usize = 3;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "among", "and", "any", "are",
    "because", "been", "before", "being", "below", "between", "both", "but", "can", "could",
    "did", "does", "doing", "down", "during", "each", "either", "etc", "few", "for", "from",
    "further", "had", "has", "have", "having", "her", "here", "hers", "him", "his", "how",
    "however", "into", "its", "itself", "just", "may", "more", "most", "much", "must", "nor",
    "not", "now", "off", "once", "one", "only", "other", "our", "ours", "out", "over", "own",
    "per", "same", "shall", "she", "should", "such", "than", "that", "the", "their", "theirs",
    "them", "then", "there", "these", "they", "this", "those", "through", "thus", "too",
    "under", "until", "upon", "very", "via", "was", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "within", "without", "would", "yet", "you",
    "your", "yours",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub word: String,
    pub count: usize,
}

/// Top `limit` content words, most frequent first, ties alphabetical.
pub fn keyword_frequencies(text: &str, limit: usize) -> Vec<KeywordCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for raw in text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-')) {
        let word = raw.trim_matches(|c| c == '\'' || c == '-').to_lowercase();
        let word = word.strip_suffix("'s").unwrap_or(&word);
        if word.chars().count() < MIN_WORD_CHARS
            || !word.chars().any(char::is_alphabetic)
            || STOPWORDS.contains(&word)
        {
            continue;
        }
        *counts.entry(word.to_string()).or_default() += 1;
    }

    let mut keywords: Vec<KeywordCount> = counts
        .into_iter()
        .map(|(word, count)| KeywordCount { word, count })
        .collect();
    keywords.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    keywords.truncate(limit);
    keywords
}
