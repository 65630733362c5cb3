//! Query tokenizer: bounded keyword extraction and the lexical OR query.
//!
//! Pure functions with no error path. Malformed or empty input simply
//! yields no keywords, and no keywords yields an empty lexical query.

/// Maximum number of keywords kept from a query.
pub const MAX_KEYWORDS: usize = 10;

/// Characters stripped from both ends of every whitespace token.
const SURROUNDING_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '"', '\'', '-',
];

/// Pronouns, articles, auxiliary verbs and question words.
pub const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with", "this", "but", "they", "have",
    "had", "what", "when", "where", "who", "which", "why", "how", "can", "could", "would",
    "should", "may", "might", "must", "shall", "am", "i", "my",
];

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Extract up to [`MAX_KEYWORDS`] keywords from a free-text query.
///
/// Lowercases, splits on whitespace, trims surrounding punctuation, then
/// drops tokens of two characters or fewer and stopwords. Input order is
/// preserved and duplicates are kept.
pub fn extract_keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|word| word.trim_matches(SURROUNDING_PUNCTUATION))
        .filter(|word| word.chars().count() > 2 && !is_stopword(word))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// OR-join keywords into an FTS5 match expression.
///
/// Each keyword becomes a quoted string so FTS5 operators inside user text
/// (`*`, `^`, `NEAR`, column filters) are never interpreted. Embedded
/// double quotes are escaped by doubling. Returns an empty string for an
/// empty keyword list.
pub fn build_lexical_query(keywords: &[String]) -> String {
    keywords
        .iter()
        .map(|k| format!("\"{}\"", k.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
