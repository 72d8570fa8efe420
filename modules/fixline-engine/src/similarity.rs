//! Text similarity between complaint descriptions.
//!
//! Sørensen–Dice overlap over the union of word unigrams and adjacent-word
//! bigrams, computed on normalized text (lowercase, punctuation stripped,
//! whitespace collapsed, street suffixes expanded). Bigrams reward shared
//! phrasing ("main street") beyond bag-of-words overlap; unigrams keep
//! single-word reports comparable.

use std::collections::HashSet;

/// Normalize a description for comparison: lowercase, strip anything that is
/// not alphanumeric or whitespace, collapse whitespace runs, expand street
/// suffix abbreviations so "Main St" and "Main Street" tokenize identically.
pub fn normalize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(|token| canonical_token(token).to_string())
        .collect()
}

/// Common street-suffix abbreviations, expanded to their full word.
fn canonical_token(token: &str) -> &str {
    match token {
        "st" => "street",
        "ave" => "avenue",
        "rd" => "road",
        "blvd" => "boulevard",
        "dr" => "drive",
        "ln" => "lane",
        "hwy" => "highway",
        "pkwy" => "parkway",
        _ => token,
    }
}

/// Similarity score in [0, 1]. Symmetric; 1.0 for identical non-empty text;
/// 0.0 when either side normalizes to nothing.
pub fn similarity(a: &str, b: &str) -> f64 {
    let tokens_a = normalize(a);
    let tokens_b = normalize(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let set_a = shingle_set(&tokens_a);
    let set_b = shingle_set(&tokens_b);

    let shared = set_a.intersection(&set_b).count();
    let total = set_a.len() + set_b.len();
    if total == 0 {
        return 0.0;
    }
    2.0 * shared as f64 / total as f64
}

/// Unigrams plus adjacent-word bigrams as one shingle set.
fn shingle_set(tokens: &[String]) -> HashSet<String> {
    let mut set: HashSet<String> = tokens.iter().cloned().collect();
    for pair in tokens.windows(2) {
        set.insert(format!("{} {}", pair[0], pair[1]));
    }
    set
}
