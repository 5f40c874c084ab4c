//! Lexical normalization: case/punctuation folding, plural stripping,
//! number words, and the token utilities behind the fuzzy matcher.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Words ignored by token-set matching.
pub static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "do", "does", "did", "you", "your", "yours", "have", "has", "had",
        "any", "that", "this", "these", "those", "can", "could", "may", "might", "will",
        "would", "shall", "should", "more", "most", "then", "than", "of", "for", "to", "in",
        "on", "with", "without", "and", "or", "but", "if", "it", "its", "is", "are", "was",
        "were", "be", "being", "been", "at", "by", "about", "from", "as", "up", "over",
        "under", "between",
    ]
    .into_iter()
    .collect()
});

fn is_punct(c: char) -> bool {
    c.is_ascii_punctuation() || matches!(c, '\u{2018}' | '\u{2019}' | '\u{201c}' | '\u{201d}')
}

/// Lowercase, strip punctuation, collapse whitespace. Idempotent.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !is_punct(*c))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip plural suffixes with a small rule table. Approximate on purpose:
/// irregular plurals are not handled, words ending "ss" keep their "s".
pub fn lemmatize(token: &str) -> String {
    let tok = token.to_lowercase();
    if tok.len() > 4 {
        if let Some(stem) = tok.strip_suffix("ies") {
            return format!("{stem}y");
        }
    }
    if tok.len() > 3 {
        if let Some(stem) = tok.strip_suffix("es") {
            return stem.to_string();
        }
        if !tok.ends_with("ss") {
            if let Some(stem) = tok.strip_suffix('s') {
                return stem.to_string();
            }
        }
    }
    tok
}

/// Map a number word "zero".."twelve" to its value.
pub fn words_to_number(word: &str) -> Option<u32> {
    let n = match word {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        _ => return None,
    };
    Some(n)
}

/// Lemmatized, stopword-filtered token set of a normalized string.
pub fn token_set(s: &str) -> HashSet<String> {
    normalize(s)
        .split_whitespace()
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(*w))
        .map(lemmatize)
        .collect()
}

/// Candidate phrases for fuzzy matching: 2..4-grams over stopword-filtered
/// words, plus single words of length >= 4.
pub fn meaningful_ngrams(prompt_norm: &str) -> Vec<String> {
    let words: Vec<&str> = prompt_norm
        .split_whitespace()
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(*w))
        .collect();
    let mut grams = Vec::new();
    for n in 2..=4.min(words.len()) {
        for window in words.windows(n) {
            grams.push(window.join(" "));
        }
    }
    grams.extend(words.iter().filter(|w| w.len() >= 4).map(|w| w.to_string()));
    grams
}

/// Character-level similarity in [0, 1]: twice the total length of the
/// recursively matched common blocks over the combined length.
pub fn char_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let matched = matching_chars(&a, &b);
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (ai, bi, size) = longest_match(a, b);
    if size == 0 {
        return 0;
    }
    size + matching_chars(&a[..ai], &b[..bi]) + matching_chars(&a[ai + size..], &b[bi + size..])
}

fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // lengths here are short category values, quadratic is fine
    let mut prev = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        let mut cur = vec![0usize; b.len() + 1];
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                let run = prev[j] + 1;
                cur[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            }
        }
        prev = cur;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_idempotent() {
        let once = normalize("  Do you HAVE any USB-C cables?! ");
        assert_eq!(once, "do you have any usbc cables");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_normalize_strips_curly_quotes() {
        assert_eq!(normalize("what’s included"), "whats included");
    }

    #[test]
    fn test_lemmatize_rules() {
        assert_eq!(lemmatize("categories"), "category");
        assert_eq!(lemmatize("cables"), "cabl");
        assert_eq!(lemmatize("ports"), "port");
        assert_eq!(lemmatize("glass"), "glass");
        assert_eq!(lemmatize("bus"), "bus");
    }

    #[test]
    fn test_words_to_number() {
        assert_eq!(words_to_number("two"), Some(2));
        assert_eq!(words_to_number("twelve"), Some(12));
        assert_eq!(words_to_number("thirteen"), None);
    }

    #[test]
    fn test_token_set_filters_stopwords() {
        let set = token_set("do you have any docking stations");
        assert!(set.contains("docking"));
        assert!(set.contains("station"));
        assert!(!set.contains("any"));
    }

    #[test]
    fn test_meaningful_ngrams() {
        let grams = meaningful_ngrams("usb hub with four ports");
        assert!(grams.contains(&"usb hub".to_string()));
        assert!(grams.contains(&"usb hub four".to_string()));
        assert!(grams.contains(&"ports".to_string()));
        assert!(!grams.contains(&"with".to_string()));
    }

    #[test]
    fn test_char_similarity() {
        assert_eq!(char_similarity("cable", "cable"), 1.0);
        assert!(char_similarity("docking station", "docking stations") > 0.9);
        assert!(char_similarity("cable", "rack") < 0.5);
    }
}
