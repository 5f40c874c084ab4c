//! Explicit SKU extraction: vocabulary-first, hyphen-insensitive.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::vocab::CatalogVocabulary;

static SKU_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z0-9-]{3,}").unwrap());

/// All SKU mentions in the text, canonical form, first-appearance order,
/// de-duplicated. Only vocabulary members are accepted, so arbitrary
/// uppercase runs never produce false positives.
pub fn extract_skus(text: &str, vocab: &CatalogVocabulary) -> Vec<String> {
    let upper = text.to_uppercase();
    let mut out = Vec::new();
    for cand in SKU_TOKEN.find_iter(&upper) {
        if let Some(sku) = vocab.resolve_sku(cand.as_str()) {
            if !out.iter().any(|s| s == sku) {
                out.push(sku.to_string());
            }
        }
    }
    out
}

/// First SKU mention, if any.
pub fn extract_sku(text: &str, vocab: &CatalogVocabulary) -> Option<String> {
    extract_skus(text, vocab).into_iter().next()
}

/// SKU-shaped tokens the vocabulary does not recognize, sorted and capped.
/// Diagnostic only; surfaces typos and catalog gaps in the logs.
pub fn unrecognized_sku_tokens(text: &str, vocab: &CatalogVocabulary) -> Vec<String> {
    let upper = text.to_uppercase();
    let mut out: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for cand in SKU_TOKEN.find_iter(&upper) {
        if vocab.resolve_sku(cand.as_str()).is_none() {
            out.insert(cand.as_str().to_string());
        }
    }
    out.into_iter().take(20).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn vocab() -> CatalogVocabulary {
        CatalogVocabulary::from_parts(
            vec!["ABC123".into(), "KVM-4P".into(), "XYZ200".into()],
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_extract_hyphen_insensitive_once() {
        let v = vocab();
        assert_eq!(extract_skus("does ABC-123 come in black", &v), ["ABC123"]);
        // canonical and hyphen forms de-duplicate to one mention
        assert_eq!(
            extract_skus("compare ABC123 with abc-123", &v),
            ["ABC123"]
        );
    }

    #[test]
    fn test_order_of_first_appearance() {
        let v = vocab();
        assert_eq!(
            extract_skus("is XYZ200 cheaper than ABC123", &v),
            ["XYZ200", "ABC123"]
        );
    }

    #[test]
    fn test_unknown_tokens_rejected() {
        let v = vocab();
        assert!(extract_skus("USB-C HDMI 4K60", &v).is_empty());
    }
}
