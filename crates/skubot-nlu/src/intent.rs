//! Per-turn intent classification.
//!
//! An ordered rule list, each rule a pure predicate over the prompt's
//! precomputed signals plus the conversation context. The first matching
//! rule decides the turn; precedence is the order of [`RULES`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::{
    detect_anchor, has_comparator, has_number_unit, has_number_word, has_pack_pattern, Anchor,
};
use crate::normalize::{lemmatize, normalize};
use crate::sku::extract_skus;
use crate::vocab::CatalogVocabulary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Installation/troubleshooting request; deflected without retrieval.
    InstallDeflection,
    /// Session-opening greeting.
    Greeting,
    /// Farewell; ends the exchange politely.
    Farewell,
    /// Prompt names one or more known SKUs.
    ExplicitProduct(Vec<String>),
    /// Short or ambiguous continuation of the previous product.
    FollowUp,
    /// New descriptive product search.
    Search,
}

/// Conversation facts the classifier needs from the session.
#[derive(Debug, Default)]
pub struct TurnContext {
    pub has_prior_product: bool,
    pub greeted: bool,
}

const GREETING_KEYWORDS: &[&str] =
    &["hello", "hi", "hey", "good morning", "good afternoon", "good evening"];

const FAREWELL_KEYWORDS: &[&str] = &[
    "thank you",
    "thanks",
    "appreciate it",
    "cheers",
    "bye",
    "goodbye",
    "see you",
    "youve been helpful",
    "you have been helpful",
    "thats all",
    "that is all",
    "cool",
];

const INSTALL_KEYWORDS: &[&str] = &[
    "install",
    "installation",
    "set up",
    "setup",
    "configure",
    "configuration",
    "how do i connect",
    "wiring",
    "mount it",
    "mounting steps",
    "pair",
    "pairing",
    "firmware",
    "driver install",
    "troubleshoot",
    "troubleshooting",
    "fix",
    "repair",
    "update firmware",
    "how to use",
    "step by step",
    "steps",
];

/// Clarification phrasings that mark a turn as asking about the current
/// product rather than starting over.
const FALLBACK_KEYWORDS: &[&str] = &[
    "what color",
    "what colours",
    "what colour",
    "what type",
    "what kind",
    "how big",
    "how small",
    "how long",
    "how wide",
    "how tall",
    "how thick",
    "how heavy",
    "how many",
    "how much",
    "what size",
    "what sizes",
    "does it",
    "is it",
    "is it compatible",
    "are they",
    "specs",
    "details",
    "specifications",
    "tech specs",
    "technical details",
    "what ports",
    "which ports",
    "what connectors",
    "which connectors",
    "what inputs",
    "what outputs",
    "how fast",
    "what speed",
    "what resolution",
    "is this compatible",
    "is this supported",
    "will this work",
    "tell me more",
    "can i use this",
    "can it",
    "is there",
    "do they",
    "whats included",
    "what is included",
    "what do you get",
    "included accessories",
    "in the box",
    "whats in the box",
    "what comes with",
    "do i need",
    "will it help",
    "does it require",
    "will it fit",
    "will it keep",
    "what version",
    "any differences",
    "any difference",
    "difference between",
];

/// Phrases that pivot away from the current product.
const PIVOT_PHRASES: &[&str] = &[
    "another",
    "different",
    "similar",
    "do you have",
    "do you sell",
    "alternative",
    "alternatives",
    "other options",
    "something else",
    "instead",
];

/// Product-domain nouns that signal a fresh search when combined with a
/// concrete spec (number, color, material, wireless).
const DOMAIN_TOKENS: &[&str] = &[
    "adapter", "hdmi", "dock", "docking", "enclosure", "kvm", "switch", "cable", "hub", "pack",
    "bundle",
];

static DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());

/// Precomputed per-prompt facts the rules consume.
pub struct Signals {
    raw_word_count: usize,
    lower: String,
    norm: String,
    skus: Vec<String>,
    anchor: Option<&'static Anchor>,
    numeric_signal: bool,
    domain_token: bool,
    color_value: bool,
    material_value: bool,
    wireless_mention: bool,
    fallback_keyword: bool,
}

impl Signals {
    pub fn gather(prompt: &str, vocab: &CatalogVocabulary) -> Self {
        let lower = prompt.to_lowercase();
        let norm = normalize(prompt);
        let words: Vec<String> = norm.split_whitespace().map(lemmatize).collect();
        let contains_value = |field: &str| {
            vocab
                .values_for(field)
                .iter()
                .map(|v| normalize(v))
                .any(|v| !v.is_empty() && norm.contains(&v))
        };
        Signals {
            raw_word_count: prompt.split_whitespace().count(),
            skus: extract_skus(prompt, vocab),
            anchor: detect_anchor(&norm),
            numeric_signal: DIGIT_RE.is_match(&lower)
                || has_number_unit(&lower)
                || has_comparator(&lower)
                || has_number_word(&norm)
                || has_pack_pattern(&norm),
            domain_token: words.iter().any(|w| DOMAIN_TOKENS.contains(&w.as_str())),
            color_value: contains_value("color"),
            material_value: contains_value("material"),
            wireless_mention: ["wireless", "wifi", "wi fi"].iter().any(|t| norm.contains(t)),
            fallback_keyword: FALLBACK_KEYWORDS.iter().any(|k| norm.contains(k)),
            lower,
            norm,
        }
    }

    fn whole_word(&self, phrase: &str) -> bool {
        Regex::new(&format!(r"\b{}\b", regex::escape(phrase)))
            .map(|re| re.is_match(&self.lower))
            .unwrap_or(false)
    }

    /// Pivot phrase, or a domain noun tied to a concrete spec.
    fn looks_like_new_query(&self) -> bool {
        if PIVOT_PHRASES.iter().any(|p| self.norm.contains(p)) {
            return true;
        }
        self.domain_token
            && (self.numeric_signal
                || self.color_value
                || self.material_value
                || self.wireless_mention)
    }
}

type RuleFn = fn(&Signals, &TurnContext) -> Option<Intent>;

fn rule_install(s: &Signals, _: &TurnContext) -> Option<Intent> {
    INSTALL_KEYWORDS
        .iter()
        .any(|k| s.norm.contains(k))
        .then_some(Intent::InstallDeflection)
}

fn rule_greeting(s: &Signals, ctx: &TurnContext) -> Option<Intent> {
    if ctx.greeted || s.raw_word_count > 4 {
        return None;
    }
    GREETING_KEYWORDS
        .iter()
        .any(|g| s.whole_word(g))
        .then_some(Intent::Greeting)
}

fn rule_farewell(s: &Signals, _: &TurnContext) -> Option<Intent> {
    FAREWELL_KEYWORDS
        .iter()
        .any(|k| s.norm.contains(k))
        .then_some(Intent::Farewell)
}

fn rule_explicit_product(s: &Signals, _: &TurnContext) -> Option<Intent> {
    (!s.skus.is_empty()).then(|| Intent::ExplicitProduct(s.skus.clone()))
}

fn rule_follow_up(s: &Signals, ctx: &TurnContext) -> Option<Intent> {
    if ctx.has_prior_product {
        // Continuing the prior product, unless the prompt pivots to a new
        // one or re-anchors on a category.
        if s.anchor.is_some() || s.looks_like_new_query() {
            return None;
        }
        return Some(Intent::FollowUp);
    }
    // Nothing to follow up on: concrete specs mean a fresh search.
    if s.numeric_signal || s.domain_token {
        return None;
    }
    (s.norm.split_whitespace().count() <= 6 || s.fallback_keyword).then_some(Intent::FollowUp)
}

/// Precedence-ordered classification rules.
const RULES: &[(&str, RuleFn)] = &[
    ("install_deflection", rule_install),
    ("greeting", rule_greeting),
    ("farewell", rule_farewell),
    ("explicit_product", rule_explicit_product),
    ("follow_up", rule_follow_up),
];

/// Classify one turn. Falls through to [`Intent::Search`] when no rule
/// matches.
pub fn classify(prompt: &str, vocab: &CatalogVocabulary, ctx: &TurnContext) -> Intent {
    let signals = Signals::gather(prompt, vocab);
    for (name, rule) in RULES {
        if let Some(intent) = rule(&signals, ctx) {
            tracing::debug!(rule = name, ?intent, "intent classified");
            return intent;
        }
    }
    tracing::debug!("intent classified as descriptive search");
    Intent::Search
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn vocab() -> CatalogVocabulary {
        let mut values = BTreeMap::new();
        values.insert("color".to_string(), vec!["black".to_string()]);
        values.insert("material".to_string(), vec!["steel".to_string()]);
        CatalogVocabulary::from_parts(vec!["ABC100".to_string()], values)
    }

    fn ctx(prior: bool, greeted: bool) -> TurnContext {
        TurnContext {
            has_prior_product: prior,
            greeted,
        }
    }

    #[test]
    fn test_greeting_fires_once() {
        let v = vocab();
        assert_eq!(classify("hi", &v, &ctx(false, false)), Intent::Greeting);
        // greeted flag suppresses a second greeting
        assert_ne!(classify("hi", &v, &ctx(false, true)), Intent::Greeting);
    }

    #[test]
    fn test_greeting_requires_short_message() {
        let v = vocab();
        let long = "hi i am looking for a new docking station today";
        assert_ne!(classify(long, &v, &ctx(false, false)), Intent::Greeting);
    }

    #[test]
    fn test_install_beats_explicit_sku() {
        let v = vocab();
        assert_eq!(
            classify("how do I install ABC100", &v, &ctx(false, false)),
            Intent::InstallDeflection
        );
    }

    #[test]
    fn test_explicit_sku_beats_follow_up() {
        let v = vocab();
        assert_eq!(
            classify("does abc-100 come in black", &v, &ctx(true, true)),
            Intent::ExplicitProduct(vec!["ABC100".to_string()])
        );
    }

    #[test]
    fn test_farewell() {
        let v = vocab();
        assert_eq!(
            classify("thanks, that is all", &v, &ctx(true, true)),
            Intent::Farewell
        );
    }

    #[test]
    fn test_short_question_with_prior_product_is_follow_up() {
        let v = vocab();
        assert_eq!(
            classify("what color is it", &v, &ctx(true, true)),
            Intent::FollowUp
        );
    }

    #[test]
    fn test_anchor_overrides_follow_up() {
        let v = vocab();
        // prior product was something else; a fresh anchor restarts search
        assert_eq!(
            classify("what about a rack enclosure", &v, &ctx(true, true)),
            Intent::Search
        );
    }

    #[test]
    fn test_pivot_phrase_is_new_search() {
        let v = vocab();
        assert_eq!(
            classify("do you have a black cable", &v, &ctx(true, true)),
            Intent::Search
        );
    }

    #[test]
    fn test_no_prior_product_concrete_specs_search() {
        let v = vocab();
        assert_eq!(
            classify("a 6ft hdmi cable", &v, &ctx(false, true)),
            Intent::Search
        );
    }

    #[test]
    fn test_no_prior_product_short_vague_is_follow_up() {
        let v = vocab();
        assert_eq!(
            classify("what color is it", &v, &ctx(false, true)),
            Intent::FollowUp
        );
    }
}
