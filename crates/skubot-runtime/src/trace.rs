//! Per-turn resolution tracing.
//!
//! Mirrors what an operator needs to see when a query resolves oddly: the
//! active filter, the resolved product, and the metadata fields that drive
//! matching decisions.

use skubot_core::{ConversationState, Filter};
use skubot_nlu::{unrecognized_sku_tokens, CatalogVocabulary};

/// Metadata fields worth surfacing when a product resolves.
const INTERESTING_KEYS: &[&str] = &[
    "category",
    "subcategory",
    "material",
    "material_tags",
    "fiberduplex",
    "fibertype",
    "ports",
    "displays",
    "color",
    "cablelength",
    "wireless",
    "interface",
    "mounting_options",
];

pub fn log_resolution(
    prompt: &str,
    filter: Option<&Filter>,
    state: &ConversationState,
    vocab: &CatalogVocabulary,
) {
    tracing::debug!(
        ?filter,
        prompt,
        sku = state.last_sku.as_deref().unwrap_or(""),
        score = state.last_score,
        "turn resolved"
    );

    let unknown = unrecognized_sku_tokens(prompt, vocab);
    if !unknown.is_empty() {
        tracing::debug!(tokens = ?unknown, "unrecognized sku-shaped tokens in prompt");
    }

    if let Some(md) = &state.last_metadata {
        for key in INTERESTING_KEYS {
            if let Some(value) = md.get(*key) {
                tracing::debug!(key = *key, %value, "resolved metadata");
            }
        }
    }
}
