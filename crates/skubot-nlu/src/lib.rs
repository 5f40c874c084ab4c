//! Rule-based query understanding for the catalog chatbot.
//!
//! Pure, deterministic heuristics: text normalization and unit conversion,
//! the catalog vocabulary, SKU extraction, the staged filter extractor, and
//! the intent classifier. No I/O except vocabulary file loading.

pub mod extract;
pub mod intent;
pub mod normalize;
pub mod sku;
pub mod units;
pub mod vocab;

pub use extract::FilterExtractor;
pub use intent::{classify, Intent};
pub use sku::{extract_skus, unrecognized_sku_tokens};
pub use vocab::{CatalogVocabulary, VocabCache};
