//! Index boundary types and traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use skubot_core::{Filter, Result};

/// A record as stored in the index: the SKU identifies it, the text is the
/// rendered specification body, the metadata backs filtered search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub sku: String,
    pub text: String,
    pub metadata: serde_json::Map<String, Value>,
}

/// One search result with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordHit {
    pub sku: String,
    pub text: String,
    pub metadata: serde_json::Map<String, Value>,
    pub score: f64,
}

/// Turns text into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Nearest-neighbor search with optional metadata filtering, plus the
/// upsert path used by ingestion.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<RecordHit>>;

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()>;
}
