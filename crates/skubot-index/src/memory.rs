//! In-memory index: exact filter evaluation plus token-overlap scoring.
//!
//! Deterministic stand-in for the hosted index, used as the retrieval
//! oracle in tests.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;

use skubot_core::{Filter, Result};

use crate::types::{IndexRecord, RecordHit, VectorIndex};

#[derive(Default)]
pub struct MemoryIndex {
    records: RwLock<Vec<IndexRecord>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<IndexRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn tokens(s: &str) -> HashSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Share of query tokens present in the record text.
fn overlap_score(query: &HashSet<String>, text: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let text_tokens = tokens(text);
    query.intersection(&text_tokens).count() as f64 / query.len() as f64
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<RecordHit>> {
        let query_tokens = tokens(query);
        let mut hits: Vec<RecordHit> = self
            .records
            .read()
            .iter()
            .filter(|r| filter.map_or(true, |f| f.satisfies(&r.metadata)))
            .map(|r| RecordHit {
                sku: r.sku.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                score: overlap_score(&query_tokens, &r.text),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.sku.cmp(&b.sku))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()> {
        let mut store = self.records.write();
        for rec in records {
            if let Some(existing) = store.iter_mut().find(|r| r.sku == rec.sku) {
                *existing = rec;
            } else {
                store.push(rec);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skubot_core::{Constraint, FilterValue};

    fn record(sku: &str, text: &str, metadata: serde_json::Value) -> IndexRecord {
        IndexRecord {
            sku: sku.to_string(),
            text: text.to_string(),
            metadata: serde_json::from_value(metadata).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_filtered_search() {
        let idx = MemoryIndex::new();
        idx.upsert(vec![
            record("ABC100", "SKU: ABC100\nCategory: docking station", json!({"category": "docking station"})),
            record("XYZ200", "SKU: XYZ200\nCategory: cable", json!({"category": "cable", "cablelength": 1000.0})),
        ])
        .await
        .unwrap();

        let mut f = Filter::new();
        f.insert("category", Constraint::Eq(FilterValue::Text("cable".into())));
        let hits = idx.search("product spec", 10, Some(&f)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sku, "XYZ200");
    }

    #[tokio::test]
    async fn test_semantic_ranking_by_overlap() {
        let idx = MemoryIndex::new();
        idx.upsert(vec![
            record("AAA111", "usb hub with four ports", json!({})),
            record("BBB222", "hdmi cable six feet", json!({})),
        ])
        .await
        .unwrap();

        let hits = idx.search("hdmi cable", 10, None).await.unwrap();
        assert_eq!(hits[0].sku, "BBB222");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_sku() {
        let idx = MemoryIndex::new();
        idx.upsert(vec![record("AAA111", "old", json!({}))]).await.unwrap();
        idx.upsert(vec![record("AAA111", "new", json!({}))]).await.unwrap();
        assert_eq!(idx.len(), 1);
        let hits = idx.search("new", 1, None).await.unwrap();
        assert_eq!(hits[0].text, "new");
    }
}
