//! Tiered candidate retrieval.
//!
//! A descriptive-search turn walks three tiers: metadata-filtered search,
//! a modal-category reroute when the filter finds nothing, and finally
//! scored semantic search with a client-side numeric re-check. A remote
//! failure in any tier counts as an empty result set and the walk
//! continues, so one flaky call never aborts the turn.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use skubot_core::{Constraint, Filter, FilterValue};
use skubot_index::{RecordHit, VectorIndex};

/// Fixed query for filter-only searches; the filter does the selection.
const FILTERED_QUERY: &str = "product spec";
const FILTERED_K: usize = 50;
const REROUTE_K: usize = 30;
const SEMANTIC_K: usize = 12;
/// Semantic hits below this relevance are discarded.
const SCORE_FLOOR: f64 = 0.35;

/// Terminal state of one retrieval walk.
#[derive(Debug, Clone)]
pub enum RetrievalOutcome {
    /// A candidate was resolved; score is 1.0 for exact filter matches.
    Found(RecordHit),
    /// Results existed but none met the numeric requirements. Definitive.
    NoMatch,
    /// Nothing relevant came back at all.
    NoResults,
}

pub struct RetrievalOrchestrator {
    index: Arc<dyn VectorIndex>,
}

impl RetrievalOrchestrator {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Errors degrade to an empty tier rather than propagating.
    async fn search_lenient(
        &self,
        query: &str,
        k: usize,
        filter: Option<&Filter>,
    ) -> Vec<RecordHit> {
        match self.index.search(query, k, filter).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, filtered = filter.is_some(), "search failed, treating as empty");
                Vec::new()
            }
        }
    }

    pub async fn resolve(&self, prompt: &str, filter: Option<&Filter>) -> RetrievalOutcome {
        // Tier 1: exact filtered search.
        if let Some(f) = filter {
            let hits = self
                .search_lenient(FILTERED_QUERY, FILTERED_K, Some(f))
                .await;
            if let Some(top) = hits.into_iter().next() {
                tracing::debug!(sku = %top.sku, "resolved via filtered search");
                return RetrievalOutcome::Found(RecordHit { score: 1.0, ..top });
            }

            // Tier 2: reroute the filter to the modal category of an
            // unfiltered semantic pass.
            if let Some(rerouted) = self.reroute_filter(prompt, f).await {
                let hits = self
                    .search_lenient(FILTERED_QUERY, FILTERED_K, Some(&rerouted))
                    .await;
                if let Some(top) = hits.into_iter().next() {
                    tracing::debug!(sku = %top.sku, "resolved via category reroute");
                    return RetrievalOutcome::Found(RecordHit { score: 1.0, ..top });
                }
            }
        }

        // Tier 3: scored semantic search.
        let hits = self.search_lenient(prompt, SEMANTIC_K, None).await;
        let survivors: Vec<RecordHit> =
            hits.into_iter().filter(|h| h.score >= SCORE_FLOOR).collect();
        if survivors.is_empty() {
            return RetrievalOutcome::NoResults;
        }

        match filter {
            // The structured filter failed upstream; accept a semantic hit
            // only if it still meets the numeric requirements.
            Some(f) => {
                for hit in survivors {
                    if f.satisfies_numeric(&hit.metadata) {
                        tracing::debug!(sku = %hit.sku, score = hit.score, "resolved via semantic search");
                        return RetrievalOutcome::Found(hit);
                    }
                }
                RetrievalOutcome::NoMatch
            }
            None => {
                let top = survivors.into_iter().next();
                match top {
                    Some(hit) => {
                        tracing::debug!(sku = %hit.sku, score = hit.score, "resolved via semantic search");
                        RetrievalOutcome::Found(hit)
                    }
                    None => RetrievalOutcome::NoResults,
                }
            }
        }
    }

    /// Replace the failed filter's category with the most frequent category
    /// among unfiltered hits (ties broken lexically) and drop the
    /// subcategory constraint.
    async fn reroute_filter(&self, prompt: &str, original: &Filter) -> Option<Filter> {
        let hits = self.search_lenient(prompt, REROUTE_K, None).await;
        let mut tally: BTreeMap<String, usize> = BTreeMap::new();
        for hit in &hits {
            if let Some(Value::String(cat)) = hit.metadata.get("category") {
                *tally.entry(cat.clone()).or_default() += 1;
            }
        }
        // BTreeMap iterates in key order, so the first maximum is the
        // lexically smallest.
        let modal = tally
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(cat, _)| cat.clone())?;
        tracing::debug!(category = %modal, "rerouting to modal category");

        let mut rerouted = original.clone();
        rerouted.remove("subcategory");
        rerouted.insert("category", Constraint::Eq(FilterValue::Text(modal)));
        Some(rerouted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skubot_core::NumericRange;
    use skubot_index::{IndexRecord, MemoryIndex};

    fn record(sku: &str, text: &str, metadata: serde_json::Value) -> IndexRecord {
        IndexRecord {
            sku: sku.to_string(),
            text: text.to_string(),
            metadata: serde_json::from_value(metadata).unwrap(),
        }
    }

    fn orchestrator(records: Vec<IndexRecord>) -> RetrievalOrchestrator {
        RetrievalOrchestrator::new(Arc::new(MemoryIndex::with_records(records)))
    }

    #[tokio::test]
    async fn test_filtered_hit_scores_one() {
        let orch = orchestrator(vec![
            record("CAB100", "hdmi cable", json!({"category": "cable"})),
            record("DOCK10", "docking station", json!({"category": "docking station"})),
        ]);
        let mut f = Filter::new();
        f.insert("category", Constraint::Eq(FilterValue::Text("cable".into())));

        match orch.resolve("anything", Some(&f)).await {
            RetrievalOutcome::Found(hit) => {
                assert_eq!(hit.sku, "CAB100");
                assert_eq!(hit.score, 1.0);
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reroute_to_modal_category() {
        let orch = orchestrator(vec![
            record(
                "DOCK10",
                "usb c docking station for laptops",
                json!({"category": "docking station"}),
            ),
            record(
                "DOCK20",
                "4k docking station dual monitor",
                json!({"category": "docking station"}),
            ),
            record("CAB100", "hdmi cable", json!({"category": "cable"})),
        ]);
        // extractor guessed a category value that does not exist verbatim
        let mut f = Filter::new();
        f.insert("category", Constraint::Eq(FilterValue::Text("dock".into())));

        match orch.resolve("docking station for laptops", Some(&f)).await {
            RetrievalOutcome::Found(hit) => {
                assert_eq!(hit.score, 1.0);
                assert!(hit.sku.starts_with("DOCK"));
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_numeric_recheck_rejects_all() {
        let orch = orchestrator(vec![record(
            "CAB300",
            "hdmi cable ten feet long",
            json!({"category": "cable", "cablelength": 3048.0}),
        )]);
        let mut f = Filter::new();
        f.insert("category", Constraint::Eq(FilterValue::Text("fiber".into())));
        f.insert(
            "cablelength",
            Constraint::Range(NumericRange::between(900.0, 1100.0)),
        );

        match orch.resolve("a long hdmi cable", Some(&f)).await {
            RetrievalOutcome::NoMatch => {}
            other => panic!("expected NoMatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_semantic_floor_yields_no_results() {
        let orch = orchestrator(vec![record(
            "RACK99",
            "server rack cabinet",
            json!({"category": "rack"}),
        )]);
        match orch.resolve("wireless presenter remote", None).await {
            RetrievalOutcome::NoResults => {}
            other => panic!("expected NoResults, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unfiltered_semantic_takes_top_hit() {
        let orch = orchestrator(vec![
            record("CAB100", "hdmi cable six feet", json!({"category": "cable"})),
            record("HUB400", "usb hub four ports", json!({"category": "hub"})),
        ]);
        match orch.resolve("hdmi cable", None).await {
            RetrievalOutcome::Found(hit) => assert_eq!(hit.sku, "CAB100"),
            other => panic!("expected Found, got {other:?}"),
        }
    }
}
