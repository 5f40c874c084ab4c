//! The turn engine: classify, retrieve, respond.
//!
//! One call per user message. The engine owns no session storage; callers
//! pass the conversation state in and the engine mutates it (transcript,
//! focused product, greeted flag) alongside producing the reply text.

use std::sync::Arc;

use skubot_chat::{build_answer_messages, AnswerRenderer};
use skubot_core::{ChatRole, Constraint, ConversationState, Filter, FilterValue, Result};
use skubot_index::VectorIndex;
use skubot_nlu::intent::TurnContext;
use skubot_nlu::sku::extract_sku;
use skubot_nlu::{classify, FilterExtractor, Intent, VocabCache};
use skubot_retrieve::{RetrievalOrchestrator, RetrievalOutcome};

use crate::responses;
use crate::trace;

const EXPLICIT_QUERY: &str = "product spec";
const EXPLICIT_K: usize = 5;

pub struct TurnEngine {
    vocab: Arc<VocabCache>,
    index: Arc<dyn VectorIndex>,
    retriever: RetrievalOrchestrator,
    renderer: Arc<dyn AnswerRenderer>,
}

impl TurnEngine {
    pub fn new(
        vocab: Arc<VocabCache>,
        index: Arc<dyn VectorIndex>,
        renderer: Arc<dyn AnswerRenderer>,
    ) -> Self {
        let retriever = RetrievalOrchestrator::new(Arc::clone(&index));
        Self {
            vocab,
            index,
            retriever,
            renderer,
        }
    }

    /// Process one user message and return the reply. The transcript gains
    /// both the message and the reply.
    pub async fn handle_turn(
        &self,
        state: &mut ConversationState,
        prompt: &str,
    ) -> Result<String> {
        state.push(ChatRole::User, prompt);
        let vocab = self.vocab.current();
        let ctx = TurnContext {
            has_prior_product: state.last_context.is_some(),
            greeted: state.greeted,
        };

        let reply = match classify(prompt, &vocab, &ctx) {
            Intent::InstallDeflection => {
                // Hydrate focus from a mentioned SKU so the deflection can
                // name it, but never answer the install question itself.
                if let Some(sku) = extract_sku(prompt, &vocab) {
                    self.hydrate_sku(state, &sku).await;
                }
                responses::install_deflection(state.last_sku.as_deref())
            }
            Intent::Greeting => {
                state.greeted = true;
                responses::GREETING.to_string()
            }
            Intent::Farewell => responses::FAREWELL.to_string(),
            Intent::ExplicitProduct(skus) => {
                let hit = self.hydrate_sku(state, &skus[0]).await;
                if !hit {
                    state.clear_product();
                }
                trace::log_resolution(prompt, None, state, &vocab);
                if state.last_context.is_some() {
                    self.render_answer(state, prompt).await?
                } else {
                    responses::NO_CONTEXT.to_string()
                }
            }
            Intent::FollowUp => {
                if state.last_context.is_some() {
                    state.last_score = Some(1.0);
                    self.render_answer(state, prompt).await?
                } else {
                    responses::CLARIFICATION.to_string()
                }
            }
            Intent::Search => {
                let filter = FilterExtractor::new(&vocab).extract(prompt);
                match self.retriever.resolve(prompt, filter.as_ref()).await {
                    RetrievalOutcome::Found(hit) => {
                        state.set_product(hit.sku, hit.text, hit.score, hit.metadata);
                        trace::log_resolution(prompt, filter.as_ref(), state, &vocab);
                        self.render_answer(state, prompt).await?
                    }
                    RetrievalOutcome::NoMatch => {
                        trace::log_resolution(prompt, filter.as_ref(), state, &vocab);
                        responses::NO_MATCH.to_string()
                    }
                    RetrievalOutcome::NoResults => {
                        trace::log_resolution(prompt, filter.as_ref(), state, &vocab);
                        responses::CLARIFICATION.to_string()
                    }
                }
            }
        };

        state.push(ChatRole::Assistant, reply.clone());
        Ok(reply)
    }

    /// Focus the named product via an exact metadata lookup. Returns whether
    /// the index knew it; the caller decides what a miss means.
    async fn hydrate_sku(&self, state: &mut ConversationState, sku: &str) -> bool {
        let mut f = Filter::new();
        f.insert(
            "product_number",
            Constraint::Eq(FilterValue::Text(sku.to_string())),
        );
        match self.index.search(EXPLICIT_QUERY, EXPLICIT_K, Some(&f)).await {
            Ok(hits) => match hits.into_iter().next() {
                Some(top) => {
                    state.set_product(sku, top.text, 1.0, top.metadata);
                    true
                }
                None => false,
            },
            Err(e) => {
                tracing::warn!(%sku, error = %e, "explicit product lookup failed");
                false
            }
        }
    }

    async fn render_answer(&self, state: &ConversationState, prompt: &str) -> Result<String> {
        // The current prompt is already in the transcript; the stack appends
        // it explicitly, so pass only the history before it.
        let cut = state.transcript.len().saturating_sub(1);
        let messages = build_answer_messages(
            &state.transcript[..cut],
            state.last_sku.as_deref(),
            state.last_context.as_deref().unwrap_or(""),
            prompt,
        );
        self.renderer.render(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skubot_chat::PromptMessage;
    use skubot_core::DataPaths;
    use skubot_index::{IndexRecord, MemoryIndex};
    use tempfile::TempDir;

    /// Renderer that returns the specification block, so assertions can see
    /// which product the answer was grounded in.
    struct SpecEcho;

    #[async_trait::async_trait]
    impl AnswerRenderer for SpecEcho {
        async fn render(&self, messages: Vec<PromptMessage>) -> Result<String> {
            Ok(messages
                .iter()
                .rev()
                .find(|m| m.content.starts_with("SPECIFICATION:"))
                .map(|m| m.content.clone())
                .unwrap_or_default())
        }
    }

    fn record(sku: &str, text: &str, metadata: serde_json::Value) -> IndexRecord {
        IndexRecord {
            sku: sku.to_string(),
            text: text.to_string(),
            metadata: serde_json::from_value(metadata).unwrap(),
        }
    }

    fn engine(records: Vec<IndexRecord>) -> (TurnEngine, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path(), dir.path().join("catalog.xlsx"));
        std::fs::write(
            &paths.sku_vocab,
            r#"{"version": 1, "skus": ["ABC100", "XYZ200"]}"#,
        )
        .unwrap();
        std::fs::write(
            &paths.categorical_values,
            r#"{"version": 1, "category": ["cable", "docking station"], "subcategory": ["hdmi cables"]}"#,
        )
        .unwrap();
        let vocab = Arc::new(VocabCache::load(&paths).unwrap());
        let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::with_records(records));
        let engine = TurnEngine::new(vocab, Arc::clone(&index), Arc::new(SpecEcho));
        (engine, dir)
    }

    fn catalog() -> Vec<IndexRecord> {
        vec![
            record(
                "ABC100",
                "Product Number: ABC100\nProduct Category: Docking Station",
                json!({"product_number": "ABC100", "category": "docking station"}),
            ),
            record(
                "XYZ200",
                "Product Number: XYZ200\nProduct Category: Cable\nCable Length: 3.3ft [1m]",
                json!({"product_number": "XYZ200", "category": "cable", "cablelength": 1000.0}),
            ),
        ]
    }

    #[tokio::test]
    async fn test_cable_length_query_resolves_the_cable() {
        let (engine, _dir) = engine(catalog());
        let mut state = ConversationState::new();
        let reply = engine
            .handle_turn(&mut state, "do you have a cable around 1 meter")
            .await
            .unwrap();
        assert!(reply.contains("XYZ200"), "got: {reply}");
        assert_eq!(state.last_sku.as_deref(), Some("XYZ200"));
        assert_eq!(state.last_score, Some(1.0));
    }

    #[tokio::test]
    async fn test_greeting_fires_once_per_session() {
        let (engine, _dir) = engine(catalog());
        let mut state = ConversationState::new();
        let first = engine.handle_turn(&mut state, "hi").await.unwrap();
        assert_eq!(first, responses::GREETING);
        assert!(state.greeted);
        let second = engine.handle_turn(&mut state, "hi").await.unwrap();
        assert_ne!(second, responses::GREETING);
    }

    #[tokio::test]
    async fn test_install_question_short_circuits_even_with_sku() {
        let (engine, _dir) = engine(catalog());
        let mut state = ConversationState::new();
        let reply = engine
            .handle_turn(&mut state, "how do I install ABC100")
            .await
            .unwrap();
        assert!(reply.starts_with("I can help with product selection"));
        assert!(reply.contains("**ABC100**"));
        // the install question itself was never answered from the spec
        assert!(!reply.contains("SPECIFICATION"));
    }

    #[tokio::test]
    async fn test_explicit_sku_lookup() {
        let (engine, _dir) = engine(catalog());
        let mut state = ConversationState::new();
        let reply = engine
            .handle_turn(&mut state, "tell me about xyz-200")
            .await
            .unwrap();
        assert!(reply.contains("XYZ200"));
        assert_eq!(state.last_sku.as_deref(), Some("XYZ200"));
    }

    #[tokio::test]
    async fn test_follow_up_reuses_prior_product() {
        let (engine, _dir) = engine(catalog());
        let mut state = ConversationState::new();
        engine
            .handle_turn(&mut state, "tell me about XYZ200")
            .await
            .unwrap();
        let reply = engine
            .handle_turn(&mut state, "what color is it")
            .await
            .unwrap();
        assert!(reply.contains("XYZ200"));
        assert_eq!(state.last_score, Some(1.0));
    }

    #[tokio::test]
    async fn test_follow_up_without_context_asks_for_detail() {
        let (engine, _dir) = engine(catalog());
        let mut state = ConversationState::new();
        state.greeted = true;
        let reply = engine
            .handle_turn(&mut state, "what color is it")
            .await
            .unwrap();
        assert_eq!(reply, responses::CLARIFICATION);
    }

    #[tokio::test]
    async fn test_unmet_numeric_requirement_reports_no_match() {
        let (engine, _dir) = engine(vec![record(
            "CAB300",
            "extension cable around 1 meter workspaces",
            json!({"product_number": "CAB300", "category": "cable", "cablelength": 3000.0}),
        )]);
        let mut state = ConversationState::new();
        let reply = engine
            .handle_turn(&mut state, "cable around 1 meter")
            .await
            .unwrap();
        assert_eq!(reply, responses::NO_MATCH);
        assert!(state.last_sku.is_none());
    }

    #[tokio::test]
    async fn test_farewell() {
        let (engine, _dir) = engine(catalog());
        let mut state = ConversationState::new();
        let reply = engine
            .handle_turn(&mut state, "thanks, that's all")
            .await
            .unwrap();
        assert_eq!(reply, responses::FAREWELL);
    }
}
