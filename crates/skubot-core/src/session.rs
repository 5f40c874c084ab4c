//! Per-session conversation state.
//!
//! Each chat session tracks the product currently "in focus" plus an
//! append-only transcript. Focus is overwritten atomically when retrieval
//! resolves a product and cleared when a lookup misses, so follow-up
//! questions always refer to the most recent successful resolution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Mutable state carried across turns of one conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// SKU of the product currently in focus.
    pub last_sku: Option<String>,
    /// Rendered record text backing the focused product.
    pub last_context: Option<String>,
    /// Retrieval score of the focused product.
    pub last_score: Option<f64>,
    /// Metadata of the focused product.
    pub last_metadata: Option<serde_json::Map<String, Value>>,
    /// Whether the greeting has already fired this session.
    pub greeted: bool,
    pub transcript: Vec<ChatTurn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_product(&self) -> bool {
        self.last_sku.is_some()
    }

    /// Replace the focused product. All four fields move together.
    pub fn set_product(
        &mut self,
        sku: impl Into<String>,
        context: impl Into<String>,
        score: f64,
        metadata: serde_json::Map<String, Value>,
    ) {
        self.last_sku = Some(sku.into());
        self.last_context = Some(context.into());
        self.last_score = Some(score);
        self.last_metadata = Some(metadata);
    }

    /// Drop the focused product after a miss.
    pub fn clear_product(&mut self) {
        self.last_sku = None;
        self.last_context = None;
        self.last_score = None;
        self.last_metadata = None;
    }

    pub fn push(&mut self, role: ChatRole, content: impl Into<String>) {
        self.transcript.push(ChatTurn { role, content: content.into() });
    }
}
