//! The grounded-answer prompt stack.
//!
//! Every rendered answer carries the transcript plus four system messages:
//! the assistant's scope, a content-safety pin to the single resolved
//! product number, style rules, and the product's specification block.
//! The model is never shown a product it did not just retrieve.

use serde::Serialize;

use skubot_core::{ChatRole, ChatTurn};

#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

/// Session-opening system message, ahead of the transcript.
pub const BASE_SYSTEM_PROMPT: &str = "You are a StarTech.com assistant. Always be friendly and professional. \
    You only answer questions about StarTech.com products using the provided context. \
    Do not mention or recommend products from any other company, supplier, or brand — only StarTech.com. \
    Do not make up information. If you’re unsure, ask for clarification. \
    Stay helpful, polite, and focused on StarTech.com solutions.";

const SCOPE_PROMPT: &str = "SCOPE: You are a StarTech.com product assistant. \
    You ONLY provide product information, specs, compatibility, and high-level recommendations. \
    You DO NOT provide installation, configuration, wiring, firmware, or troubleshooting steps. \
    If asked for those, politely decline and recommend contacting StarTech.com Technical Support.";

const STYLE_PROMPT: &str = "STYLE: Be conversational and concise like a knowledgeable product specialist. \
    No section headings or tables. Prefer 3–6 sentences. \
    Start with: 'For <PRODUCT NUMBER>:' once, then explain. \
    Answer the user’s question directly using the spec. \
    If a quick list helps, you may include up to 3–5 short bullets, but only when the user asked for 'specs', 'what’s included', or similar. \
    If 'Included in Package' exists AND the user asks what's in the box, summarize it inline as 'In the box: ...'. \
    Avoid emojis. End with a short offer to check another detail if needed.";

fn content_safety_prompt(sku: &str) -> String {
    format!(
        "CONTENT SAFETY: Answer ONLY about the single StarTech.com product number {sku}. \
         Do not mention, invent, or guess other product numbers or product names. \
         Use ONLY facts present in the SPECIFICATION block below; if a fact is missing, say: \
         'That detail isn’t in the spec I have.'"
    )
}

/// Assemble the full message list for one answer.
pub fn build_answer_messages(
    transcript: &[ChatTurn],
    sku: Option<&str>,
    context: &str,
    question: &str,
) -> Vec<PromptMessage> {
    let mut messages = vec![PromptMessage::system(BASE_SYSTEM_PROMPT)];
    for turn in transcript {
        messages.push(match turn.role {
            ChatRole::User => PromptMessage::user(turn.content.clone()),
            ChatRole::Assistant => PromptMessage::assistant(turn.content.clone()),
        });
    }
    messages.push(PromptMessage::system(SCOPE_PROMPT));
    messages.push(PromptMessage::system(content_safety_prompt(
        sku.unwrap_or("(unknown)"),
    )));
    messages.push(PromptMessage::system(STYLE_PROMPT));
    messages.push(PromptMessage::system(format!("SPECIFICATION:\n{context}")));
    messages.push(PromptMessage::user(question));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_order_and_pinning() {
        let transcript = vec![
            ChatTurn {
                role: ChatRole::User,
                content: "do you have hdmi cables".into(),
            },
            ChatTurn {
                role: ChatRole::Assistant,
                content: "For XYZ200: ...".into(),
            },
        ];
        let msgs = build_answer_messages(
            &transcript,
            Some("XYZ200"),
            "Product Number: XYZ200\nCable Length: 3.3ft [1m]",
            "how long is it",
        );

        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].content, "do you have hdmi cables");
        assert_eq!(msgs[2].role, "assistant");
        assert!(msgs[4].content.contains("product number XYZ200"));
        assert!(msgs[6].content.starts_with("SPECIFICATION:"));
        assert_eq!(msgs.last().unwrap().content, "how long is it");
    }

    #[test]
    fn test_unknown_sku_placeholder() {
        let msgs = build_answer_messages(&[], None, "", "hello");
        assert!(msgs
            .iter()
            .any(|m| m.content.contains("product number (unknown)")));
    }
}
