//! Answer rendering: the grounded prompt stack and the completion client.

pub mod client;
pub mod prompts;

pub use client::{AnswerRenderer, OpenAiChatClient};
pub use prompts::{build_answer_messages, PromptMessage, BASE_SYSTEM_PROMPT};
