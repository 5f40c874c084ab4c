//! Turn handling: intent dispatch, retrieval, and reply selection.

pub mod engine;
pub mod responses;
pub mod trace;

pub use engine::TurnEngine;
