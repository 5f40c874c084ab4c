//! SkuBot core: errors, configuration, the metadata filter model, and
//! per-session conversation state.

pub mod config;
pub mod error;
pub mod filter;
pub mod session;

pub use config::{DataPaths, SkubotConfig};
pub use error::{Error, Result};
pub use filter::{Constraint, Filter, FilterValue, NumericRange};
pub use session::{ChatRole, ChatTurn, ConversationState};
