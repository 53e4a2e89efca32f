//! Sakhi Engine - Conversation Orchestration
//!
//! Wires language detection, fact memory, and persona synthesis into the
//! per-message pipeline, and owns conversation persistence (users,
//! conversations, ordered messages).

pub mod orchestrator;
pub mod store;

pub use orchestrator::{
    ContextSummary, ConversationOrchestrator, FactDigest, MessageOutcome, MessageRequest,
};
pub use store::{ConversationStore, InMemoryConversationStore, NewMessage};
