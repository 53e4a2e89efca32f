//! Sakhi Core - Primitive Types and Quota Governance
//!
//! Pure data types for the conversation pipeline: entities, enums, errors,
//! configuration, embedding vectors, and the per-tier quota governor.
//! No I/O lives here; providers and stores are defined in the sibling crates.

pub mod config;
pub mod context;
pub mod embedding;
pub mod entities;
pub mod enums;
pub mod error;
pub mod quota;

pub use config::CompanionConfig;
pub use context::ConversationContext;
pub use embedding::EmbeddingVector;
pub use entities::{Conversation, EntityGraph, Fact, HistoryTurn, StoredMessage, UserRecord};
pub use enums::{
    ConversationStatus, EmotionalTone, InterfaceKind, InterfaceParseError, Language,
    LanguageParseError, MessageRole, MessageType, RoleParseError, Tier, ToneParseError,
};
pub use error::{ConfigError, LlmError, SakhiError, SakhiResult, StorageError, VectorError};
pub use quota::{QuotaGovernor, QuotaStatus};
