//! Persistent entity types: facts, users, conversations, messages.

use crate::{EmbeddingVector, ConversationStatus, InterfaceKind, Language, MessageRole, MessageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// FACT
// ============================================================================

/// An atomic personal-context record tied to exactly one user.
///
/// Facts are immutable after creation; the only removal paths are an
/// explicit per-fact delete or a whole-user purge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Unique identifier, immutable after creation.
    pub fact_id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Name of the person/thing the fact is about (e.g. "Rahul", "Mom").
    pub entity: String,
    /// Relation label (e.g. "friend", "family", "project").
    pub relation: String,
    /// Attribute name (e.g. "profession", "health issue").
    pub attribute: String,
    /// Attribute value (e.g. "dancer", "recovering").
    pub value: String,
    /// Verbatim sentence the fact was extracted from.
    pub context: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Embedding of the document text; attached by the fact store on write.
    pub embedding: Option<EmbeddingVector>,
}

impl Fact {
    /// Create a fresh fact with a new id and the current timestamp.
    /// The embedding is attached later by the fact store.
    pub fn new(
        user_id: Uuid,
        entity: impl Into<String>,
        relation: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            fact_id: Uuid::now_v7(),
            user_id,
            entity: entity.into(),
            relation: relation.into(),
            attribute: attribute.into(),
            value: value.into(),
            context: context.into(),
            created_at: Utc::now(),
            embedding: None,
        }
    }

    /// The text that gets embedded and searched against.
    pub fn document_text(&self) -> String {
        format!(
            "{} {} {}: {}. Context: {}",
            self.entity, self.relation, self.attribute, self.value, self.context
        )
    }
}

// ============================================================================
// ENTITY GRAPH
// ============================================================================

/// Derived relationship view for one (user, entity) pair.
///
/// Built at query time by aggregating facts; never stored. BTreeMaps keep
/// iteration order deterministic for prompt rendering and tests.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityGraph {
    /// Entity this graph describes.
    pub entity: String,
    /// Relation label -> related values, insertion-deduplicated.
    pub relationships: BTreeMap<String, Vec<String>>,
    /// Attribute name -> most recent value.
    pub attributes: BTreeMap<String, String>,
}

impl EntityGraph {
    /// Empty graph for an entity.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            relationships: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Fold one fact into the graph.
    pub fn absorb(&mut self, fact: &Fact) {
        let values = self
            .relationships
            .entry(fact.relation.clone())
            .or_default();
        if !values.contains(&fact.value) {
            values.push(fact.value.clone());
        }
        self.attributes
            .insert(fact.attribute.clone(), fact.value.clone());
    }

    /// Whether any fact contributed to this graph.
    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty() && self.attributes.is_empty()
    }
}

// ============================================================================
// USER
// ============================================================================

/// Canonical user record. External identifiers from every interface map to
/// exactly one of these, which is what makes history interface-agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: Uuid,
    /// Display name, if known.
    pub name: Option<String>,
    /// External identifiers, e.g. "telegram:12345", "web:abc-session".
    pub external_ids: Vec<String>,
    pub preferred_language: Language,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl UserRecord {
    /// Canonical external-id form for an (interface, platform id) pair.
    /// One deterministic mapping per interface, no special-casing elsewhere.
    pub fn external_key(interface: InterfaceKind, platform_id: &str) -> String {
        format!("{}:{}", interface.as_db_str(), platform_id)
    }
}

// ============================================================================
// CONVERSATION AND MESSAGES
// ============================================================================

/// A conversation thread. Opened implicitly on first message for a
/// (user, interface) pair, closed only by an explicit end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    /// Interface the conversation was opened from.
    pub interface: InterfaceKind,
    pub status: ConversationStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A persisted message within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    /// Monotonic position within the conversation, assigned by the store.
    pub sequence: i64,
    pub role: MessageRole,
    pub content: String,
    pub language: Language,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    /// Arbitrary metadata (tone, concealment flag, originating interface).
    pub metadata: Option<serde_json::Value>,
}

/// A (role, content) pair as fed to prompt assembly. Oldest-first ordering
/// is the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: MessageRole,
    pub content: String,
}

impl From<&StoredMessage> for HistoryTurn {
    fn from(msg: &StoredMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_fact(user_id: Uuid) -> Fact {
        Fact::new(
            user_id,
            "Rahul",
            "friend",
            "profession",
            "dancer",
            "My friend Rahul is a dancer",
        )
    }

    #[test]
    fn test_fact_new_assigns_fresh_id() {
        let user_id = Uuid::now_v7();
        let a = make_test_fact(user_id);
        let b = make_test_fact(user_id);
        assert_ne!(a.fact_id, b.fact_id);
        assert_eq!(a.user_id, user_id);
        assert!(a.embedding.is_none());
    }

    #[test]
    fn test_fact_document_text() {
        let fact = make_test_fact(Uuid::now_v7());
        let doc = fact.document_text();
        assert!(doc.contains("Rahul"));
        assert!(doc.contains("friend"));
        assert!(doc.contains("dancer"));
        assert!(doc.contains("My friend Rahul is a dancer"));
    }

    #[test]
    fn test_entity_graph_absorb() {
        let user_id = Uuid::now_v7();
        let mut graph = EntityGraph::new("Rahul");
        assert!(graph.is_empty());

        graph.absorb(&make_test_fact(user_id));
        assert!(!graph.is_empty());
        assert_eq!(graph.relationships["friend"], vec!["dancer".to_string()]);
        assert_eq!(graph.attributes["profession"], "dancer");
    }

    #[test]
    fn test_entity_graph_deduplicates_relation_values() {
        let user_id = Uuid::now_v7();
        let mut graph = EntityGraph::new("Rahul");
        let fact = make_test_fact(user_id);
        graph.absorb(&fact);
        graph.absorb(&fact);
        assert_eq!(graph.relationships["friend"].len(), 1);
    }

    #[test]
    fn test_entity_graph_attribute_takes_latest() {
        let user_id = Uuid::now_v7();
        let mut graph = EntityGraph::new("Rahul");
        graph.absorb(&make_test_fact(user_id));

        let updated = Fact::new(
            user_id,
            "Rahul",
            "friend",
            "profession",
            "choreographer",
            "Rahul became a choreographer",
        );
        graph.absorb(&updated);
        assert_eq!(graph.attributes["profession"], "choreographer");
    }

    #[test]
    fn test_external_key_is_deterministic() {
        let a = UserRecord::external_key(InterfaceKind::Telegram, "12345");
        let b = UserRecord::external_key(InterfaceKind::Telegram, "12345");
        assert_eq!(a, b);
        assert_eq!(a, "telegram:12345");

        let web = UserRecord::external_key(InterfaceKind::Web, "12345");
        assert_ne!(a, web);
    }

    #[test]
    fn test_history_turn_from_stored_message() {
        let msg = StoredMessage {
            message_id: Uuid::now_v7(),
            conversation_id: Uuid::now_v7(),
            sequence: 1,
            role: MessageRole::User,
            content: "hello".to_string(),
            language: Language::English,
            message_type: MessageType::Text,
            created_at: Utc::now(),
            metadata: None,
        };
        let turn = HistoryTurn::from(&msg);
        assert_eq!(turn.role, MessageRole::User);
        assert_eq!(turn.content, "hello");
    }
}
