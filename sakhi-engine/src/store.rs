//! Conversation persistence: users, conversations, messages.
//!
//! Message sequence numbers are assigned under the store's write lock, so
//! appends to one conversation can never interleave out of order.

use async_trait::async_trait;
use chrono::Utc;
use sakhi_core::{
    Conversation, ConversationStatus, InterfaceKind, Language, MessageRole, MessageType,
    SakhiError, SakhiResult, StorageError, StoredMessage, UserRecord,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Everything needed to persist one message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub language: Language,
    pub message_type: MessageType,
    pub metadata: Option<serde_json::Value>,
}

/// Persistence seam for the orchestrator.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Look up a user by any of their external identifiers.
    async fn find_user_by_external_id(&self, external_id: &str)
        -> SakhiResult<Option<UserRecord>>;

    /// Persist a new user record.
    async fn create_user(&self, user: UserRecord) -> SakhiResult<UserRecord>;

    /// Fetch a user by canonical id.
    async fn get_user(&self, user_id: Uuid) -> SakhiResult<UserRecord>;

    /// Attach an additional external identifier to an existing user.
    async fn add_external_id(&self, user_id: Uuid, external_id: &str) -> SakhiResult<()>;

    /// Bump the user's last-active timestamp.
    async fn touch_user(&self, user_id: Uuid) -> SakhiResult<()>;

    /// Fetch a conversation by id.
    async fn get_conversation(&self, conversation_id: Uuid) -> SakhiResult<Option<Conversation>>;

    /// The open conversation for a (user, interface) pair, if any.
    async fn find_open_conversation(
        &self,
        user_id: Uuid,
        interface: InterfaceKind,
    ) -> SakhiResult<Option<Conversation>>;

    /// Persist a new conversation.
    async fn create_conversation(&self, conversation: Conversation) -> SakhiResult<Conversation>;

    /// Transition a conversation to ended. Fails if already ended.
    async fn end_conversation(&self, conversation_id: Uuid) -> SakhiResult<Conversation>;

    /// Append a message, assigning the next sequence number. Fails if the
    /// conversation is missing or already ended.
    async fn append_message(&self, message: NewMessage) -> SakhiResult<StoredMessage>;

    /// The most recent `limit` messages of one conversation, oldest first.
    async fn conversation_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> SakhiResult<Vec<StoredMessage>>;

    /// The most recent `limit` messages of a user across every
    /// conversation and interface, oldest first.
    async fn user_messages(&self, user_id: Uuid, limit: usize) -> SakhiResult<Vec<StoredMessage>>;
}

#[derive(Default)]
struct StoreState {
    users: HashMap<Uuid, UserRecord>,
    conversations: HashMap<Uuid, Conversation>,
    // Messages live per conversation in append order; sequence is index+1.
    messages: HashMap<Uuid, Vec<StoredMessage>>,
}

/// In-memory conversation store.
#[derive(Default)]
pub struct InMemoryConversationStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_guard(&self) -> SakhiResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| SakhiError::Storage(StorageError::LockPoisoned))
    }

    fn write_guard(&self) -> SakhiResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| SakhiError::Storage(StorageError::LockPoisoned))
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> SakhiResult<Option<UserRecord>> {
        let state = self.read_guard()?;
        Ok(state
            .users
            .values()
            .find(|u| u.external_ids.iter().any(|id| id == external_id))
            .cloned())
    }

    async fn create_user(&self, user: UserRecord) -> SakhiResult<UserRecord> {
        let mut state = self.write_guard()?;
        state.users.insert(user.user_id, user.clone());
        tracing::debug!(user_id = %user.user_id, "created user");
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> SakhiResult<UserRecord> {
        let state = self.read_guard()?;
        state.users.get(&user_id).cloned().ok_or_else(|| {
            SakhiError::Storage(StorageError::NotFound {
                kind: "user",
                id: user_id,
            })
        })
    }

    async fn add_external_id(&self, user_id: Uuid, external_id: &str) -> SakhiResult<()> {
        let mut state = self.write_guard()?;
        let user = state.users.get_mut(&user_id).ok_or_else(|| {
            SakhiError::Storage(StorageError::NotFound {
                kind: "user",
                id: user_id,
            })
        })?;
        if !user.external_ids.iter().any(|id| id == external_id) {
            user.external_ids.push(external_id.to_string());
        }
        Ok(())
    }

    async fn touch_user(&self, user_id: Uuid) -> SakhiResult<()> {
        let mut state = self.write_guard()?;
        let user = state.users.get_mut(&user_id).ok_or_else(|| {
            SakhiError::Storage(StorageError::NotFound {
                kind: "user",
                id: user_id,
            })
        })?;
        user.last_active_at = Utc::now();
        Ok(())
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> SakhiResult<Option<Conversation>> {
        let state = self.read_guard()?;
        Ok(state.conversations.get(&conversation_id).cloned())
    }

    async fn find_open_conversation(
        &self,
        user_id: Uuid,
        interface: InterfaceKind,
    ) -> SakhiResult<Option<Conversation>> {
        let state = self.read_guard()?;
        Ok(state
            .conversations
            .values()
            .find(|c| {
                c.user_id == user_id
                    && c.interface == interface
                    && c.status == ConversationStatus::Open
            })
            .cloned())
    }

    async fn create_conversation(&self, conversation: Conversation) -> SakhiResult<Conversation> {
        let mut state = self.write_guard()?;
        state
            .conversations
            .insert(conversation.conversation_id, conversation.clone());
        tracing::debug!(
            conversation_id = %conversation.conversation_id,
            interface = %conversation.interface.as_db_str(),
            "opened conversation"
        );
        Ok(conversation)
    }

    async fn end_conversation(&self, conversation_id: Uuid) -> SakhiResult<Conversation> {
        let mut state = self.write_guard()?;
        let conversation = state.conversations.get_mut(&conversation_id).ok_or_else(|| {
            SakhiError::Storage(StorageError::NotFound {
                kind: "conversation",
                id: conversation_id,
            })
        })?;

        if conversation.status == ConversationStatus::Ended {
            return Err(SakhiError::Storage(StorageError::ConversationEnded {
                id: conversation_id,
            }));
        }

        conversation.status = ConversationStatus::Ended;
        conversation.ended_at = Some(Utc::now());
        Ok(conversation.clone())
    }

    async fn append_message(&self, message: NewMessage) -> SakhiResult<StoredMessage> {
        // Single write lock covers the status check and the sequence
        // assignment, which is what keeps per-conversation order strict.
        let mut state = self.write_guard()?;

        let conversation = state
            .conversations
            .get(&message.conversation_id)
            .ok_or_else(|| {
                SakhiError::Storage(StorageError::NotFound {
                    kind: "conversation",
                    id: message.conversation_id,
                })
            })?;

        if conversation.status == ConversationStatus::Ended {
            return Err(SakhiError::Storage(StorageError::ConversationEnded {
                id: message.conversation_id,
            }));
        }

        let entries = state.messages.entry(message.conversation_id).or_default();
        let stored = StoredMessage {
            message_id: Uuid::now_v7(),
            conversation_id: message.conversation_id,
            sequence: entries.len() as i64 + 1,
            role: message.role,
            content: message.content,
            language: message.language,
            message_type: message.message_type,
            created_at: Utc::now(),
            metadata: message.metadata,
        };
        entries.push(stored.clone());
        Ok(stored)
    }

    async fn conversation_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> SakhiResult<Vec<StoredMessage>> {
        let state = self.read_guard()?;
        let messages = state
            .messages
            .get(&conversation_id)
            .map(|v| v.as_slice())
            .unwrap_or_default();

        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn user_messages(&self, user_id: Uuid, limit: usize) -> SakhiResult<Vec<StoredMessage>> {
        let state = self.read_guard()?;

        let conversation_ids: Vec<Uuid> = state
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.conversation_id)
            .collect();

        let mut all: Vec<StoredMessage> = conversation_ids
            .iter()
            .filter_map(|id| state.messages.get(id))
            .flatten()
            .cloned()
            .collect();

        // Message ids are time-ordered (v7), which breaks created_at ties
        // across conversations deterministically.
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });

        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }
}

impl std::fmt::Debug for InMemoryConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryConversationStore").finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
