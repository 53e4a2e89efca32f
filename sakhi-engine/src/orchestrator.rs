//! The per-message conversation pipeline.
//!
//! Resolves the user and conversation, detects language, extracts and
//! retrieves memory, synthesizes the persona reply, and persists both
//! sides of the exchange. Only persistence problems surface as errors;
//! every collaborator failure degrades inside its own component.

use crate::store::{ConversationStore, NewMessage};
use chrono::Utc;
use sakhi_core::{
    CompanionConfig, Conversation, ConversationContext, ConversationStatus, EmotionalTone, Fact,
    HistoryTurn, InterfaceKind, Language, MessageRole, MessageType, QuotaGovernor, QuotaStatus,
    SakhiError, SakhiResult, StoredMessage, UserRecord,
};
use sakhi_memory::{FactExtractor, FactStore};
use sakhi_persona::{LanguageDetector, PersonaSynthesizer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// One inbound message with its delivery metadata.
#[derive(Debug, Clone)]
pub struct MessageRequest {
    pub interface: InterfaceKind,
    /// Platform-specific user identifier (Telegram id, web session id, ...).
    pub platform_id: String,
    pub user_name: String,
    pub message: String,
    /// Continue this conversation if it exists and is still open.
    pub conversation_id: Option<Uuid>,
    pub message_type: MessageType,
    /// Client-selected mode; "grammar" enables gentle correction.
    pub mode_context: Option<String>,
}

impl MessageRequest {
    pub fn new(
        interface: InterfaceKind,
        platform_id: impl Into<String>,
        user_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            interface,
            platform_id: platform_id.into(),
            user_name: user_name.into(),
            message: message.into(),
            conversation_id: None,
            message_type: MessageType::Text,
            mode_context: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: Uuid) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn with_mode_context(mut self, mode: impl Into<String>) -> Self {
        self.mode_context = Some(mode.into());
        self
    }

    fn is_grammar_mode(&self) -> bool {
        self.mode_context.as_deref() == Some("grammar")
    }
}

/// The processed result handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageOutcome {
    pub response_text: String,
    pub language: Language,
    pub conversation_id: Uuid,
    /// Id of the persisted assistant message.
    pub message_id: Uuid,
    pub emotional_tone: EmotionalTone,
    pub facts_extracted: usize,
    pub concealment_applied: bool,
}

/// One remembered attribute in a context summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactDigest {
    pub relation: String,
    pub attribute: String,
    pub value: String,
    pub context: String,
    pub created_at: chrono::DateTime<Utc>,
}

/// Everything the companion remembers about a user, grouped by entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub user_id: Uuid,
    pub total_facts: usize,
    pub entities: BTreeMap<String, Vec<FactDigest>>,
}

/// Orchestrates the full message pipeline.
pub struct ConversationOrchestrator {
    store: Arc<dyn ConversationStore>,
    facts: Arc<dyn FactStore>,
    extractor: FactExtractor,
    detector: LanguageDetector,
    synthesizer: PersonaSynthesizer,
    quota: Arc<QuotaGovernor>,
    config: CompanionConfig,
}

impl ConversationOrchestrator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        facts: Arc<dyn FactStore>,
        extractor: FactExtractor,
        detector: LanguageDetector,
        synthesizer: PersonaSynthesizer,
        quota: Arc<QuotaGovernor>,
        config: CompanionConfig,
    ) -> Self {
        Self {
            store,
            facts,
            extractor,
            detector,
            synthesizer,
            quota,
            config,
        }
    }

    /// Process one inbound message end to end.
    ///
    /// Collaborator failures (detection, extraction, retrieval, generation)
    /// degrade inside their components; only persistence errors propagate.
    pub async fn process(&self, request: MessageRequest) -> SakhiResult<MessageOutcome> {
        // Step 1: resolve user and conversation.
        let user = self.resolve_user(&request).await?;
        let conversation = self.resolve_conversation(&request, &user).await?;

        // Step 2: detect language.
        let detection = self.detector.detect(&request.message).await;
        tracing::debug!(
            user_id = %user.user_id,
            language = detection.language.code(),
            confidence = detection.confidence,
            "detected language"
        );

        // Step 3: recent history across every interface the user talks on.
        let recent = self
            .store
            .user_messages(user.user_id, self.config.history_window)
            .await?;
        let history: Vec<HistoryTurn> = recent.iter().map(HistoryTurn::from).collect();

        // Step 4: extract and persist facts. Extraction itself is
        // best-effort, but a fact store that cannot write is a hard
        // failure; only embedding trouble is skippable.
        let extracted = self
            .extractor
            .extract(user.user_id, &request.message, &history)
            .await?;
        let mut facts_extracted = 0;
        for fact in extracted {
            match self.facts.store_fact(fact).await {
                Ok(_) => facts_extracted += 1,
                Err(e @ SakhiError::Storage(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(user_id = %user.user_id, error = %e, "fact embedding failed, skipping fact")
                }
            }
        }

        // Step 5: retrieve remembered context for this message. Same
        // split: storage outages surface, embedding failures degrade.
        let retrieved = match self
            .facts
            .retrieve_context(user.user_id, &request.message, self.config.retrieval_top_k)
            .await
        {
            Ok(facts) => facts,
            Err(e @ SakhiError::Storage(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(user_id = %user.user_id, error = %e, "fact retrieval degraded, continuing without context");
                Vec::new()
            }
        };
        let facts_retrieved = retrieved.len();

        // Step 6: synthesize the persona reply.
        let context = ConversationContext::new(user.user_id, &request.user_name, &request.message)
            .with_language(detection.language)
            .with_history(history, self.config.history_window)
            .with_facts(retrieved, self.config.retrieval_top_k)
            .with_grammar_mode(request.is_grammar_mode());
        let reply = self.synthesizer.respond(&context).await;

        // Step 7: persist both sides of the exchange in order.
        self.store
            .append_message(NewMessage {
                conversation_id: conversation.conversation_id,
                role: MessageRole::User,
                content: request.message.clone(),
                language: detection.language,
                message_type: request.message_type,
                metadata: Some(serde_json::json!({
                    "interface": request.interface.as_db_str(),
                })),
            })
            .await?;

        let assistant_message = self
            .store
            .append_message(NewMessage {
                conversation_id: conversation.conversation_id,
                role: MessageRole::Assistant,
                content: reply.content.clone(),
                language: reply.language,
                message_type: request.message_type,
                metadata: Some(serde_json::json!({
                    "interface": request.interface.as_db_str(),
                    "emotional_tone": reply.emotional_tone.as_db_str(),
                    "concealment_applied": reply.concealment_applied,
                    "facts_retrieved": facts_retrieved,
                })),
            })
            .await?;

        self.store.touch_user(user.user_id).await?;

        // Step 8: report the outcome.
        Ok(MessageOutcome {
            response_text: reply.content,
            language: reply.language,
            conversation_id: conversation.conversation_id,
            message_id: assistant_message.message_id,
            emotional_tone: reply.emotional_tone,
            facts_extracted,
            concealment_applied: reply.concealment_applied,
        })
    }

    /// Explicitly end a conversation. Subsequent messages for the same
    /// (user, interface) pair open a fresh one.
    pub async fn end_conversation(&self, conversation_id: Uuid) -> SakhiResult<Conversation> {
        self.store.end_conversation(conversation_id).await
    }

    /// Extract and store facts from free text outside the message pipeline,
    /// e.g. for batch imports.
    pub async fn extract_and_store(&self, user_id: Uuid, text: &str) -> SakhiResult<Vec<Fact>> {
        let extracted = self.extractor.extract(user_id, text, &[]).await?;
        let mut stored = Vec::with_capacity(extracted.len());
        for fact in extracted {
            stored.push(self.facts.store_fact(fact).await?);
        }
        Ok(stored)
    }

    /// Summarize what the companion remembers about a user, optionally
    /// narrowed to facts relevant to `query`.
    pub async fn context_summary(
        &self,
        user_id: Uuid,
        query: Option<&str>,
    ) -> SakhiResult<ContextSummary> {
        let facts = match query {
            Some(q) => {
                self.facts
                    .retrieve_context(user_id, q, self.config.retrieval_top_k * 2)
                    .await?
            }
            None => self.facts.list_all(user_id, 100).await?,
        };

        let mut entities: BTreeMap<String, Vec<FactDigest>> = BTreeMap::new();
        let total_facts = facts.len();
        for fact in facts {
            entities.entry(fact.entity.clone()).or_default().push(FactDigest {
                relation: fact.relation,
                attribute: fact.attribute,
                value: fact.value,
                context: fact.context,
                created_at: fact.created_at,
            });
        }

        Ok(ContextSummary {
            user_id,
            total_facts,
            entities,
        })
    }

    /// Message history for display: one conversation if an id is given,
    /// otherwise the user's recent messages across all interfaces.
    pub async fn history(
        &self,
        user_id: Uuid,
        conversation_id: Option<Uuid>,
        limit: usize,
    ) -> SakhiResult<Vec<StoredMessage>> {
        match conversation_id {
            Some(id) => self.store.conversation_messages(id, limit).await,
            None => self.store.user_messages(user_id, limit).await,
        }
    }

    /// Current day's quota usage per tier.
    pub fn quota_status(&self) -> Vec<QuotaStatus> {
        self.quota.status_all()
    }

    async fn resolve_user(&self, request: &MessageRequest) -> SakhiResult<UserRecord> {
        let external_key = UserRecord::external_key(request.interface, &request.platform_id);

        if let Some(user) = self.store.find_user_by_external_id(&external_key).await? {
            return Ok(user);
        }

        let now = Utc::now();
        let user = UserRecord {
            user_id: Uuid::now_v7(),
            name: Some(request.user_name.clone()),
            external_ids: vec![external_key],
            preferred_language: Language::default(),
            created_at: now,
            last_active_at: now,
        };
        self.store.create_user(user).await
    }

    async fn resolve_conversation(
        &self,
        request: &MessageRequest,
        user: &UserRecord,
    ) -> SakhiResult<Conversation> {
        // An explicitly named conversation is honored only while it is
        // still open and belongs to this user.
        if let Some(id) = request.conversation_id {
            if let Some(conversation) = self.store.get_conversation(id).await? {
                if conversation.user_id == user.user_id
                    && conversation.status == ConversationStatus::Open
                {
                    return Ok(conversation);
                }
            }
        }

        if let Some(conversation) = self
            .store
            .find_open_conversation(user.user_id, request.interface)
            .await?
        {
            return Ok(conversation);
        }

        self.store
            .create_conversation(Conversation {
                conversation_id: Uuid::now_v7(),
                user_id: user.user_id,
                interface: request.interface,
                status: ConversationStatus::Open,
                started_at: Utc::now(),
                ended_at: None,
            })
            .await
    }
}

impl std::fmt::Debug for ConversationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationOrchestrator")
            .field("config", &self.config)
            .finish()
    }
}
