//! Fact storage and semantic retrieval.
//!
//! Facts live in a per-user partition; every read and write goes through a
//! user id, so one user's facts can never appear in another user's results.

use async_trait::async_trait;
use sakhi_core::{
    EmbeddingVector, EntityGraph, Fact, SakhiError, SakhiResult, StorageError,
};
use sakhi_llm::EmbeddingProvider;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Persistence seam for the fact vault.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Persist a fact, attaching an embedding of its document text.
    /// Returns the stored fact with the embedding filled in.
    async fn store_fact(&self, fact: Fact) -> SakhiResult<Fact>;

    /// Semantic search over one user's facts. Returns at most `top_k`
    /// facts, most similar first; newer facts win similarity ties.
    async fn retrieve_context(
        &self,
        user_id: Uuid,
        query: &str,
        top_k: usize,
    ) -> SakhiResult<Vec<Fact>>;

    /// Aggregate all of a user's facts about one entity (case-insensitive)
    /// into a relationship graph.
    async fn entity_graph(&self, user_id: Uuid, entity: &str) -> SakhiResult<EntityGraph>;

    /// All facts for a user, newest first, capped at `limit`.
    async fn list_all(&self, user_id: Uuid, limit: usize) -> SakhiResult<Vec<Fact>>;

    /// Delete one fact. Returns whether it existed.
    async fn delete_fact(&self, user_id: Uuid, fact_id: Uuid) -> SakhiResult<bool>;

    /// Remove every fact belonging to a user. Returns the removed count.
    async fn purge_user(&self, user_id: Uuid) -> SakhiResult<usize>;
}

type Partition = HashMap<Uuid, HashMap<Uuid, Fact>>;

/// In-memory fact store backed by an embedding provider.
///
/// The outer map is keyed by user id so the per-user partition is
/// structural, not a filter applied after the fact.
pub struct InMemoryFactStore {
    facts: Arc<RwLock<Partition>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl InMemoryFactStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            facts: Arc::new(RwLock::new(HashMap::new())),
            embedder,
        }
    }

    fn read_guard(&self) -> SakhiResult<RwLockReadGuard<'_, Partition>> {
        self.facts
            .read()
            .map_err(|_| SakhiError::Storage(StorageError::LockPoisoned))
    }

    fn write_guard(&self) -> SakhiResult<RwLockWriteGuard<'_, Partition>> {
        self.facts
            .write()
            .map_err(|_| SakhiError::Storage(StorageError::LockPoisoned))
    }

    /// Total fact count across all users.
    pub fn len(&self) -> usize {
        self.facts
            .read()
            .map(|p| p.values().map(|m| m.len()).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Score facts against a query embedding and return the `top_k` best.
/// Facts without an embedding are skipped; ties go to the newer fact.
fn rank_by_similarity(facts: Vec<Fact>, query: &EmbeddingVector, top_k: usize) -> Vec<Fact> {
    let mut scored: Vec<(f32, Fact)> = facts
        .into_iter()
        .filter_map(|fact| {
            let embedding = fact.embedding.as_ref()?;
            let score = embedding.cosine_similarity(query).ok()?;
            Some((score, fact))
        })
        .collect();

    scored.sort_by(|(sa, fa), (sb, fb)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| fb.created_at.cmp(&fa.created_at))
    });

    scored.truncate(top_k);
    scored.into_iter().map(|(_, fact)| fact).collect()
}

#[async_trait]
impl FactStore for InMemoryFactStore {
    async fn store_fact(&self, mut fact: Fact) -> SakhiResult<Fact> {
        if fact.embedding.is_none() {
            let embedding = self.embedder.embed(&fact.document_text()).await?;
            fact.embedding = Some(embedding);
        }

        let mut partition = self.write_guard()?;
        partition
            .entry(fact.user_id)
            .or_default()
            .insert(fact.fact_id, fact.clone());

        tracing::debug!(
            user_id = %fact.user_id,
            entity = %fact.entity,
            "stored fact"
        );
        Ok(fact)
    }

    async fn retrieve_context(
        &self,
        user_id: Uuid,
        query: &str,
        top_k: usize,
    ) -> SakhiResult<Vec<Fact>> {
        if top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;

        let candidates: Vec<Fact> = {
            let partition = self.read_guard()?;
            match partition.get(&user_id) {
                Some(user_facts) => user_facts.values().cloned().collect(),
                None => return Ok(Vec::new()),
            }
        };

        Ok(rank_by_similarity(candidates, &query_embedding, top_k))
    }

    async fn entity_graph(&self, user_id: Uuid, entity: &str) -> SakhiResult<EntityGraph> {
        let partition = self.read_guard()?;
        let mut graph = EntityGraph::new(entity);

        if let Some(user_facts) = partition.get(&user_id) {
            let needle = entity.to_lowercase();
            for fact in user_facts.values() {
                if fact.entity.to_lowercase() == needle {
                    graph.absorb(fact);
                }
            }
        }

        Ok(graph)
    }

    async fn list_all(&self, user_id: Uuid, limit: usize) -> SakhiResult<Vec<Fact>> {
        let partition = self.read_guard()?;
        let mut facts: Vec<Fact> = partition
            .get(&user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();

        facts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        facts.truncate(limit);
        Ok(facts)
    }

    async fn delete_fact(&self, user_id: Uuid, fact_id: Uuid) -> SakhiResult<bool> {
        let mut partition = self.write_guard()?;
        Ok(partition
            .get_mut(&user_id)
            .and_then(|m| m.remove(&fact_id))
            .is_some())
    }

    async fn purge_user(&self, user_id: Uuid) -> SakhiResult<usize> {
        let mut partition = self.write_guard()?;
        let removed = partition.remove(&user_id).map(|m| m.len()).unwrap_or(0);
        tracing::info!(user_id = %user_id, removed, "purged user facts");
        Ok(removed)
    }
}

impl std::fmt::Debug for InMemoryFactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryFactStore")
            .field("facts", &self.len())
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sakhi_llm::MockEmbeddingProvider;

    fn make_test_store() -> InMemoryFactStore {
        InMemoryFactStore::new(Arc::new(MockEmbeddingProvider::new("test-model", 64)))
    }

    fn make_fact(user_id: Uuid, entity: &str, context: &str) -> Fact {
        Fact::new(user_id, entity, "friend", "profession", "dancer", context)
    }

    #[tokio::test]
    async fn test_store_fact_attaches_embedding() {
        let store = make_test_store();
        let user_id = Uuid::now_v7();
        let stored = store
            .store_fact(make_fact(user_id, "Rahul", "My friend Rahul is a dancer"))
            .await
            .unwrap();

        assert!(stored.embedding.is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_respects_user_partition() {
        let store = make_test_store();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();

        store
            .store_fact(make_fact(alice, "Rahul", "My friend Rahul is a dancer"))
            .await
            .unwrap();
        store
            .store_fact(make_fact(bob, "Priya", "My sister Priya is a doctor"))
            .await
            .unwrap();

        let results = store.retrieve_context(alice, "Rahul dancer", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].user_id, alice);
        assert_eq!(results[0].entity, "Rahul");
    }

    #[tokio::test]
    async fn test_retrieve_unknown_user_is_empty() {
        let store = make_test_store();
        let results = store
            .retrieve_context(Uuid::now_v7(), "anything", 5)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_caps_at_top_k() {
        let store = make_test_store();
        let user_id = Uuid::now_v7();

        for i in 0..8 {
            store
                .store_fact(make_fact(user_id, &format!("Person{}", i), "some context"))
                .await
                .unwrap();
        }

        let results = store.retrieve_context(user_id, "person", 5).await.unwrap();
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn test_retrieve_empty_query_is_empty() {
        let store = make_test_store();
        let user_id = Uuid::now_v7();
        store
            .store_fact(make_fact(user_id, "Rahul", "ctx"))
            .await
            .unwrap();

        let results = store.retrieve_context(user_id, "   ", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_most_similar_first() {
        let store = make_test_store();
        let user_id = Uuid::now_v7();

        let target = store
            .store_fact(make_fact(user_id, "Rahul", "My friend Rahul is a dancer"))
            .await
            .unwrap();
        store
            .store_fact(Fact::new(
                user_id,
                "Taxes",
                "event",
                "deadline",
                "next week",
                "Taxes are due next week",
            ))
            .await
            .unwrap();

        // Query identical to the target's document text must rank it first.
        let results = store
            .retrieve_context(user_id, &target.document_text(), 2)
            .await
            .unwrap();
        assert_eq!(results[0].fact_id, target.fact_id);
    }

    #[tokio::test]
    async fn test_store_fact_keeps_existing_embedding() {
        let store = make_test_store();
        let user_id = Uuid::now_v7();
        let mut fact = make_fact(user_id, "Rahul", "ctx");
        fact.embedding = Some(EmbeddingVector::new(vec![0.25; 64]));

        let stored = store.store_fact(fact).await.unwrap();
        assert_eq!(stored.embedding.unwrap().data, vec![0.25; 64]);
    }

    #[tokio::test]
    async fn test_retrieve_by_source_sentence() {
        let store = make_test_store();
        let user_id = Uuid::now_v7();
        let target = store
            .store_fact(make_fact(user_id, "Rahul", "My friend Rahul is a dancer"))
            .await
            .unwrap();

        // The sentence a fact came from must bring it back.
        let results = store
            .retrieve_context(user_id, &target.context, 5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].fact_id, target.fact_id);
    }

    #[tokio::test]
    async fn test_entity_graph_case_insensitive() {
        let store = make_test_store();
        let user_id = Uuid::now_v7();
        store
            .store_fact(make_fact(user_id, "Rahul", "ctx"))
            .await
            .unwrap();

        let graph = store.entity_graph(user_id, "rahul").await.unwrap();
        assert!(!graph.is_empty());
        assert_eq!(graph.attributes["profession"], "dancer");
    }

    #[tokio::test]
    async fn test_entity_graph_unknown_entity_is_empty() {
        let store = make_test_store();
        let graph = store
            .entity_graph(Uuid::now_v7(), "Nobody")
            .await
            .unwrap();
        assert!(graph.is_empty());
    }

    #[tokio::test]
    async fn test_list_all_newest_first_with_limit() {
        let store = make_test_store();
        let user_id = Uuid::now_v7();

        for i in 0..4 {
            store
                .store_fact(make_fact(user_id, &format!("E{}", i), "ctx"))
                .await
                .unwrap();
        }

        let facts = store.list_all(user_id, 3).await.unwrap();
        assert_eq!(facts.len(), 3);
        assert!(facts[0].created_at >= facts[1].created_at);
    }

    #[tokio::test]
    async fn test_delete_fact() {
        let store = make_test_store();
        let user_id = Uuid::now_v7();
        let stored = store
            .store_fact(make_fact(user_id, "Rahul", "ctx"))
            .await
            .unwrap();

        assert!(store.delete_fact(user_id, stored.fact_id).await.unwrap());
        assert!(!store.delete_fact(user_id, stored.fact_id).await.unwrap());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_purge_user_leaves_others_untouched() {
        let store = make_test_store();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();

        store.store_fact(make_fact(alice, "A", "ctx")).await.unwrap();
        store.store_fact(make_fact(alice, "B", "ctx")).await.unwrap();
        store.store_fact(make_fact(bob, "C", "ctx")).await.unwrap();

        let removed = store.purge_user(alice).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.list_all(bob, 10).await.unwrap().len(), 1);
    }
}
