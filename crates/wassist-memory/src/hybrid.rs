use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::models::{
    ConversationRecord, PatternAnalysis, PreferencesUpdate, SimilarMessage, TaskStatus,
    UserPreferences, UserTask,
};
use crate::store::MemoryStore;
use crate::MemoryBackend;

const SEMANTIC_CANDIDATES: usize = 3;
const SEMANTIC_SHOWN: usize = 2;
const PATTERN_WINDOW: usize = 20;
const SNIPPET_CHARS: usize = 100;

/// Structured SQLite memory plus embedding-based recall of past messages.
#[derive(Clone)]
pub struct HybridMemory {
    store: MemoryStore,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl HybridMemory {
    pub fn new(store: MemoryStore, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embeddings }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Past messages of this user ranked by similarity to `text`.
    pub async fn similar_messages(
        &self,
        user_id: &str,
        text: &str,
        limit: usize,
    ) -> Result<Vec<SimilarMessage>> {
        if !self.embeddings.is_semantic() {
            return Ok(Vec::new());
        }
        let query = self.embeddings.embed(&[text.to_string()]).await?;
        let Some(query) = query.embeddings.into_iter().next() else {
            return Ok(Vec::new());
        };

        let stored = self
            .store
            .embeddings_for_user(user_id, self.embeddings.model_id())
            .await?;
        let mut scored: Vec<SimilarMessage> = stored
            .into_iter()
            .filter(|s| s.message_text != text)
            .map(|s| SimilarMessage {
                score: cosine_similarity(&query, &s.embedding),
                conversation_id: s.conversation_id,
                message_text: s.message_text,
                intent: s.intent,
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn embed_message(&self, conversation_id: &str, user_id: &str, text: &str) -> Result<()> {
        let result = self.embeddings.embed(&[text.to_string()]).await?;
        if let Some(vector) = result.embeddings.into_iter().next() {
            self.store
                .upsert_embedding(conversation_id, user_id, self.embeddings.model_id(), vector)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryBackend for HybridMemory {
    async fn get_or_create_user_id(&self, whatsapp_number: &str) -> Result<String> {
        self.store.get_or_create_user(whatsapp_number).await
    }

    async fn store_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.store
            .insert_conversation(conversation_id, user_id, text, at)
            .await?;
        if self.embeddings.is_semantic() {
            if let Err(e) = self.embed_message(conversation_id, user_id, text).await {
                tracing::warn!(%conversation_id, "message stored without embedding: {e:#}");
            }
        }
        Ok(())
    }

    async fn set_conversation_intent(
        &self,
        conversation_id: &str,
        intent: &str,
        payload: serde_json::Value,
    ) -> Result<bool> {
        self.store
            .set_conversation_intent(conversation_id, intent, payload)
            .await
    }

    async fn personalized_context(&self, user_id: &str, message: &str) -> Result<String> {
        let mut parts = Vec::new();

        if let Some(prefs) = self.store.preferences(user_id).await? {
            parts.push("USER PERSONALIZATION:".to_string());
            parts.push(format!("- Preferred email tone: {}", prefs.email_tone));
            parts.push(format!("- Email signature: {}", prefs.email_signoff));
            if !prefs.favorite_locations.is_empty() {
                let top: Vec<&str> = prefs
                    .favorite_locations
                    .iter()
                    .take(3)
                    .map(String::as_str)
                    .collect();
                parts.push(format!(
                    "- Frequently mentioned locations: {}",
                    top.join(", ")
                ));
            }
        }

        let similar = self
            .similar_messages(user_id, message, SEMANTIC_CANDIDATES)
            .await?;
        if !similar.is_empty() {
            parts.push(String::new());
            parts.push("RELEVANT PAST INTERACTIONS:".to_string());
            for msg in similar.iter().take(SEMANTIC_SHOWN) {
                let snippet: String = msg.message_text.chars().take(SNIPPET_CHARS).collect();
                match msg.intent.as_deref() {
                    Some(intent) => parts.push(format!("- [{intent}] {snippet}...")),
                    None => parts.push(format!("- {snippet}...")),
                }
            }
        }

        Ok(parts.join("\n"))
    }

    async fn recent_conversations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>> {
        self.store.recent_conversations(user_id, limit).await
    }

    async fn update_preferences(&self, user_id: &str, update: PreferencesUpdate) -> Result<()> {
        self.store.update_preferences(user_id, update).await
    }

    async fn preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        self.store.preferences(user_id).await
    }

    async fn create_task(
        &self,
        user_id: &str,
        task_type: &str,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<String> {
        self.store
            .create_task(user_id, task_type, description, metadata)
            .await
    }

    async fn tasks(&self, user_id: &str, status: Option<TaskStatus>) -> Result<Vec<UserTask>> {
        self.store.tasks(user_id, status).await
    }

    async fn analyze_patterns(&self, user_id: &str) -> Result<PatternAnalysis> {
        let recent = self
            .store
            .recent_conversations(user_id, PATTERN_WINDOW)
            .await?;
        let pending = self.store.tasks(user_id, Some(TaskStatus::Pending)).await?;
        Ok(summarize_patterns(&recent, pending.len()))
    }
}

fn summarize_patterns(recent: &[ConversationRecord], pending_tasks: usize) -> PatternAnalysis {
    let mut intent_frequency: BTreeMap<String, usize> = BTreeMap::new();
    for conv in recent {
        let intent = conv.intent.clone().unwrap_or_else(|| "unknown".to_string());
        *intent_frequency.entry(intent).or_default() += 1;
    }

    // Ties resolve to the alphabetically first intent.
    let most_common_intent = intent_frequency
        .iter()
        .fold(None::<(&String, usize)>, |best, (intent, &count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((intent, count)),
        })
        .map(|(intent, _)| intent.clone())
        .unwrap_or_else(|| "unknown".to_string());

    PatternAnalysis {
        total_conversations: recent.len(),
        pending_tasks_count: pending_tasks,
        most_common_intent,
        intent_frequency,
        has_pending_tasks: pending_tasks > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingResult, StubEmbeddingProvider};
    use chrono::Duration;

    /// Bag-of-keywords vectors so similarity is predictable in tests.
    struct KeywordEmbeddings;

    const KEYWORDS: [&str; 4] = ["pizza", "email", "meeting", "coffee"];

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbeddings {
        async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult> {
            let embeddings = texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    KEYWORDS
                        .iter()
                        .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect();
            Ok(EmbeddingResult {
                embeddings,
                model: "keywords".into(),
                dimensions: KEYWORDS.len(),
            })
        }

        fn model_id(&self) -> &str {
            "keywords"
        }

        fn dimensions(&self) -> usize {
            KEYWORDS.len()
        }
    }

    fn memory(embeddings: Arc<dyn EmbeddingProvider>) -> HybridMemory {
        HybridMemory::new(MemoryStore::open_in_memory().unwrap(), embeddings)
    }

    #[tokio::test]
    async fn personalized_context_includes_preferences_and_similar() {
        let mem = memory(Arc::new(KeywordEmbeddings));
        let user = mem.get_or_create_user_id("whatsapp:+1").await.unwrap();
        mem.update_preferences(
            &user,
            PreferencesUpdate {
                email_tone: Some("polite".into()),
                favorite_locations: Some(vec!["JBR".into(), "Marina".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let now = Utc::now();
        mem.store_conversation(&user, "c1", "find pizza near JBR", now - Duration::seconds(5))
            .await
            .unwrap();
        mem.set_conversation_intent("c1", "find_place", serde_json::json!({}))
            .await
            .unwrap();
        mem.store_conversation(&user, "c2", "schedule a meeting", now)
            .await
            .unwrap();

        let ctx = mem.personalized_context(&user, "best pizza tonight").await.unwrap();
        assert!(ctx.contains("Preferred email tone: polite"));
        assert!(ctx.contains("Frequently mentioned locations: JBR, Marina"));
        let past = ctx.split("RELEVANT PAST INTERACTIONS:").nth(1).unwrap();
        let first = past.lines().find(|l| l.starts_with("- ")).unwrap();
        assert_eq!(first, "- [find_place] find pizza near JBR...");
    }

    #[tokio::test]
    async fn stub_embeddings_skip_semantic_recall() {
        let mem = memory(Arc::new(StubEmbeddingProvider::new(8)));
        let user = mem.get_or_create_user_id("n").await.unwrap();
        mem.store_conversation(&user, "c1", "find pizza", Utc::now())
            .await
            .unwrap();

        let ctx = mem.personalized_context(&user, "pizza").await.unwrap();
        assert!(ctx.starts_with("USER PERSONALIZATION:"));
        assert!(!ctx.contains("RELEVANT PAST INTERACTIONS"));
        assert!(mem
            .store()
            .embeddings_for_user(&user, "stub")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn analyze_patterns_counts_intents_and_pending_tasks() {
        let mem = memory(Arc::new(StubEmbeddingProvider::new(4)));
        let user = mem.get_or_create_user_id("n").await.unwrap();
        let now = Utc::now();
        for (i, intent) in ["send_email", "find_place", "send_email"].iter().enumerate() {
            let id = format!("c{i}");
            mem.store_conversation(&user, &id, "msg", now + Duration::seconds(i as i64))
                .await
                .unwrap();
            mem.set_conversation_intent(&id, intent, serde_json::json!({}))
                .await
                .unwrap();
        }
        mem.store_conversation(&user, "c9", "raw", now).await.unwrap();
        mem.create_task(&user, "email_task", "email bob", serde_json::json!({}))
            .await
            .unwrap();

        let analysis = mem.analyze_patterns(&user).await.unwrap();
        assert_eq!(analysis.total_conversations, 4);
        assert_eq!(analysis.most_common_intent, "send_email");
        assert_eq!(analysis.intent_frequency.get("send_email"), Some(&2));
        assert_eq!(analysis.intent_frequency.get("unknown"), Some(&1));
        assert_eq!(analysis.pending_tasks_count, 1);
        assert!(analysis.has_pending_tasks);
    }

    #[test]
    fn summarize_patterns_empty_history() {
        let analysis = summarize_patterns(&[], 0);
        assert_eq!(analysis.total_conversations, 0);
        assert_eq!(analysis.most_common_intent, "unknown");
        assert!(!analysis.has_pending_tasks);
    }
}
