pub mod embedding;
pub mod hybrid;
pub mod migrations;
pub mod models;
pub mod store;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use embedding::{EmbeddingProvider, OpenAiEmbeddingProvider, StubEmbeddingProvider};
pub use hybrid::HybridMemory;
pub use models::*;
pub use store::MemoryStore;

/// Per-user long-term memory. Every call is best-effort from the caller's
/// point of view: failures are logged, never surfaced to the user.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    async fn get_or_create_user_id(&self, whatsapp_number: &str) -> Result<String>;

    async fn store_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Returns false when no message with `conversation_id` was stored.
    async fn set_conversation_intent(
        &self,
        conversation_id: &str,
        intent: &str,
        payload: serde_json::Value,
    ) -> Result<bool>;

    async fn personalized_context(&self, user_id: &str, message: &str) -> Result<String>;

    async fn recent_conversations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>>;

    async fn update_preferences(&self, user_id: &str, update: PreferencesUpdate) -> Result<()>;

    async fn preferences(&self, user_id: &str) -> Result<Option<UserPreferences>>;

    async fn create_task(
        &self,
        user_id: &str,
        task_type: &str,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<String>;

    async fn tasks(&self, user_id: &str, status: Option<TaskStatus>) -> Result<Vec<UserTask>>;

    async fn analyze_patterns(&self, user_id: &str) -> Result<PatternAnalysis>;
}
