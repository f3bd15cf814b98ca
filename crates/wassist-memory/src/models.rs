use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPreferences {
    pub user_id: String,
    pub email_tone: String,
    pub email_signoff: String,
    pub work_hours: String,
    pub favorite_locations: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PreferencesUpdate {
    #[serde(default)]
    pub email_tone: Option<String>,
    #[serde(default)]
    pub email_signoff: Option<String>,
    #[serde(default)]
    pub work_hours: Option<String>,
    #[serde(default)]
    pub favorite_locations: Option<Vec<String>>,
}

impl PreferencesUpdate {
    pub fn is_empty(&self) -> bool {
        self.email_tone.is_none()
            && self.email_signoff.is_none()
            && self.work_hours.is_none()
            && self.favorite_locations.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTask {
    pub id: String,
    pub user_id: String,
    pub task_type: String,
    pub description: String,
    pub status: TaskStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub user_id: String,
    pub message_text: String,
    pub message_type: String,
    pub intent: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternAnalysis {
    pub total_conversations: usize,
    pub pending_tasks_count: usize,
    pub most_common_intent: String,
    pub intent_frequency: BTreeMap<String, usize>,
    pub has_pending_tasks: bool,
}

#[derive(Debug, Clone)]
pub struct SimilarMessage {
    pub conversation_id: String,
    pub message_text: String,
    pub intent: Option<String>,
    pub score: f32,
}
