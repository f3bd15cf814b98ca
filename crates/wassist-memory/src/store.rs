use crate::migrations::run_migrations;
use crate::models::{
    ConversationRecord, PreferencesUpdate, TaskStatus, UserPreferences, UserTask,
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task;
use uuid::Uuid;

/// Structured memory: users, preferences, tasks and conversation history.
#[derive(Clone)]
pub struct MemoryStore {
    db: Arc<Mutex<Connection>>,
}

/// A stored message embedding, decoded.
#[derive(Debug, Clone)]
pub struct StoredEmbedding {
    pub conversation_id: String,
    pub message_text: String,
    pub intent: Option<String>,
    pub embedding: Vec<f32>,
}

impl MemoryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            f(&conn)
        })
        .await?
    }

    /// Looks a user up by WhatsApp number, creating the user and a default
    /// preferences row on first contact.
    pub async fn get_or_create_user(&self, whatsapp_number: &str) -> Result<String> {
        let number = whatsapp_number.to_owned();
        self.with_conn(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE whatsapp_number = ?1",
                    params![number],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                return Ok(id);
            }

            let id = Uuid::new_v4().to_string();
            let now = Utc::now().to_rfc3339();
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO users (id, whatsapp_number, created_at) VALUES (?1, ?2, ?3)",
                params![id, number, now],
            )?;
            tx.execute(
                "INSERT INTO user_preferences (user_id, updated_at) VALUES (?1, ?2)",
                params![id, now],
            )?;
            tx.commit()?;
            tracing::info!(user_id = %id, "created memory user");
            Ok(id)
        })
        .await
    }

    pub async fn user_id_for(&self, whatsapp_number: &str) -> Result<Option<String>> {
        let number = whatsapp_number.to_owned();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id FROM users WHERE whatsapp_number = ?1",
                    params![number],
                    |r| r.get(0),
                )
                .optional()?)
        })
        .await
    }

    pub async fn preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        let user_id = user_id.to_owned();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    r#"
                    SELECT user_id, email_tone, email_signoff, work_hours, favorite_locations, updated_at
                    FROM user_preferences
                    WHERE user_id = ?1
                    "#,
                    params![user_id],
                    row_to_preferences,
                )
                .optional()?)
        })
        .await
    }

    pub async fn update_preferences(&self, user_id: &str, update: PreferencesUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let user_id = user_id.to_owned();
        self.with_conn(move |conn| {
            let locations = update
                .favorite_locations
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let changed = conn.execute(
                r#"
                UPDATE user_preferences SET
                    email_tone = COALESCE(?2, email_tone),
                    email_signoff = COALESCE(?3, email_signoff),
                    work_hours = COALESCE(?4, work_hours),
                    favorite_locations = COALESCE(?5, favorite_locations),
                    updated_at = ?6
                WHERE user_id = ?1
                "#,
                params![
                    user_id,
                    update.email_tone,
                    update.email_signoff,
                    update.work_hours,
                    locations,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            if changed == 0 {
                return Err(anyhow!("no preferences row for user {user_id}"));
            }
            Ok(())
        })
        .await
    }

    pub async fn create_task(
        &self,
        user_id: &str,
        task_type: &str,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<String> {
        let user_id = user_id.to_owned();
        let task_type = task_type.to_owned();
        let description = description.to_owned();
        self.with_conn(move |conn| {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                r#"
                INSERT INTO user_tasks (id, user_id, task_type, description, status, metadata, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    id,
                    user_id,
                    task_type,
                    description,
                    TaskStatus::Pending.as_str(),
                    serde_json::to_string(&metadata)?,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(id)
        })
        .await
    }

    pub async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<bool> {
        let task_id = task_id.to_owned();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE user_tasks SET status = ?2 WHERE id = ?1",
                params![task_id, status.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn tasks(&self, user_id: &str, status: Option<TaskStatus>) -> Result<Vec<UserTask>> {
        let user_id = user_id.to_owned();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, user_id, task_type, description, status, metadata, created_at
                FROM user_tasks
                WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
                ORDER BY created_at DESC
                "#,
            )?;
            let rows = stmt.query_map(
                params![user_id, status.map(|s| s.as_str())],
                row_to_task,
            )?;
            let mut tasks = Vec::new();
            for row in rows {
                tasks.push(row?);
            }
            Ok(tasks)
        })
        .await
    }

    pub async fn insert_conversation(
        &self,
        id: &str,
        user_id: &str,
        message_text: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let id = id.to_owned();
        let user_id = user_id.to_owned();
        let message_text = message_text.to_owned();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT OR IGNORE INTO conversation_history (
                    id, user_id, message_text, message_type, intent, metadata, created_at
                ) VALUES (?1, ?2, ?3, 'user_input', NULL, '{}', ?4)
                "#,
                params![id, user_id, message_text, at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    /// Attaches the classified intent to an already stored message.
    pub async fn set_conversation_intent(
        &self,
        id: &str,
        intent: &str,
        metadata: serde_json::Value,
    ) -> Result<bool> {
        let id = id.to_owned();
        let intent = intent.to_owned();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE conversation_history SET intent = ?2, metadata = ?3 WHERE id = ?1",
                params![id, intent, serde_json::to_string(&metadata)?],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn recent_conversations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>> {
        let user_id = user_id.to_owned();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, user_id, message_text, message_type, intent, metadata, created_at
                FROM conversation_history
                WHERE user_id = ?1
                ORDER BY created_at DESC
                LIMIT ?2
                "#,
            )?;
            let rows = stmt.query_map(params![user_id, limit as i64], row_to_conversation)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
    }

    pub async fn upsert_embedding(
        &self,
        conversation_id: &str,
        user_id: &str,
        model: &str,
        embedding: Vec<f32>,
    ) -> Result<()> {
        let conversation_id = conversation_id.to_owned();
        let user_id = user_id.to_owned();
        let model = model.to_owned();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO message_embeddings (conversation_id, user_id, model, embedding)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(conversation_id) DO UPDATE SET
                    model = excluded.model,
                    embedding = excluded.embedding
                "#,
                params![
                    conversation_id,
                    user_id,
                    model,
                    serde_json::to_string(&embedding)?
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn embeddings_for_user(
        &self,
        user_id: &str,
        model: &str,
    ) -> Result<Vec<StoredEmbedding>> {
        let user_id = user_id.to_owned();
        let model = model.to_owned();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT e.conversation_id, c.message_text, c.intent, e.embedding
                FROM message_embeddings e
                JOIN conversation_history c ON c.id = e.conversation_id
                WHERE e.user_id = ?1 AND e.model = ?2
                "#,
            )?;
            let rows = stmt.query_map(params![user_id, model], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (conversation_id, message_text, intent, raw) = row?;
                match serde_json::from_str::<Vec<f32>>(&raw) {
                    Ok(embedding) => out.push(StoredEmbedding {
                        conversation_id,
                        message_text,
                        intent,
                        embedding,
                    }),
                    Err(e) => {
                        tracing::warn!(%conversation_id, "skipping corrupt embedding: {e}");
                    }
                }
            }
            Ok(out)
        })
        .await
    }
}

fn parse_datetime_sql(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_preferences(row: &Row<'_>) -> rusqlite::Result<UserPreferences> {
    let locations_raw: String = row.get(4)?;
    let updated_raw: String = row.get(5)?;
    Ok(UserPreferences {
        user_id: row.get(0)?,
        email_tone: row.get(1)?,
        email_signoff: row.get(2)?,
        work_hours: row.get(3)?,
        favorite_locations: serde_json::from_str(&locations_raw).unwrap_or_default(),
        updated_at: parse_datetime_sql(&updated_raw)?,
    })
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<UserTask> {
    let status_raw: String = row.get(4)?;
    let metadata_raw: String = row.get(5)?;
    let created_raw: String = row.get(6)?;
    Ok(UserTask {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task_type: row.get(2)?,
        description: row.get(3)?,
        status: TaskStatus::parse(&status_raw).unwrap_or(TaskStatus::Pending),
        metadata: serde_json::from_str(&metadata_raw).unwrap_or(serde_json::Value::Null),
        created_at: parse_datetime_sql(&created_raw)?,
    })
}

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<ConversationRecord> {
    let metadata_raw: String = row.get(5)?;
    let created_raw: String = row.get(6)?;
    Ok(ConversationRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        message_text: row.get(2)?,
        message_type: row.get(3)?,
        intent: row.get(4)?,
        metadata: serde_json::from_str(&metadata_raw).unwrap_or(serde_json::Value::Null),
        created_at: parse_datetime_sql(&created_raw)?,
    })
}
