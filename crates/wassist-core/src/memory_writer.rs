//! Background worker that applies queued memory writes.
//!
//! The dispatcher publishes [`MemoryWrite`]s on the bus and moves on; this
//! worker drains them in order. Failures are logged and dropped.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;
use wassist_bus::{EventBus, Topic};
use wassist_memory::{MemoryBackend, PreferencesUpdate, UserPreferences};
use wassist_schema::{BusMessage, MemoryWrite};

const POLITE_MARKERS: [&str; 3] = ["please", "kindly", "would appreciate"];
const DIRECT_MARKERS: [&str; 3] = ["urgent", "asap", "immediately"];
// Texts of conversations still waiting for their intent.
const MAX_PENDING_TEXTS: usize = 256;

/// Task recorded for an intent, if it creates one.
pub fn task_type_for(intent: &str) -> Option<&'static str> {
    match intent {
        "send_email" => Some("email_task"),
        "calendar_create" => Some("calendar_task"),
        "add_contact" => Some("contact_task"),
        "find_place" => Some("location_task"),
        _ => None,
    }
}

fn payload_text<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).map(str::trim)
}

/// Preferences implied by one classified message.
pub fn learned_preferences(
    intent: &str,
    payload: &Value,
    current: Option<&UserPreferences>,
) -> PreferencesUpdate {
    let mut update = PreferencesUpdate::default();
    match intent {
        "send_email" => {
            let body = payload_text(payload, "email_body")
                .unwrap_or_default()
                .to_lowercase();
            if POLITE_MARKERS.iter().any(|m| body.contains(m)) {
                update.email_tone = Some("polite".to_string());
            } else if DIRECT_MARKERS.iter().any(|m| body.contains(m)) {
                update.email_tone = Some("direct".to_string());
            }
        }
        "find_place" => {
            let location = payload_text(payload, "place_location").filter(|l| {
                !l.is_empty()
                    && !matches!(l.to_lowercase().as_str(), "near me" | "null" | "none")
            });
            if let Some(location) = location {
                let mut favorites = current
                    .map(|p| p.favorite_locations.clone())
                    .unwrap_or_default();
                if !favorites.iter().any(|f| f == location) {
                    favorites.push(location.to_string());
                    update.favorite_locations = Some(favorites);
                }
            }
        }
        _ => {}
    }
    update
}

pub struct MemoryWriter {
    memory: Arc<dyn MemoryBackend>,
    pending_texts: HashMap<Uuid, String>,
}

impl MemoryWriter {
    pub fn new(memory: Arc<dyn MemoryBackend>) -> Self {
        Self {
            memory,
            pending_texts: HashMap::new(),
        }
    }

    /// Subscribes to memory writes and drains them on a background task.
    pub async fn spawn(self, bus: &EventBus) -> JoinHandle<()> {
        let rx = bus.subscribe(Topic::MemoryWriteRequested).await;
        tokio::spawn(self.run(rx))
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<BusMessage>) {
        while let Some(msg) = rx.recv().await {
            let BusMessage::MemoryWriteRequested { write } = msg else {
                continue;
            };
            if let Err(e) = self.apply(&write).await {
                tracing::warn!(sender = %write.sender(), error = %e, "memory write failed");
            }
        }
        tracing::debug!("memory writer stopped");
    }

    pub async fn apply(&mut self, write: &MemoryWrite) -> Result<()> {
        match write {
            MemoryWrite::Conversation {
                trace_id,
                sender,
                text,
                at,
            } => {
                let user_id = self.memory.get_or_create_user_id(sender).await?;
                self.memory
                    .store_conversation(&user_id, &trace_id.to_string(), text, *at)
                    .await?;
                if self.pending_texts.len() >= MAX_PENDING_TEXTS {
                    self.pending_texts.clear();
                }
                self.pending_texts.insert(*trace_id, text.clone());
                tracing::debug!(sender = %sender, trace_id = %trace_id, "conversation stored");
            }
            MemoryWrite::IntentClassified {
                trace_id,
                sender,
                intent,
                payload,
            } => {
                let text = self.pending_texts.remove(trace_id);
                let user_id = self.memory.get_or_create_user_id(sender).await?;
                let tagged = self
                    .memory
                    .set_conversation_intent(&trace_id.to_string(), intent, payload.clone())
                    .await?;
                if !tagged {
                    tracing::debug!(trace_id = %trace_id, "no stored conversation to tag");
                }

                let current = self.memory.preferences(&user_id).await?;
                let update = learned_preferences(intent, payload, current.as_ref());
                if !update.is_empty() {
                    self.memory.update_preferences(&user_id, update).await?;
                    tracing::info!(sender = %sender, intent = %intent, "preferences learned");
                }

                if let Some(task_type) = task_type_for(intent) {
                    let description = text.unwrap_or_else(|| intent.clone());
                    self.memory
                        .create_task(&user_id, task_type, &description, payload.clone())
                        .await?;
                }
            }
        }
        Ok(())
    }
}
