//! In-memory conversation state, keyed by sender.
//!
//! Each sender has at most one delayed reply, one email draft awaiting
//! approval and one place query awaiting a location. Nothing expires by time
//! and nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct SenderSlots {
    delayed: Option<String>,
    draft: Option<EmailDraft>,
    pending_place: Option<String>,
}

impl SenderSlots {
    fn is_empty(&self) -> bool {
        self.delayed.is_none() && self.draft.is_none() && self.pending_place.is_none()
    }
}

#[derive(Clone, Default)]
pub struct ConversationStore {
    slots: Arc<Mutex<HashMap<String, SenderSlots>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<R>(&self, sender: &str, f: impl FnOnce(&mut SenderSlots) -> R) -> R {
        let mut slots = self.slots.lock().await;
        let entry = slots.entry(sender.to_string()).or_default();
        let out = f(entry);
        if entry.is_empty() {
            slots.remove(sender);
        }
        out
    }

    async fn read<R>(&self, sender: &str, f: impl FnOnce(&SenderSlots) -> R) -> Option<R> {
        self.slots.lock().await.get(sender).map(f)
    }

    /// Removes and returns the delayed reply, if any.
    pub async fn take_delayed(&self, sender: &str) -> Option<String> {
        self.update(sender, |s| s.delayed.take()).await
    }

    /// Stores a reply for replay; replaces any earlier one.
    pub async fn set_delayed(&self, sender: &str, reply: impl Into<String>) {
        let reply = reply.into();
        self.update(sender, |s| s.delayed = Some(reply)).await;
    }

    pub async fn draft(&self, sender: &str) -> Option<EmailDraft> {
        self.read(sender, |s| s.draft.clone()).await.flatten()
    }

    /// Installs `draft` as the sender's only draft.
    pub async fn set_draft(&self, sender: &str, draft: EmailDraft) {
        self.update(sender, |s| s.draft = Some(draft)).await;
    }

    pub async fn clear_draft(&self, sender: &str) {
        self.update(sender, |s| s.draft = None).await;
    }

    pub async fn take_draft(&self, sender: &str) -> Option<EmailDraft> {
        self.update(sender, |s| s.draft.take()).await
    }

    pub async fn pending_place(&self, sender: &str) -> Option<String> {
        self.read(sender, |s| s.pending_place.clone())
            .await
            .flatten()
    }

    pub async fn set_pending_place(&self, sender: &str, term: impl Into<String>) {
        let term = term.into();
        self.update(sender, |s| s.pending_place = Some(term)).await;
    }

    pub async fn take_pending_place(&self, sender: &str) -> Option<String> {
        self.update(sender, |s| s.pending_place.take()).await
    }

    pub async fn clear_pending_place(&self, sender: &str) {
        self.update(sender, |s| s.pending_place = None).await;
    }

    /// Number of senders with any state at all.
    pub async fn active_senders(&self) -> usize {
        self.slots.lock().await.len()
    }
}
