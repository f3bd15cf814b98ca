use chrono::FixedOffset;
use wassist_memory::ConversationRecord;

use super::Dispatcher;
use crate::replies;

const RECENT_SCAN: usize = 20;
const RECENT_ALL: usize = 10;
const MAX_ITEMS: usize = 5;

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

fn clock_time(record: &ConversationRecord, offset: FixedOffset) -> String {
    record
        .created_at
        .with_timezone(&offset)
        .format("%I:%M %p")
        .to_string()
}

fn intent_of(record: &ConversationRecord) -> &str {
    record.intent.as_deref().unwrap_or("unknown")
}

/// "email john about ..." → "John".
fn email_recipient(message: &str) -> Option<String> {
    let lower = message.to_lowercase();
    let (_, rest) = lower.split_once("to ")?;
    let word = rest.split_whitespace().next()?;
    let mut chars = word.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

/// Renders past activity of one kind (`emails`, `places`, `meetings`) or
/// everything recent.
pub fn render_recall(what: &str, records: &[ConversationRecord], offset: FixedOffset) -> String {
    match what.trim().to_lowercase().as_str() {
        "emails" | "email" => {
            let sent: Vec<_> = records
                .iter()
                .filter(|r| intent_of(r) == "send_email")
                .take(MAX_ITEMS)
                .collect();
            if sent.is_empty() {
                return "📧 *No emails sent today.* You haven't sent any emails recently."
                    .to_string();
            }
            let mut reply = "📧 *Yes, you sent emails today!*\n\n".to_string();
            for record in sent {
                let time = clock_time(record, offset);
                let message = &record.message_text;
                match email_recipient(message) {
                    Some(to) => reply.push_str(&format!(
                        "🕐 *{time}* - Email to {to}\n   📝 {}\n\n",
                        truncate(message, 80)
                    )),
                    None => reply.push_str(&format!("🕐 *{time}* - {}\n\n", truncate(message, 100))),
                }
            }
            reply.trim_end().to_string()
        }
        "places" | "place" => {
            let searches: Vec<_> = records
                .iter()
                .filter(|r| intent_of(r) == "find_place")
                .take(MAX_ITEMS)
                .collect();
            if searches.is_empty() {
                return "🗺️ *No location searches today.* You haven't searched for places recently."
                    .to_string();
            }
            let mut reply = "🗺️ *Yes, you searched for places today!*\n\n".to_string();
            for record in searches {
                reply.push_str(&format!(
                    "🕐 *{}* - {}\n\n",
                    clock_time(record, offset),
                    record.message_text
                ));
            }
            reply.trim_end().to_string()
        }
        "meetings" | "meeting" | "calendar" => {
            let activity: Vec<_> = records
                .iter()
                .filter(|r| {
                    matches!(
                        intent_of(r),
                        "calendar_create" | "calendar_list" | "calendar_delete"
                    )
                })
                .take(MAX_ITEMS)
                .collect();
            if activity.is_empty() {
                return "📅 *No calendar activity today.* You haven't had any calendar activity recently."
                    .to_string();
            }
            let mut reply = "📅 *Yes, you had calendar activity today!*\n\n".to_string();
            for record in activity {
                let action = match intent_of(record) {
                    "calendar_create" => "📝 Created",
                    "calendar_delete" => "🗑️ Deleted",
                    _ => "📋 Checked",
                };
                reply.push_str(&format!(
                    "🕐 *{}* - {action}: {}\n\n",
                    clock_time(record, offset),
                    truncate(&record.message_text, 80)
                ));
            }
            reply.trim_end().to_string()
        }
        _ => {
            if records.is_empty() {
                return "📋 *No recent activity found.* You haven't done anything recently that I can remember."
                    .to_string();
            }
            let mut reply = "📋 *Here's what you did today:*\n\n".to_string();
            for record in records.iter().take(RECENT_ALL) {
                let intent = intent_of(record);
                let emoji = match intent {
                    "send_email" => "📧",
                    "find_place" => "🗺️",
                    "memory_query" => "🧠",
                    i if i.starts_with("calendar") => "📅",
                    _ => "💬",
                };
                reply.push_str(&format!(
                    "🕐 *{}* {emoji} {}\n\n",
                    clock_time(record, offset),
                    truncate(&record.message_text, 70)
                ));
            }
            reply.trim_end().to_string()
        }
    }
}

impl Dispatcher {
    pub(super) async fn recall(&self, sender: &str, what: Option<String>) -> String {
        let Some(memory) = &self.memory else {
            return replies::MEMORY_UNAVAILABLE.to_string();
        };
        let Some(what) = what else {
            return replies::MEMORY_QUERY_MISSING.to_string();
        };
        let lookup = async {
            let user_id = memory.get_or_create_user_id(sender).await?;
            memory.recent_conversations(&user_id, RECENT_SCAN).await
        };
        match tokio::time::timeout(self.timeouts.connector(), lookup).await {
            Ok(Ok(records)) => render_recall(&what, &records, *self.clock.now().offset()),
            Ok(Err(e)) => {
                tracing::warn!(sender = %sender, error = %e, "memory recall failed");
                replies::MEMORY_LOOKUP_FAILED.to_string()
            }
            Err(_) => {
                tracing::warn!(sender = %sender, "memory recall timed out");
                replies::MEMORY_LOOKUP_FAILED.to_string()
            }
        }
    }
}
