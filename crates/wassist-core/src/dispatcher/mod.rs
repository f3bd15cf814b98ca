//! Turns one inbound message into exactly one reply.
//!
//! A message from a sender is handled while holding that sender's lock, so
//! the draft and place-query slots change atomically with respect to the
//! sender's next message. The order of checks:
//!
//! 1. voice note → transcribe
//! 2. date/time question → answer from the clock
//! 3. pending email draft → approve, cancel or revise
//! 4. pending place query → this message is the location
//! 5. extract an intent and route it to a handler
//!
//! Every external call is bounded by a timeout and degrades to a reply.

mod calendar;
mod contacts;
mod email;
mod places;
mod recall;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use wassist_bus::BusPublisher;
use wassist_memory::MemoryBackend;
use wassist_schema::{BusMessage, InboundMessage, MemoryWrite, OutboundMessage};

use crate::clock::{answer_date_time, Clock};
use crate::config::TimeoutsConfig;
use crate::connectors::{
    Calendar, ConnectorResult, ContactBook, EmailSender, PlaceSearch, Transcriber, WebSearch,
};
use crate::error::ConnectorError;
use crate::extractor::{Extraction, IntentExtractor};
use crate::heuristic::looks_like_search;
use crate::intent::Intent;
use crate::replies::{self, Service};
use crate::reviser::DraftReviser;
use crate::sender_lock::SenderLocks;
use crate::state::ConversationStore;

pub use recall::render_recall;

/// The action services a dispatcher talks to.
#[derive(Clone)]
pub struct Connectors {
    pub email: Arc<dyn EmailSender>,
    pub contacts: Arc<dyn ContactBook>,
    pub calendar: Arc<dyn Calendar>,
    pub places: Arc<dyn PlaceSearch>,
    /// `None` when web search is disabled.
    pub web_search: Option<Arc<dyn WebSearch>>,
    pub transcriber: Arc<dyn Transcriber>,
}

pub struct Dispatcher {
    state: ConversationStore,
    locks: SenderLocks,
    extractor: Arc<dyn IntentExtractor>,
    reviser: Arc<dyn DraftReviser>,
    connectors: Connectors,
    memory: Option<Arc<dyn MemoryBackend>>,
    publisher: BusPublisher,
    clock: Arc<dyn Clock>,
    timeouts: TimeoutsConfig,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: ConversationStore,
        extractor: Arc<dyn IntentExtractor>,
        reviser: Arc<dyn DraftReviser>,
        connectors: Connectors,
        memory: Option<Arc<dyn MemoryBackend>>,
        publisher: BusPublisher,
        clock: Arc<dyn Clock>,
        timeouts: TimeoutsConfig,
    ) -> Self {
        Self {
            state,
            locks: SenderLocks::new(),
            extractor,
            reviser,
            connectors,
            memory,
            publisher,
            clock,
            timeouts,
        }
    }

    pub fn state(&self) -> &ConversationStore {
        &self.state
    }

    pub async fn handle_inbound(&self, inbound: &InboundMessage) -> OutboundMessage {
        let text = {
            let _guard = self.locks.acquire(&inbound.sender).await;
            self.route(inbound).await
        };
        self.locks.cleanup_unused().await;
        OutboundMessage::reply_to(inbound, text)
    }

    async fn route(&self, inbound: &InboundMessage) -> String {
        let sender = inbound.sender.as_str();

        let text = match inbound.audio() {
            Some(audio) => match self.transcribe(sender, &audio.url).await {
                Some(transcript) => transcript,
                None => return replies::TRANSCRIPTION_FAILED.to_string(),
            },
            None => inbound.text.trim().to_string(),
        };

        if let Some(answer) = answer_date_time(&text, self.clock.now()) {
            tracing::info!(sender = %sender, route = "clock", "answered locally");
            return answer;
        }

        if let Some(draft) = self.state.draft(sender).await {
            tracing::info!(sender = %sender, route = "draft", "reply to pending draft");
            return self.continue_draft(sender, draft, &text).await;
        }

        if let Some(term) = self.state.take_pending_place(sender).await {
            tracing::warn!(
                sender = %sender,
                term = %term,
                location = %text,
                "using whole message as location for pending place search"
            );
            return self.search_places(&term, Some(&text)).await;
        }

        self.request_memory_write(MemoryWrite::Conversation {
            trace_id: inbound.trace_id,
            sender: sender.to_string(),
            text: text.clone(),
            at: inbound.at,
        })
        .await;

        match self.extract(sender, &text).await {
            Some(Extraction { intent, payload }) => {
                self.request_memory_write(MemoryWrite::IntentClassified {
                    trace_id: inbound.trace_id,
                    sender: sender.to_string(),
                    intent: intent.tag().to_string(),
                    payload,
                })
                .await;
                tracing::info!(sender = %sender, intent = intent.tag(), "dispatching intent");
                self.dispatch_intent(sender, &text, intent).await
            }
            None => self.fallback(&text).await,
        }
    }

    async fn dispatch_intent(&self, sender: &str, text: &str, intent: Intent) -> String {
        match intent {
            Intent::SendEmail {
                recipient_email,
                recipient_name,
                subject,
                email_body,
            } => {
                self.propose_email(sender, recipient_email, recipient_name, subject, email_body)
                    .await
            }
            Intent::AddContact {
                contact_name,
                contact_email,
                contact_phone,
            } => self.add_contact(contact_name, contact_email, contact_phone).await,
            Intent::LookupContact {
                lookup_name,
                lookup_field,
            } => self.lookup_contact(lookup_name, lookup_field).await,
            Intent::UpdateContact {
                contact_name,
                update_field,
                update_value,
            } => {
                self.update_contact(contact_name, update_field, update_value)
                    .await
            }
            Intent::DeleteContact { contact_name } => self.delete_contact(contact_name).await,
            Intent::ListContacts => self.list_contacts().await,
            Intent::CalendarAuth => self.check_calendar().await,
            Intent::CalendarCreate { event } => self.create_event(&event).await,
            Intent::CalendarBulkCreate { calendar_events } => {
                self.create_events(&calendar_events).await
            }
            Intent::CalendarList => self.list_events().await,
            Intent::CalendarUpdate {
                calendar_event_id,
                calendar_summary,
                calendar_field,
                calendar_value,
            } => {
                self.update_event(
                    calendar_event_id,
                    calendar_summary,
                    calendar_field,
                    calendar_value,
                )
                .await
            }
            Intent::CalendarDelete {
                calendar_event_id,
                calendar_start,
                calendar_summary,
            } => {
                self.delete_event(calendar_event_id, calendar_start, calendar_summary)
                    .await
            }
            Intent::CalendarBulkDelete { calendar_start } => {
                self.clear_day(calendar_start).await
            }
            Intent::FindPlace {
                place_query,
                place_location,
            } => self.find_place(sender, place_query, place_location).await,
            Intent::PlaceDetails { place_query } => self.describe_place(place_query).await,
            Intent::WebSearch { search_query } => {
                let query = search_query.unwrap_or_else(|| text.to_string());
                match &self.connectors.web_search {
                    Some(_) => self.web_search(&query).await,
                    None => replies::WEB_SEARCH_UNAVAILABLE.to_string(),
                }
            }
            Intent::MemoryQuery { memory_query } => self.recall(sender, memory_query).await,
            Intent::Other => self.fallback(text).await,
        }
    }

    /// Unclassified text: web search if it reads like a question, else the
    /// capability overview.
    async fn fallback(&self, text: &str) -> String {
        if self.connectors.web_search.is_some() && looks_like_search(text) {
            tracing::info!(route = "web_search_fallback", "text looks like a search");
            return self.web_search(text).await;
        }
        replies::generic_reply(text)
    }

    async fn web_search(&self, query: &str) -> String {
        let Some(search) = &self.connectors.web_search else {
            return replies::WEB_SEARCH_UNAVAILABLE.to_string();
        };
        match self.bounded("web search", search.search(query)).await {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!(error = %err, "web search failed");
                match err {
                    ConnectorError::NotAuthenticated(_) | ConnectorError::PermissionDenied(_) => {
                        replies::connector_failure("search the web", Service::WebSearch, &err)
                    }
                    _ => replies::WEB_SEARCH_FAILED.to_string(),
                }
            }
        }
    }

    async fn transcribe(&self, sender: &str, url: &str) -> Option<String> {
        let limit = self.timeouts.transcription();
        match tokio::time::timeout(limit, self.connectors.transcriber.transcribe(url)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                tracing::info!(sender = %sender, chars = text.len(), "voice note transcribed");
                Some(text.trim().to_string())
            }
            Ok(Ok(_)) => {
                tracing::warn!(sender = %sender, "transcription was empty");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(sender = %sender, error = %e, "transcription failed");
                None
            }
            Err(_) => {
                tracing::warn!(sender = %sender, "transcription timed out");
                None
            }
        }
    }

    async fn extract(&self, sender: &str, text: &str) -> Option<Extraction> {
        let context = self.personalized_context(sender, text).await;
        let limit = self.timeouts.extractor();
        match tokio::time::timeout(limit, self.extractor.extract(text, context.as_deref())).await {
            Ok(Ok(Some(extraction))) => Some(extraction),
            Ok(Ok(None)) => {
                tracing::warn!(sender = %sender, "extractor returned no JSON");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(sender = %sender, error = %e, "intent extraction failed");
                None
            }
            Err(_) => {
                tracing::warn!(sender = %sender, timeout_secs = limit.as_secs(), "intent extraction timed out");
                None
            }
        }
    }

    async fn personalized_context(&self, sender: &str, text: &str) -> Option<String> {
        let memory = self.memory.as_ref()?;
        let lookup = async {
            let user_id = memory.get_or_create_user_id(sender).await?;
            memory.personalized_context(&user_id, text).await
        };
        match tokio::time::timeout(self.timeouts.connector(), lookup).await {
            Ok(Ok(context)) if !context.trim().is_empty() => Some(context),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                tracing::warn!(sender = %sender, error = %e, "memory context unavailable");
                None
            }
            Err(_) => {
                tracing::warn!(sender = %sender, "memory context timed out");
                None
            }
        }
    }

    /// Queues a memory write without waiting for it to be applied.
    async fn request_memory_write(&self, write: MemoryWrite) {
        if let Err(e) = self
            .publisher
            .publish(BusMessage::MemoryWriteRequested { write })
            .await
        {
            tracing::warn!(error = %e, "failed to queue memory write");
        }
    }

    async fn bounded<T, F>(&self, what: &str, call: F) -> ConnectorResult<T>
    where
        F: Future<Output = ConnectorResult<T>>,
    {
        bounded(self.timeouts.connector(), what, call).await
    }
}

/// Runs `call`, mapping an elapsed `limit` to [`ConnectorError::Timeout`].
pub(crate) async fn bounded<T, F>(limit: Duration, what: &str, call: F) -> ConnectorResult<T>
where
    F: Future<Output = ConnectorResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ConnectorError::Timeout(format!(
            "{what} did not finish within {}s",
            limit.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bounded_maps_elapsed_to_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, ConnectorError>(())
        };
        let err = bounded(Duration::from_secs(5), "calendar list", slow)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ConnectorError::Timeout("calendar list did not finish within 5s".into())
        );
    }

    #[tokio::test]
    async fn bounded_passes_results_through() {
        let ok = bounded(Duration::from_secs(5), "x", async { Ok::<_, ConnectorError>(7) }).await;
        assert_eq!(ok, Ok(7));
    }
}
