use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset};
use wassist_provider::{extract_json_object, LlmProvider, LlmRequest};

use crate::clock::Clock;
use crate::intent::Intent;
use crate::sanitize::sanitize_for_prompt;

/// A classified message together with the raw JSON the model produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub intent: Intent,
    pub payload: serde_json::Value,
}

impl Extraction {
    pub fn from_value(payload: serde_json::Value) -> Self {
        Self {
            intent: Intent::from_value(payload.clone()),
            payload,
        }
    }
}

#[async_trait]
pub trait IntentExtractor: Send + Sync {
    /// `Ok(None)` when the model answered without a JSON object.
    async fn extract(&self, text: &str, context: Option<&str>) -> Result<Option<Extraction>>;
}

pub struct LlmIntentExtractor {
    provider: Arc<dyn LlmProvider>,
    model: String,
    signature: String,
    clock: Arc<dyn Clock>,
}

impl LlmIntentExtractor {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        signature: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            signature: signature.into(),
            clock,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You extract structured instructions from WhatsApp messages and write professional emails signed as {}. \
             Use the provided memory context to personalize responses based on user preferences and past interactions.",
            self.signature
        )
    }
}

#[async_trait]
impl IntentExtractor for LlmIntentExtractor {
    async fn extract(&self, text: &str, context: Option<&str>) -> Result<Option<Extraction>> {
        let sanitized = sanitize_for_prompt(text);
        let mut prompt = build_extraction_prompt(&sanitized, self.clock.now(), &self.signature);
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            prompt = format!("{context}\n\n{prompt}");
        }

        let request =
            LlmRequest::simple(self.model.clone(), Some(self.system_prompt()), prompt).json();
        let response = self
            .provider
            .chat(request)
            .await
            .context("intent extraction call failed")?;

        let Some(json) = extract_json_object(&response.text) else {
            tracing::warn!("extractor reply held no JSON object");
            return Ok(None);
        };
        let payload: serde_json::Value =
            serde_json::from_str(json).context("extractor returned malformed JSON")?;
        if !payload.is_object() {
            return Ok(None);
        }
        Ok(Some(Extraction::from_value(payload)))
    }
}

pub fn build_extraction_prompt(
    user_input: &str,
    now: DateTime<FixedOffset>,
    signature: &str,
) -> String {
    let today = now.format("%Y-%m-%d");
    let long_date = now.format("%A, %B %d, %Y");
    let year = now.format("%Y");
    let tomorrow = (now + Duration::days(1)).format("%Y-%m-%d");
    let offset = now.format("%:z");

    format!(
        r#"You are a helpful assistant that extracts structured info from user messages for contact management, email sending, calendar management, place search, web search or general conversation.

CURRENT DATE CONTEXT: Today is {today} ({long_date}), timezone offset {offset}.

Extract:
- intent: one of "send_email", "add_contact", "lookup_contact", "update_contact", "delete_contact", "list_contacts", "calendar_auth", "calendar_create", "calendar_bulk_create", "calendar_list", "calendar_update", "calendar_delete", "calendar_bulk_delete", "find_place", "place_details", "web_search", "memory_query", otherwise "other"
- recipient_email (the email address to send to, if explicitly mentioned)
- recipient_name (the person's full name if no email is provided)
- subject (a polished, professional subject line based on the message content)
- email_body (a professional, polite email body based on the user's request, always signed off as "{signature}")
- contact_name (full name of the contact for add/update/delete operations)
- contact_email (email address of the contact for add/update operations)
- contact_phone (phone number of the contact for add/update operations)
- lookup_name (name of the contact to look up)
- lookup_field (what to find: "email", "phone", "address", or "all")
- update_field (which field to update: "name", "email", or "phone")
- update_value (new value for the field being updated)
- calendar_summary (event title)
- calendar_start (start datetime in ISO format, e.g. {today}T14:00:00; for deletes extract the date even when it is relative like "today" or "May 26"; if no year is given assume {year})
- calendar_end (end datetime in ISO format)
- calendar_description (event description)
- calendar_event_id (event ID for updating/deleting events, only if the user gives one)
- calendar_field (field to update: "summary", "description", "start", "end")
- calendar_value (new value for the calendar field)
- calendar_events (for calendar_bulk_create only: a list of objects with calendar_summary, calendar_start, calendar_end, calendar_description)
- place_query (what kind of place the user is looking for, or the place name for place_details)
- place_location (the area to search in, "near me", or null when not given)
- search_query (the question to look up for web_search)
- memory_query (what the user wants to know about their past actions: "emails", "places", "meetings", or "all")

User said:
"""{user_input}"""

Examples of calendar intents:
- "setup my calendar" or "connect calendar" -> calendar_auth
- "create meeting tomorrow 2pm to 3pm" -> calendar_create (calendar_start: "{tomorrow}T14:00:00", calendar_end: "{tomorrow}T15:00:00")
- "add gym at 7am and dentist at 5pm tomorrow" -> calendar_bulk_create
- "list my events" or "what's on my calendar" -> calendar_list
- "update meeting title to Team Sync" -> calendar_update (calendar_summary: "meeting", calendar_field: "summary", calendar_value: "Team Sync")
- "Delete My Meeting on May 26" -> calendar_delete (calendar_summary: "My Meeting", calendar_start: "{year}-05-26")
- "delete my event for today" -> calendar_delete (calendar_start: "{today}")
- "clear my calendar tomorrow" -> calendar_bulk_delete (calendar_start: "{tomorrow}")

Examples of place intents:
- "What are the top sushi spots near me?" -> find_place (place_query: "sushi spots", place_location: "near me")
- "Find best pizza in Downtown Dubai" -> find_place (place_query: "best pizza", place_location: "Downtown Dubai")
- "Where can I find good coffee shops?" -> find_place (place_query: "coffee shops", place_location: null)
- "What are the opening hours of Dubai Mall?" -> place_details (place_query: "Dubai Mall")

Examples of other intents:
- "Email Sarah saying I'll be late" -> send_email
- "Add John Smith, email john@example.com, phone 123-456-7890" -> add_contact
- "What's John's email?" -> lookup_contact (lookup_name: "John", lookup_field: "email")
- "Change Sarah's phone number to 555-1234" -> update_contact
- "Remove Sarah from my contact list" -> delete_contact
- "Show all my contacts" -> list_contacts
- "Who won the last world cup?" -> web_search (search_query: "last world cup winner")
- "Did I send any emails today?" -> memory_query (memory_query: "emails")
- "What did I do earlier?" -> memory_query (memory_query: "all")

Respond ONLY with a single flat JSON object containing "intent" and the fields that apply, for example:
{{"intent": "send_email", "recipient_name": "...", "subject": "...", "email_body": "..."}}
If you cannot extract the required fields, set intent to "other"."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{offset_from_hours, FixedClock};
    use chrono::TimeZone;
    use std::sync::Mutex;
    use wassist_provider::LlmResponse;

    struct ScriptedProvider {
        reply: String,
        seen: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedProvider {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(LlmResponse {
                text: self.reply.clone(),
                input_tokens: None,
                output_tokens: None,
                stop_reason: Some("end_turn".into()),
            })
        }
    }

    fn clock() -> Arc<dyn Clock> {
        let at = offset_from_hours(4)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 19, 9, 0, 0)
            .unwrap();
        Arc::new(FixedClock::new(at))
    }

    fn extractor(provider: Arc<ScriptedProvider>) -> LlmIntentExtractor {
        LlmIntentExtractor::new(provider, "gpt-4o", "Rahul Menon", clock())
    }

    #[test]
    fn prompt_carries_date_context_and_input() {
        let prompt = build_extraction_prompt("Email Sarah", clock().now(), "Rahul Menon");
        assert!(prompt.contains("Today is 2026-10-19 (Monday, October 19, 2026)"));
        assert!(prompt.contains("\"\"\"Email Sarah\"\"\""));
        assert!(prompt.contains("signed off as \"Rahul Menon\""));
        assert!(prompt.contains("2026-10-20T14:00:00"));
    }

    #[tokio::test]
    async fn extracts_intent_and_keeps_payload() {
        let provider = ScriptedProvider::new(
            r#"{"intent": "find_place", "place_query": "coffee shops", "place_location": null}"#,
        );
        let extraction = extractor(provider.clone())
            .extract("Find good \"coffee\" shops\n", Some("USER PERSONALIZATION:\n- tone"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            extraction.intent,
            Intent::FindPlace {
                place_query: Some("coffee shops".into()),
                place_location: None
            }
        );
        assert_eq!(extraction.payload["intent"], "find_place");

        let seen = provider.seen.lock().unwrap();
        let request = &seen[0];
        assert!(request.json_mode);
        assert_eq!(request.model, "gpt-4o");
        let user = &request.messages[0].content;
        assert!(user.starts_with("USER PERSONALIZATION:"));
        assert!(user.contains("Find good 'coffee' shops"));
    }

    #[tokio::test]
    async fn prose_reply_is_no_extraction() {
        let provider = ScriptedProvider::new("Sorry, I can't help with that.");
        let extraction = extractor(provider).extract("hello", None).await.unwrap();
        assert!(extraction.is_none());
    }

    #[tokio::test]
    async fn broken_json_is_an_error() {
        let provider = ScriptedProvider::new(r#"{"intent": send_email}"#);
        let result = extractor(provider).extract("hello", None).await;
        assert!(result.is_err());
    }
}
