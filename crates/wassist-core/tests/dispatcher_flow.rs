use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use serde_json::{json, Value};
use wassist_bus::{EventBus, Topic};
use wassist_core::connectors::{
    Calendar, CalendarEvent, Contact, ContactBook, ContactField, EmailSender, EventPatch,
    EventTime, NewEvent, PlaceDetails, PlaceResult, PlaceSearch, Transcriber, WebSearch,
};
use wassist_core::{
    offset_from_hours, replies, ConnectorError, Connectors, ConversationStore, Dispatcher,
    DraftReviser, EmailDraft, Extraction, FixedClock, IntentExtractor, TimeoutsConfig,
};
use wassist_schema::{Attachment, BusMessage, InboundMessage, MemoryWrite};

const SENDER: &str = "whatsapp:+971500000001";

type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

fn now() -> DateTime<FixedOffset> {
    offset_from_hours(4)
        .unwrap()
        .with_ymd_and_hms(2026, 10, 19, 9, 0, 0)
        .unwrap()
}

// ---- fakes ----

#[derive(Default)]
struct ScriptedExtractor {
    replies: HashMap<String, Value>,
    fail: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    fn on(mut self, text: &str, payload: Value) -> Self {
        self.replies.insert(text.to_string(), payload);
        self
    }

    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl IntentExtractor for ScriptedExtractor {
    async fn extract(&self, text: &str, _context: Option<&str>) -> Result<Option<Extraction>> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(anyhow!("model unavailable"));
        }
        Ok(self.replies.get(text).cloned().map(Extraction::from_value))
    }
}

enum Revision {
    Rewrite(&'static str),
    Fail,
    Hang,
}

struct FakeReviser(Revision);

#[async_trait]
impl DraftReviser for FakeReviser {
    async fn revise(&self, draft: &EmailDraft, _instruction: &str) -> Result<EmailDraft> {
        match self.0 {
            Revision::Rewrite(body) => Ok(EmailDraft {
                to: draft.to.clone(),
                subject: format!("{} (revised)", draft.subject),
                body: body.to_string(),
            }),
            Revision::Fail => Err(anyhow!("no JSON in revision")),
            Revision::Hang => {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Err(anyhow!("unreachable"))
            }
        }
    }
}

#[derive(Default)]
struct RecordingEmail {
    sent: Mutex<Vec<(String, String, String)>>,
    fail: bool,
}

impl RecordingEmail {
    fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send(&self, to: &str, subject: &str, body: &str) -> ConnectorResult<String> {
        self.sent
            .lock()
            .unwrap()
            .push((to.into(), subject.into(), body.into()));
        if self.fail {
            return Err(ConnectorError::Other("HTTP 422: invalid from address".into()));
        }
        Ok("msg_1".into())
    }
}

#[derive(Default)]
struct FakeContacts {
    rows: Mutex<Vec<Contact>>,
}

impl FakeContacts {
    fn with(contacts: Vec<Contact>) -> Self {
        Self {
            rows: Mutex::new(contacts),
        }
    }
}

#[async_trait]
impl ContactBook for FakeContacts {
    async fn list(&self) -> ConnectorResult<Vec<Contact>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn add(&self, contact: &Contact) -> ConnectorResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|c| c.full_name.eq_ignore_ascii_case(&contact.full_name))
        {
            return Ok(false);
        }
        rows.push(contact.clone());
        Ok(true)
    }

    async fn update(
        &self,
        name: &str,
        field: ContactField,
        value: &str,
    ) -> ConnectorResult<Contact> {
        let mut rows = self.rows.lock().unwrap();
        let contact = rows
            .iter_mut()
            .find(|c| c.full_name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ConnectorError::NotFound(name.into()))?;
        match field {
            ContactField::Name => contact.full_name = value.into(),
            ContactField::Email => contact.email = value.into(),
            ContactField::Phone => contact.phone = value.into(),
        }
        Ok(contact.clone())
    }

    async fn delete(&self, name: &str) -> ConnectorResult<Contact> {
        let mut rows = self.rows.lock().unwrap();
        let index = rows
            .iter()
            .position(|c| c.full_name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ConnectorError::NotFound(name.into()))?;
        Ok(rows.remove(index))
    }
}

#[derive(Default)]
struct FakeCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    deleted: Mutex<Vec<String>>,
    deny: Option<ConnectorError>,
}

impl FakeCalendar {
    fn with(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Default::default()
        }
    }

    fn denying(err: ConnectorError) -> Self {
        Self {
            deny: Some(err),
            ..Default::default()
        }
    }

    fn check(&self) -> ConnectorResult<()> {
        match &self.deny {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn event(id: &str, summary: &str, start: &str) -> CalendarEvent {
    CalendarEvent {
        id: id.into(),
        summary: summary.into(),
        start: EventTime::parse(start, *now().offset()).unwrap(),
        end: None,
        html_link: Some(format!("https://calendar.example/{id}")),
    }
}

#[async_trait]
impl Calendar for FakeCalendar {
    async fn check_access(&self) -> ConnectorResult<String> {
        self.check()?;
        Ok("primary".into())
    }

    async fn create(&self, new: &NewEvent) -> ConnectorResult<CalendarEvent> {
        self.check()?;
        let created = CalendarEvent {
            id: "evt_new".into(),
            summary: new.summary.clone(),
            start: new.start,
            end: Some(new.end),
            html_link: Some("https://calendar.example/evt_new".into()),
        };
        self.events.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn list(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
        max: usize,
    ) -> ConnectorResult<Vec<CalendarEvent>> {
        self.check()?;
        let (from, to) = (from.date_naive(), to.date_naive());
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.start.date() >= from && e.start.date() < to)
            .take(max)
            .cloned()
            .collect())
    }

    async fn update(&self, event_id: &str, patch: &EventPatch) -> ConnectorResult<CalendarEvent> {
        self.check()?;
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| ConnectorError::NotFound(event_id.into()))?;
        if let EventPatch::Summary(summary) = patch {
            event.summary = summary.clone();
        }
        Ok(event.clone())
    }

    async fn delete(&self, event_id: &str) -> ConnectorResult<()> {
        self.check()?;
        self.events.lock().unwrap().retain(|e| e.id != event_id);
        self.deleted.lock().unwrap().push(event_id.into());
        Ok(())
    }
}

#[derive(Default)]
struct FakePlaces {
    searches: Mutex<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl PlaceSearch for FakePlaces {
    async fn search(
        &self,
        query: &str,
        location: Option<&str>,
    ) -> ConnectorResult<Vec<PlaceResult>> {
        self.searches
            .lock()
            .unwrap()
            .push((query.into(), location.map(str::to_string)));
        Ok(vec![PlaceResult {
            name: "Arabica".into(),
            address: Some("Marina Walk, Dubai".into()),
            rating: Some(4.6),
            place_id: Some("p1".into()),
        }])
    }

    async fn details(&self, _query: &str) -> ConnectorResult<Option<PlaceDetails>> {
        Ok(None)
    }
}

#[derive(Default)]
struct FakeWebSearch {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl WebSearch for FakeWebSearch {
    async fn search(&self, query: &str) -> ConnectorResult<String> {
        self.queries.lock().unwrap().push(query.into());
        Ok(format!("🔍 Search results for: {query}"))
    }
}

struct FakeTranscriber(Option<&'static str>);

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _media_url: &str) -> Result<String> {
        self.0
            .map(str::to_string)
            .ok_or_else(|| anyhow!("whisper returned 500"))
    }
}

// ---- harness ----

struct Harness {
    dispatcher: Dispatcher,
    bus: EventBus,
    extractor: Arc<ScriptedExtractor>,
    email: Arc<RecordingEmail>,
    contacts: Arc<FakeContacts>,
    calendar: Arc<FakeCalendar>,
    places: Arc<FakePlaces>,
    web: Arc<FakeWebSearch>,
}

struct Setup {
    extractor: ScriptedExtractor,
    reviser: Revision,
    email: RecordingEmail,
    contacts: FakeContacts,
    calendar: FakeCalendar,
    transcript: Option<&'static str>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            extractor: ScriptedExtractor::default(),
            reviser: Revision::Rewrite("Dear Sarah, I will be late. Regards"),
            email: RecordingEmail::default(),
            contacts: FakeContacts::with(vec![
                Contact::new("Sarah Connor").with_email("sarah@x.com")
            ]),
            calendar: FakeCalendar::default(),
            transcript: None,
        }
    }
}

impl Setup {
    fn build(self) -> Harness {
        let bus = EventBus::new(64);
        let extractor = Arc::new(self.extractor);
        let email = Arc::new(self.email);
        let contacts = Arc::new(self.contacts);
        let calendar = Arc::new(self.calendar);
        let places = Arc::new(FakePlaces::default());
        let web = Arc::new(FakeWebSearch::default());
        let connectors = Connectors {
            email: email.clone(),
            contacts: contacts.clone(),
            calendar: calendar.clone(),
            places: places.clone(),
            web_search: Some(web.clone() as Arc<dyn WebSearch>),
            transcriber: Arc::new(FakeTranscriber(self.transcript)),
        };
        let dispatcher = Dispatcher::new(
            ConversationStore::new(),
            extractor.clone(),
            Arc::new(FakeReviser(self.reviser)),
            connectors,
            None,
            bus.publisher(),
            Arc::new(FixedClock::new(now())),
            TimeoutsConfig::default(),
        );
        Harness {
            dispatcher,
            bus,
            extractor,
            email,
            contacts,
            calendar,
            places,
            web,
        }
    }
}

impl Harness {
    async fn say(&self, text: &str) -> String {
        let inbound = InboundMessage::new("whatsapp", SENDER, text);
        self.dispatcher.handle_inbound(&inbound).await.text
    }
}

fn email_intent() -> Value {
    json!({
        "intent": "send_email",
        "recipient_name": "Sarah",
        "subject": "Running late",
        "email_body": "Hi Sarah, I'll be late.\n\nRahul Menon"
    })
}

fn email_setup() -> Setup {
    Setup {
        extractor: ScriptedExtractor::default()
            .on("Email Sarah saying I'll be late", email_intent()),
        ..Default::default()
    }
}

// ---- email approval ----

#[tokio::test]
async fn email_draft_resolves_contact_and_sends_once_on_approval() {
    let h = email_setup().build();

    let proposal = h.say("Email Sarah saying I'll be late").await;
    assert!(proposal.contains("To: sarah@x.com"));
    assert!(proposal.contains("Reply 'Yes, send it'"));
    assert!(h.email.sent().is_empty());

    let sent = h.say("Yes, send it").await;
    assert!(sent.starts_with("✅ EMAIL SENT SUCCESSFULLY!"));
    assert_eq!(h.email.sent().len(), 1);
    assert_eq!(h.email.sent()[0].0, "sarah@x.com");
    assert_eq!(h.dispatcher.state().draft(SENDER).await, None);

    // A second approval has no draft to act on.
    h.say("yes").await;
    assert_eq!(h.email.sent().len(), 1);
}

#[tokio::test]
async fn cancel_clears_draft_without_sending() {
    let h = email_setup().build();
    h.say("Email Sarah saying I'll be late").await;

    assert_eq!(h.say("No").await, replies::DRAFT_CANCELLED);
    assert!(h.email.sent().is_empty());
    assert_eq!(h.dispatcher.state().draft(SENDER).await, None);
}

#[tokio::test]
async fn negated_send_cancels_instead_of_sending() {
    for reply in ["don't send it", "do not send it", "No, don't send it"] {
        let h = email_setup().build();
        h.say("Email Sarah saying I'll be late").await;

        assert_eq!(h.say(reply).await, replies::DRAFT_CANCELLED, "{reply}");
        assert!(h.email.sent().is_empty(), "{reply}");
        assert_eq!(h.dispatcher.state().draft(SENDER).await, None, "{reply}");
    }
}

#[tokio::test]
async fn concurrent_messages_from_one_sender_are_serialised() {
    let mut setup = email_setup();
    setup.extractor.delay = Some(Duration::from_millis(50));
    let h = setup.build();

    let (first, second) = tokio::join!(
        h.say("Email Sarah saying I'll be late"),
        h.say("Email Sarah saying I'll be late"),
    );

    // The second message sees the first one's draft and revises it.
    assert_eq!(h.extractor.calls(), 1);
    let revised = [&first, &second]
        .iter()
        .filter(|r| r.starts_with("Here is your revised email draft:"))
        .count();
    assert_eq!(revised, 1, "{first}\n---\n{second}");
    let draft = h.dispatcher.state().draft(SENDER).await.unwrap();
    assert_eq!(draft.subject, "Running late (revised)");
    assert_eq!(h.dispatcher.state().active_senders().await, 1);
    assert!(h.email.sent().is_empty());
}

#[tokio::test]
async fn revision_replaces_draft_and_reproposes() {
    let h = email_setup().build();
    h.say("Email Sarah saying I'll be late").await;

    let reply = h.say("make it more formal").await;
    assert!(reply.starts_with("Here is your revised email draft:"));
    let draft = h.dispatcher.state().draft(SENDER).await.unwrap();
    assert_eq!(draft.to, "sarah@x.com");
    assert_eq!(draft.subject, "Running late (revised)");
    assert_eq!(draft.body, "Dear Sarah, I will be late. Regards");
    assert!(h.email.sent().is_empty());
}

#[tokio::test]
async fn failed_revision_keeps_original_draft() {
    let h = Setup {
        reviser: Revision::Fail,
        ..email_setup()
    }
    .build();
    h.say("Email Sarah saying I'll be late").await;
    let before = h.dispatcher.state().draft(SENDER).await;

    assert_eq!(h.say("shorter please").await, replies::REVISION_FAILED);
    assert_eq!(h.dispatcher.state().draft(SENDER).await, before);
}

#[tokio::test(start_paused = true)]
async fn timed_out_revision_keeps_original_draft() {
    let h = Setup {
        reviser: Revision::Hang,
        ..email_setup()
    }
    .build();
    h.say("Email Sarah saying I'll be late").await;
    let before = h.dispatcher.state().draft(SENDER).await;

    assert_eq!(h.say("add a thank you").await, replies::REVISION_FAILED);
    assert_eq!(h.dispatcher.state().draft(SENDER).await, before);
}

#[tokio::test]
async fn failed_send_still_clears_draft() {
    let h = Setup {
        email: RecordingEmail {
            fail: true,
            ..Default::default()
        },
        ..email_setup()
    }
    .build();
    h.say("Email Sarah saying I'll be late").await;

    let reply = h.say("go ahead").await;
    assert!(reply.starts_with("❌ Failed to send email. Error: HTTP 422"));
    assert_eq!(h.email.sent().len(), 1);
    assert_eq!(h.dispatcher.state().draft(SENDER).await, None);
}

#[tokio::test]
async fn unknown_recipient_creates_no_draft() {
    let h = Setup {
        extractor: ScriptedExtractor::default().on(
            "Email Bob hello",
            json!({"intent": "send_email", "recipient_name": "Bob", "subject": "Hi", "email_body": "Hello"}),
        ),
        ..Default::default()
    }
    .build();

    assert_eq!(
        h.say("Email Bob hello").await,
        "❌ Couldn't find an email for Bob in your contacts."
    );
    assert_eq!(h.dispatcher.state().draft(SENDER).await, None);
}

#[tokio::test]
async fn date_question_bypasses_pending_draft() {
    let h = email_setup().build();
    h.say("Email Sarah saying I'll be late").await;

    let reply = h.say("what time is it").await;
    assert!(reply.starts_with("🕐 Current time (UTC+4): 09:00 AM"));
    assert!(h.dispatcher.state().draft(SENDER).await.is_some());
    assert_eq!(h.extractor.calls(), 1);
}

// ---- places ----

#[tokio::test]
async fn place_query_without_area_asks_then_uses_next_message() {
    let h = Setup {
        extractor: ScriptedExtractor::default().on(
            "Where can I find good coffee shops?",
            json!({"intent": "find_place", "place_query": "coffee shops", "place_location": null}),
        ),
        ..Default::default()
    }
    .build();

    assert_eq!(
        h.say("Where can I find good coffee shops?").await,
        replies::ASK_PLACE_LOCATION
    );
    assert!(h.places.searches.lock().unwrap().is_empty());

    let reply = h.say("Dubai Marina").await;
    assert!(reply.starts_with("🗺️ Here are the places I found:"));
    assert!(reply.contains("Arabica (⭐4.6)"));
    assert_eq!(
        *h.places.searches.lock().unwrap(),
        vec![("coffee shops".to_string(), Some("Dubai Marina".to_string()))]
    );
    assert_eq!(h.dispatcher.state().pending_place(SENDER).await, None);
    // The location reply never reached the extractor.
    assert_eq!(h.extractor.calls(), 1);
}

#[tokio::test]
async fn place_query_with_area_searches_immediately() {
    let h = Setup {
        extractor: ScriptedExtractor::default().on(
            "Find best pizza in Downtown Dubai",
            json!({"intent": "find_place", "place_query": "best pizza", "place_location": "Downtown Dubai"}),
        ),
        ..Default::default()
    }
    .build();

    h.say("Find best pizza in Downtown Dubai").await;
    assert_eq!(h.places.searches.lock().unwrap().len(), 1);
    assert_eq!(h.dispatcher.state().pending_place(SENDER).await, None);
}

// ---- fallbacks ----

#[tokio::test]
async fn extraction_failure_falls_back_to_web_search_for_questions() {
    let h = Setup {
        extractor: ScriptedExtractor {
            fail: true,
            ..Default::default()
        },
        ..Default::default()
    }
    .build();

    let reply = h.say("What is the latest in AI?").await;
    assert_eq!(reply, "🔍 Search results for: What is the latest in AI?");
    assert_eq!(*h.web.queries.lock().unwrap(), vec!["What is the latest in AI?"]);
}

#[tokio::test]
async fn unclassified_statement_gets_capability_overview() {
    let h = Setup::default().build();
    let reply = h.say("hello there friend").await;
    assert!(reply.starts_with("Hi! You said: hello there friend"));
    assert!(h.web.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_transcription_apologises() {
    let h = Setup::default().build();
    let inbound = InboundMessage::new("whatsapp", SENDER, "")
        .with_attachment(Attachment::from_mime("https://media/1", "audio/ogg"));
    let reply = h.dispatcher.handle_inbound(&inbound).await;
    assert_eq!(reply.text, replies::TRANSCRIPTION_FAILED);
    assert_eq!(h.extractor.calls(), 0);
}

#[tokio::test]
async fn transcript_is_dispatched_like_text() {
    let h = Setup {
        transcript: Some("Email Sarah saying I'll be late"),
        ..email_setup()
    }
    .build();
    let inbound = InboundMessage::new("whatsapp", SENDER, "")
        .with_attachment(Attachment::from_mime("https://media/1", "audio/ogg"));
    let reply = h.dispatcher.handle_inbound(&inbound).await;
    assert!(reply.text.contains("To: sarah@x.com"));
}

// ---- memory writes ----

#[tokio::test]
async fn raw_message_then_intent_are_queued_for_memory() {
    let h = email_setup().build();
    let mut rx = h.bus.subscribe(Topic::MemoryWriteRequested).await;

    h.say("Email Sarah saying I'll be late").await;

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    match (first, second) {
        (
            BusMessage::MemoryWriteRequested {
                write: MemoryWrite::Conversation { text, .. },
            },
            BusMessage::MemoryWriteRequested {
                write: MemoryWrite::IntentClassified { intent, payload, .. },
            },
        ) => {
            assert_eq!(text, "Email Sarah saying I'll be late");
            assert_eq!(intent, "send_email");
            assert_eq!(payload["recipient_name"], "Sarah");
        }
        other => panic!("unexpected writes: {other:?}"),
    }
}

#[tokio::test]
async fn memory_query_without_memory_is_unavailable() {
    let h = Setup {
        extractor: ScriptedExtractor::default().on(
            "Did I send any emails today?",
            json!({"intent": "memory_query", "memory_query": "emails"}),
        ),
        ..Default::default()
    }
    .build();
    assert_eq!(
        h.say("Did I send any emails today?").await,
        replies::MEMORY_UNAVAILABLE
    );
}

// ---- contacts ----

#[tokio::test]
async fn add_contact_normalises_spoken_email() {
    let h = Setup {
        extractor: ScriptedExtractor::default().on(
            "Add John Smith john at example.com",
            json!({"intent": "add_contact", "contact_name": "John Smith", "contact_email": "john at example.com"}),
        ),
        ..Default::default()
    }
    .build();

    assert_eq!(
        h.say("Add John Smith john at example.com").await,
        "✅ Contact 'John Smith' added successfully!"
    );
    let rows = h.contacts.rows.lock().unwrap();
    let john = rows.iter().find(|c| c.full_name == "John Smith").unwrap();
    assert_eq!(john.email, "john@example.com");
    assert_eq!(john.phone, "N/A");
}

#[tokio::test]
async fn update_of_missing_contact_says_not_found() {
    let h = Setup {
        extractor: ScriptedExtractor::default().on(
            "Change Zed's phone to 555",
            json!({"intent": "update_contact", "contact_name": "Zed", "update_field": "phone", "update_value": "555"}),
        ),
        ..Default::default()
    }
    .build();
    assert_eq!(h.say("Change Zed's phone to 555").await, "❌ Contact Zed not found");
}

// ---- calendar ----

#[tokio::test]
async fn delete_on_busy_day_lists_candidates() {
    let h = Setup {
        extractor: ScriptedExtractor::default().on(
            "delete my event for tomorrow",
            json!({"intent": "calendar_delete", "calendar_start": "2026-10-20"}),
        ),
        calendar: FakeCalendar::with(vec![
            event("a", "Standup", "2026-10-20T09:00:00"),
            event("b", "Dentist", "2026-10-20T15:00:00"),
        ]),
        ..Default::default()
    }
    .build();

    let reply = h.say("delete my event for tomorrow").await;
    assert!(reply.starts_with("❌ Multiple events found on October 20, 2026:"));
    assert!(reply.contains("1. 09:00 - Standup\n2. 15:00 - Dentist"));
    assert!(h.calendar.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn delete_by_title_on_day_removes_single_match() {
    let h = Setup {
        extractor: ScriptedExtractor::default().on(
            "Delete the dentist tomorrow",
            json!({"intent": "calendar_delete", "calendar_start": "2026-10-20", "calendar_summary": "dentist"}),
        ),
        calendar: FakeCalendar::with(vec![
            event("a", "Standup", "2026-10-20T09:00:00"),
            event("b", "Dentist", "2026-10-20T15:00:00"),
        ]),
        ..Default::default()
    }
    .build();

    assert_eq!(
        h.say("Delete the dentist tomorrow").await,
        "✅ Deleted event: Dentist on October 20, 2026"
    );
    assert_eq!(*h.calendar.deleted.lock().unwrap(), vec!["b".to_string()]);
}

#[tokio::test]
async fn calendar_auth_and_scope_failures_read_differently() {
    let create = json!({
        "intent": "calendar_create",
        "calendar_summary": "Sync",
        "calendar_start": "2026-10-20T14:00:00",
        "calendar_end": "2026-10-20T15:00:00"
    });
    let expired = Setup {
        extractor: ScriptedExtractor::default().on("create sync", create.clone()),
        calendar: FakeCalendar::denying(ConnectorError::NotAuthenticated("HTTP 401".into())),
        ..Default::default()
    }
    .build();
    let scoped = Setup {
        extractor: ScriptedExtractor::default().on("create sync", create),
        calendar: FakeCalendar::denying(ConnectorError::PermissionDenied("HTTP 403".into())),
        ..Default::default()
    }
    .build();

    let auth_reply = expired.say("create sync").await;
    let scope_reply = scoped.say("create sync").await;
    assert!(auth_reply.contains("access token has expired"));
    assert!(scope_reply.contains("calendar.events scope"));
}

#[tokio::test]
async fn create_without_end_asks_for_both_times() {
    let h = Setup {
        extractor: ScriptedExtractor::default().on(
            "create meeting tomorrow 2pm",
            json!({"intent": "calendar_create", "calendar_start": "2026-10-20T14:00:00"}),
        ),
        ..Default::default()
    }
    .build();
    assert_eq!(
        h.say("create meeting tomorrow 2pm").await,
        replies::EVENT_TIMES_MISSING
    );
    assert!(h.calendar.events.lock().unwrap().is_empty());
}
