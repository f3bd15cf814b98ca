use chrono::{Days, Duration, FixedOffset, NaiveDate};

use super::Dispatcher;
use crate::connectors::calendar::{day_bounds, EventField};
use crate::connectors::{CalendarEvent, EventTime, NewEvent};
use crate::error::ConnectorError;
use crate::intent::EventSpec;
use crate::replies::{self, Service};

const UPCOMING_DAYS: i64 = 7;
const UPCOMING_MAX: usize = 10;
const TITLE_SEARCH_DAYS: i64 = 30;
const DAY_MAX: usize = 250;

/// Case-insensitive containment either way round.
fn title_matches(title: &str, wanted: &str) -> bool {
    let title = title.trim().to_lowercase();
    let wanted = wanted.trim().to_lowercase();
    !title.is_empty() && !wanted.is_empty() && (title.contains(&wanted) || wanted.contains(&title))
}

fn date_label(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

/// A creatable event, or the reply explaining why not.
pub(crate) fn build_event(spec: &EventSpec, offset: FixedOffset) -> Result<NewEvent, String> {
    let (Some(start_raw), Some(end_raw)) = (&spec.calendar_start, &spec.calendar_end) else {
        return Err(replies::EVENT_TIMES_MISSING.to_string());
    };
    let start = EventTime::parse(start_raw, offset)
        .ok_or_else(|| replies::unparsed_event_time(start_raw))?;
    let mut end =
        EventTime::parse(end_raw, offset).ok_or_else(|| replies::unparsed_event_time(end_raw))?;
    // All-day end dates are exclusive.
    if let (EventTime::AllDay(s), EventTime::AllDay(e)) = (start, end) {
        if e <= s {
            end = EventTime::AllDay(s.checked_add_days(Days::new(1)).unwrap_or(s));
        }
    }
    Ok(NewEvent {
        summary: spec
            .calendar_summary
            .clone()
            .unwrap_or_else(|| "New Event".to_string()),
        start,
        end,
        description: spec.calendar_description.clone(),
    })
}

impl Dispatcher {
    fn offset(&self) -> FixedOffset {
        *self.clock.now().offset()
    }

    pub(super) async fn check_calendar(&self) -> String {
        match self
            .bounded("calendar access", self.connectors.calendar.check_access())
            .await
        {
            Ok(name) => {
                tracing::info!(calendar = %name, "calendar access confirmed");
                replies::CALENDAR_CONNECTED.to_string()
            }
            Err(err) => {
                replies::connector_failure("connect Google Calendar", Service::Calendar, &err)
            }
        }
    }

    pub(super) async fn create_event(&self, spec: &EventSpec) -> String {
        let event = match build_event(spec, self.offset()) {
            Ok(event) => event,
            Err(reply) => return reply,
        };
        match self
            .bounded("event create", self.connectors.calendar.create(&event))
            .await
        {
            Ok(created) => replies::event_created(&created),
            Err(err) => {
                tracing::warn!(error = %err, "event create failed");
                replies::connector_failure("create the event", Service::Calendar, &err)
            }
        }
    }

    /// Creates each event independently; one failure does not stop the rest.
    pub(super) async fn create_events(&self, specs: &[EventSpec]) -> String {
        if specs.is_empty() {
            return replies::BULK_EVENTS_MISSING.to_string();
        }
        let offset = self.offset();
        let mut created = Vec::new();
        let mut failures = Vec::new();
        for spec in specs {
            let label = spec.calendar_summary.as_deref().unwrap_or("New Event");
            let event = match build_event(spec, offset) {
                Ok(event) => event,
                Err(reply) => {
                    failures.push(format!("{label}: {}", reply.trim_start_matches("❌ ")));
                    continue;
                }
            };
            match self
                .bounded("event create", self.connectors.calendar.create(&event))
                .await
            {
                Ok(event) => created.push(event),
                Err(err) => failures.push(format!("{label}: {err}")),
            }
        }
        replies::bulk_created(&created, &failures, specs.len())
    }

    pub(super) async fn list_events(&self) -> String {
        let now = self.clock.now();
        let until = now + Duration::days(UPCOMING_DAYS);
        match self
            .bounded(
                "event list",
                self.connectors.calendar.list(now, until, UPCOMING_MAX),
            )
            .await
        {
            Ok(events) => replies::upcoming_events(&events),
            Err(err) => replies::connector_failure("list your events", Service::Calendar, &err),
        }
    }

    async fn events_titled(&self, title: &str) -> Result<Vec<CalendarEvent>, ConnectorError> {
        let now = self.clock.now();
        let until = now + Duration::days(TITLE_SEARCH_DAYS);
        let events = self
            .bounded("event search", self.connectors.calendar.list(now, until, DAY_MAX))
            .await?;
        Ok(events
            .into_iter()
            .filter(|e| title_matches(&e.summary, title))
            .collect())
    }

    async fn events_on(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>, ConnectorError> {
        let Some((from, to)) = day_bounds(date, self.offset()) else {
            return Ok(Vec::new());
        };
        self.bounded("event list", self.connectors.calendar.list(from, to, DAY_MAX))
            .await
    }

    fn parse_day(&self, raw: &str) -> Option<NaiveDate> {
        EventTime::parse(raw, self.offset()).map(|t| t.date())
    }

    pub(super) async fn update_event(
        &self,
        event_id: Option<String>,
        summary: Option<String>,
        field: Option<String>,
        value: Option<String>,
    ) -> String {
        let (Some(field), Some(value)) = (field, value) else {
            return replies::EVENT_CHANGE_MISSING.to_string();
        };
        let Some(field) = EventField::parse(&field) else {
            return replies::INVALID_EVENT_FIELD.to_string();
        };
        let Some(patch) = field.patch(&value, self.offset()) else {
            return replies::unparsed_event_time(&value);
        };

        let event_id = match (event_id, summary) {
            (Some(id), _) => id,
            (None, Some(title)) => match self.events_titled(&title).await {
                Ok(matches) => match matches.as_slice() {
                    [] => return replies::no_events_matching(&title),
                    [only] => only.id.clone(),
                    several => return replies::several_events_matching(&title, several, "update"),
                },
                Err(err) => {
                    return replies::connector_failure("find the event", Service::Calendar, &err)
                }
            },
            (None, None) => return replies::UPDATE_TARGET_MISSING.to_string(),
        };

        match self
            .bounded(
                "event update",
                self.connectors.calendar.update(&event_id, &patch),
            )
            .await
        {
            Ok(event) => replies::event_updated(&event, patch.field_name(), &value),
            Err(err) => replies::connector_failure("update the event", Service::Calendar, &err),
        }
    }

    /// Deletes by id, by day (optionally narrowed by title) or by title over
    /// the next 30 days. Several candidates are listed, never guessed.
    pub(super) async fn delete_event(
        &self,
        event_id: Option<String>,
        start: Option<String>,
        summary: Option<String>,
    ) -> String {
        if let Some(id) = event_id {
            return match self
                .bounded("event delete", self.connectors.calendar.delete(&id))
                .await
            {
                Ok(()) => replies::EVENT_DELETED.to_string(),
                Err(err) => replies::connector_failure("delete the event", Service::Calendar, &err),
            };
        }

        if let Some(raw) = start {
            let Some(date) = self.parse_day(&raw) else {
                return replies::unparsed_event_time(&raw);
            };
            let label = date_label(date);
            let events = match self.events_on(date).await {
                Ok(events) => events,
                Err(err) => {
                    return replies::connector_failure("list your events", Service::Calendar, &err)
                }
            };
            let matches: Vec<CalendarEvent> = match &summary {
                Some(title) => events
                    .into_iter()
                    .filter(|e| title_matches(&e.summary, title))
                    .collect(),
                None => events,
            };
            return match matches.as_slice() {
                [] => replies::no_events_on(&label, summary.as_deref()),
                [only] => self.delete_found(only, &label).await,
                several => replies::several_events_on(&label, several),
            };
        }

        if let Some(title) = summary {
            return match self.events_titled(&title).await {
                Ok(matches) => match matches.as_slice() {
                    [] => replies::no_events_matching(&title),
                    [only] => self.delete_found(only, &date_label(only.start.date())).await,
                    several => replies::several_events_matching(&title, several, "delete"),
                },
                Err(err) => replies::connector_failure("find the event", Service::Calendar, &err),
            };
        }

        replies::DELETE_TARGET_MISSING.to_string()
    }

    async fn delete_found(&self, event: &CalendarEvent, label: &str) -> String {
        match self
            .bounded("event delete", self.connectors.calendar.delete(&event.id))
            .await
        {
            Ok(()) => replies::event_deleted_on(&event.summary, label),
            Err(err) => replies::connector_failure("delete the event", Service::Calendar, &err),
        }
    }

    /// Deletes every event on one day.
    pub(super) async fn clear_day(&self, start: Option<String>) -> String {
        let Some(raw) = start else {
            return replies::BULK_DELETE_DATE_MISSING.to_string();
        };
        let Some(date) = self.parse_day(&raw) else {
            return replies::unparsed_event_time(&raw);
        };
        let label = date_label(date);
        let events = match self.events_on(date).await {
            Ok(events) => events,
            Err(err) => {
                return replies::connector_failure("list your events", Service::Calendar, &err)
            }
        };
        if events.is_empty() {
            return replies::no_events_on(&label, None);
        }

        let mut deleted = Vec::new();
        let mut failures = Vec::new();
        for event in &events {
            match self
                .bounded("event delete", self.connectors.calendar.delete(&event.id))
                .await
            {
                Ok(()) => deleted.push(event.summary.clone()),
                Err(err) => failures.push(format!("{}: {err}", event.summary)),
            }
        }
        tracing::info!(date = %date, deleted = deleted.len(), failed = failures.len(), "cleared calendar day");
        replies::bulk_deleted(&label, &deleted, &failures)
    }
}
