//! Google Calendar v3 events client plus the date handling the calendar
//! handlers share.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::{check_status, http_client, Calendar, CalendarEvent, ConnectorResult, NewEvent};
use crate::config::CalendarConfig;
use crate::error::ConnectorError;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Start or end of an event: a zoned instant or a whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTime {
    At(DateTime<FixedOffset>),
    AllDay(NaiveDate),
}

impl EventTime {
    /// RFC 3339 keeps its own offset, a naive timestamp gets `offset`, a bare
    /// date becomes an all-day time.
    pub fn parse(raw: &str, offset: FixedOffset) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self::At(at));
        }
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return offset
                    .from_local_datetime(&naive)
                    .single()
                    .map(Self::At);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(Self::AllDay)
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Self::At(at) => at.date_naive(),
            Self::AllDay(date) => *date,
        }
    }

    /// `10/20 14:00`, or `10/20` for all-day times.
    pub fn short_label(&self) -> String {
        match self {
            Self::At(at) => at.format("%m/%d %H:%M").to_string(),
            Self::AllDay(date) => date.format("%m/%d").to_string(),
        }
    }

    pub fn clock_label(&self) -> Option<String> {
        match self {
            Self::At(at) => Some(at.format("%H:%M").to_string()),
            Self::AllDay(_) => None,
        }
    }

    fn to_google(self) -> serde_json::Value {
        match self {
            Self::At(at) => serde_json::json!({ "dateTime": at.to_rfc3339() }),
            Self::AllDay(date) => serde_json::json!({ "date": date.format("%Y-%m-%d").to_string() }),
        }
    }
}

/// `[00:00, next 00:00)` of `date` in `offset`.
pub fn day_bounds(
    date: NaiveDate,
    offset: FixedOffset,
) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let start = offset
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .single()?;
    let end = start.checked_add_days(Days::new(1))?;
    Some((start, end))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventField {
    Summary,
    Description,
    Start,
    End,
}

impl EventField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "summary" | "title" => Some(Self::Summary),
            "description" => Some(Self::Description),
            "start" => Some(Self::Start),
            "end" => Some(Self::End),
            _ => None,
        }
    }

    /// `None` when a start/end value is not a recognisable date.
    pub fn patch(self, value: &str, offset: FixedOffset) -> Option<EventPatch> {
        match self {
            Self::Summary => Some(EventPatch::Summary(value.to_string())),
            Self::Description => Some(EventPatch::Description(value.to_string())),
            Self::Start => EventTime::parse(value, offset).map(EventPatch::Start),
            Self::End => EventTime::parse(value, offset).map(EventPatch::End),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPatch {
    Summary(String),
    Description(String),
    Start(EventTime),
    End(EventTime),
}

impl EventPatch {
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Summary(_) => "summary",
            Self::Description(_) => "description",
            Self::Start(_) => "start",
            Self::End(_) => "end",
        }
    }

    fn to_google(&self) -> serde_json::Value {
        match self {
            Self::Summary(v) => serde_json::json!({ "summary": v }),
            Self::Description(v) => serde_json::json!({ "description": v }),
            Self::Start(t) => serde_json::json!({ "start": t.to_google() }),
            Self::End(t) => serde_json::json!({ "end": t.to_google() }),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTime {
    #[serde(default)]
    date_time: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl GoogleTime {
    fn into_event_time(self) -> Option<EventTime> {
        if let Some(at) = self.date_time {
            return DateTime::parse_from_rfc3339(&at).ok().map(EventTime::At);
        }
        self.date
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
            .map(EventTime::AllDay)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    start: GoogleTime,
    #[serde(default)]
    end: Option<GoogleTime>,
    #[serde(default)]
    html_link: Option<String>,
}

impl GoogleEvent {
    fn into_event(self) -> ConnectorResult<CalendarEvent> {
        let start = self
            .start
            .into_event_time()
            .ok_or_else(|| ConnectorError::Other(format!("event {} has no usable start", self.id)))?;
        Ok(CalendarEvent {
            id: self.id,
            summary: self.summary.unwrap_or_else(|| "No title".to_string()),
            start,
            end: self.end.and_then(GoogleTime::into_event_time),
            html_link: self.html_link,
        })
    }
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Deserialize)]
struct CalendarMeta {
    #[serde(default)]
    summary: Option<String>,
}

pub struct GoogleCalendar {
    calendar_id: String,
    access_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl GoogleCalendar {
    pub fn new(
        calendar_id: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            access_token: access_token.into(),
            api_base: CALENDAR_API_BASE.to_string(),
            client: http_client(timeout),
        }
    }

    pub fn from_config(config: &CalendarConfig, timeout: Duration) -> Self {
        let calendar = Self::new(&config.calendar_id, &config.access_token, timeout);
        match &config.api_base {
            Some(base) => calendar.with_api_base(base),
            None => calendar,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn calendar_url(&self) -> String {
        format!(
            "{}/calendars/{}",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!(
            "{}/events/{}",
            self.calendar_url(),
            urlencoding::encode(event_id)
        )
    }
}

#[async_trait]
impl Calendar for GoogleCalendar {
    async fn check_access(&self) -> ConnectorResult<String> {
        let resp = self
            .client
            .get(self.calendar_url())
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let meta: CalendarMeta = check_status(resp).await?.json().await?;
        Ok(meta.summary.unwrap_or_else(|| self.calendar_id.clone()))
    }

    async fn create(&self, event: &NewEvent) -> ConnectorResult<CalendarEvent> {
        let end = match (event.start, event.end) {
            // all-day end dates are exclusive
            (EventTime::AllDay(start), EventTime::AllDay(end)) if end <= start => start
                .checked_add_days(Days::new(1))
                .map(EventTime::AllDay)
                .unwrap_or(event.end),
            _ => event.end,
        };
        let mut body = serde_json::json!({
            "summary": event.summary,
            "start": event.start.to_google(),
            "end": end.to_google(),
        });
        if let Some(description) = &event.description {
            body["description"] = serde_json::Value::String(description.clone());
        }
        let resp = self
            .client
            .post(format!("{}/events", self.calendar_url()))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let created: GoogleEvent = check_status(resp).await?.json().await?;
        created.into_event()
    }

    async fn list(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
        max: usize,
    ) -> ConnectorResult<Vec<CalendarEvent>> {
        let resp = self
            .client
            .get(format!("{}/events", self.calendar_url()))
            .query(&[
                ("timeMin", from.to_rfc3339()),
                ("timeMax", to.to_rfc3339()),
                ("maxResults", max.to_string()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let list: EventList = check_status(resp).await?.json().await?;
        list.items.into_iter().map(GoogleEvent::into_event).collect()
    }

    async fn update(&self, event_id: &str, patch: &EventPatch) -> ConnectorResult<CalendarEvent> {
        let resp = self
            .client
            .patch(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .json(&patch.to_google())
            .send()
            .await?;
        let updated: GoogleEvent = check_status(resp).await?.json().await?;
        updated.into_event()
    }

    async fn delete(&self, event_id: &str) -> ConnectorResult<()> {
        let resp = self
            .client
            .delete(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::GONE {
            return Err(ConnectorError::NotFound(format!(
                "event {event_id} was already deleted"
            )));
        }
        check_status(resp).await?;
        Ok(())
    }
}
