//! Action connectors: thin clients for the services a handler calls.
//!
//! The dispatcher only sees the traits here. HTTP implementations live in the
//! submodules; tests substitute recording fakes.

pub mod calendar;
pub mod contacts;
pub mod email;
pub mod places;
pub mod web_search;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, DeliveryError};

pub use calendar::{EventPatch, EventTime, GoogleCalendar};
pub use contacts::{match_contact, Contact, ContactField, GoogleSheetsContacts};
pub use email::ResendEmailSender;
pub use places::{place_search_query, GooglePlaces, PlaceDetails, PlaceResult};
pub use web_search::BraveWebSearch;

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends a plain-text email; `Ok` carries the provider's message id.
    async fn send(&self, to: &str, subject: &str, body: &str) -> ConnectorResult<String>;
}

#[async_trait]
pub trait ContactBook: Send + Sync {
    async fn list(&self) -> ConnectorResult<Vec<Contact>>;

    /// Exact name match first, then a match on every name part.
    async fn lookup(&self, name: &str) -> ConnectorResult<Option<Contact>> {
        let contacts = self.list().await?;
        Ok(match_contact(&contacts, name).cloned())
    }

    /// Returns `false` when a contact with the same name already exists.
    async fn add(&self, contact: &Contact) -> ConnectorResult<bool>;

    /// Updates one field of the contact named exactly `name`.
    async fn update(&self, name: &str, field: ContactField, value: &str)
        -> ConnectorResult<Contact>;

    /// Deletes the best match for `name` and returns what was removed.
    async fn delete(&self, name: &str) -> ConnectorResult<Contact>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: Option<EventTime>,
    pub html_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    pub description: Option<String>,
}

#[async_trait]
pub trait Calendar: Send + Sync {
    /// Confirms the configured token can read the calendar; returns its name.
    async fn check_access(&self) -> ConnectorResult<String>;

    async fn create(&self, event: &NewEvent) -> ConnectorResult<CalendarEvent>;

    /// Events overlapping `[from, to)`, ordered by start time.
    async fn list(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
        max: usize,
    ) -> ConnectorResult<Vec<CalendarEvent>>;

    async fn update(&self, event_id: &str, patch: &EventPatch) -> ConnectorResult<CalendarEvent>;

    async fn delete(&self, event_id: &str) -> ConnectorResult<()>;
}

#[async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Top matches for `query`, optionally narrowed to `location`.
    async fn search(&self, query: &str, location: Option<&str>)
        -> ConnectorResult<Vec<PlaceResult>>;

    async fn details(&self, query: &str) -> ConnectorResult<Option<PlaceDetails>>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Formatted summary of the top results, ready to send.
    async fn search(&self, query: &str) -> ConnectorResult<String>;
}

/// Turns a voice note URL into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, media_url: &str) -> Result<String>;
}

/// Outbound message delivery to a sender.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, to: &str, text: &str) -> std::result::Result<(), DeliveryError>;
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Passes successful responses through and classifies the rest.
pub(crate) async fn check_status(resp: reqwest::Response) -> ConnectorResult<reqwest::Response> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(ConnectorError::from_response(resp).await)
    }
}
