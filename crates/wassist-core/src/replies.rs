//! Reply texts sent back to the sender.

use crate::connectors::{CalendarEvent, Contact, PlaceDetails, PlaceResult};
use crate::error::ConnectorError;
use crate::state::EmailDraft;

pub const CATCH_ALL: &str = "Sorry, something went wrong. Please try again.";
pub const TRANSCRIPTION_FAILED: &str =
    "Sorry, I couldn't transcribe your voice message. Please try again.";
pub const REVISION_FAILED: &str =
    "Sorry, I couldn't revise the email. Please try again or reply 'Yes' to send the original draft.";
pub const DRAFT_CANCELLED: &str = "❌ Email draft cancelled. No email was sent.";
pub const EMAIL_DETAILS_MISSING: &str = "❌ Couldn't extract all email details. Please try again.";
pub const ASK_PLACE_LOCATION: &str = "Sure—what area should I search in?";
pub const PLACE_QUERY_MISSING: &str =
    "Sorry, I couldn't understand what kind of place you're looking for.";
pub const NO_PLACES: &str = "Sorry, I couldn't find any places matching that.";
pub const WEB_SEARCH_FAILED: &str =
    "Sorry, I couldn't complete the web search right now. Please try again later.";
pub const WEB_SEARCH_UNAVAILABLE: &str = "❌ Web search is not available right now.";
pub const MEMORY_UNAVAILABLE: &str = "❌ Memory system not available.";
pub const MEMORY_QUERY_MISSING: &str =
    "Sorry, I couldn't understand what you want to know about your past actions.";
pub const MEMORY_LOOKUP_FAILED: &str =
    "Sorry, there was an error retrieving your memory. Please try again later.";

pub const CONTACT_NAME_MISSING: &str = "Please provide at least a contact name.";
pub const LOOKUP_NAME_MISSING: &str = "Please specify which contact you want to look up.";
pub const UPDATE_DETAILS_MISSING: &str =
    "Please specify the contact name, field to update, and new value.";
pub const INVALID_CONTACT_FIELD: &str = "❌ Invalid field specified";
pub const DELETE_NAME_MISSING: &str = "Please specify which contact you want to delete.";

pub const EVENT_TIMES_MISSING: &str = "❌ Please provide both start and end times for the event.\nExample: 'Create meeting tomorrow 2pm to 3pm'";
pub const NO_UPCOMING_EVENTS: &str = "📅 No upcoming events found in the next 7 days.";
pub const EVENT_DELETED: &str = "✅ Event deleted successfully!";
pub const DELETE_TARGET_MISSING: &str = "❌ Please specify which event to delete. You can say 'Delete my meeting on May 26' or provide an event ID.";
pub const UPDATE_TARGET_MISSING: &str = "❌ Please specify which event to update, for example 'Rename my team meeting to Weekly Sync'.";
pub const EVENT_CHANGE_MISSING: &str =
    "❌ Please tell me what to change and the new value, for example 'move my dentist appointment start to 3pm'.";
pub const INVALID_EVENT_FIELD: &str = "❌ Invalid field. Use: summary, description, start, or end";
pub const BULK_EVENTS_MISSING: &str = "❌ Please list the events you want to create.";
pub const BULK_DELETE_DATE_MISSING: &str =
    "❌ Please tell me which day to clear, for example 'clear my calendar tomorrow'.";
pub const CALENDAR_CONNECTED: &str = "✅ Google Calendar connected successfully! You can now:\n\n📅 Create events: 'create meeting tomorrow 2pm to 3pm'\n📋 List events: 'list my events'\n\nYour calendar is ready to use!";

/// The service behind a connector, for error wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Email,
    Contacts,
    Calendar,
    Places,
    WebSearch,
}

impl Service {
    fn name(self) -> &'static str {
        match self {
            Self::Email => "the email service",
            Self::Contacts => "Google Sheets",
            Self::Calendar => "Google Calendar",
            Self::Places => "Google Places",
            Self::WebSearch => "web search",
        }
    }

    fn reconnect_hint(self) -> &'static str {
        match self {
            Self::Calendar => "Refresh the Google access token, then say 'setup my calendar'.",
            Self::Contacts => "Refresh the Google access token for the contacts sheet.",
            _ => "Please check the API key.",
        }
    }

    fn required_permission(self) -> &'static str {
        match self {
            Self::Calendar => "re-authorize with the calendar.events scope",
            Self::Contacts => "re-authorize with the spreadsheets scope and edit access to the sheet",
            Self::Email => "use a key that is allowed to send from the configured address",
            Self::Places => "enable the Places API for the key",
            Self::WebSearch => "use a key with search access",
        }
    }
}

/// Turns a failed connector call into a reply. Missing credentials and
/// missing permissions get different fixes.
pub fn connector_failure(action: &str, service: Service, err: &ConnectorError) -> String {
    match err {
        ConnectorError::NotAuthenticated(_) => format!(
            "❌ Couldn't {action}: {} is not connected or the access token has expired. {}",
            service.name(),
            service.reconnect_hint()
        ),
        ConnectorError::PermissionDenied(_) => format!(
            "❌ Couldn't {action}: the {} credentials don't have permission for this. Please {}.",
            service.name(),
            service.required_permission()
        ),
        ConnectorError::NotFound(_) => format!("❌ Couldn't {action}: nothing matched."),
        ConnectorError::Timeout(_) => format!(
            "❌ Couldn't {action}: {} took too long to respond. Please try again.",
            service.name()
        ),
        ConnectorError::Other(detail) => format!("❌ Failed to {action}. Error: {detail}"),
    }
}

fn draft_block(draft: &EmailDraft) -> String {
    format!(
        "To: {}\nSubject: {}\n\n{}",
        draft.to, draft.subject, draft.body
    )
}

pub fn draft_proposed(draft: &EmailDraft) -> String {
    format!(
        "Here is your email draft:\n\n{}\n\nReply 'Yes, send it' to send this email, or 'No' to cancel.",
        draft_block(draft)
    )
}

pub fn draft_revised(draft: &EmailDraft) -> String {
    format!(
        "Here is your revised email draft:\n\n{}\n\nReply 'Yes, send it' to send this email, provide more editing instructions, or 'No' to cancel.",
        draft_block(draft)
    )
}

pub fn email_sent(draft: &EmailDraft) -> String {
    format!(
        "✅ EMAIL SENT SUCCESSFULLY!\n\nTo: {}\nSubject: {}\n\nYour email has been delivered!",
        draft.to, draft.subject
    )
}

pub fn email_failed(err: &ConnectorError) -> String {
    match err {
        ConnectorError::NotAuthenticated(_) | ConnectorError::PermissionDenied(_) => {
            connector_failure("send the email", Service::Email, err)
        }
        _ => format!("❌ Failed to send email. Error: {err}"),
    }
}

pub fn unknown_recipient(name: &str) -> String {
    format!("❌ Couldn't find an email for {name} in your contacts.")
}

pub fn places_found(places: &[PlaceResult]) -> String {
    if places.is_empty() {
        return NO_PLACES.to_string();
    }
    let entries: Vec<String> = places
        .iter()
        .map(|p| {
            let rating = p
                .rating
                .map(|r| r.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            let address = p.address.as_deref().unwrap_or("Address not available");
            format!("{} (⭐{rating})\n{address}", p.name)
        })
        .collect();
    format!("🗺️ Here are the places I found:\n\n{}", entries.join("\n\n"))
}

pub fn place_details(details: &PlaceDetails) -> String {
    let mut lines = vec![format!("📍 {}", details.name)];
    if let Some(address) = &details.address {
        lines.push(format!("🏠 {address}"));
    }
    if let Some(phone) = &details.phone {
        lines.push(format!("📞 {phone}"));
    }
    if let Some(website) = &details.website {
        lines.push(format!("🌐 {website}"));
    }
    if let Some(rating) = details.rating {
        lines.push(format!("⭐ {rating}"));
    }
    if !details.opening_hours.is_empty() {
        lines.push(format!(
            "🕐 Opening hours:\n{}",
            details.opening_hours.join("\n")
        ));
    }
    lines.join("\n")
}

pub fn ask_contact_details(name: &str) -> String {
    format!(
        "I have the name '{name}'. Please provide either an email address or phone number (or say 'N/A' if you don't have it)."
    )
}

pub fn contact_added(name: &str) -> String {
    format!("✅ Contact '{name}' added successfully!")
}

pub fn contact_not_added(name: &str) -> String {
    format!("❌ Contact '{name}' already exists or failed to add.")
}

/// One field of a contact, or every field for `all`.
pub fn contact_lookup(contact: &Contact, field: &str) -> String {
    let or_na = |v: Option<&str>| v.unwrap_or("N/A").to_string();
    let name = &contact.full_name;
    let body = match field.trim().to_lowercase().as_str() {
        "email" => format!("{name}'s email: {}", or_na(contact.email_address())),
        "phone" | "phone_number" => format!("{name}'s phone: {}", or_na(contact.phone_number())),
        "address" => format!("{name}'s address: {}", or_na(contact.street_address())),
        _ => format!(
            "Contact: {name}\nEmail: {}\nPhone: {}\nAddress: {}",
            or_na(contact.email_address()),
            or_na(contact.phone_number()),
            or_na(contact.street_address())
        ),
    };
    format!("📋 {body}")
}

pub fn contact_missing(name: &str) -> String {
    format!("📋 No contact found for {name}")
}

pub fn contact_updated(name: &str, field: &str, value: &str) -> String {
    format!("✅ Updated {name}'s {field} to {value}")
}

pub fn contact_not_found(name: &str) -> String {
    format!("❌ Contact {name} not found")
}

pub fn contact_deleted(full_name: &str) -> String {
    format!("✅ Contact {full_name} deleted successfully")
}

pub fn contact_list(contacts: &[Contact]) -> String {
    if contacts.is_empty() {
        return "📋 Your contact list is empty.".to_string();
    }
    let lines: Vec<String> = contacts
        .iter()
        .map(|c| {
            let details: Vec<&str> = [c.email_address(), c.phone_number()]
                .into_iter()
                .flatten()
                .collect();
            if details.is_empty() {
                format!("• {}", c.full_name)
            } else {
                format!("• {} ({})", c.full_name, details.join(", "))
            }
        })
        .collect();
    format!("📋 Your contacts ({}):\n\n{}", contacts.len(), lines.join("\n"))
}

pub fn event_created(event: &CalendarEvent) -> String {
    format!(
        "✅ Calendar event created successfully!\n\n📅 {}\n🔗 {}",
        event.summary,
        event.html_link.as_deref().unwrap_or("No link available")
    )
}

pub fn unparsed_event_time(raw: &str) -> String {
    format!("❌ Could not understand the event time '{raw}'.")
}

pub fn upcoming_events(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return NO_UPCOMING_EVENTS.to_string();
    }
    let lines: Vec<String> = events
        .iter()
        .map(|e| format!("📅 {} - {}", e.start.short_label(), e.summary))
        .collect();
    format!("📅 Your upcoming events:\n\n{}", lines.join("\n"))
}

pub fn event_updated(event: &CalendarEvent, field: &str, value: &str) -> String {
    let mut reply = format!(
        "✅ Event updated successfully!\n\n📅 {}\nChanged {field} to '{value}'",
        event.summary
    );
    if let Some(link) = &event.html_link {
        reply.push_str(&format!("\n🔗 {link}"));
    }
    reply
}

/// `1. 14:00 - Standup` lines for events on one day.
fn numbered_by_clock(events: &[CalendarEvent]) -> String {
    events
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let at = e.start.clock_label().unwrap_or_else(|| "All day".to_string());
            format!("{}. {at} - {}", i + 1, e.summary)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `1. 10/20 14:00 - Standup` lines for events across days.
fn numbered_by_date(events: &[CalendarEvent]) -> String {
    events
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {} - {}", i + 1, e.start.short_label(), e.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn no_events_on(date_label: &str, title: Option<&str>) -> String {
    match title {
        Some(title) => format!("❌ No events found matching '{title}' on {date_label}"),
        None => format!("❌ No events found on {date_label}"),
    }
}

pub fn event_deleted_on(summary: &str, date_label: &str) -> String {
    format!("✅ Deleted event: {summary} on {date_label}")
}

pub fn several_events_on(date_label: &str, events: &[CalendarEvent]) -> String {
    format!(
        "❌ Multiple events found on {date_label}:\n\n{}\n\nPlease specify which event to delete by saying 'Delete event [number]' or provide the event name.",
        numbered_by_clock(events)
    )
}

pub fn no_events_matching(title: &str) -> String {
    format!("❌ No events found matching '{title}' in the next 30 days")
}

pub fn several_events_matching(title: &str, events: &[CalendarEvent], verb: &str) -> String {
    format!(
        "❌ Multiple events found matching '{title}':\n\n{}\n\nPlease specify which event to {verb} by giving its full name or a more specific date.",
        numbered_by_date(events)
    )
}

pub fn bulk_created(created: &[CalendarEvent], failures: &[String], total: usize) -> String {
    let mut lines: Vec<String> = created
        .iter()
        .map(|e| format!("✅ {} ({})", e.summary, e.start.short_label()))
        .collect();
    lines.extend(failures.iter().map(|f| format!("❌ {f}")));
    format!(
        "📅 Created {} of {total} events:\n\n{}",
        created.len(),
        lines.join("\n")
    )
}

pub fn bulk_deleted(date_label: &str, deleted: &[String], failures: &[String]) -> String {
    let mut lines: Vec<String> = deleted.iter().map(|s| format!("• {s}")).collect();
    lines.extend(failures.iter().map(|f| format!("❌ {f}")));
    format!(
        "🗑️ Deleted {} event(s) on {date_label}:\n\n{}",
        deleted.len(),
        lines.join("\n")
    )
}

pub fn generic_reply(body: &str) -> String {
    format!(
        "Hi! You said: {body}\n\n\
         I can help you:\n\
         📧 Send emails\n\
         👤 Add/update/delete contacts\n\
         🔍 Look up contact info\n\
         📅 Manage your calendar\n\
         🗺️ Find places nearby\n\n\
         Calendar commands:\n\
         • 'setup my calendar' - Connect Google Calendar\n\
         • 'create meeting tomorrow 2pm to 3pm' - Create events\n\
         • 'list my events' - Show upcoming events\n\n\
         Place search:\n\
         • 'Find best pizza in Downtown Dubai'\n\
         • 'What are the top sushi spots near me?'"
    )
}
