//! Structured intents produced by the extractor.
//!
//! The extractor's JSON is untrusted: each variant carries only the fields it
//! needs, extra fields are ignored, and anything that fails to parse (or names
//! an unknown tag) becomes [`Intent::Other`].

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    SendEmail {
        #[serde(default, deserialize_with = "lenient_text")]
        recipient_email: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        recipient_name: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        subject: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        email_body: Option<String>,
    },
    AddContact {
        #[serde(default, deserialize_with = "lenient_text")]
        contact_name: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        contact_email: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        contact_phone: Option<String>,
    },
    LookupContact {
        #[serde(default, deserialize_with = "lenient_text")]
        lookup_name: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        lookup_field: Option<String>,
    },
    UpdateContact {
        #[serde(default, deserialize_with = "lenient_text")]
        contact_name: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        update_field: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        update_value: Option<String>,
    },
    DeleteContact {
        #[serde(default, deserialize_with = "lenient_text")]
        contact_name: Option<String>,
    },
    ListContacts,
    CalendarAuth,
    CalendarCreate {
        #[serde(flatten)]
        event: EventSpec,
    },
    CalendarBulkCreate {
        #[serde(default)]
        calendar_events: Vec<EventSpec>,
    },
    CalendarList,
    CalendarUpdate {
        #[serde(default, deserialize_with = "lenient_text")]
        calendar_event_id: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        calendar_summary: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        calendar_field: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        calendar_value: Option<String>,
    },
    CalendarDelete {
        #[serde(default, deserialize_with = "lenient_text")]
        calendar_event_id: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        calendar_start: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        calendar_summary: Option<String>,
    },
    CalendarBulkDelete {
        #[serde(default, deserialize_with = "lenient_text")]
        calendar_start: Option<String>,
    },
    FindPlace {
        #[serde(default, deserialize_with = "lenient_text")]
        place_query: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        place_location: Option<String>,
    },
    PlaceDetails {
        #[serde(default, deserialize_with = "lenient_text")]
        place_query: Option<String>,
    },
    WebSearch {
        #[serde(default, deserialize_with = "lenient_text")]
        search_query: Option<String>,
    },
    MemoryQuery {
        #[serde(default, deserialize_with = "lenient_text")]
        memory_query: Option<String>,
    },
    Other,
}

/// One calendar event as described by the extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    #[serde(default, deserialize_with = "lenient_text")]
    pub calendar_summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub calendar_start: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub calendar_end: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub calendar_description: Option<String>,
}

pub const ALL_TAGS: [&str; 18] = [
    "send_email",
    "add_contact",
    "lookup_contact",
    "update_contact",
    "delete_contact",
    "list_contacts",
    "calendar_auth",
    "calendar_create",
    "calendar_bulk_create",
    "calendar_list",
    "calendar_update",
    "calendar_delete",
    "calendar_bulk_delete",
    "find_place",
    "place_details",
    "web_search",
    "memory_query",
    "other",
];

impl Intent {
    pub fn tag(&self) -> &'static str {
        match self {
            Intent::SendEmail { .. } => "send_email",
            Intent::AddContact { .. } => "add_contact",
            Intent::LookupContact { .. } => "lookup_contact",
            Intent::UpdateContact { .. } => "update_contact",
            Intent::DeleteContact { .. } => "delete_contact",
            Intent::ListContacts => "list_contacts",
            Intent::CalendarAuth => "calendar_auth",
            Intent::CalendarCreate { .. } => "calendar_create",
            Intent::CalendarBulkCreate { .. } => "calendar_bulk_create",
            Intent::CalendarList => "calendar_list",
            Intent::CalendarUpdate { .. } => "calendar_update",
            Intent::CalendarDelete { .. } => "calendar_delete",
            Intent::CalendarBulkDelete { .. } => "calendar_bulk_delete",
            Intent::FindPlace { .. } => "find_place",
            Intent::PlaceDetails { .. } => "place_details",
            Intent::WebSearch { .. } => "web_search",
            Intent::MemoryQuery { .. } => "memory_query",
            Intent::Other => "other",
        }
    }

    /// Parses a JSON object. Unknown tags and malformed payloads map to `Other`.
    pub fn from_value(value: serde_json::Value) -> Self {
        let tag = value
            .get("intent")
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        match serde_json::from_value::<Intent>(value) {
            Ok(intent) => intent,
            Err(err) => {
                tracing::debug!(tag = ?tag, "unparseable intent payload: {err}");
                Intent::Other
            }
        }
    }

    /// Parses raw model output; `None` when it holds no JSON object at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let json = wassist_provider::extract_json_object(raw)?;
        let value: serde_json::Value = serde_json::from_str(json).ok()?;
        if !value.is_object() {
            return None;
        }
        Some(Self::from_value(value))
    }

    pub fn is_other(&self) -> bool {
        matches!(self, Intent::Other)
    }
}

/// Accepts strings, numbers and booleans; blank strings and the literal
/// `"null"` become `None`.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_send_email_ignoring_extra_fields() {
        let intent = Intent::from_value(json!({
            "intent": "send_email",
            "recipient_name": "Sarah",
            "recipient_email": "",
            "subject": "Running late",
            "email_body": "Hi Sarah, I'll be late.",
            "place_query": "...",
            "calendar_start": null
        }));
        assert_eq!(
            intent,
            Intent::SendEmail {
                recipient_email: None,
                recipient_name: Some("Sarah".into()),
                subject: Some("Running late".into()),
                email_body: Some("Hi Sarah, I'll be late.".into()),
            }
        );
    }

    #[test]
    fn unknown_tag_becomes_other() {
        assert_eq!(
            Intent::from_value(json!({"intent": "order_pizza"})),
            Intent::Other
        );
        assert_eq!(Intent::from_value(json!({"no_tag": true})), Intent::Other);
    }

    #[test]
    fn unit_variants_accept_extra_fields() {
        assert_eq!(
            Intent::from_value(json!({"intent": "calendar_list", "subject": ""})),
            Intent::CalendarList
        );
        assert_eq!(
            Intent::from_value(json!({"intent": "list_contacts"})),
            Intent::ListContacts
        );
    }

    #[test]
    fn numbers_are_accepted_as_text() {
        let intent = Intent::from_value(json!({
            "intent": "add_contact",
            "contact_name": "Bob",
            "contact_phone": 5551234
        }));
        assert_eq!(
            intent,
            Intent::AddContact {
                contact_name: Some("Bob".into()),
                contact_email: None,
                contact_phone: Some("5551234".into()),
            }
        );
    }

    #[test]
    fn calendar_create_flattens_event_fields() {
        let intent = Intent::from_value(json!({
            "intent": "calendar_create",
            "calendar_summary": "Standup",
            "calendar_start": "2026-10-20T09:00:00",
            "calendar_end": "2026-10-20T09:15:00"
        }));
        let Intent::CalendarCreate { event } = intent else {
            panic!("expected calendar_create");
        };
        assert_eq!(event.calendar_summary.as_deref(), Some("Standup"));
        assert_eq!(event.calendar_description, None);
    }

    #[test]
    fn bulk_create_reads_event_list() {
        let intent = Intent::from_value(json!({
            "intent": "calendar_bulk_create",
            "calendar_events": [
                {"calendar_summary": "A", "calendar_start": "2026-10-20T09:00:00", "calendar_end": "2026-10-20T10:00:00"},
                {"calendar_summary": "B"}
            ]
        }));
        let Intent::CalendarBulkCreate { calendar_events } = intent else {
            panic!("expected bulk create");
        };
        assert_eq!(calendar_events.len(), 2);
        assert_eq!(calendar_events[1].calendar_start, None);
    }

    #[test]
    fn wrong_field_shape_becomes_other() {
        assert_eq!(
            Intent::from_value(json!({"intent": "calendar_bulk_create", "calendar_events": "x"})),
            Intent::Other
        );
    }

    #[test]
    fn parse_handles_fenced_output_and_garbage() {
        let raw = "```json\n{\"intent\": \"memory_query\", \"memory_query\": \"emails\"}\n```";
        assert_eq!(
            Intent::parse(raw),
            Some(Intent::MemoryQuery {
                memory_query: Some("emails".into())
            })
        );
        assert_eq!(Intent::parse("I cannot help with that"), None);
        assert_eq!(Intent::parse("{not json}"), None);
    }

    #[test]
    fn every_tag_round_trips_through_tag() {
        for tag in ALL_TAGS {
            let value = match tag {
                "calendar_create" => json!({"intent": tag, "calendar_summary": "x"}),
                _ => json!({"intent": tag}),
            };
            assert_eq!(Intent::from_value(value).tag(), tag);
        }
    }

    #[test]
    fn serialized_payload_carries_tag() {
        let value = serde_json::to_value(Intent::FindPlace {
            place_query: Some("sushi".into()),
            place_location: None,
        })
        .unwrap();
        assert_eq!(value["intent"], "find_place");
        assert_eq!(value["place_query"], "sushi");
    }
}
