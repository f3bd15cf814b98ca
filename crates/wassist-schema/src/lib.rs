use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub trace_id: Uuid,
    pub channel_type: String,
    /// Stable conversation key, e.g. `whatsapp:+15551234567`
    pub sender: String,
    pub text: String,
    pub at: DateTime<Utc>,
    /// Attached media (voice notes, images)
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl InboundMessage {
    pub fn new(channel_type: impl Into<String>, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            channel_type: channel_type.into(),
            sender: sender.into(),
            text: text.into(),
            at: Utc::now(),
            attachments: vec![],
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// First audio attachment, if the message is a voice note.
    pub fn audio(&self) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|a| a.kind == AttachmentKind::Audio)
    }
}

/// Media attachment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// Provider URL of the media
    pub url: String,
    /// MIME type if known
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl Attachment {
    pub fn from_mime(url: impl Into<String>, mime_type: &str) -> Self {
        Self {
            kind: AttachmentKind::from_mime(mime_type),
            url: url.into(),
            mime_type: if mime_type.is_empty() {
                None
            } else {
                Some(mime_type.to_string())
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl AttachmentKind {
    pub fn from_mime(mime_type: &str) -> Self {
        let major = mime_type.split('/').next().unwrap_or("").trim();
        match major.to_ascii_lowercase().as_str() {
            "audio" => Self::Audio,
            "image" => Self::Image,
            "video" => Self::Video,
            "application" | "text" => Self::Document,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub trace_id: Uuid,
    pub channel_type: String,
    pub recipient: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl OutboundMessage {
    pub fn reply_to(inbound: &InboundMessage, text: impl Into<String>) -> Self {
        Self {
            trace_id: inbound.trace_id,
            channel_type: inbound.channel_type.clone(),
            recipient: inbound.sender.clone(),
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// A write destined for the memory store. Writes for one message are
/// published in order on a single topic so the worker sees the raw
/// conversation before the intent that was extracted from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MemoryWrite {
    Conversation {
        trace_id: Uuid,
        sender: String,
        text: String,
        at: DateTime<Utc>,
    },
    IntentClassified {
        trace_id: Uuid,
        sender: String,
        intent: String,
        /// Raw extractor payload, used for preference learning
        payload: serde_json::Value,
    },
}

impl MemoryWrite {
    pub fn sender(&self) -> &str {
        match self {
            Self::Conversation { sender, .. } | Self::IntentClassified { sender, .. } => sender,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusMessage {
    MessageAccepted {
        trace_id: Uuid,
        sender: String,
    },
    ReplyReady {
        outbound: OutboundMessage,
    },
    /// Outbound delivery was throttled; the text waits for the sender's next webhook call.
    DeliveryDeferred {
        trace_id: Uuid,
        sender: String,
        text: String,
    },
    TaskFailed {
        trace_id: Uuid,
        error: String,
    },
    MemoryWriteRequested {
        write: MemoryWrite,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_kind_from_mime() {
        assert_eq!(AttachmentKind::from_mime("audio/ogg"), AttachmentKind::Audio);
        assert_eq!(AttachmentKind::from_mime("Audio/AMR"), AttachmentKind::Audio);
        assert_eq!(AttachmentKind::from_mime("image/jpeg"), AttachmentKind::Image);
        assert_eq!(AttachmentKind::from_mime("application/pdf"), AttachmentKind::Document);
        assert_eq!(AttachmentKind::from_mime(""), AttachmentKind::Other);
    }

    #[test]
    fn inbound_audio_picks_first_audio_attachment() {
        let msg = InboundMessage::new("whatsapp", "whatsapp:+1555", "")
            .with_attachment(Attachment::from_mime("https://m/1", "image/png"))
            .with_attachment(Attachment::from_mime("https://m/2", "audio/ogg"));
        let audio = msg.audio().unwrap();
        assert_eq!(audio.url, "https://m/2");
        assert_eq!(audio.mime_type.as_deref(), Some("audio/ogg"));
    }

    #[test]
    fn reply_to_targets_sender() {
        let inbound = InboundMessage::new("whatsapp", "whatsapp:+1555", "hi");
        let out = OutboundMessage::reply_to(&inbound, "hello");
        assert_eq!(out.recipient, "whatsapp:+1555");
        assert_eq!(out.trace_id, inbound.trace_id);
        assert_eq!(out.text, "hello");
    }

    #[test]
    fn bus_message_serde_roundtrip() {
        let trace_id = Uuid::new_v4();
        let msg = BusMessage::MemoryWriteRequested {
            write: MemoryWrite::IntentClassified {
                trace_id,
                sender: "whatsapp:+1555".into(),
                intent: "send_email".into(),
                payload: serde_json::json!({"intent": "send_email"}),
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: BusMessage = serde_json::from_str(&json).unwrap();
        match back {
            BusMessage::MemoryWriteRequested { write } => {
                assert_eq!(write.sender(), "whatsapp:+1555");
                assert!(matches!(write, MemoryWrite::IntentClassified { intent, .. } if intent == "send_email"));
            }
            _ => panic!("expected MemoryWriteRequested"),
        }
    }
}
