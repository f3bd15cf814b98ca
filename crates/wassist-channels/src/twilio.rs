use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use wassist_core::connectors::{Messenger, Transcriber};
use wassist_core::{DeliveryError, TwilioConfig};
use wassist_provider::SpeechToText;
use wassist_schema::{Attachment, InboundMessage};

const TWILIO_API_BASE: &str = "https://api.twilio.com";
const CHANNEL_TYPE: &str = "whatsapp";
/// Twilio's "daily messages limit exceeded" error code.
const DAILY_LIMIT_CODE: &str = "63038";

/// Form fields Twilio posts to the webhook for one WhatsApp message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwilioWebhookForm {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "NumMedia", default)]
    pub num_media: Option<String>,
    #[serde(rename = "MediaContentType0", default)]
    pub media_content_type: Option<String>,
    #[serde(rename = "MediaUrl0", default)]
    pub media_url: Option<String>,
}

impl TwilioWebhookForm {
    fn media_count(&self) -> usize {
        self.num_media
            .as_deref()
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn into_inbound(self) -> InboundMessage {
        let has_media = self.media_count() > 0;
        let mut inbound = InboundMessage::new(CHANNEL_TYPE, self.from.trim(), self.body.trim());
        if has_media {
            if let Some(url) = self.media_url.filter(|u| !u.trim().is_empty()) {
                let mime = self.media_content_type.unwrap_or_default();
                inbound = inbound.with_attachment(Attachment::from_mime(url, &mime));
            }
        }
        inbound
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Whether a failed send was refused because of Twilio rate limiting.
pub fn is_throttle(status: reqwest::StatusCode, body: &str) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || body.contains(DAILY_LIMIT_CODE)
        || body.to_lowercase().contains("daily messages limit")
}

/// Sends WhatsApp replies through the Twilio Messages API.
pub struct TwilioMessenger {
    account_sid: String,
    auth_token: String,
    from: String,
    api_base: String,
    client: reqwest::Client,
}

impl TwilioMessenger {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        whatsapp_number: &str,
        timeout: Duration,
    ) -> Self {
        let number = whatsapp_number.trim();
        let from = if number.starts_with("whatsapp:") {
            number.to_string()
        } else {
            format!("whatsapp:{number}")
        };
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from,
            api_base: TWILIO_API_BASE.to_string(),
            client: http_client(timeout),
        }
    }

    pub fn from_config(config: &TwilioConfig, timeout: Duration) -> Self {
        let messenger = Self::new(
            &config.account_sid,
            &config.auth_token,
            &config.whatsapp_number,
            timeout,
        );
        match &config.api_base {
            Some(base) => messenger.with_api_base(base),
            None => messenger,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl Messenger for TwilioMessenger {
    async fn send(&self, to: &str, text: &str) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("From", self.from.as_str()), ("To", to), ("Body", text)])
            .send()
            .await
            .map_err(|e| DeliveryError::Failed(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(to, chars = text.len(), "whatsapp message queued");
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        let detail = format!("HTTP {status}: {body}");
        if is_throttle(status, &body) {
            Err(DeliveryError::Throttled(detail))
        } else {
            Err(DeliveryError::Failed(detail))
        }
    }
}

/// Downloads a Twilio-hosted voice note and transcribes it.
pub struct TwilioTranscriber {
    account_sid: String,
    auth_token: String,
    client: reqwest::Client,
    stt: Arc<dyn SpeechToText>,
}

impl TwilioTranscriber {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        stt: Arc<dyn SpeechToText>,
        timeout: Duration,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            client: http_client(timeout),
            stt,
        }
    }

    async fn download(&self, media_url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(media_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .context("media download failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("media download failed: HTTP {}", resp.status()));
        }
        let bytes = resp.bytes().await.context("media download interrupted")?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Transcriber for TwilioTranscriber {
    async fn transcribe(&self, media_url: &str) -> Result<String> {
        let audio = self.download(media_url).await?;
        if audio.is_empty() {
            return Err(anyhow!("voice note is empty"));
        }
        tracing::debug!(bytes = audio.len(), "voice note downloaded");
        let text = self.stt.transcribe(audio, "voice_note.ogg").await?;
        Ok(text.trim().to_string())
    }
}
