use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{check_status, http_client, ConnectorResult, EmailSender};
use crate::config::EmailConfig;

const RESEND_API_BASE: &str = "https://api.resend.com";

pub struct ResendEmailSender {
    api_key: String,
    sender: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ResendResponse {
    #[serde(default)]
    id: Option<String>,
}

impl ResendEmailSender {
    pub fn new(api_key: impl Into<String>, sender: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            sender: sender.into(),
            api_base: RESEND_API_BASE.to_string(),
            client: http_client(timeout),
        }
    }

    pub fn from_config(config: &EmailConfig, timeout: Duration) -> Self {
        let sender = Self::new(&config.api_key, &config.sender, timeout);
        match &config.api_base {
            Some(base) => sender.with_api_base(base),
            None => sender,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> ConnectorResult<String> {
        let payload = serde_json::json!({
            "from": self.sender,
            "to": [to],
            "subject": subject,
            "text": body,
        });
        let resp = self
            .client
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let parsed: ResendResponse = resp.json().await?;
        tracing::info!(to, "email accepted by resend");
        Ok(parsed.id.unwrap_or_else(|| "accepted".to_string()))
    }
}
