use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use wassist_provider::{extract_json_object, LlmProvider, LlmRequest};

use crate::sanitize::sanitize_for_prompt;
use crate::state::EmailDraft;

#[async_trait]
pub trait DraftReviser: Send + Sync {
    /// Produces a complete replacement draft for the same recipient.
    async fn revise(&self, draft: &EmailDraft, instruction: &str) -> Result<EmailDraft>;
}

pub struct LlmDraftReviser {
    provider: Arc<dyn LlmProvider>,
    model: String,
    signature: String,
}

#[derive(Deserialize)]
struct RevisedFields {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    email_body: Option<String>,
}

impl LlmDraftReviser {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            signature: signature.into(),
        }
    }
}

pub fn build_revision_prompt(draft: &EmailDraft, instruction: &str, signature: &str) -> String {
    format!(
        r#"You are helping to revise an email draft based on user feedback.

Current email:
To: {to}
Subject: {subject}
Body: {body}

User's revision request: "{instruction}"

Revise the email according to the request. Keep the same recipient; you may change the subject and body. Always sign off as "{signature}".

Respond ONLY in this JSON format:
{{
  "to_email": "{to}",
  "subject": "revised subject line",
  "email_body": "revised email body content"
}}"#,
        to = draft.to,
        subject = draft.subject,
        body = draft.body,
        instruction = sanitize_for_prompt(instruction),
    )
}

#[async_trait]
impl DraftReviser for LlmDraftReviser {
    async fn revise(&self, draft: &EmailDraft, instruction: &str) -> Result<EmailDraft> {
        let system = format!(
            "You are an expert email writer who revises emails based on user feedback. \
             Always stay professional and sign as {}.",
            self.signature
        );
        let request = LlmRequest::simple(
            self.model.clone(),
            Some(system),
            build_revision_prompt(draft, instruction, &self.signature),
        )
        .json();
        let response = self
            .provider
            .chat(request)
            .await
            .context("draft revision call failed")?;

        let json = extract_json_object(&response.text)
            .ok_or_else(|| anyhow!("revision reply held no JSON object"))?;
        let fields: RevisedFields =
            serde_json::from_str(json).context("revision reply was not valid JSON")?;
        let subject = fields
            .subject
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("revision is missing a subject"))?;
        let body = fields
            .email_body
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| anyhow!("revision is missing a body"))?;

        Ok(EmailDraft {
            to: draft.to.clone(),
            subject,
            body,
        })
    }
}
