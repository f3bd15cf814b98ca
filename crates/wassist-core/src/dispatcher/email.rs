use super::Dispatcher;
use crate::approval::DraftDecision;
use crate::error::ConnectorError;
use crate::replies::{self, Service};
use crate::state::EmailDraft;

impl Dispatcher {
    /// Builds a draft from the extracted fields and holds it for approval.
    pub(super) async fn propose_email(
        &self,
        sender: &str,
        recipient_email: Option<String>,
        recipient_name: Option<String>,
        subject: Option<String>,
        body: Option<String>,
    ) -> String {
        let to = match (recipient_email, recipient_name) {
            (Some(email), _) => Some(email),
            (None, Some(name)) => match self.resolve_recipient(&name).await {
                Ok(Some(email)) => Some(email),
                Ok(None) => return replies::unknown_recipient(&name),
                Err(err) => {
                    return replies::connector_failure(
                        "look up the recipient",
                        Service::Contacts,
                        &err,
                    )
                }
            },
            (None, None) => None,
        };

        let (Some(to), Some(subject), Some(body)) = (to, subject, body) else {
            return replies::EMAIL_DETAILS_MISSING.to_string();
        };
        let draft = EmailDraft { to, subject, body };
        tracing::info!(sender = %sender, to = %draft.to, "email draft proposed");
        let reply = replies::draft_proposed(&draft);
        self.state.set_draft(sender, draft).await;
        reply
    }

    async fn resolve_recipient(&self, name: &str) -> Result<Option<String>, ConnectorError> {
        match self
            .bounded("contact lookup", self.connectors.contacts.lookup(name))
            .await
        {
            Ok(contact) => Ok(contact.and_then(|c| c.email_address().map(str::to_string))),
            Err(ConnectorError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Handles the sender's next message while a draft is pending.
    pub(super) async fn continue_draft(
        &self,
        sender: &str,
        draft: EmailDraft,
        text: &str,
    ) -> String {
        match DraftDecision::classify(text) {
            DraftDecision::Approve => {
                // Cleared before sending: a failed send is not retried by approving again.
                let draft = self.state.take_draft(sender).await.unwrap_or(draft);
                let send = self.connectors.email.send(&draft.to, &draft.subject, &draft.body);
                match self.bounded("email send", send).await {
                    Ok(message_id) => {
                        tracing::info!(sender = %sender, to = %draft.to, message_id = %message_id, "email sent");
                        replies::email_sent(&draft)
                    }
                    Err(err) => {
                        tracing::warn!(sender = %sender, to = %draft.to, error = %err, "email send failed");
                        replies::email_failed(&err)
                    }
                }
            }
            DraftDecision::Cancel => {
                self.state.clear_draft(sender).await;
                tracing::info!(sender = %sender, "email draft cancelled");
                replies::DRAFT_CANCELLED.to_string()
            }
            DraftDecision::Revise => {
                let limit = self.timeouts.revision();
                match tokio::time::timeout(limit, self.reviser.revise(&draft, text)).await {
                    Ok(Ok(revised)) => {
                        let reply = replies::draft_revised(&revised);
                        self.state.set_draft(sender, revised).await;
                        reply
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(sender = %sender, error = %e, "draft revision failed");
                        replies::REVISION_FAILED.to_string()
                    }
                    Err(_) => {
                        tracing::warn!(sender = %sender, "draft revision timed out");
                        replies::REVISION_FAILED.to_string()
                    }
                }
            }
        }
    }
}
