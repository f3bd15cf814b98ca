use std::sync::LazyLock;

use regex::Regex;

use super::Dispatcher;
use crate::connectors::{Contact, ContactField};
use crate::error::ConnectorError;
use crate::replies::{self, Service};

const NOT_AVAILABLE: &str = "N/A";

// Dictated addresses come through as "john at example.com".
static SPOKEN_AT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\s+at\s+").unwrap());

pub(crate) fn normalize_email(raw: &str) -> String {
    SPOKEN_AT.replace_all(raw.trim(), "@").into_owned()
}

impl Dispatcher {
    pub(super) async fn add_contact(
        &self,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> String {
        let Some(name) = name else {
            return replies::CONTACT_NAME_MISSING.to_string();
        };
        if email.is_none() && phone.is_none() {
            return replies::ask_contact_details(&name);
        }
        let contact = Contact::new(name.as_str())
            .with_email(
                email
                    .map(|e| normalize_email(&e))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            )
            .with_phone(phone.unwrap_or_else(|| NOT_AVAILABLE.to_string()));

        match self
            .bounded("contact add", self.connectors.contacts.add(&contact))
            .await
        {
            Ok(true) => replies::contact_added(&name),
            Ok(false) => replies::contact_not_added(&name),
            Err(err) => {
                tracing::warn!(contact = %name, error = %err, "contact add failed");
                replies::connector_failure("add the contact", Service::Contacts, &err)
            }
        }
    }

    pub(super) async fn lookup_contact(
        &self,
        name: Option<String>,
        field: Option<String>,
    ) -> String {
        let Some(name) = name else {
            return replies::LOOKUP_NAME_MISSING.to_string();
        };
        let field = field.unwrap_or_else(|| "all".to_string());
        match self
            .bounded("contact lookup", self.connectors.contacts.lookup(&name))
            .await
        {
            Ok(Some(contact)) => replies::contact_lookup(&contact, &field),
            Ok(None) | Err(ConnectorError::NotFound(_)) => replies::contact_missing(&name),
            Err(err) => replies::connector_failure("look up the contact", Service::Contacts, &err),
        }
    }

    pub(super) async fn update_contact(
        &self,
        name: Option<String>,
        field: Option<String>,
        value: Option<String>,
    ) -> String {
        let (Some(name), Some(field), Some(value)) = (name, field, value) else {
            return replies::UPDATE_DETAILS_MISSING.to_string();
        };
        let Some(field) = ContactField::parse(&field) else {
            return replies::INVALID_CONTACT_FIELD.to_string();
        };
        let value = match field {
            ContactField::Email => normalize_email(&value),
            _ => value,
        };
        let update = self.connectors.contacts.update(&name, field, &value);
        match self.bounded("contact update", update).await {
            Ok(_) => replies::contact_updated(&name, field.as_str(), &value),
            Err(ConnectorError::NotFound(_)) => replies::contact_not_found(&name),
            Err(err) => replies::connector_failure("update the contact", Service::Contacts, &err),
        }
    }

    pub(super) async fn delete_contact(&self, name: Option<String>) -> String {
        let Some(name) = name else {
            return replies::DELETE_NAME_MISSING.to_string();
        };
        match self
            .bounded("contact delete", self.connectors.contacts.delete(&name))
            .await
        {
            Ok(removed) => replies::contact_deleted(&removed.full_name),
            Err(ConnectorError::NotFound(_)) => replies::contact_not_found(&name),
            Err(err) => replies::connector_failure("delete the contact", Service::Contacts, &err),
        }
    }

    pub(super) async fn list_contacts(&self) -> String {
        match self
            .bounded("contact list", self.connectors.contacts.list())
            .await
        {
            Ok(contacts) => replies::contact_list(&contacts),
            Err(err) => replies::connector_failure("list your contacts", Service::Contacts, &err),
        }
    }
}
