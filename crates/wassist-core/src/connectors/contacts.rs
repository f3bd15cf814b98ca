//! Contact book backed by a Google Sheets worksheet.
//!
//! Row 1 is a header naming the columns (`full_name`, `email`,
//! `phone_number`, `address`); every later row is one contact.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_status, http_client, ConnectorResult, ContactBook};
use crate::config::ContactsConfig;
use crate::error::ConnectorError;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
const PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

impl Contact {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    /// The email, unless blank or the `N/A` placeholder.
    pub fn email_address(&self) -> Option<&str> {
        present(&self.email)
    }

    pub fn phone_number(&self) -> Option<&str> {
        present(&self.phone)
    }

    pub fn street_address(&self) -> Option<&str> {
        present(&self.address)
    }
}

fn present(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case(PLACEHOLDER) {
        None
    } else {
        Some(value)
    }
}

/// Columns a contact update may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    Name,
    Email,
    Phone,
}

impl ContactField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name" | "full_name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "phone" | "phone_number" => Some(Self::Phone),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }

    fn apply(&self, contact: &mut Contact, value: &str) {
        match self {
            Self::Name => contact.full_name = value.to_string(),
            Self::Email => contact.email = value.to_string(),
            Self::Phone => contact.phone = value.to_string(),
        }
    }
}

/// Case-insensitive exact match on the full name, falling back to the first
/// contact whose name parts contain every part of `name`.
pub fn match_contact<'a>(contacts: &'a [Contact], name: &str) -> Option<&'a Contact> {
    match_index(contacts, name).map(|i| &contacts[i])
}

fn exact_index(contacts: &[Contact], name: &str) -> Option<usize> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    contacts
        .iter()
        .position(|c| c.full_name.trim().to_lowercase() == wanted)
}

fn match_index(contacts: &[Contact], name: &str) -> Option<usize> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    exact_index(contacts, &wanted).or_else(|| {
        let wanted_parts: Vec<&str> = wanted.split_whitespace().collect();
        contacts.iter().position(|c| {
            let full = c.full_name.trim().to_lowercase();
            let full_parts: Vec<&str> = full.split_whitespace().collect();
            wanted_parts
                .iter()
                .all(|part| full_parts.iter().any(|fp| fp.contains(part)))
        })
    })
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    name: usize,
    email: usize,
    phone: usize,
    address: usize,
}

impl Columns {
    fn from_header(header: &[String]) -> Self {
        let find = |wanted: &str, fallback: usize| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(wanted))
                .unwrap_or(fallback)
        };
        Self {
            name: find("full_name", 0),
            email: find("email", 1),
            phone: find("phone_number", 2),
            address: find("address", 3),
        }
    }

    fn of(&self, field: ContactField) -> usize {
        match field {
            ContactField::Name => self.name,
            ContactField::Email => self.email,
            ContactField::Phone => self.phone,
        }
    }

    fn width(&self) -> usize {
        [self.name, self.email, self.phone, self.address]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }

    fn contact(&self, row: &[String]) -> Contact {
        let cell = |i: usize| row.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        Contact {
            full_name: cell(self.name),
            email: cell(self.email),
            phone: cell(self.phone),
            address: cell(self.address),
        }
    }

    fn row(&self, contact: &Contact) -> Vec<String> {
        let mut row = vec![String::new(); self.width()];
        row[self.name] = contact.full_name.clone();
        row[self.email] = contact.email.clone();
        row[self.phone] = contact.phone.clone();
        row[self.address] = contact.address.clone();
        row
    }
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

/// All data rows in sheet order, blank ones included, so that an index maps
/// straight to a sheet row.
struct SheetSnapshot {
    columns: Columns,
    contacts: Vec<Contact>,
}

impl SheetSnapshot {
    fn parse(range: ValueRange) -> Self {
        let mut rows = range.values.into_iter().map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect::<Vec<String>>()
        });
        let header = rows.next().unwrap_or_default();
        let columns = Columns::from_header(&header);
        let contacts = rows.map(|row| columns.contact(&row)).collect();
        Self { columns, contacts }
    }
}

pub struct GoogleSheetsContacts {
    sheet_id: String,
    worksheet: String,
    access_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl GoogleSheetsContacts {
    pub fn new(
        sheet_id: impl Into<String>,
        worksheet: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            worksheet: worksheet.into(),
            access_token: access_token.into(),
            api_base: SHEETS_API_BASE.to_string(),
            client: http_client(timeout),
        }
    }

    pub fn from_config(config: &ContactsConfig, timeout: Duration) -> Self {
        let contacts = Self::new(
            &config.sheet_id,
            &config.worksheet,
            &config.access_token,
            timeout,
        );
        match &config.api_base {
            Some(base) => contacts.with_api_base(base),
            None => contacts,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/v4/spreadsheets/{}", self.api_base, self.sheet_id)
    }

    fn values_url(&self, a1: &str) -> String {
        let sheet = if self.worksheet.chars().all(|c| c.is_ascii_alphanumeric()) {
            self.worksheet.clone()
        } else {
            format!("'{}'", self.worksheet.replace('\'', "''"))
        };
        let range = if a1.is_empty() {
            sheet
        } else {
            format!("{sheet}!{a1}")
        };
        format!(
            "{}/values/{}",
            self.spreadsheet_url(),
            urlencoding::encode(&range)
        )
    }

    async fn snapshot(&self) -> ConnectorResult<SheetSnapshot> {
        let resp = self
            .client
            .get(self.values_url(""))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let range: ValueRange = check_status(resp).await?.json().await?;
        Ok(SheetSnapshot::parse(range))
    }

    async fn numeric_sheet_id(&self) -> ConnectorResult<i64> {
        let resp = self
            .client
            .get(self.spreadsheet_url())
            .query(&[("fields", "sheets.properties")])
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let spreadsheet: Spreadsheet = check_status(resp).await?.json().await?;
        spreadsheet
            .sheets
            .into_iter()
            .find(|s| s.properties.title == self.worksheet)
            .map(|s| s.properties.sheet_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("worksheet {}", self.worksheet)))
    }

    /// Data rows start at sheet row 2.
    fn sheet_row(index: usize) -> usize {
        index + 2
    }
}

#[async_trait]
impl ContactBook for GoogleSheetsContacts {
    async fn list(&self) -> ConnectorResult<Vec<Contact>> {
        let mut contacts = self.snapshot().await?.contacts;
        contacts.retain(|c| !c.full_name.is_empty());
        Ok(contacts)
    }

    async fn add(&self, contact: &Contact) -> ConnectorResult<bool> {
        let snapshot = self.snapshot().await?;
        if exact_index(&snapshot.contacts, &contact.full_name).is_some() {
            tracing::info!(name = %contact.full_name, "contact already exists");
            return Ok(false);
        }
        let resp = self
            .client
            .post(format!("{}:append", self.values_url("A1")))
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "values": [snapshot.columns.row(contact)] }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(true)
    }

    async fn update(
        &self,
        name: &str,
        field: ContactField,
        value: &str,
    ) -> ConnectorResult<Contact> {
        let snapshot = self.snapshot().await?;
        let index = exact_index(&snapshot.contacts, name)
            .ok_or_else(|| ConnectorError::NotFound(format!("Contact {name} not found")))?;
        let cell = format!(
            "{}{}",
            column_letter(snapshot.columns.of(field)),
            Self::sheet_row(index)
        );
        let resp = self
            .client
            .put(self.values_url(&cell))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "values": [[value]] }))
            .send()
            .await?;
        check_status(resp).await?;

        let mut updated = snapshot.contacts[index].clone();
        field.apply(&mut updated, value);
        Ok(updated)
    }

    async fn delete(&self, name: &str) -> ConnectorResult<Contact> {
        let snapshot = self.snapshot().await?;
        let index = match_index(&snapshot.contacts, name)
            .ok_or_else(|| ConnectorError::NotFound(format!("Contact {name} not found")))?;
        let gid = self.numeric_sheet_id().await?;
        let row = Self::sheet_row(index);
        let body = serde_json::json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": gid,
                        "dimension": "ROWS",
                        "startIndex": row - 1,
                        "endIndex": row,
                    }
                }
            }]
        });
        let resp = self
            .client
            .post(format!("{}:batchUpdate", self.spreadsheet_url()))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(snapshot.contacts[index].clone())
    }
}
