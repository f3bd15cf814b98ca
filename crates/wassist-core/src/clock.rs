use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;

static DATE_TIME_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(what is the date|what's the date|what date is it|what is today's date|what's today's date|date today|what time is it|what's the time|current time|time now)\b",
    )
    .unwrap()
});

/// Source of "now" in the assistant's fixed offset.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    at: DateTime<FixedOffset>,
}

impl FixedClock {
    pub fn new(at: DateTime<FixedOffset>) -> Self {
        Self { at }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.at
    }
}

pub fn offset_from_hours(hours: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(hours * 3600).ok_or_else(|| anyhow!("invalid utc offset: {hours}h"))
}

/// `UTC+4`, `UTC-5`, `UTC`.
pub fn offset_label(offset: &FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let hours = secs / 3600;
    let minutes = (secs.abs() % 3600) / 60;
    match (hours, minutes) {
        (0, 0) => "UTC".to_string(),
        (h, 0) => format!("UTC{h:+}"),
        (h, m) => format!("UTC{h:+}:{m:02}"),
    }
}

/// Answers a plain date or time question locally. `None` when the text is
/// not one.
pub fn answer_date_time(text: &str, now: DateTime<FixedOffset>) -> Option<String> {
    let lower = text.trim().to_lowercase().replace('\u{2019}', "'");
    if !DATE_TIME_QUERY.is_match(&lower) {
        return None;
    }
    let label = offset_label(now.offset());
    let time = now.format("%I:%M %p");
    let date = now.format("%A, %B %d, %Y");
    if lower.contains("time") {
        Some(format!("🕐 Current time ({label}): {time}\n📅 Date: {date}"))
    } else {
        Some(format!("📅 Today's date: {date}\n🕐 Current time ({label}): {time}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dubai_afternoon() -> DateTime<FixedOffset> {
        offset_from_hours(4)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 19, 14, 5, 0)
            .unwrap()
    }

    #[test]
    fn time_question_leads_with_time() {
        let reply = answer_date_time("What time is it?", dubai_afternoon()).unwrap();
        assert_eq!(
            reply,
            "🕐 Current time (UTC+4): 02:05 PM\n📅 Date: Monday, October 19, 2026"
        );
    }

    #[test]
    fn date_question_leads_with_date() {
        let reply = answer_date_time("what’s the date", dubai_afternoon()).unwrap();
        assert!(reply.starts_with("📅 Today's date: Monday, October 19, 2026"));
    }

    #[test]
    fn unrelated_text_is_not_answered() {
        assert!(answer_date_time("update today's meeting", dubai_afternoon()).is_none());
        assert!(answer_date_time("send an email to John", dubai_afternoon()).is_none());
    }

    #[test]
    fn phrases_are_word_bounded() {
        assert!(answer_date_time("please update today", dubai_afternoon()).is_none());
        assert!(answer_date_time("is it lunch time now", dubai_afternoon()).is_some());
    }

    #[test]
    fn offset_labels() {
        assert_eq!(offset_label(&offset_from_hours(4).unwrap()), "UTC+4");
        assert_eq!(offset_label(&offset_from_hours(-5).unwrap()), "UTC-5");
        assert_eq!(offset_label(&offset_from_hours(0).unwrap()), "UTC");
        assert!(offset_from_hours(30).is_err());
    }

    #[test]
    fn fixed_clock_returns_its_instant() {
        let at = dubai_afternoon();
        assert_eq!(FixedClock::new(at).now(), at);
    }
}
