//! Decides whether free text the extractor could not classify reads like a
//! general knowledge question worth a web search.
//!
//! Precision first: anything that mentions email, contacts, the calendar or
//! places is rejected outright, and ambiguous text is not a search.

use std::sync::LazyLock;

use regex::Regex;

const MIN_CHARS: usize = 8;
const MIN_WORDS: usize = 2;

static EXCLUDED_TOPICS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(e-?mails?|mail|send|contacts?|phone numbers?|calendar|meetings?|events?|schedule|appointments?|remind(ers?)?|places?|restaurants?|cafes?|coffee|pizza|sushi|food|hotels?|near me|nearby)\b",
    )
    .unwrap()
});

static PLACE_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(find|show|locate|search for)\b.+\b(in|near|around)\s+\w").unwrap()
});

static QUESTION_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(what|who|when|where|why|how|which|is there|are there|can you tell me)\b")
        .unwrap()
});

static SEARCH_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(search|google|lookup|look up|find|explain|define|research|tell me about)\b")
        .unwrap()
});

static SEARCH_PHRASING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(best|top|recommend|suggest|vs|versus|compare|difference between|meaning of|definition of|latest|news about)\b",
    )
    .unwrap()
});

pub fn looks_like_search(text: &str) -> bool {
    let text = text.trim().to_lowercase();

    if text.chars().count() < MIN_CHARS || text.split_whitespace().count() < MIN_WORDS {
        return false;
    }
    if text.starts_with('/') {
        return false;
    }
    if EXCLUDED_TOPICS.is_match(&text) || PLACE_REQUEST.is_match(&text) {
        return false;
    }

    QUESTION_OPENER.is_match(&text)
        || SEARCH_VERB.is_match(&text)
        || text.ends_with('?')
        || SEARCH_PHRASING.is_match(&text)
}
