//! Classifies a sender's reply to a pending email draft.

use std::sync::LazyLock;

use regex::Regex;

/// What a reply to a proposed draft asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftDecision {
    Approve,
    Cancel,
    /// Anything else is an editing instruction.
    Revise,
}

static APPROVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(yes|send it|please send|go ahead|confirm|approve)\b").unwrap()
});

static NEGATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(cancel|don't send|dont send|do not send)\b").unwrap());

static NO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bno\b").unwrap());

impl DraftDecision {
    /// An explicit negation ("don't send", "cancel") always cancels. Otherwise
    /// approval wins over a bare "no", so "yes, no changes" sends.
    pub fn classify(reply: &str) -> Self {
        let lower = reply.trim().to_lowercase().replace('\u{2019}', "'");
        if NEGATION.is_match(&lower) {
            Self::Cancel
        } else if APPROVE.is_match(&lower) {
            Self::Approve
        } else if NO.is_match(&lower) {
            Self::Cancel
        } else {
            Self::Revise
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_phrases() {
        for reply in ["Yes, send it", "yes", "Go ahead!", "please send", "CONFIRM", "approve"] {
            assert_eq!(DraftDecision::classify(reply), DraftDecision::Approve, "{reply}");
        }
    }

    #[test]
    fn cancel_phrases() {
        for reply in [
            "No",
            "cancel that",
            "don’t send it",
            "don't send it",
            "do not send it",
            "No, don't send it",
            "yes, actually cancel",
        ] {
            assert_eq!(DraftDecision::classify(reply), DraftDecision::Cancel, "{reply}");
        }
    }

    #[test]
    fn phrases_match_whole_words_only() {
        // "know" and "yesterday" must not read as no/yes.
        assert_eq!(
            DraftDecision::classify("mention you know about yesterday's call"),
            DraftDecision::Revise
        );
        assert_eq!(DraftDecision::classify("make it more formal"), DraftDecision::Revise);
    }

    #[test]
    fn approval_checked_before_cancel() {
        assert_eq!(DraftDecision::classify("yes, no changes"), DraftDecision::Approve);
    }
}
