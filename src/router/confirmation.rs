//! Confirmation side flow for writes that would replace existing content.
//!
//! When a write directive targets a document that already has content, the
//! orchestrator parks it in a [`PendingConfirmation`] and asks whether to
//! continue from the existing document, start fresh, or cancel. Replies are
//! analyzed locally without a collaborator call.

use regex::Regex;
use std::sync::LazyLock;

use super::action::ProposedAction;

static CONTINUE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(continue|resume|pick up|where we left|previous|last session|keep)\b").unwrap()
});

static START_NEW_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(new|fresh|start over|from scratch|clean|restart|replace)\b").unwrap()
});

static DECLINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(no|nope|nah|not now|cancel|never mind|nevermind|forget it|stop)\b|\bdon'?t\b")
        .unwrap()
});

const AMBIGUOUS_WORDS: [&str; 7] = ["yes", "yeah", "yep", "okay", "ok", "sure", "alright"];

/// Classification of a reply to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationReply {
    ContinuePrevious,
    StartNew,
    Declined,
    /// An affirmative that does not say which option
    Ambiguous,
    Unintelligible,
}

/// The decision a pending confirmation resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    ContinuePrevious,
    StartNew,
    Declined,
}

pub fn analyze_confirmation_response(text: &str) -> ConfirmationReply {
    let lower = text
        .to_lowercase()
        .trim()
        .trim_end_matches(['.', '!', '?', ','])
        .to_string();
    let words: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();

    if CONTINUE_REGEX.is_match(&lower) {
        return ConfirmationReply::ContinuePrevious;
    }
    if START_NEW_REGEX.is_match(&lower) {
        return ConfirmationReply::StartNew;
    }
    if DECLINE_REGEX.is_match(&lower) {
        return ConfirmationReply::Declined;
    }
    if is_ambiguous_affirmative(&words, &lower) {
        return ConfirmationReply::Ambiguous;
    }
    ConfirmationReply::Unintelligible
}

fn is_ambiguous_affirmative(words: &[&str], text: &str) -> bool {
    match words {
        [only] => AMBIGUOUS_WORDS.contains(only),
        [first, _] if AMBIGUOUS_WORDS.contains(first) => true,
        _ => matches!(text, "yes please" | "okay please" | "sure thing"),
    }
}

/// Outcome of feeding one reply into a [`PendingConfirmation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Resolved(SessionAction),
    /// Ask again with this prompt
    Reprompt(String),
    /// Second unclear reply; the pending write is dropped
    Unintelligible,
}

/// A document write waiting for the user to choose how to proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub action: ProposedAction,
    pub is_initial_prompt: bool,
    pub session_action: Option<SessionAction>,
}

impl PendingConfirmation {
    pub fn new(action: ProposedAction) -> Self {
        Self {
            action,
            is_initial_prompt: true,
            session_action: None,
        }
    }

    /// Question asked when the confirmation is first raised.
    pub fn prompt(&self) -> String {
        let target = match self.action {
            ProposedAction::WriteDescription => "a description",
            ProposedAction::WritePhasing => "a phasing document",
            _ => "a description and phasing",
        };
        format!(
            "There's already {target}. Should I continue from it, start new, or cancel?"
        )
    }

    pub fn respond(&mut self, text: &str) -> ConfirmationOutcome {
        let decision = match analyze_confirmation_response(text) {
            ConfirmationReply::ContinuePrevious => SessionAction::ContinuePrevious,
            ConfirmationReply::StartNew => SessionAction::StartNew,
            ConfirmationReply::Declined => SessionAction::Declined,
            reply @ (ConfirmationReply::Ambiguous | ConfirmationReply::Unintelligible) => {
                if !self.is_initial_prompt {
                    return ConfirmationOutcome::Unintelligible;
                }
                self.is_initial_prompt = false;
                let prompt = if reply == ConfirmationReply::Ambiguous {
                    "Do you want me to continue from what's there, or start new?"
                } else {
                    "Sorry, I didn't catch that. Say continue, start new, or cancel."
                };
                return ConfirmationOutcome::Reprompt(prompt.to_string());
            }
        };
        self.session_action = Some(decision);
        ConfirmationOutcome::Resolved(decision)
    }
}
