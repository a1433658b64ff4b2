//! Intent routing: one utterance in, exactly one [`ProposedAction`] out.
//!
//! Routing runs in three steps:
//! 1. A local grammar answers stop/repeat/yes/no without any external call
//! 2. Otherwise the classification collaborator returns a JSON envelope
//!    `{intent, action: {action, ...}, reasoning?}`
//! 3. The envelope is decoded against the closed taxonomy, filling in phase
//!    numbers and ranges from the transcript where needed
//!
//! Any failure along the way (collaborator error, malformed JSON, unknown
//! action, missing parameter) yields `Conversation(transcript)`. Routing
//! never errors and never drops a turn.

pub mod action;
pub mod confirmation;
pub mod extract;

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::RouteError;
use crate::history::{ConversationMessage, render_for_prompt};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::util::{extract_json_object, truncate_chars};

pub use action::ProposedAction;
pub use confirmation::{
    ConfirmationOutcome, ConfirmationReply, PendingConfirmation, SessionAction,
    analyze_confirmation_response,
};
pub use extract::{PhaseRange, extract_phase_number, extract_range};

/// Default cap on transcript length sent to the classifier.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 1500;

/// Default number of history messages given to the classifier.
pub const DEFAULT_HISTORY_TURNS: usize = 10;

const STOP_PHRASES: [&str; 4] = ["stop", "stop talking", "be quiet", "cancel"];
const REPEAT_PHRASES: [&str; 4] = ["repeat", "repeat that", "say that again", "what did you say"];
const YES_NO_PHRASES: [&str; 12] = [
    "yes", "yeah", "yep", "yup", "sure", "ok", "okay", "no", "nope", "nah", "yes please",
    "no thanks",
];

const ROUTER_SYSTEM_PROMPT: &str = r###"You route utterances for a voice-driven project spec editor. The user maintains two documents: a prose project description and a numbered phasing plan ("## Phase N: Title" sections).

Respond with one JSON object:
{
  "intent": "directive" | "conversation",
  "action": {"action": "<name>", ...fields},
  "reasoning": "<short reason>"
}

Action names and their fields:
- write_description, write_phasing, write_both: no fields
- read_description, read_phasing: no fields
- read_specific_phase: phaseNumber
- edit_description: content (what to change)
- edit_phasing: content (what to change), phaseNumber (omit to rewrite the whole plan)
- split_phase: phaseNumber, instructions
- merge_phases: startPhase, endPhase, instructions (optional)
- search, deep_search: query
- copy_description, copy_phasing, copy_both: no fields
- repeat_last, stop, conversation: no fields

Rules:
- Most utterances are conversation: brainstorming, describing ideas, asking questions. Use intent "conversation" unless the user gives an explicit command.
- A directive needs a command verb aimed at a document: write, create, read, edit, change, split, merge, search, copy.
- "should we write the description?" is conversation. "write the description" is a directive.
- Use deep_search only when the user asks for thorough or in-depth research.
- Copy the user's wording into content, instructions and query; do not paraphrase.

Examples:
"It should help people walk more" -> {"intent": "conversation", "action": {"action": "conversation"}}
"write the description" -> {"intent": "directive", "action": {"action": "write_description"}}
"read phase two" -> {"intent": "directive", "action": {"action": "read_specific_phase", "phaseNumber": 2}}
"change phase 2 to use TypeScript" -> {"intent": "directive", "action": {"action": "edit_phasing", "phaseNumber": 2, "content": "use TypeScript"}}
"split phase 3 into backend and frontend" -> {"intent": "directive", "action": {"action": "split_phase", "phaseNumber": 3, "instructions": "backend and frontend"}}
"merge phases 2 and 3" -> {"intent": "directive", "action": {"action": "merge_phases", "startPhase": 2, "endPhase": 3}}
"look up the best Rust audio crates" -> {"intent": "directive", "action": {"action": "search", "query": "best Rust audio crates"}}"###;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub max_input_chars: usize,
    pub history_turns: usize,
    pub model: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            history_turns: DEFAULT_HISTORY_TURNS,
            model: None,
        }
    }
}

/// Classifies utterances into actions.
pub struct Router {
    client: Arc<dyn CompletionClient>,
    config: RouterConfig,
}

impl Router {
    pub fn new(client: Arc<dyn CompletionClient>, config: RouterConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Classify one utterance. Infallible: every failure becomes a conversation turn.
    pub async fn classify(
        &self,
        transcript: &str,
        history: &[ConversationMessage],
        last_search_query: Option<&str>,
    ) -> ProposedAction {
        let transcript = transcript.trim();

        if let Some(action) = classify_local(transcript) {
            debug!(action = %action, "Matched local grammar");
            return action;
        }

        // Only the prompt is bounded; fallbacks carry the full transcript.
        let bounded = truncate_chars(transcript, self.config.max_input_chars);
        let request = self.build_request(&bounded, history, last_search_query);
        let reply = match self.client.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Classification failed, treating as conversation");
                return ProposedAction::conversation(transcript);
            }
        };

        match decode(&reply, transcript) {
            Ok(action) => {
                debug!(action = %action, "Classified utterance");
                action
            }
            Err(e) => {
                warn!(error = %e, "Could not decode classification, treating as conversation");
                ProposedAction::conversation(transcript)
            }
        }
    }

    fn build_request(
        &self,
        transcript: &str,
        history: &[ConversationMessage],
        last_search_query: Option<&str>,
    ) -> CompletionRequest {
        let skip = history.len().saturating_sub(self.config.history_turns);
        let recent = &history[skip..];

        let mut context = String::new();
        if !recent.is_empty() {
            context.push_str("Recent conversation:\n");
            context.push_str(&render_for_prompt(recent));
            context.push_str("\n\n");
        }
        if let Some(query) = last_search_query {
            context.push_str(&format!("Last search query: {}\n\n", query));
        }
        context.push_str(&format!("Utterance: {}", transcript));

        CompletionRequest::new(ROUTER_SYSTEM_PROMPT)
            .user(context)
            .json()
            .model(self.config.model.as_deref())
            .max_tokens(300)
    }
}

/// Deterministic matches that need no collaborator call.
pub fn classify_local(transcript: &str) -> Option<ProposedAction> {
    let normalized = normalize_phrase(transcript);
    if STOP_PHRASES.contains(&normalized.as_str()) {
        Some(ProposedAction::Stop)
    } else if REPEAT_PHRASES.contains(&normalized.as_str()) {
        Some(ProposedAction::RepeatLast)
    } else if YES_NO_PHRASES.contains(&normalized.as_str()) {
        Some(ProposedAction::conversation(transcript.trim()))
    } else {
        None
    }
}

fn normalize_phrase(text: &str) -> String {
    text.trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_lowercase()
}

/// Map aliases onto canonical action names.
fn canonical_action_name(raw: &str) -> String {
    let name = raw.trim().to_lowercase().replace(['-', ' '], "_");
    let canonical = match name.as_str() {
        "edit_phase" => "edit_phasing",
        "read_phase" | "read_phase_n" => "read_specific_phase",
        "merge_phase" => "merge_phases",
        "split" => "split_phase",
        "write_spec" => "write_both",
        "copy_spec" | "copy_all" => "copy_both",
        "repeat" => "repeat_last",
        "web_search" => "search",
        "research" => "deep_search",
        "none" | "info" | "chat" => "conversation",
        other => other,
    };
    canonical.to_string()
}

/// Decode a classification reply into an action for `transcript`.
pub fn decode(reply: &str, transcript: &str) -> Result<ProposedAction, RouteError> {
    let json = extract_json_object(reply).ok_or(RouteError::MissingJson)?;
    let envelope: Value = serde_json::from_str(json)?;

    let intent = envelope
        .get("intent")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_lowercase());
    match intent.as_deref() {
        Some("directive") => {}
        Some("conversation") => return Ok(ProposedAction::conversation(transcript)),
        _ => return Err(RouteError::NotDirective(intent)),
    }

    let empty = Map::new();
    let (name, fields) = match envelope.get("action") {
        Some(Value::String(name)) => (name.clone(), &empty),
        Some(Value::Object(obj)) => {
            let name = obj
                .get("action")
                .and_then(Value::as_str)
                .ok_or(RouteError::MissingParameter {
                    action: "action",
                    field: "action",
                })?;
            (name.to_string(), obj)
        }
        _ => {
            return Err(RouteError::MissingParameter {
                action: "action",
                field: "action",
            });
        }
    };

    decode_action(&canonical_action_name(&name), fields, transcript)
}

fn decode_action(
    name: &str,
    fields: &Map<String, Value>,
    transcript: &str,
) -> Result<ProposedAction, RouteError> {
    let action = match name {
        "write_description" => ProposedAction::WriteDescription,
        "write_phasing" => ProposedAction::WritePhasing,
        "write_both" => ProposedAction::WriteBoth,
        "read_description" => ProposedAction::ReadDescription,
        "read_phasing" => ProposedAction::ReadPhasing,
        "read_specific_phase" => ProposedAction::ReadSpecificPhase {
            phase_number: phase_number(fields, transcript).ok_or(RouteError::MissingParameter {
                action: "read_specific_phase",
                field: "phaseNumber",
            })?,
        },
        "edit_description" => ProposedAction::EditDescription {
            content: text_field(fields, &["content"]).ok_or(RouteError::MissingParameter {
                action: "edit_description",
                field: "content",
            })?,
        },
        "edit_phasing" => ProposedAction::EditPhasing {
            phase_number: phase_number(fields, transcript),
            content: text_field(fields, &["content"]).ok_or(RouteError::MissingParameter {
                action: "edit_phasing",
                field: "content",
            })?,
        },
        "split_phase" => ProposedAction::SplitPhase {
            phase_number: phase_number(fields, transcript).ok_or(RouteError::MissingParameter {
                action: "split_phase",
                field: "phaseNumber",
            })?,
            instructions: text_field(fields, &["instructions", "content"]).ok_or(
                RouteError::MissingParameter {
                    action: "split_phase",
                    field: "instructions",
                },
            )?,
        },
        "merge_phases" => {
            let (start, end) = merge_range(fields, transcript)?;
            ProposedAction::MergePhases {
                start,
                end,
                instructions: text_field(fields, &["instructions", "content"]),
            }
        }
        "search" => ProposedAction::Search {
            query: text_field(fields, &["query"]).ok_or(RouteError::MissingParameter {
                action: "search",
                field: "query",
            })?,
        },
        "deep_search" => ProposedAction::DeepSearch {
            query: text_field(fields, &["query"]).ok_or(RouteError::MissingParameter {
                action: "deep_search",
                field: "query",
            })?,
        },
        "copy_description" => ProposedAction::CopyDescription,
        "copy_phasing" => ProposedAction::CopyPhasing,
        "copy_both" => ProposedAction::CopyBoth,
        "repeat_last" => ProposedAction::RepeatLast,
        "stop" => ProposedAction::Stop,
        "conversation" => ProposedAction::conversation(transcript),
        other => return Err(RouteError::UnknownAction(other.to_string())),
    };
    Ok(action)
}

/// A non-empty trimmed string from the first present key.
fn text_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// A phase number given as a JSON number or a spoken string.
fn number_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => extract_phase_number(s),
            _ => None,
        })
        .filter(|n| *n >= 1)
}

fn phase_number(fields: &Map<String, Value>, transcript: &str) -> Option<u32> {
    number_field(fields, &["phaseNumber", "phase_number", "phase"])
        .or_else(|| extract_phase_number(transcript))
}

/// A range spoken in the transcript wins over the collaborator's numbers.
fn merge_range(fields: &Map<String, Value>, transcript: &str) -> Result<(u32, u32), RouteError> {
    if let Some(range) = extract_range(transcript) {
        return if range.is_valid() {
            Ok((range.start, range.end))
        } else {
            Err(RouteError::InvalidRange {
                start: range.start,
                end: range.end,
            })
        };
    }

    let start = number_field(fields, &["startPhase", "start_phase", "start"]).ok_or(
        RouteError::MissingParameter {
            action: "merge_phases",
            field: "startPhase",
        },
    )?;
    let end = number_field(fields, &["endPhase", "end_phase", "end"]).ok_or(
        RouteError::MissingParameter {
            action: "merge_phases",
            field: "endPhase",
        },
    )?;
    if start > end {
        return Err(RouteError::InvalidRange { start, end });
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollaboratorError;
    use crate::history::ConversationHistory;
    use crate::llm::ScriptedClient;

    fn router_with(client: Arc<ScriptedClient>) -> Router {
        Router::new(client, RouterConfig::default())
    }

    #[test]
    fn test_system_prompt_is_complete() {
        assert!(ROUTER_SYSTEM_PROMPT.contains("(\"## Phase N: Title\" sections)"));
        assert!(ROUTER_SYSTEM_PROMPT.ends_with(r#""query": "best Rust audio crates"}}"#));
    }

    // =========================================
    // Local grammar
    // =========================================

    #[test]
    fn test_local_stop_and_repeat() {
        assert_eq!(classify_local("Stop."), Some(ProposedAction::Stop));
        assert_eq!(classify_local("be quiet"), Some(ProposedAction::Stop));
        assert_eq!(classify_local("Repeat that"), Some(ProposedAction::RepeatLast));
        assert_eq!(
            classify_local("what did you say?"),
            Some(ProposedAction::RepeatLast)
        );
    }

    #[test]
    fn test_local_yes_no_are_conversation() {
        assert_eq!(
            classify_local("Yes!"),
            Some(ProposedAction::conversation("Yes!"))
        );
        assert_eq!(classify_local("nope"), Some(ProposedAction::conversation("nope")));
        assert_eq!(classify_local("stop writing phase two"), None);
    }

    #[tokio::test]
    async fn test_local_grammar_makes_no_external_call() {
        let client = Arc::new(ScriptedClient::new());
        let router = router_with(client.clone());
        assert_eq!(router.classify("stop", &[], None).await, ProposedAction::Stop);
        assert!(client.requests().is_empty());
    }

    // =========================================
    // Decoding
    // =========================================

    #[test]
    fn test_decode_read_specific_phase_number() {
        let reply = r#"{"intent": "directive", "action": {"action": "read_specific_phase", "phaseNumber": 2}}"#;
        assert_eq!(
            decode(reply, "read phase two").unwrap(),
            ProposedAction::ReadSpecificPhase { phase_number: 2 }
        );
    }

    #[test]
    fn test_decode_phase_number_as_spoken_string() {
        let reply = r#"{"intent": "directive", "action": {"action": "read_phase", "phaseNumber": "three"}}"#;
        assert_eq!(
            decode(reply, "read it").unwrap(),
            ProposedAction::ReadSpecificPhase { phase_number: 3 }
        );
    }

    #[test]
    fn test_decode_fills_missing_number_from_transcript() {
        let reply = r#"{"intent": "directive", "action": {"action": "split_phase", "instructions": "backend and frontend"}}"#;
        assert_eq!(
            decode(reply, "split the second phase into backend and frontend").unwrap(),
            ProposedAction::SplitPhase {
                phase_number: 2,
                instructions: "backend and frontend".into()
            }
        );
    }

    #[test]
    fn test_decode_edit_phasing_without_number() {
        let reply = r#"{"intent": "directive", "action": {"action": "edit_phasing", "content": "  add a testing phase  "}}"#;
        assert_eq!(
            decode(reply, "add a testing phase to the plan").unwrap(),
            ProposedAction::EditPhasing {
                phase_number: None,
                content: "add a testing phase".into()
            }
        );
    }

    #[test]
    fn test_decode_merge_prefers_transcript_range() {
        let reply = r#"{"intent": "directive", "action": {"action": "merge_phases", "startPhase": 1, "endPhase": 2}}"#;
        assert_eq!(
            decode(reply, "merge phases two through four").unwrap(),
            ProposedAction::MergePhases {
                start: 2,
                end: 4,
                instructions: None
            }
        );
    }

    #[test]
    fn test_decode_merge_non_adjacent_and_is_rejected() {
        let reply = r#"{"intent": "directive", "action": {"action": "merge_phases", "startPhase": 1, "endPhase": 3}}"#;
        assert!(matches!(
            decode(reply, "merge phases 1 and 3"),
            Err(RouteError::InvalidRange { start: 1, end: 3 })
        ));
    }

    #[test]
    fn test_decode_merge_inverted_collaborator_range() {
        let reply = r#"{"intent": "directive", "action": {"action": "merge_phases", "startPhase": 4, "endPhase": 2}}"#;
        assert!(matches!(
            decode(reply, "merge those"),
            Err(RouteError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_decode_aliases() {
        let cases = [
            ("web_search", r#","query": "rust tts""#, "search"),
            ("research", r#","query": "rust tts""#, "deep_search"),
            ("copy_all", "", "copy_both"),
            ("write_spec", "", "write_both"),
            ("repeat", "", "repeat_last"),
        ];
        for (alias, extra, expected) in cases {
            let reply = format!(
                r#"{{"intent": "directive", "action": {{"action": "{alias}"{extra}}}}}"#
            );
            assert_eq!(decode(&reply, "x").unwrap().name(), expected, "{alias}");
        }
    }

    #[test]
    fn test_decode_conversation_intent_wins() {
        let reply = r#"{"intent": "conversation", "action": {"action": "write_description"}}"#;
        assert_eq!(
            decode(reply, "maybe we should write it").unwrap(),
            ProposedAction::conversation("maybe we should write it")
        );
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(decode("not json", "x"), Err(RouteError::MissingJson)));
        assert!(matches!(
            decode(r#"{"intent": "directive", "action": {"action": "dance"}}"#, "x"),
            Err(RouteError::UnknownAction(_))
        ));
        assert!(matches!(
            decode(r#"{"intent": "directive", "action": {"action": "search"}}"#, "x"),
            Err(RouteError::MissingParameter { field: "query", .. })
        ));
        assert!(matches!(
            decode(r#"{"action": {"action": "stop"}}"#, "x"),
            Err(RouteError::NotDirective(None))
        ));
    }

    #[test]
    fn test_decode_tolerates_prose_and_fences() {
        let reply = "Here you go:\n```json\n{\"intent\": \"directive\", \"action\": {\"action\": \"read_phasing\"}}\n```";
        assert_eq!(decode(reply, "x").unwrap(), ProposedAction::ReadPhasing);
    }

    // =========================================
    // Classification with collaborator
    // =========================================

    #[tokio::test]
    async fn test_unknown_action_falls_back_to_conversation() {
        let client = Arc::new(ScriptedClient::new());
        client.push_ok(r#"{"intent": "directive", "action": {"action": "frobnicate"}}"#);
        let router = router_with(client);

        assert_eq!(
            router.classify("frobnicate the plan", &[], None).await,
            ProposedAction::conversation("frobnicate the plan")
        );
    }

    #[tokio::test]
    async fn test_collaborator_failure_falls_back_to_conversation() {
        let client = Arc::new(ScriptedClient::new());
        client.push_err(CollaboratorError::Timeout { secs: 45 });
        let router = router_with(client);

        assert_eq!(
            router.classify("write the description", &[], None).await,
            ProposedAction::conversation("write the description")
        );
    }

    #[tokio::test]
    async fn test_long_input_is_truncated_before_classification() {
        let client = Arc::new(ScriptedClient::new());
        client.push_ok(r#"{"intent": "conversation"}"#);
        let router = Router::new(
            client.clone(),
            RouterConfig {
                max_input_chars: 10,
                ..RouterConfig::default()
            },
        );

        let long = "a".repeat(50);
        let action = router.classify(&long, &[], None).await;
        assert_eq!(action, ProposedAction::conversation(long.clone()));

        let expected = format!("{}{}", "a".repeat(10), crate::util::TRUNCATION_MARKER);
        let sent = client.requests()[0].last_user_message().unwrap().to_string();
        assert!(sent.ends_with(&expected));
    }

    #[tokio::test]
    async fn test_request_includes_recent_history_and_search_query() {
        let client = Arc::new(ScriptedClient::new());
        client.push_ok(r#"{"intent": "directive", "action": {"action": "read_phasing"}}"#);
        let router = Router::new(
            client.clone(),
            RouterConfig {
                history_turns: 2,
                ..RouterConfig::default()
            },
        );

        let mut history = ConversationHistory::default();
        history.push_user("oldest");
        history.push_assistant("middle");
        history.push_user("newest");

        let action = router
            .classify("read the plan", &history.all(), Some("rust audio"))
            .await;
        assert_eq!(action, ProposedAction::ReadPhasing);

        let request = &client.requests()[0];
        assert!(request.json);
        let body = request.last_user_message().unwrap();
        assert!(!body.contains("oldest"));
        assert!(body.contains("newest"));
        assert!(body.contains("Last search query: rust audio"));
    }
}
