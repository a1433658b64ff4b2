//! The closed action taxonomy produced by the router.

use serde::{Deserialize, Serialize};

/// One routed decision. Each variant carries only the parameters its
/// handler needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProposedAction {
    WriteDescription,
    WritePhasing,
    WriteBoth,
    ReadDescription,
    ReadPhasing,
    ReadSpecificPhase {
        phase_number: u32,
    },
    EditDescription {
        content: String,
    },
    EditPhasing {
        phase_number: Option<u32>,
        content: String,
    },
    SplitPhase {
        phase_number: u32,
        instructions: String,
    },
    MergePhases {
        start: u32,
        end: u32,
        instructions: Option<String>,
    },
    Search {
        query: String,
    },
    DeepSearch {
        query: String,
    },
    CopyDescription,
    CopyPhasing,
    CopyBoth,
    RepeatLast,
    Stop,
    Conversation {
        text: String,
    },
}

impl ProposedAction {
    pub fn conversation(text: impl Into<String>) -> Self {
        ProposedAction::Conversation { text: text.into() }
    }

    /// Canonical snake_case name, as used on the wire and in the journal.
    pub fn name(&self) -> &'static str {
        match self {
            ProposedAction::WriteDescription => "write_description",
            ProposedAction::WritePhasing => "write_phasing",
            ProposedAction::WriteBoth => "write_both",
            ProposedAction::ReadDescription => "read_description",
            ProposedAction::ReadPhasing => "read_phasing",
            ProposedAction::ReadSpecificPhase { .. } => "read_specific_phase",
            ProposedAction::EditDescription { .. } => "edit_description",
            ProposedAction::EditPhasing { .. } => "edit_phasing",
            ProposedAction::SplitPhase { .. } => "split_phase",
            ProposedAction::MergePhases { .. } => "merge_phases",
            ProposedAction::Search { .. } => "search",
            ProposedAction::DeepSearch { .. } => "deep_search",
            ProposedAction::CopyDescription => "copy_description",
            ProposedAction::CopyPhasing => "copy_phasing",
            ProposedAction::CopyBoth => "copy_both",
            ProposedAction::RepeatLast => "repeat_last",
            ProposedAction::Stop => "stop",
            ProposedAction::Conversation { .. } => "conversation",
        }
    }
}

impl std::fmt::Display for ProposedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProposedAction::ReadSpecificPhase { phase_number } => {
                write!(f, "{} {}", self.name(), phase_number)
            }
            ProposedAction::EditPhasing {
                phase_number: Some(n),
                ..
            }
            | ProposedAction::SplitPhase { phase_number: n, .. } => {
                write!(f, "{} {}", self.name(), n)
            }
            ProposedAction::MergePhases { start, end, .. } => {
                write!(f, "{} {}-{}", self.name(), start, end)
            }
            _ => write!(f, "{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_cover_taxonomy() {
        let samples = vec![
            ProposedAction::WriteDescription,
            ProposedAction::WritePhasing,
            ProposedAction::WriteBoth,
            ProposedAction::ReadDescription,
            ProposedAction::ReadPhasing,
            ProposedAction::ReadSpecificPhase { phase_number: 1 },
            ProposedAction::EditDescription { content: "x".into() },
            ProposedAction::EditPhasing {
                phase_number: None,
                content: "x".into(),
            },
            ProposedAction::SplitPhase {
                phase_number: 1,
                instructions: "x".into(),
            },
            ProposedAction::MergePhases {
                start: 1,
                end: 2,
                instructions: None,
            },
            ProposedAction::Search { query: "q".into() },
            ProposedAction::DeepSearch { query: "q".into() },
            ProposedAction::CopyDescription,
            ProposedAction::CopyPhasing,
            ProposedAction::CopyBoth,
            ProposedAction::RepeatLast,
            ProposedAction::Stop,
            ProposedAction::conversation("hi"),
        ];
        let names: Vec<_> = samples.iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec![
                "write_description",
                "write_phasing",
                "write_both",
                "read_description",
                "read_phasing",
                "read_specific_phase",
                "edit_description",
                "edit_phasing",
                "split_phase",
                "merge_phases",
                "search",
                "deep_search",
                "copy_description",
                "copy_phasing",
                "copy_both",
                "repeat_last",
                "stop",
                "conversation",
            ]
        );
    }

    #[test]
    fn test_serde_tag_matches_name() {
        let action = ProposedAction::MergePhases {
            start: 2,
            end: 3,
            instructions: None,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "merge_phases");
    }

    #[test]
    fn test_display_includes_numbers() {
        let action = ProposedAction::MergePhases {
            start: 2,
            end: 4,
            instructions: None,
        };
        assert_eq!(action.to_string(), "merge_phases 2-4");
        assert_eq!(ProposedAction::Stop.to_string(), "stop");
    }
}
