//! Observable orchestrator state and per-action outcomes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::router::ProposedAction;

/// Where the orchestrator is in its drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorState {
    /// Queue empty, no drain task running
    #[default]
    Idle,
    /// A drain task owns the queue
    Executing,
    /// Generating a conversational reply inside a drain
    Conversing,
}

impl OrchestratorState {
    pub fn is_busy(&self) -> bool {
        !matches!(self, OrchestratorState::Idle)
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorState::Idle => write!(f, "idle"),
            OrchestratorState::Executing => write!(f, "executing"),
            OrchestratorState::Conversing => write!(f, "conversing"),
        }
    }
}

/// A queued action and the utterance it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionQueueItem {
    pub id: Uuid,
    pub action: ProposedAction,
    pub utterance: Option<String>,
}

impl ActionQueueItem {
    pub fn new(action: ProposedAction, utterance: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            utterance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Completed,
    /// Refused on validation grounds; nothing was changed
    Rejected,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Completed => "completed",
            ActionStatus::Rejected => "rejected",
            ActionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handler produced. `response` is what the user hears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub status: ActionStatus,
    pub response: String,
}

impl ActionOutcome {
    pub fn completed(response: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Completed,
            response: response.into(),
        }
    }

    pub fn rejected(response: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Rejected,
            response: response.into(),
        }
    }

    pub fn failed(response: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Failed,
            response: response.into(),
        }
    }
}

/// Broadcast to observers as the queue drains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    StateChanged(OrchestratorState),
    ActionStarted {
        id: Uuid,
        action: ProposedAction,
    },
    ActionFinished {
        id: Uuid,
        action: ProposedAction,
        outcome: ActionOutcome,
    },
}
