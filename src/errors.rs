//! Typed error hierarchy for walkspec.
//!
//! One enum per subsystem:
//! - `StoreError` — artifact reads, atomic writes and backups
//! - `PhaseError` — phase document structure
//! - `EditError` — split/merge/edit validation and reassembly
//! - `CollaboratorError` — completion, search and classification calls
//! - `RouteError` — classification replies that cannot become a directive
//! - `ClipboardError` — copy actions
//! - `ActionError` — anything an orchestrator handler can fail with
//!
//! None of these escape the orchestrator: the dispatch boundary turns every
//! one of them into a user-visible response.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Refusing to write empty content to {name}")]
    EmptyContent { name: String },

    #[error("Failed to read artifact at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage temporary file for {path}: {source}")]
    StageFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to replace artifact at {path}: {source}")]
    ReplaceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to back up {path}: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifacts directory {path} is locked by another walkspec process")]
    Locked { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Structural problems in a phase document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("Phase numbering must be 1..{expected_len}, found {found:?}")]
    NonContiguous {
        expected_len: usize,
        found: Vec<u32>,
    },

    #[error("Phasing document contains no '## Phase N: Title' headers")]
    NoPhases,
}

/// Rejections and failures from the phase editor. Every variant except
/// `Store` and `Collaborator` is raised before anything is written.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("No phasing document has been written yet")]
    NoDocument,

    #[error("Phase {number} does not exist")]
    PhaseNotFound { number: u32 },

    #[error("Merging needs between 2 and 5 phases, got {count}")]
    MergeArity { count: usize },

    #[error("Phases {numbers:?} are not consecutive")]
    NonConsecutive { numbers: Vec<u32> },

    #[error("A split must produce between 2 and 4 phases, got {count}")]
    InvalidSplit { count: usize },

    #[error("Generated phase content was unusable: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl EditError {
    /// True when the request was refused on validation grounds, as opposed to
    /// failing partway through.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EditError::NoDocument
                | EditError::PhaseNotFound { .. }
                | EditError::MergeArity { .. }
                | EditError::NonConsecutive { .. }
        )
    }
}

/// Failures from external collaborators (completion, classification, search).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited or unavailable (HTTP {status})")]
    Unavailable { status: u16 },

    #[error("Collaborator returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {stderr}")]
    ProcessExit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("Collaborator returned an empty response")]
    EmptyResponse,

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Collaborator not configured: {0}")]
    NotConfigured(String),
}

impl CollaboratorError {
    /// Whether a retry with backoff has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CollaboratorError::Timeout { .. }
                | CollaboratorError::Network(_)
                | CollaboratorError::Unavailable { .. }
                | CollaboratorError::EmptyResponse
        )
    }
}

/// Reasons a classification reply could not become a directive. The router
/// turns every one of these into a conversation turn.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("No JSON object in classification reply")]
    MissingJson,

    #[error("Classification reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Intent {0:?} is not a directive")]
    NotDirective(Option<String>),

    #[error("Unknown action {0:?}")]
    UnknownAction(String),

    #[error("Action {action} is missing {field}")]
    MissingParameter {
        action: &'static str,
        field: &'static str,
    },

    #[error("Phase range {start}..{end} is not valid")]
    InvalidRange { start: u32, end: u32 },
}

/// Failures from the clipboard collaborator.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("No clipboard command configured")]
    NotConfigured,

    #[error("Clipboard command {program} failed: {message}")]
    CommandFailed { program: String, message: String },
}

/// Union of handler failures, converted to a response at the dispatch boundary.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Generated phasing was unusable: {0}")]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

impl ActionError {
    /// True when nothing was attempted because the request itself was invalid.
    pub fn is_rejection(&self) -> bool {
        match self {
            ActionError::Edit(e) => e.is_rejection(),
            ActionError::Clipboard(ClipboardError::NotConfigured) => true,
            _ => false,
        }
    }
}
