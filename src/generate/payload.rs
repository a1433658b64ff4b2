//! Parsers for content-generation payloads.
//!
//! Phase content comes back as JSON, possibly wrapped in prose or a code
//! fence:
//!
//! ```json
//! {"title": "Storage", "description": "...", "definitionOfDone": "..."}
//! ```
//!
//! Splits wrap several of those in `{"phases": [...]}`. Markdown documents
//! (description, whole phasing) come back as text.

use serde::{Deserialize, Serialize};

use crate::errors::{CollaboratorError, EditError};
use crate::phase::Phase;
use crate::util::{extract_json_object, strip_code_fence};

/// Phase content synthesized by the collaborator, before it is numbered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "definition_of_done", alias = "dod")]
    pub definition_of_done: String,
}

impl PhaseDraft {
    pub fn into_phase(self) -> Phase {
        Phase::new(0, &self.title, &self.description, &self.definition_of_done)
    }

    fn validate(self) -> Result<Self, EditError> {
        if self.title.trim().is_empty() {
            return Err(EditError::InvalidPayload("phase has no title".to_string()));
        }
        if self.description.trim().is_empty() && self.definition_of_done.trim().is_empty() {
            return Err(EditError::InvalidPayload(format!(
                "phase '{}' has neither description nor definition of done",
                self.title.trim()
            )));
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct RawSplit {
    phases: Vec<PhaseDraft>,
}

/// Parse a single phase payload.
pub fn parse_phase_draft(output: &str) -> Result<PhaseDraft, EditError> {
    let json = extract_json_object(output)
        .ok_or_else(|| EditError::InvalidPayload("no JSON object in response".to_string()))?;
    let draft: PhaseDraft = serde_json::from_str(json)
        .map_err(|e| EditError::InvalidPayload(format!("phase JSON: {}", e)))?;
    draft.validate()
}

/// Parse a split payload. Arity is checked by the caller.
pub fn parse_split(output: &str) -> Result<Vec<PhaseDraft>, EditError> {
    let json = extract_json_object(output)
        .ok_or_else(|| EditError::InvalidPayload("no JSON object in response".to_string()))?;
    let raw: RawSplit = serde_json::from_str(json)
        .map_err(|e| EditError::InvalidPayload(format!("split JSON: {}", e)))?;
    raw.phases.into_iter().map(PhaseDraft::validate).collect()
}

/// Clean a markdown document returned by the collaborator.
pub fn parse_markdown(output: &str) -> Result<String, CollaboratorError> {
    let text = strip_code_fence(output).trim();
    if text.is_empty() {
        return Err(CollaboratorError::EmptyResponse);
    }
    Ok(format!("{}\n", text))
}
