//! Structural edits of the phasing document.
//!
//! Every operation follows the same shape: read and parse the current
//! document, validate the request against it (rejecting before any
//! collaborator call where possible), ask the generator for new phase
//! content, apply the change, renumber, and write through the store so the
//! previous document is backed up. Phases an operation does not touch are
//! written back byte-identical.

use std::sync::Arc;
use tracing::info;

use crate::artifact::{Documents, WriteReceipt};
use crate::errors::{EditError, PhaseError};
use crate::generate::ContentGenerator;
use crate::phase::{DEFAULT_PREAMBLE, Phase, PhaseDocument, SPLIT_ARITY};

/// Result of a successful edit.
#[derive(Debug, Clone)]
pub struct PhaseEdit {
    pub receipt: WriteReceipt,
    /// Phases created or rewritten by the edit, with their final numbers
    pub changed: Vec<Phase>,
    /// Phase count after the edit
    pub total: usize,
}

pub struct PhaseEditor {
    documents: Documents,
    generator: Arc<ContentGenerator>,
}

impl PhaseEditor {
    pub fn new(documents: Documents, generator: Arc<ContentGenerator>) -> Self {
        Self {
            documents,
            generator,
        }
    }

    fn load(&self) -> Result<PhaseDocument, EditError> {
        let document = self
            .documents
            .read_phase_document()?
            .ok_or(EditError::NoDocument)?;
        if document.is_empty() {
            return Err(EditError::NoDocument);
        }
        // Structural edits address phases by number, so the numbering must be sound.
        document.validate_numbering()?;
        Ok(document)
    }

    fn description(&self) -> Option<String> {
        self.documents.read_description().ok().flatten()
    }

    fn save(&self, document: &PhaseDocument, changed: Vec<u32>) -> Result<PhaseEdit, EditError> {
        document.validate_numbering()?;
        let receipt = self.documents.write_phasing(&document.to_markdown())?;
        let changed = changed
            .into_iter()
            .filter_map(|n| document.get(n).cloned())
            .collect();
        Ok(PhaseEdit {
            receipt,
            changed,
            total: document.len(),
        })
    }

    /// Rewrite one phase according to `instructions`.
    pub async fn edit(&self, number: u32, instructions: &str) -> Result<PhaseEdit, EditError> {
        let mut document = self.load()?;
        let target = document
            .get(number)
            .cloned()
            .ok_or(EditError::PhaseNotFound { number })?;

        let description = self.description();
        let draft = self
            .generator
            .edit_phase(&target, instructions, description.as_deref())
            .await?;

        document.replace_phase(number, draft.into_phase())?;
        let edit = self.save(&document, vec![number])?;
        info!(phase = number, digest = %edit.receipt.digest, "Edited phase");
        Ok(edit)
    }

    /// Replace one phase with 2–4 sub-phases; later phases shift up.
    pub async fn split(&self, number: u32, instructions: &str) -> Result<PhaseEdit, EditError> {
        let mut document = self.load()?;
        let target = document
            .get(number)
            .cloned()
            .ok_or(EditError::PhaseNotFound { number })?;

        let description = self.description();
        let drafts = self
            .generator
            .split_phase(&target, instructions, description.as_deref())
            .await?;
        if !SPLIT_ARITY.contains(&drafts.len()) {
            return Err(EditError::InvalidSplit {
                count: drafts.len(),
            });
        }

        let count = drafts.len() as u32;
        document.splice_phase(
            number,
            drafts.into_iter().map(|d| d.into_phase()).collect(),
        )?;
        let edit = self.save(&document, (number..number + count).collect())?;
        info!(phase = number, into = count, total = edit.total, "Split phase");
        Ok(edit)
    }

    /// Merge 2–5 strictly consecutive phases into one; later phases shift down.
    pub async fn merge(
        &self,
        numbers: &[u32],
        instructions: Option<&str>,
    ) -> Result<PhaseEdit, EditError> {
        let mut document = self.load()?;
        let selection: Vec<Phase> = document
            .merge_selection(numbers)?
            .into_iter()
            .cloned()
            .collect();
        let refs: Vec<&Phase> = selection.iter().collect();

        let description = self.description();
        let draft = self
            .generator
            .merge_phases(&refs, instructions, description.as_deref())
            .await?;

        document.merge_phases(numbers, draft.into_phase())?;
        let edit = self.save(&document, vec![numbers[0]])?;
        info!(phases = ?numbers, total = edit.total, "Merged phases");
        Ok(edit)
    }

    /// Rewrite the whole document according to `instructions`.
    pub async fn rewrite(&self, instructions: &str) -> Result<PhaseEdit, EditError> {
        let current = self
            .documents
            .read_phasing()?
            .ok_or(EditError::NoDocument)?;
        let description = self.description();
        let text = self
            .generator
            .rewrite_phasing(&current, instructions, description.as_deref())
            .await?;

        let document = canonicalize_phasing(&text)?;
        let all = document.numbers();
        let edit = self.save(&document, all)?;
        info!(total = edit.total, "Rewrote phasing");
        Ok(edit)
    }
}

/// Parse generated phasing text into canonical form, numbered from 1.
pub fn canonicalize_phasing(text: &str) -> Result<PhaseDocument, PhaseError> {
    let parsed = PhaseDocument::parse(text);
    if parsed.is_empty() {
        return Err(PhaseError::NoPhases);
    }
    let preamble = if parsed.preamble().trim().is_empty() {
        DEFAULT_PREAMBLE.to_string()
    } else {
        format!("{}\n\n", parsed.preamble().trim_end())
    };
    let phases = parsed
        .phases()
        .iter()
        .map(|p| Phase::new(0, &p.title, &p.description, &p.definition_of_done))
        .collect();
    Ok(PhaseDocument::from_phases(&preamble, phases))
}
