//! Description and phasing access over either storage layout.
//!
//! - `split`: `description.md` and `phasing.md` are separate artifacts
//! - `unified`: one `spec.md` with `# Project Description` and
//!   `# Project Phasing` sections
//!
//! In the unified layout the phasing section is stored verbatim from its
//! heading to the end of the file, so phase edits stay byte-exact.

use serde::{Deserialize, Serialize};

use super::store::{ArtifactStore, WriteReceipt};
use crate::errors::StoreError;
use crate::phase::{DEFAULT_PREAMBLE, PhaseDocument};

pub const DESCRIPTION: &str = "description";
pub const PHASING: &str = "phasing";
pub const SPEC: &str = "spec";

const DESCRIPTION_HEADING: &str = "# Project Description";
const PHASING_HEADING: &str = "# Project Phasing";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Split,
    Unified,
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layout::Split => write!(f, "split"),
            Layout::Unified => write!(f, "unified"),
        }
    }
}

/// The two living documents, backed by an [`ArtifactStore`].
#[derive(Debug, Clone)]
pub struct Documents {
    store: ArtifactStore,
    layout: Layout,
}

impl Documents {
    pub fn new(store: ArtifactStore, layout: Layout) -> Self {
        Self { store, layout }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Description text, or `None` when nothing non-blank has been written.
    pub fn read_description(&self) -> Result<Option<String>, StoreError> {
        let text = match self.layout {
            Layout::Split => self.store.read(DESCRIPTION)?,
            Layout::Unified => self
                .store
                .read(SPEC)?
                .and_then(|spec| split_unified(&spec).0.map(str::to_string)),
        };
        Ok(text.filter(|t| !t.trim().is_empty()))
    }

    /// Phasing text exactly as stored, or `None` when absent or blank.
    ///
    /// In the unified layout a phasing section holding only its heading
    /// counts as absent.
    pub fn read_phasing(&self) -> Result<Option<String>, StoreError> {
        let text = match self.layout {
            Layout::Split => self.store.read(PHASING)?,
            Layout::Unified => self
                .store
                .read(SPEC)?
                .and_then(|spec| split_unified(&spec).1.map(str::to_string))
                .filter(|section| !section[PHASING_HEADING.len()..].trim().is_empty()),
        };
        Ok(text.filter(|t| !t.trim().is_empty()))
    }

    /// Parsed phasing document, or `None` when there is no phasing yet.
    pub fn read_phase_document(&self) -> Result<Option<PhaseDocument>, StoreError> {
        Ok(self.read_phasing()?.map(|text| PhaseDocument::parse(&text)))
    }

    pub fn write_description(&self, content: &str) -> Result<WriteReceipt, StoreError> {
        match self.layout {
            Layout::Split => self.store.write(DESCRIPTION, content),
            Layout::Unified => {
                if content.trim().is_empty() {
                    return Err(StoreError::EmptyContent {
                        name: DESCRIPTION.to_string(),
                    });
                }
                let phasing = self.read_phasing()?;
                self.store
                    .write(SPEC, &compose_unified(Some(content), phasing.as_deref()))
            }
        }
    }

    pub fn write_phasing(&self, content: &str) -> Result<WriteReceipt, StoreError> {
        match self.layout {
            Layout::Split => self.store.write(PHASING, content),
            Layout::Unified => {
                if content.trim().is_empty() {
                    return Err(StoreError::EmptyContent {
                        name: PHASING.to_string(),
                    });
                }
                let description = self.read_description()?;
                self.store
                    .write(SPEC, &compose_unified(description.as_deref(), Some(content)))
            }
        }
    }

    /// Write both documents. The unified layout does this in a single write.
    pub fn write_both(
        &self,
        description: &str,
        phasing: &str,
    ) -> Result<Vec<WriteReceipt>, StoreError> {
        for (name, content) in [(DESCRIPTION, description), (PHASING, phasing)] {
            if content.trim().is_empty() {
                return Err(StoreError::EmptyContent {
                    name: name.to_string(),
                });
            }
        }
        match self.layout {
            Layout::Split => Ok(vec![
                self.store.write(DESCRIPTION, description)?,
                self.store.write(PHASING, phasing)?,
            ]),
            Layout::Unified => Ok(vec![
                self.store
                    .write(SPEC, &compose_unified(Some(description), Some(phasing)))?,
            ]),
        }
    }

    /// Description and phasing joined for copying or display.
    pub fn read_combined(&self) -> Result<Option<String>, StoreError> {
        let description = self.read_description()?;
        let phasing = self.read_phasing()?;
        if description.is_none() && phasing.is_none() {
            return Ok(None);
        }
        Ok(Some(compose_unified(
            description.as_deref(),
            phasing.as_deref(),
        )))
    }
}

/// Split a unified spec into (description body, phasing section).
fn split_unified(spec: &str) -> (Option<&str>, Option<&str>) {
    let phasing_start = find_heading(spec, PHASING_HEADING);
    let head = &spec[..phasing_start.unwrap_or(spec.len())];
    let description = find_heading(head, DESCRIPTION_HEADING).map(|start| {
        let after = &head[start + DESCRIPTION_HEADING.len()..];
        after.trim()
    });
    let phasing = phasing_start.map(|start| &spec[start..]);
    (description, phasing)
}

/// Byte offset of a line that is exactly `heading` (ignoring trailing spaces).
fn find_heading(text: &str, heading: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end() == heading {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

fn compose_unified(description: Option<&str>, phasing: Option<&str>) -> String {
    let mut out = format!("{}\n\n", DESCRIPTION_HEADING);
    if let Some(description) = description {
        out.push_str(description.trim());
        out.push_str("\n\n");
    }
    // No phasing section until there is phasing to put in it.
    if let Some(phasing) = phasing {
        if find_heading(phasing, PHASING_HEADING) != Some(0) {
            out.push_str(DEFAULT_PREAMBLE);
        }
        out.push_str(phasing);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PHASING_TEXT: &str =
        "# Project Phasing\n\n## Phase 1: Start\n\n**Description:** Begin.\n\n**Definition of Done:** Begun.\n";

    fn docs(dir: &std::path::Path, layout: Layout) -> Documents {
        Documents::new(ArtifactStore::new(dir), layout)
    }

    #[test]
    fn test_split_layout_uses_separate_files() {
        let dir = tempdir().unwrap();
        let docs = docs(dir.path(), Layout::Split);
        docs.write_description("A walking coach.").unwrap();
        docs.write_phasing(PHASING_TEXT).unwrap();

        assert!(dir.path().join("description.md").exists());
        assert!(dir.path().join("phasing.md").exists());
        assert_eq!(docs.read_phasing().unwrap().as_deref(), Some(PHASING_TEXT));
    }

    #[test]
    fn test_absent_documents_read_as_none() {
        let dir = tempdir().unwrap();
        for layout in [Layout::Split, Layout::Unified] {
            let docs = docs(dir.path(), layout);
            assert_eq!(docs.read_description().unwrap(), None);
            assert_eq!(docs.read_phasing().unwrap(), None);
            assert!(docs.read_phase_document().unwrap().is_none());
            assert_eq!(docs.read_combined().unwrap(), None);
        }
    }

    #[test]
    fn test_unified_layout_keeps_sections_independent() {
        let dir = tempdir().unwrap();
        let docs = docs(dir.path(), Layout::Unified);
        docs.write_description("First description.").unwrap();
        docs.write_phasing(PHASING_TEXT).unwrap();
        docs.write_description("Second description.").unwrap();

        assert_eq!(
            docs.read_description().unwrap().as_deref(),
            Some("Second description.")
        );
        assert_eq!(docs.read_phasing().unwrap().as_deref(), Some(PHASING_TEXT));
        assert!(!dir.path().join("phasing.md").exists());
    }

    #[test]
    fn test_unified_write_both_is_single_write() {
        let dir = tempdir().unwrap();
        let docs = docs(dir.path(), Layout::Unified);
        let receipts = docs.write_both("Desc.", PHASING_TEXT).unwrap();
        assert_eq!(receipts.len(), 1);

        let spec = std::fs::read_to_string(dir.path().join("spec.md")).unwrap();
        assert!(spec.starts_with("# Project Description\n\nDesc.\n\n# Project Phasing"));
        assert_eq!(docs.read_phase_document().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_write_both_rejects_empty_half_before_writing() {
        let dir = tempdir().unwrap();
        let docs = docs(dir.path(), Layout::Split);
        let err = docs.write_both("Desc.", "   ").unwrap_err();
        assert!(matches!(err, StoreError::EmptyContent { .. }));
        assert_eq!(docs.read_description().unwrap(), None);
    }

    #[test]
    fn test_unified_description_alone_leaves_phasing_absent() {
        let dir = tempdir().unwrap();
        let docs = docs(dir.path(), Layout::Unified);
        docs.write_description("Just the idea so far.").unwrap();

        let spec = std::fs::read_to_string(dir.path().join("spec.md")).unwrap();
        assert!(!spec.contains(PHASING_HEADING));
        assert_eq!(docs.read_phasing().unwrap(), None);
        assert!(docs.read_phase_document().unwrap().is_none());
    }

    #[test]
    fn test_unified_bare_phasing_heading_reads_as_absent() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("spec.md"),
            "# Project Description\n\nAn idea.\n\n# Project Phasing\n\n",
        )
        .unwrap();
        let docs = docs(dir.path(), Layout::Unified);
        assert_eq!(docs.read_description().unwrap().as_deref(), Some("An idea."));
        assert_eq!(docs.read_phasing().unwrap(), None);
    }

    #[test]
    fn test_phasing_without_heading_gets_default_preamble_in_unified() {
        let dir = tempdir().unwrap();
        let docs = docs(dir.path(), Layout::Unified);
        docs.write_phasing("## Phase 1: Solo\n\nOnly phase.\n").unwrap();
        let phasing = docs.read_phasing().unwrap().unwrap();
        assert!(phasing.starts_with("# Project Phasing\n\n## Phase 1: Solo"));
    }
}
