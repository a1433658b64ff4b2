//! Phase records and the markdown phasing document.
//!
//! This module provides:
//! - `Phase` — one numbered unit of the plan (title, description, definition of done)
//! - `PhaseDocument` — the ordered phase list parsed from / serialized to markdown
//! - Structural operations (replace, splice, merge) that keep numbering contiguous
//!
//! # Grammar
//!
//! ```text
//! # Project Phasing            <- preamble, kept verbatim
//!
//! ## Phase 1: Scaffold
//!
//! **Description:** Set up the crate layout.
//!
//! **Definition of Done:** `cargo build` succeeds.
//!
//! ## Phase 2: Storage
//!
//! Atomic writes with backups.  <- implicit form: first paragraph is the description
//!
//! **Definition of Done:** Writes survive a crash mid-write.
//! ```
//!
//! Phases that are not touched by an edit are re-emitted from their original
//! source text, so an edit to one phase leaves every other phase byte-identical.

use regex::Regex;
use std::sync::LazyLock;

use crate::errors::{EditError, PhaseError};

static PHASE_HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s+Phase\s+(\d+)\s*:\s*(.*?)\s*$").unwrap());

static DESCRIPTION_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\*\*\s*description\s*:\s*\*\*\s*(.*)$").unwrap());

static DOD_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\*\*\s*definition of done\s*:\s*\*\*\s*(.*)$").unwrap());

/// Any `**Label:**` line; ends a multi-line marker value.
static ANY_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*[^*]+:\s*\*\*").unwrap());

/// Markdown heading prefix (`#`, `##`, ...) at the start of a line.
static HEADING_PREFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#+\s+").unwrap());

/// Heading written at the top of a freshly generated phasing document.
pub const DEFAULT_PREAMBLE: &str = "# Project Phasing\n\n";

/// Merges accept between 2 and 5 phases.
pub const MERGE_ARITY: std::ops::RangeInclusive<usize> = 2..=5;

/// Splits produce between 2 and 4 phases.
pub const SPLIT_ARITY: std::ops::RangeInclusive<usize> = 2..=4;

/// A single phase of the plan.
#[derive(Debug, Clone)]
pub struct Phase {
    /// Position in the plan, starting at 1
    pub number: u32,
    /// Short title from the `## Phase N: Title` header
    pub title: String,
    /// What the phase builds
    pub description: String,
    /// Testable completion criterion
    pub definition_of_done: String,
    source: Option<PhaseSource>,
}

/// Original text of a parsed phase, with the field values it parsed to.
#[derive(Debug, Clone)]
struct PhaseSource {
    number: u32,
    title: String,
    description: String,
    definition_of_done: String,
    header: String,
    body: String,
}

/// Two phases are equal when their structured fields match; source text is ignored.
impl PartialEq for Phase {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
            && self.title == other.title
            && self.description == other.description
            && self.definition_of_done == other.definition_of_done
    }
}

impl Eq for Phase {}

impl Phase {
    /// Fields are normalized so the rendered phase parses back to the same
    /// values: one-line title, no blank lines or headings in the body fields.
    pub fn new(number: u32, title: &str, description: &str, definition_of_done: &str) -> Self {
        Self {
            number,
            title: clean_title(title),
            description: clean_field(description),
            definition_of_done: clean_field(definition_of_done),
            source: None,
        }
    }

    /// Whether this phase still matches the text it was parsed from.
    pub fn is_pristine(&self) -> bool {
        self.source.as_ref().is_some_and(|src| {
            src.title == self.title
                && src.description == self.description
                && src.definition_of_done == self.definition_of_done
        })
    }

    /// Canonical (explicit-form) markdown for this phase.
    pub fn to_canonical_markdown(&self) -> String {
        let mut out = format!("## Phase {}: {}\n", self.number, self.title);
        if !self.description.is_empty() {
            out.push_str(&format!("\n**Description:** {}\n", self.description));
        }
        if !self.definition_of_done.is_empty() {
            out.push_str(&format!(
                "\n**Definition of Done:** {}\n",
                self.definition_of_done
            ));
        }
        out
    }

    /// Markdown for this phase, reusing the original text when unmodified.
    pub fn to_markdown(&self) -> String {
        match &self.source {
            Some(src) if self.is_pristine() => {
                let header = if src.number == self.number {
                    src.header.clone()
                } else {
                    format!("## Phase {}: {}\n", self.number, self.title)
                };
                format!("{}{}", header, src.body)
            }
            _ => self.to_canonical_markdown(),
        }
    }

    /// Plain-text rendering suitable for reading aloud.
    pub fn to_spoken(&self) -> String {
        let mut out = format!("Phase {}: {}.", self.number, self.title);
        if !self.description.is_empty() {
            out.push(' ');
            out.push_str(&self.description);
        }
        if !self.definition_of_done.is_empty() {
            out.push_str(" Definition of done: ");
            out.push_str(&self.definition_of_done);
        }
        out
    }
}

/// An ordered list of phases plus the text that precedes the first header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseDocument {
    preamble: String,
    phases: Vec<Phase>,
}

impl PhaseDocument {
    /// Build a document from phases, numbering them 1..N in the given order.
    pub fn from_phases(preamble: &str, phases: Vec<Phase>) -> Self {
        let mut doc = Self {
            preamble: preamble.to_string(),
            phases,
        };
        doc.renumber();
        doc
    }

    /// Parse a markdown phasing document. Never fails: text without phase
    /// headers yields an empty document whose preamble is the whole input.
    pub fn parse(text: &str) -> Self {
        let mut preamble = String::new();
        let mut phases = Vec::new();
        let mut current: Option<(u32, String, String, String)> = None;

        for line in text.split_inclusive('\n') {
            let bare = line.trim_end_matches(['\n', '\r']);
            if let Some(caps) = PHASE_HEADER_REGEX.captures(bare) {
                if let Some(block) = current.take() {
                    phases.push(finish_block(block));
                }
                // Header digits are bounded by the regex; fall back to 0 on overflow.
                let number = caps[1].parse::<u32>().unwrap_or(0);
                current = Some((number, caps[2].to_string(), line.to_string(), String::new()));
                continue;
            }
            match current.as_mut() {
                Some((_, _, _, body)) => body.push_str(line),
                None => preamble.push_str(line),
            }
        }
        if let Some(block) = current.take() {
            phases.push(finish_block(block));
        }

        Self { preamble, phases }
    }

    /// Serialize back to markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = self.preamble.clone();
        let mut previous_pristine = true;
        for phase in &self.phases {
            let pristine = phase.is_pristine();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            // Canonical blocks get a blank line on both sides.
            if (!pristine || !previous_pristine) && !out.is_empty() && !out.ends_with("\n\n") {
                out.push('\n');
            }
            out.push_str(&phase.to_markdown());
            previous_pristine = pristine;
        }
        out
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn get(&self, number: u32) -> Option<&Phase> {
        self.phases.iter().find(|p| p.number == number)
    }

    fn index_of(&self, number: u32) -> Result<usize, EditError> {
        self.phases
            .iter()
            .position(|p| p.number == number)
            .ok_or(EditError::PhaseNotFound { number })
    }

    /// Numbers in document order.
    pub fn numbers(&self) -> Vec<u32> {
        self.phases.iter().map(|p| p.number).collect()
    }

    /// Check that numbers are exactly 1..=N in order.
    pub fn validate_numbering(&self) -> Result<(), PhaseError> {
        let found = self.numbers();
        let contiguous = found
            .iter()
            .enumerate()
            .all(|(i, &n)| n as usize == i + 1);
        if contiguous {
            Ok(())
        } else {
            Err(PhaseError::NonContiguous {
                expected_len: found.len(),
                found,
            })
        }
    }

    /// Renumber phases 1..=N in document order.
    pub fn renumber(&mut self) {
        for (i, phase) in self.phases.iter_mut().enumerate() {
            phase.number = (i + 1) as u32;
        }
    }

    /// Replace one phase in place, then renumber.
    pub fn replace_phase(&mut self, number: u32, replacement: Phase) -> Result<(), EditError> {
        let idx = self.index_of(number)?;
        self.phases[idx] = replacement;
        self.renumber();
        Ok(())
    }

    /// Replace one phase with several, shifting every later phase, then renumber.
    pub fn splice_phase(&mut self, number: u32, replacements: Vec<Phase>) -> Result<(), EditError> {
        if !SPLIT_ARITY.contains(&replacements.len()) {
            return Err(EditError::InvalidSplit {
                count: replacements.len(),
            });
        }
        let idx = self.index_of(number)?;
        self.phases.splice(idx..=idx, replacements);
        self.renumber();
        Ok(())
    }

    /// Validate a merge selection and return the phases it covers, in order.
    ///
    /// The selection must name 2–5 existing phases with strictly consecutive
    /// numbers. Nothing is mutated.
    pub fn merge_selection(&self, numbers: &[u32]) -> Result<Vec<&Phase>, EditError> {
        if !MERGE_ARITY.contains(&numbers.len()) {
            return Err(EditError::MergeArity {
                count: numbers.len(),
            });
        }
        let consecutive = numbers.windows(2).all(|w| w[1] == w[0] + 1);
        if !consecutive {
            return Err(EditError::NonConsecutive {
                numbers: numbers.to_vec(),
            });
        }
        numbers
            .iter()
            .map(|&n| self.get(n).ok_or(EditError::PhaseNotFound { number: n }))
            .collect()
    }

    /// Replace a validated consecutive selection with one phase, then renumber.
    pub fn merge_phases(&mut self, numbers: &[u32], merged: Phase) -> Result<(), EditError> {
        self.merge_selection(numbers)?;
        let indices = numbers
            .iter()
            .map(|&n| self.index_of(n))
            .collect::<Result<Vec<_>, _>>()?;
        let first = indices.iter().copied().min().unwrap_or(0);
        let last = indices.iter().copied().max().unwrap_or(0);
        // The selection must also be adjacent in the document, not just by number.
        if last - first + 1 != numbers.len() {
            return Err(EditError::NonConsecutive {
                numbers: numbers.to_vec(),
            });
        }
        self.phases.splice(first..=last, std::iter::once(merged));
        self.renumber();
        Ok(())
    }
}

/// Single-line title without heading markers.
fn clean_title(title: &str) -> String {
    let joined = title.split_whitespace().collect::<Vec<_>>().join(" ");
    HEADING_PREFIX_REGEX.replace(&joined, "").into_owned()
}

/// Flatten a field value to the lines a marker value can hold: blank lines
/// are dropped, headings are demoted to plain text, and a leading
/// `**Label:**` loses its bold so it can't end the value early.
fn clean_field(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let line = HEADING_PREFIX_REGEX.replace(line, "").into_owned();
            match ANY_MARKER_REGEX.find(&line) {
                Some(marker) => format!(
                    "{}{}",
                    marker.as_str().replace("**", ""),
                    &line[marker.end()..]
                ),
                None => line,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn finish_block((number, title, header, body): (u32, String, String, String)) -> Phase {
    let (description, definition_of_done) = extract_fields(&body);
    let title = title.trim().to_string();
    Phase {
        number,
        title: title.clone(),
        description: description.clone(),
        definition_of_done: definition_of_done.clone(),
        source: Some(PhaseSource {
            number,
            title,
            description,
            definition_of_done,
            header,
            body,
        }),
    }
}

/// Pull the description and definition of done out of a phase body.
fn extract_fields(body: &str) -> (String, String) {
    let lines: Vec<&str> = body.lines().map(str::trim).collect();

    let explicit = marker_value(&lines, &DESCRIPTION_MARKER_REGEX);
    let dod = marker_value(&lines, &DOD_MARKER_REGEX).unwrap_or_default();

    let description = explicit.unwrap_or_else(|| {
        lines
            .iter()
            .skip_while(|l| l.is_empty())
            .take_while(|l| !l.is_empty() && !ANY_MARKER_REGEX.is_match(l))
            .copied()
            .collect::<Vec<_>>()
            .join("\n")
    });

    (description, dod)
}

/// Value of a `**Label:** value` marker, continuing over following non-empty,
/// non-marker lines.
fn marker_value(lines: &[&str], marker: &Regex) -> Option<String> {
    let (idx, caps) = lines
        .iter()
        .enumerate()
        .find_map(|(i, l)| marker.captures(l).map(|c| (i, c)))?;

    let mut parts: Vec<&str> = Vec::new();
    let first = caps.get(1).map_or("", |m| m.as_str()).trim();
    if !first.is_empty() {
        parts.push(first);
    }
    let mut rest = lines[idx + 1..].iter();
    // A bare marker may be followed by a blank line before its value (e.g. a bullet list).
    let mut skipping_leading_blank = parts.is_empty();
    for line in rest.by_ref() {
        if line.is_empty() {
            if skipping_leading_blank {
                skipping_leading_blank = false;
                continue;
            }
            break;
        }
        if ANY_MARKER_REGEX.is_match(line) || PHASE_HEADER_REGEX.is_match(line) {
            break;
        }
        skipping_leading_blank = false;
        parts.push(line);
    }
    Some(parts.join("\n"))
}
