//! Content generation: prompts and calls for every document the user can
//! ask for.
//!
//! The generator is stateless. Callers pass in the conversation and the
//! current documents; the generator builds one completion request, calls the
//! collaborator, and parses the payload (markdown for whole documents, JSON
//! for individual phases).

pub mod payload;

use std::sync::Arc;

use crate::errors::{CollaboratorError, EditError};
use crate::history::{ConversationMessage, render_for_prompt};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::phase::Phase;

pub use payload::{PhaseDraft, parse_markdown, parse_phase_draft, parse_split};

const DESCRIPTION_PROMPT: &str = r###"You write the project description for a software project the user has been describing out loud.

Write clear markdown prose: what the project is, who it is for, the core features, and any constraints the user mentioned. Use only what the user actually said; do not invent features. Output only the description, starting with a "# " title line."###;

const PHASING_PROMPT: &str = r###"You write the phased implementation plan for a software project.

Output markdown only, starting with "# Project Phasing", followed by phases in exactly this form:

## Phase 1: <Title>

**Description:** <what this phase builds>

**Definition of Done:** <a concrete, testable completion criterion>

Number phases from 1 with no gaps. Each phase should be a small, verifiable step. Base the plan on the project description and conversation."###;

const EDIT_DESCRIPTION_PROMPT: &str = r#"You revise a project description. Apply the requested change and keep everything else as it is. Output the complete revised description as markdown and nothing else."#;

const REWRITE_PHASING_PROMPT: &str = r###"You revise a phased implementation plan. Apply the requested change to the whole plan, keep phases the change does not touch, and output the complete plan as markdown in the same "## Phase N: Title" / "**Description:**" / "**Definition of Done:**" format, numbered from 1 with no gaps."###;

const PHASE_JSON_SHAPE: &str =
    r#"{"title": "<short title>", "description": "<what it builds>", "definitionOfDone": "<testable criterion>"}"#;

const CONVERSATION_PROMPT: &str = r#"You are a voice assistant helping someone plan a software project while they walk. Your replies are read aloud, so keep them short (two to four sentences), conversational, and free of markdown.

Help them think through the idea: ask one focused question at a time, point out gaps, and suggest when they have enough to write the description or the phasing. You cannot change the documents yourself; they edit by saying things like "write the description" or "split phase two"."#;

const SEARCH_PROMPT: &str = r#"Answer the research question for someone planning a software project. Your answer is read aloud: give a concise spoken summary (under 120 words), no markdown, no URLs."#;

const DEEP_SEARCH_PROMPT: &str = r#"Research the question thoroughly for someone planning a software project. Compare the main options, note trade-offs, and end with a recommendation. Your answer is read aloud: use plain sentences, no markdown, no URLs, under 300 words."#;

/// How thorough a search should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDepth {
    Quick,
    Deep,
}

/// Model names per task. `None` lets the client use its default.
#[derive(Debug, Clone, Default)]
pub struct GeneratorModels {
    pub content: Option<String>,
    pub search: Option<String>,
    pub deep_search: Option<String>,
}

pub struct ContentGenerator {
    client: Arc<dyn CompletionClient>,
    models: GeneratorModels,
}

impl ContentGenerator {
    pub fn new(client: Arc<dyn CompletionClient>, models: GeneratorModels) -> Self {
        Self { client, models }
    }

    fn request(&self, system: &str) -> CompletionRequest {
        CompletionRequest::new(system).model(self.models.content.as_deref())
    }

    async fn markdown(&self, request: CompletionRequest) -> Result<String, CollaboratorError> {
        let output = self.client.complete(request).await?;
        parse_markdown(&output)
    }

    /// Draft the description from the conversation. `existing` is passed when
    /// the user chose to continue from the current description.
    pub async fn write_description(
        &self,
        history: &[ConversationMessage],
        existing: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        let mut prompt = conversation_block(history);
        if let Some(existing) = existing {
            prompt.push_str(&format!(
                "\n\n## Current Description (extend it, don't discard it)\n\n{}",
                existing
            ));
        }
        prompt.push_str("\n\nWrite the project description.");
        self.markdown(self.request(DESCRIPTION_PROMPT).user(prompt))
            .await
    }

    /// Draft the phasing from the conversation and description.
    pub async fn write_phasing(
        &self,
        history: &[ConversationMessage],
        description: Option<&str>,
        existing: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        let mut prompt = conversation_block(history);
        if let Some(description) = description {
            prompt.push_str(&format!("\n\n## Project Description\n\n{}", description));
        }
        if let Some(existing) = existing {
            prompt.push_str(&format!(
                "\n\n## Current Phasing (extend it, don't discard it)\n\n{}",
                existing
            ));
        }
        prompt.push_str("\n\nWrite the phasing.");
        self.markdown(self.request(PHASING_PROMPT).user(prompt)).await
    }

    pub async fn edit_description(
        &self,
        current: &str,
        instructions: &str,
    ) -> Result<String, CollaboratorError> {
        let prompt = format!(
            "## Current Description\n\n{}\n\n## Requested Change\n\n{}",
            current, instructions
        );
        self.markdown(self.request(EDIT_DESCRIPTION_PROMPT).user(prompt))
            .await
    }

    /// Rewrite the whole phasing document according to `instructions`.
    pub async fn rewrite_phasing(
        &self,
        current: &str,
        instructions: &str,
        description: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        let mut prompt = String::new();
        if let Some(description) = description {
            prompt.push_str(&format!("## Project Description\n\n{}\n\n", description));
        }
        prompt.push_str(&format!(
            "## Current Phasing\n\n{}\n\n## Requested Change\n\n{}",
            current, instructions
        ));
        self.markdown(self.request(REWRITE_PHASING_PROMPT).user(prompt))
            .await
    }

    /// New content for one phase.
    pub async fn edit_phase(
        &self,
        phase: &Phase,
        instructions: &str,
        description: Option<&str>,
    ) -> Result<PhaseDraft, EditError> {
        let system = format!(
            "You revise one phase of an implementation plan. Apply the requested change and respond with one JSON object: {}",
            PHASE_JSON_SHAPE
        );
        let mut prompt = context_block(description);
        prompt.push_str(&format!(
            "## Phase {}\n\n{}\n\n## Requested Change\n\n{}",
            phase.number,
            phase.to_canonical_markdown(),
            instructions
        ));
        let output = self
            .client
            .complete(self.request(&system).user(prompt).json())
            .await?;
        parse_phase_draft(&output)
    }

    /// Replacement phases for one phase. Arity is validated by the caller.
    pub async fn split_phase(
        &self,
        phase: &Phase,
        instructions: &str,
        description: Option<&str>,
    ) -> Result<Vec<PhaseDraft>, EditError> {
        let system = format!(
            "You split one phase of an implementation plan into 2 to 4 smaller sequential phases. Respond with one JSON object: {{\"phases\": [{}, ...]}}",
            PHASE_JSON_SHAPE
        );
        let mut prompt = context_block(description);
        prompt.push_str(&format!(
            "## Phase to Split\n\n{}\n\n## Instructions\n\n{}",
            phase.to_canonical_markdown(),
            instructions
        ));
        let output = self
            .client
            .complete(self.request(&system).user(prompt).json())
            .await?;
        parse_split(&output)
    }

    /// One phase covering all of `phases`.
    pub async fn merge_phases(
        &self,
        phases: &[&Phase],
        instructions: Option<&str>,
        description: Option<&str>,
    ) -> Result<PhaseDraft, EditError> {
        let system = format!(
            "You merge consecutive phases of an implementation plan into a single phase that covers all of their work. Respond with one JSON object: {}",
            PHASE_JSON_SHAPE
        );
        let mut prompt = context_block(description);
        prompt.push_str("## Phases to Merge\n\n");
        for phase in phases {
            prompt.push_str(&phase.to_canonical_markdown());
            prompt.push('\n');
        }
        if let Some(instructions) = instructions {
            prompt.push_str(&format!("\n## Instructions\n\n{}", instructions));
        }
        let output = self
            .client
            .complete(self.request(&system).user(prompt).json())
            .await?;
        parse_phase_draft(&output)
    }

    /// A conversational reply given the history and current documents.
    pub async fn converse(
        &self,
        history: &[ConversationMessage],
        description: Option<&str>,
        phasing: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        let mut system = CONVERSATION_PROMPT.to_string();
        if let Some(description) = description {
            system.push_str(&format!("\n\n## Current Description\n\n{}", description));
        }
        if let Some(phasing) = phasing {
            system.push_str(&format!("\n\n## Current Phasing\n\n{}", phasing));
        }

        let mut request = self.request(&system);
        for message in history {
            request = request.message(message.role, message.content.clone());
        }
        let reply = self.client.complete(request).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(CollaboratorError::EmptyResponse);
        }
        Ok(reply.to_string())
    }

    pub async fn search(
        &self,
        query: &str,
        depth: SearchDepth,
    ) -> Result<String, CollaboratorError> {
        let (system, model) = match depth {
            SearchDepth::Quick => (SEARCH_PROMPT, self.models.search.as_deref()),
            SearchDepth::Deep => (DEEP_SEARCH_PROMPT, self.models.deep_search.as_deref()),
        };
        let request = CompletionRequest::new(system).model(model).user(query);
        let reply = self.client.complete(request).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(CollaboratorError::EmptyResponse);
        }
        Ok(reply.to_string())
    }
}

fn conversation_block(history: &[ConversationMessage]) -> String {
    if history.is_empty() {
        "## Conversation\n\n(no conversation yet)".to_string()
    } else {
        format!("## Conversation\n\n{}", render_for_prompt(history))
    }
}

fn context_block(description: Option<&str>) -> String {
    description
        .map(|d| format!("## Project Description\n\n{}\n\n", d))
        .unwrap_or_default()
}
