//! Single-threaded execution engine.
//!
//! Every action goes through one FIFO queue. The first enqueue on an idle
//! orchestrator flips the state to `Executing` under the queue lock and
//! spawns a drain task; the drain task runs items one at a time and only
//! returns to `Idle`, under the same lock, once the queue is empty. No
//! other code path consumes the queue, so two actions never overlap.
//!
//! Handlers never fail from the caller's point of view: errors are turned
//! into the spoken response at the dispatch boundary and the queue moves on.

pub mod journal;
pub mod state;

pub use journal::{Journal, JournalEntry};
pub use state::{ActionOutcome, ActionQueueItem, ActionStatus, OrchestratorEvent, OrchestratorState};

use anyhow::Result;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactStore, Documents, WriteReceipt};
use crate::clipboard::{Clipboard, CommandClipboard, NoClipboard};
use crate::config::WalkspecConfig;
use crate::editor::{PhaseEditor, canonicalize_phasing};
use crate::errors::{ActionError, EditError};
use crate::generate::{ContentGenerator, GeneratorModels, SearchDepth};
use crate::history::{ConversationHistory, ConversationMessage, DEFAULT_HISTORY_CAPACITY, Role};
use crate::llm;
use crate::phase::MERGE_ARITY;
use crate::router::{
    ConfirmationOutcome, PendingConfirmation, ProposedAction, Router, RouterConfig, SessionAction,
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub history_capacity: usize,
    /// Ask before a write replaces a document that already has content
    pub confirm_overwrite: bool,
    pub journal: Option<PathBuf>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            confirm_overwrite: true,
            journal: None,
        }
    }
}

/// Everything the handlers delegate to.
pub struct Collaborators {
    pub router: Router,
    pub generator: Arc<ContentGenerator>,
    pub documents: Documents,
    pub clipboard: Arc<dyn Clipboard>,
}

#[derive(Debug, Clone, Copy)]
enum WriteTarget {
    Description,
    Phasing,
    Both,
}

impl WriteTarget {
    fn of(action: &ProposedAction) -> Option<Self> {
        match action {
            ProposedAction::WriteDescription => Some(WriteTarget::Description),
            ProposedAction::WritePhasing => Some(WriteTarget::Phasing),
            ProposedAction::WriteBoth => Some(WriteTarget::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CopyTarget {
    Description,
    Phasing,
    Both,
}

#[derive(Default)]
struct Queue {
    items: VecDeque<ActionQueueItem>,
    draining: bool,
}

struct Session {
    history: ConversationHistory,
    last_response: Option<String>,
    last_search_query: Option<String>,
    pending: Option<PendingConfirmation>,
}

struct Shared {
    queue: Mutex<Queue>,
    session: Mutex<Session>,
    state_tx: watch::Sender<OrchestratorState>,
    events: broadcast::Sender<OrchestratorEvent>,
    router: Router,
    generator: Arc<ContentGenerator>,
    editor: PhaseEditor,
    documents: Documents,
    clipboard: Arc<dyn Clipboard>,
    journal: Option<Journal>,
    confirm_overwrite: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle to the engine. Cheap to clone; all clones share one queue.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, options: OrchestratorOptions) -> Self {
        let Collaborators {
            router,
            generator,
            documents,
            clipboard,
        } = collaborators;
        let (state_tx, _) = watch::channel(OrchestratorState::Idle);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue::default()),
                session: Mutex::new(Session {
                    history: ConversationHistory::with_capacity(options.history_capacity),
                    last_response: None,
                    last_search_query: None,
                    pending: None,
                }),
                state_tx,
                events,
                router,
                editor: PhaseEditor::new(documents.clone(), Arc::clone(&generator)),
                generator,
                documents,
                clipboard,
                journal: options.journal.map(Journal::new),
                confirm_overwrite: options.confirm_overwrite,
            }),
        }
    }

    /// Wire up every collaborator from resolved configuration.
    pub fn from_config(config: &WalkspecConfig) -> Result<Self> {
        let toml = &config.toml;
        let client = llm::from_config(&toml.llm)?;

        let router = Router::new(
            Arc::clone(&client),
            RouterConfig {
                max_input_chars: toml.router.max_input_chars,
                history_turns: toml.router.history_turns,
                model: toml.llm.router_model(),
            },
        );
        let generator = Arc::new(ContentGenerator::new(
            client,
            GeneratorModels {
                content: toml.llm.content_model(),
                search: toml.llm.search_model(),
                deep_search: toml.llm.deep_search_model(),
            },
        ));
        let store = ArtifactStore::new(config.artifacts_dir())
            .with_backup_retention(toml.artifacts.backup_retention);
        let clipboard: Arc<dyn Clipboard> = match toml
            .clipboard
            .command
            .as_deref()
            .and_then(CommandClipboard::from_command_line)
        {
            Some(command) => Arc::new(command),
            None => Arc::new(NoClipboard),
        };

        Ok(Self::new(
            Collaborators {
                router,
                generator,
                documents: Documents::new(store, toml.artifacts.layout),
                clipboard,
            },
            OrchestratorOptions {
                history_capacity: toml.conversation.history_capacity,
                confirm_overwrite: toml.conversation.confirm_overwrite,
                journal: Some(config.journal_file()),
            },
        ))
    }

    pub fn state(&self) -> OrchestratorState {
        *self.shared.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<OrchestratorState> {
        self.shared.state_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.shared.events.subscribe()
    }

    pub fn last_response(&self) -> Option<String> {
        lock(&self.shared.session).last_response.clone()
    }

    pub fn last_search_query(&self) -> Option<String> {
        lock(&self.shared.session).last_search_query.clone()
    }

    pub fn history(&self) -> Vec<ConversationMessage> {
        lock(&self.shared.session).history.all()
    }

    pub fn pending_confirmation(&self) -> Option<PendingConfirmation> {
        lock(&self.shared.session).pending.clone()
    }

    /// Items waiting or running.
    pub fn queue_len(&self) -> usize {
        lock(&self.shared.queue).items.len()
    }

    /// Queue an action with no utterance attached. Must be called from
    /// within a tokio runtime.
    pub fn enqueue(&self, action: ProposedAction) -> Uuid {
        self.enqueue_item(ActionQueueItem::new(action, None))
    }

    /// Queue an action along with the utterance it was routed from; the
    /// utterance is added to conversation history when the action runs.
    pub fn enqueue_utterance(&self, utterance: impl Into<String>, action: ProposedAction) -> Uuid {
        self.enqueue_item(ActionQueueItem::new(action, Some(utterance.into())))
    }

    /// Route a transcript and queue the result. While a confirmation is
    /// pending the classifier is skipped and the reply goes to the
    /// confirmation. Blank transcripts are ignored.
    pub async fn submit(&self, transcript: &str) -> Option<Uuid> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return None;
        }

        let (history, last_query, pending) = {
            let session = lock(&self.shared.session);
            (
                session
                    .history
                    .recent(self.shared.router.config().history_turns),
                session.last_search_query.clone(),
                session.pending.is_some(),
            )
        };

        let action = if pending {
            debug!("Confirmation pending, skipping classification");
            ProposedAction::conversation(transcript)
        } else {
            self.shared
                .router
                .classify(transcript, &history, last_query.as_deref())
                .await
        };
        Some(self.enqueue_utterance(transcript, action))
    }

    /// Resolves once the queue has drained.
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe_state();
        // Err only if the sender is gone, which can't happen while `self` lives.
        let _ = rx.wait_for(|state| *state == OrchestratorState::Idle).await;
    }

    fn enqueue_item(&self, item: ActionQueueItem) -> Uuid {
        let id = item.id;
        let start_drain = {
            let mut queue = lock(&self.shared.queue);
            debug!(id = %id, action = %item.action, queued = queue.items.len() + 1, "Enqueued action");
            queue.items.push_back(item);
            if queue.draining {
                false
            } else {
                queue.draining = true;
                self.shared.set_state(OrchestratorState::Executing);
                true
            }
        };

        if start_drain {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(shared.drain());
        }
        id
    }
}

impl Shared {
    fn set_state(&self, state: OrchestratorState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "State changed");
            let _ = self.events.send(OrchestratorEvent::StateChanged(state));
        }
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let item = {
                let mut queue = lock(&self.queue);
                match queue.items.front() {
                    Some(item) => item.clone(),
                    None => {
                        queue.draining = false;
                        self.set_state(OrchestratorState::Idle);
                        return;
                    }
                }
            };

            self.execute(&item).await;

            let mut queue = lock(&self.queue);
            queue.items.pop_front();
            debug!(remaining = queue.items.len(), "Action finished");
        }
    }

    async fn execute(self: &Arc<Self>, item: &ActionQueueItem) {
        if let Some(utterance) = &item.utterance {
            lock(&self.session).history.push_user(utterance.clone());
        }
        let _ = self.events.send(OrchestratorEvent::ActionStarted {
            id: item.id,
            action: item.action.clone(),
        });

        // The handler runs in its own task so a panic ends this item, not the drain.
        let handler = {
            let shared = Arc::clone(self);
            let action = item.action.clone();
            tokio::spawn(async move { shared.dispatch(&action).await })
        };
        let outcome = match handler.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) if e.is_rejection() => ActionOutcome::rejected(format!("{}.", e)),
            Ok(Err(e)) => {
                error!(id = %item.id, action = %item.action, error = %e, "Action failed");
                ActionOutcome::failed(format!("Sorry, that didn't work: {}", e))
            }
            Err(e) => {
                error!(id = %item.id, action = %item.action, error = %e, "Action handler aborted");
                self.set_state(OrchestratorState::Executing);
                ActionOutcome::failed("Sorry, something went wrong while handling that.")
            }
        };
        info!(id = %item.id, action = %item.action, status = %outcome.status, "Action done");

        if !matches!(item.action, ProposedAction::RepeatLast) {
            let mut session = lock(&self.session);
            session.last_response = Some(outcome.response.clone());
            session.history.push_assistant(outcome.response.clone());
        }

        if let Some(journal) = &self.journal
            && let Err(e) = journal.append(&item.id.to_string(), item.action.name(), outcome.status)
        {
            warn!(error = %e, "Failed to append to journal");
        }

        let _ = self.events.send(OrchestratorEvent::ActionFinished {
            id: item.id,
            action: item.action.clone(),
            outcome,
        });
    }

    async fn dispatch(&self, action: &ProposedAction) -> Result<ActionOutcome, ActionError> {
        match action {
            ProposedAction::WriteDescription => self.write(WriteTarget::Description).await,
            ProposedAction::WritePhasing => self.write(WriteTarget::Phasing).await,
            ProposedAction::WriteBoth => self.write(WriteTarget::Both).await,
            ProposedAction::ReadDescription => Ok(match self.documents.read_description()? {
                Some(text) => ActionOutcome::completed(text),
                None => ActionOutcome::completed("No description has been written yet."),
            }),
            ProposedAction::ReadPhasing => Ok(match self.documents.read_phasing()? {
                Some(text) => ActionOutcome::completed(text),
                None => ActionOutcome::completed("No phasing has been written yet."),
            }),
            ProposedAction::ReadSpecificPhase { phase_number } => self.read_phase(*phase_number),
            ProposedAction::EditDescription { content } => self.edit_description(content).await,
            ProposedAction::EditPhasing {
                phase_number: Some(number),
                content,
            } => {
                let edit = self.editor.edit(*number, content).await?;
                log_receipt(&edit.receipt);
                let title = edit.changed.first().map(|p| p.title.as_str()).unwrap_or("");
                Ok(ActionOutcome::completed(format!(
                    "I've updated phase {}: {}.",
                    number, title
                )))
            }
            ProposedAction::EditPhasing {
                phase_number: None,
                content,
            } => {
                let edit = self.editor.rewrite(content).await?;
                log_receipt(&edit.receipt);
                Ok(ActionOutcome::completed(format!(
                    "I've rewritten the phasing. It now has {} phases.",
                    edit.total
                )))
            }
            ProposedAction::SplitPhase {
                phase_number,
                instructions,
            } => {
                let edit = self.editor.split(*phase_number, instructions).await?;
                log_receipt(&edit.receipt);
                Ok(ActionOutcome::completed(format!(
                    "I've split phase {} into {} phases. The plan now has {} phases.",
                    phase_number,
                    edit.changed.len(),
                    edit.total
                )))
            }
            ProposedAction::MergePhases {
                start,
                end,
                instructions,
            } => {
                let span = end.checked_sub(*start).map_or(0, |d| d as usize + 1);
                if !MERGE_ARITY.contains(&span) {
                    return Err(EditError::MergeArity { count: span }.into());
                }
                let numbers: Vec<u32> = (*start..=*end).collect();
                let edit = self.editor.merge(&numbers, instructions.as_deref()).await?;
                log_receipt(&edit.receipt);
                let title = edit.changed.first().map(|p| p.title.as_str()).unwrap_or("");
                Ok(ActionOutcome::completed(format!(
                    "I've merged phases {} to {} into phase {}: {}. The plan now has {} phases.",
                    start, end, start, title, edit.total
                )))
            }
            ProposedAction::Search { query } => self.search(query, SearchDepth::Quick).await,
            ProposedAction::DeepSearch { query } => self.search(query, SearchDepth::Deep).await,
            ProposedAction::CopyDescription => self.copy(CopyTarget::Description).await,
            ProposedAction::CopyPhasing => self.copy(CopyTarget::Phasing).await,
            ProposedAction::CopyBoth => self.copy(CopyTarget::Both).await,
            ProposedAction::RepeatLast => {
                let last = lock(&self.session).last_response.clone();
                Ok(ActionOutcome::completed(
                    last.unwrap_or_else(|| "I haven't said anything yet.".to_string()),
                ))
            }
            ProposedAction::Stop => {
                lock(&self.session).pending = None;
                Ok(ActionOutcome::completed("Okay."))
            }
            ProposedAction::Conversation { text } => self.converse(text).await,
        }
    }

    /// Raise a confirmation if the write would replace existing content,
    /// otherwise generate straight away.
    async fn write(&self, target: WriteTarget) -> Result<ActionOutcome, ActionError> {
        if self.confirm_overwrite {
            let existing = match target {
                WriteTarget::Description => self.documents.read_description()?.is_some(),
                WriteTarget::Phasing => self.documents.read_phasing()?.is_some(),
                WriteTarget::Both => {
                    self.documents.read_description()?.is_some()
                        || self.documents.read_phasing()?.is_some()
                }
            };
            if existing {
                let action = match target {
                    WriteTarget::Description => ProposedAction::WriteDescription,
                    WriteTarget::Phasing => ProposedAction::WritePhasing,
                    WriteTarget::Both => ProposedAction::WriteBoth,
                };
                let pending = PendingConfirmation::new(action);
                let prompt = pending.prompt();
                debug!(action = %pending.action, "Awaiting overwrite confirmation");
                lock(&self.session).pending = Some(pending);
                return Ok(ActionOutcome::completed(prompt));
            }
        }
        self.generate_documents(target, false).await
    }

    async fn generate_documents(
        &self,
        target: WriteTarget,
        continue_previous: bool,
    ) -> Result<ActionOutcome, ActionError> {
        let history = lock(&self.session).history.all();

        match target {
            WriteTarget::Description => {
                let existing = if continue_previous {
                    self.documents.read_description()?
                } else {
                    None
                };
                let text = self
                    .generator
                    .write_description(&history, existing.as_deref())
                    .await?;
                log_receipt(&self.documents.write_description(&text)?);
                Ok(ActionOutcome::completed("I've written the project description."))
            }
            WriteTarget::Phasing => {
                let description = self.documents.read_description()?;
                let existing = if continue_previous {
                    self.documents.read_phasing()?
                } else {
                    None
                };
                let text = self
                    .generator
                    .write_phasing(&history, description.as_deref(), existing.as_deref())
                    .await?;
                let document = canonicalize_phasing(&text)?;
                log_receipt(&self.documents.write_phasing(&document.to_markdown())?);
                Ok(ActionOutcome::completed(format!(
                    "I've written the phasing with {} phases.",
                    document.len()
                )))
            }
            WriteTarget::Both => {
                let (existing_description, existing_phasing) = if continue_previous {
                    (
                        self.documents.read_description()?,
                        self.documents.read_phasing()?,
                    )
                } else {
                    (None, None)
                };
                let description = self
                    .generator
                    .write_description(&history, existing_description.as_deref())
                    .await?;
                let phasing = self
                    .generator
                    .write_phasing(&history, Some(&description), existing_phasing.as_deref())
                    .await?;
                let document = canonicalize_phasing(&phasing)?;
                for receipt in self
                    .documents
                    .write_both(&description, &document.to_markdown())?
                {
                    log_receipt(&receipt);
                }
                Ok(ActionOutcome::completed(format!(
                    "I've written the description and a phasing with {} phases.",
                    document.len()
                )))
            }
        }
    }

    fn read_phase(&self, number: u32) -> Result<ActionOutcome, ActionError> {
        let document = match self.documents.read_phase_document()? {
            Some(document) if !document.is_empty() => document,
            _ => return Ok(ActionOutcome::completed("No phasing has been written yet.")),
        };
        Ok(match document.get(number) {
            Some(phase) => ActionOutcome::completed(phase.to_spoken()),
            None => ActionOutcome::rejected(format!(
                "Phase {} doesn't exist. The phasing has {} phases.",
                number,
                document.len()
            )),
        })
    }

    async fn edit_description(&self, instructions: &str) -> Result<ActionOutcome, ActionError> {
        let Some(current) = self.documents.read_description()? else {
            return Ok(ActionOutcome::rejected(
                "No description has been written yet, so there's nothing to edit.",
            ));
        };
        let text = self
            .generator
            .edit_description(&current, instructions)
            .await?;
        log_receipt(&self.documents.write_description(&text)?);
        Ok(ActionOutcome::completed("I've updated the description."))
    }

    async fn search(&self, query: &str, depth: SearchDepth) -> Result<ActionOutcome, ActionError> {
        lock(&self.session).last_search_query = Some(query.to_string());
        let reply = self.generator.search(query, depth).await?;
        Ok(ActionOutcome::completed(reply))
    }

    async fn copy(&self, target: CopyTarget) -> Result<ActionOutcome, ActionError> {
        let (text, label) = match target {
            CopyTarget::Description => (self.documents.read_description()?, "description"),
            CopyTarget::Phasing => (self.documents.read_phasing()?, "phasing"),
            CopyTarget::Both => (
                self.documents.read_combined()?,
                "description and phasing",
            ),
        };
        let Some(text) = text else {
            return Ok(ActionOutcome::rejected(format!(
                "There's no {} to copy yet.",
                label
            )));
        };
        self.clipboard.copy(&text).await?;
        Ok(ActionOutcome::completed(format!(
            "Copied the {} to the clipboard.",
            label
        )))
    }

    /// Either answers a pending confirmation or generates a reply.
    async fn converse(&self, text: &str) -> Result<ActionOutcome, ActionError> {
        let pending = lock(&self.session).pending.take();
        if let Some(mut pending) = pending {
            let target = WriteTarget::of(&pending.action);
            return match (pending.respond(text), target) {
                (ConfirmationOutcome::Resolved(SessionAction::ContinuePrevious), Some(target)) => {
                    self.generate_documents(target, true).await
                }
                (ConfirmationOutcome::Resolved(SessionAction::StartNew), Some(target)) => {
                    self.generate_documents(target, false).await
                }
                (ConfirmationOutcome::Reprompt(prompt), _) => {
                    lock(&self.session).pending = Some(pending);
                    Ok(ActionOutcome::completed(prompt))
                }
                (ConfirmationOutcome::Unintelligible, _) => Ok(ActionOutcome::rejected(
                    "I couldn't tell what you wanted, so I've left the documents unchanged.",
                )),
                _ => Ok(ActionOutcome::completed(
                    "Okay, I'll leave the existing documents as they are.",
                )),
            };
        }

        let description = self.documents.read_description()?;
        let phasing = self.documents.read_phasing()?;
        let history = {
            let mut session = lock(&self.session);
            let recorded = session
                .history
                .last()
                .is_some_and(|m| m.role == Role::User && m.content == text);
            if !recorded && !text.trim().is_empty() {
                session.history.push_user(text);
            }
            session.history.all()
        };

        self.set_state(OrchestratorState::Conversing);
        let reply = self
            .generator
            .converse(&history, description.as_deref(), phasing.as_deref())
            .await;
        self.set_state(OrchestratorState::Executing);

        Ok(ActionOutcome::completed(reply?))
    }
}

fn log_receipt(receipt: &WriteReceipt) {
    info!(
        path = %receipt.path.display(),
        digest = %receipt.digest,
        backup = ?receipt.backup,
        "Wrote artifact"
    );
}
