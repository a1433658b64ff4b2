//! Deterministic completion client for tests and offline runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::{CompletionClient, CompletionRequest};
use crate::errors::CollaboratorError;

/// Replays queued responses in order and records every request it receives.
///
/// When the script runs out, `complete` returns
/// [`CollaboratorError::NotConfigured`], which callers treat like any other
/// collaborator failure.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, text: impl Into<String>) -> &Self {
        self.push(Ok(text.into()))
    }

    pub fn push_err(&self, error: CollaboratorError) -> &Self {
        self.push(Err(error))
    }

    fn push(&self, response: Result<String, CollaboratorError>) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CollaboratorError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| {
                Err(CollaboratorError::NotConfigured(
                    "scripted client has no responses left".to_string(),
                ))
            })
    }
}
