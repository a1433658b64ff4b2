//! Language-model completion clients.
//!
//! Every collaborator call (classification, content generation, search)
//! goes through the [`CompletionClient`] trait so the orchestrator can be
//! driven by the Claude CLI, an OpenAI-compatible HTTP endpoint, or the
//! [`ScriptedClient`] in tests.

pub mod chat;
pub mod claude;
pub mod retry;
pub mod scripted;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{LlmConfig, Provider};
use crate::errors::CollaboratorError;
use crate::history::Role;

pub use chat::{ChatCompletionsClient, ChatCompletionsConfig};
pub use claude::ClaudeCliClient;
pub use retry::{RetryPolicy, RetryingClient};
pub use scripted::ScriptedClient;

/// One message of a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A single stateless completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Ask the collaborator for a single JSON object
    pub json: bool,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: Vec::new(),
            json: false,
            model: None,
            max_tokens: None,
        }
    }

    pub fn message(mut self, role: Role, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
        });
        self
    }

    pub fn user(self, content: impl Into<String>) -> Self {
        self.message(Role::User, content)
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn model(mut self, model: Option<&str>) -> Self {
        self.model = model.map(str::to_string);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Content of the last user message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// A completion service. Implementations must be cheap to share across tasks.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CollaboratorError>;
}

/// Build the configured client, wrapped in the configured retry policy.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn CompletionClient>> {
    let inner: Arc<dyn CompletionClient> = match config.provider {
        Provider::ClaudeCli => Arc::new(ClaudeCliClient::new(
            config.claude_cmd.clone(),
            config.timeout_secs,
        )),
        Provider::ChatCompletions => {
            let api_key = std::env::var(&config.api_key_env).ok();
            if api_key.is_none() {
                tracing::warn!(
                    env = %config.api_key_env,
                    "No API key in environment; requests will be sent unauthenticated"
                );
            }
            Arc::new(ChatCompletionsClient::new(ChatCompletionsConfig {
                base_url: config.base_url.clone(),
                api_key,
                timeout_secs: config.timeout_secs,
            })?)
        }
    };

    Ok(Arc::new(RetryingClient::new(
        inner,
        RetryPolicy::from(&config.retry),
    )))
}
