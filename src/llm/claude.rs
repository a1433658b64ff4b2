//! Completion client that shells out to the Claude CLI in `--print` mode.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{CompletionClient, CompletionRequest};
use crate::errors::CollaboratorError;
use crate::history::Role;

const JSON_INSTRUCTION: &str =
    "Respond with a single JSON object and nothing else. Do not wrap it in a code fence.";

/// Stateless Claude CLI invocation per request.
#[derive(Debug, Clone)]
pub struct ClaudeCliClient {
    claude_cmd: String,
    timeout_secs: u64,
}

impl ClaudeCliClient {
    pub fn new(claude_cmd: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            claude_cmd: claude_cmd.into(),
            timeout_secs,
        }
    }

    /// Flatten the request into the single prompt the CLI accepts.
    fn build_prompt(request: &CompletionRequest) -> String {
        let mut prompt = request.system.trim().to_string();
        if request.json {
            prompt.push_str("\n\n");
            prompt.push_str(JSON_INSTRUCTION);
        }

        match request.messages.as_slice() {
            [only] if only.role == Role::User => {
                prompt.push_str("\n\n");
                prompt.push_str(&only.content);
            }
            messages => {
                prompt.push_str("\n\n## Conversation\n");
                for message in messages {
                    let speaker = match message.role {
                        Role::User => "User",
                        Role::Assistant => "Assistant",
                    };
                    prompt.push_str(&format!("\n{}: {}", speaker, message.content));
                }
            }
        }
        prompt
    }
}

#[async_trait]
impl CompletionClient for ClaudeCliClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CollaboratorError> {
        let prompt = Self::build_prompt(&request);

        let mut cmd = Command::new(&self.claude_cmd);
        cmd.args(["--print", "--output-format", "text"]);
        if let Some(model) = &request.model {
            cmd.args(["--model", model]);
        }
        cmd.arg("-p").arg(&prompt);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(cmd = %self.claude_cmd, prompt_chars = prompt.len(), "Invoking Claude CLI");

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| CollaboratorError::Timeout {
                secs: self.timeout_secs,
            })?
            .map_err(|source| CollaboratorError::Spawn {
                program: self.claude_cmd.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CollaboratorError::ProcessExit {
                program: self.claude_cmd.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(CollaboratorError::EmptyResponse);
        }
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_user_message_prompt() {
        let req = CompletionRequest::new("You are terse.").user("Say hi");
        assert_eq!(ClaudeCliClient::build_prompt(&req), "You are terse.\n\nSay hi");
    }

    #[test]
    fn test_json_request_adds_instruction() {
        let req = CompletionRequest::new("Classify.").user("stop").json();
        let prompt = ClaudeCliClient::build_prompt(&req);
        assert!(prompt.contains(JSON_INSTRUCTION));
        assert!(prompt.ends_with("stop"));
    }

    #[test]
    fn test_conversation_prompt_labels_speakers() {
        let req = CompletionRequest::new("Chat.")
            .user("hello")
            .message(Role::Assistant, "hi there")
            .user("what next?");
        let prompt = ClaudeCliClient::build_prompt(&req);
        assert!(prompt.contains("User: hello"));
        assert!(prompt.contains("Assistant: hi there"));
        assert!(prompt.contains("User: what next?"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let client = ClaudeCliClient::new("walkspec-definitely-not-a-binary", 5);
        let err = client
            .complete(CompletionRequest::new("s").user("u"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_process_error() {
        let client = ClaudeCliClient::new("false", 5);
        let err = client
            .complete(CompletionRequest::new("s").user("u"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::ProcessExit { .. }));
    }
}
