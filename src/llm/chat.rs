//! OpenAI-compatible `/chat/completions` client (Groq by default).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{CompletionClient, CompletionRequest};
use crate::errors::CollaboratorError;
use crate::history::Role;

/// Statuses worth retrying: rate limiting and transient upstream failures.
const UNAVAILABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone)]
pub struct ChatCompletionsConfig {
    /// Base URL without the trailing `/chat/completions`
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

pub struct ChatCompletionsClient {
    client: reqwest::Client,
    config: ChatCompletionsConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: ChatCompletionsConfig) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

fn build_body(request: &CompletionRequest) -> Result<ChatRequest<'_>, CollaboratorError> {
    let model = request.model.as_deref().ok_or_else(|| {
        CollaboratorError::NotConfigured("chat-completions requests need a model".to_string())
    })?;

    let mut messages = vec![WireMessage {
        role: "system",
        content: &request.system,
    }];
    messages.extend(request.messages.iter().map(|m| WireMessage {
        role: match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: &m.content,
    }));

    Ok(ChatRequest {
        model,
        messages,
        temperature: 0.2,
        max_tokens: request.max_tokens,
        response_format: request.json.then_some(ResponseFormat {
            kind: "json_object",
        }),
    })
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CollaboratorError> {
        let body = build_body(&request)?;
        debug!(endpoint = %self.endpoint(), model = body.model, "Sending chat completion");

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CollaboratorError::Timeout {
                    secs: self.config.timeout_secs,
                }
            } else {
                CollaboratorError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if UNAVAILABLE_STATUSES.contains(&status) {
            return Err(CollaboratorError::Unavailable { status });
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http { status, body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(CollaboratorError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_includes_system_and_json_format() {
        let request = CompletionRequest::new("Classify.")
            .user("read phase two")
            .json()
            .model(Some("llama"));
        let body = serde_json::to_value(build_body(&request).unwrap()).unwrap();

        assert_eq!(body["model"], "llama");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "read phase two");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_body_requires_model() {
        let request = CompletionRequest::new("s").user("u");
        assert!(matches!(
            build_body(&request),
            Err(CollaboratorError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = ChatCompletionsClient::new(ChatCompletionsConfig {
            base_url: "https://api.groq.com/openai/v1/".to_string(),
            api_key: None,
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }
}
