//! Story generation through the Mistral agents completion API

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::MistralConfig;
use crate::error::GenerationError;
use crate::http::{HttpClient, HttpRequest};
use crate::normalize::clean;
use crate::types::GeneratedStory;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    agent_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Split raw model output into a normalized title and body.
///
/// The first line is the title and everything after the first newline is
/// the body. Without a newline the body is empty.
pub fn split_story(content: &str) -> GeneratedStory {
    let (first_line, rest) = content.split_once('\n').unwrap_or((content, ""));

    let title = clean(first_line.trim());
    let body = if rest.is_empty() {
        String::new()
    } else {
        clean(rest.trim())
    };

    GeneratedStory { title, body }
}

pub struct StoryGenerator {
    http: Arc<dyn HttpClient>,
    endpoint: String,
    api_key: SecretString,
    agent_id: String,
    max_tokens: u32,
    prompt: String,
}

impl StoryGenerator {
    pub fn new(http: Arc<dyn HttpClient>, config: &MistralConfig) -> Self {
        Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            agent_id: config.agent_id.clone(),
            max_tokens: config.max_tokens,
            prompt: config.prompt.clone(),
        }
    }

    fn build_request(&self) -> Result<HttpRequest, GenerationError> {
        let payload = CompletionRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: &self.prompt,
            }],
            max_tokens: self.max_tokens,
            agent_id: &self.agent_id,
        };
        let payload = serde_json::to_value(&payload)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        Ok(HttpRequest::json(&self.endpoint, payload)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .header("Content-Type", "application/json"))
    }

    /// Request one story and report why it failed.
    pub async fn try_generate(&self) -> Result<GeneratedStory, GenerationError> {
        let request = self.build_request()?;
        debug!("Requesting a story from agent {}", self.agent_id);

        let response = self.http.execute(request).await?;
        if response.status != 200 {
            return Err(GenerationError::Status {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&response.body)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(GenerationError::NoChoices)?;

        debug!("Received {} characters of story", content.len());
        Ok(split_story(&content))
    }

    /// Request one story; failures are logged and become `None`.
    ///
    /// A `None` means neither title nor body is usable.
    pub async fn generate(&self) -> Option<GeneratedStory> {
        match self.try_generate().await {
            Ok(story) => Some(story),
            Err(e) => {
                error!("API Error: {}", e);
                None
            }
        }
    }
}
