use crate::config::CompletionConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

#[derive(thiserror::Error, Debug)]
pub enum CompletionError {
    #[error("Completion API network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Completion API rejected credentials ({status}): {body}")]
    Auth { status: StatusCode, body: String },
    #[error("Completion API error ({status}): {body}")]
    Api { status: StatusCode, body: String },
    #[error("Completion API response could not be parsed: {0}")]
    Parse(String),
    #[error("Completion API returned no generated text")]
    Empty,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [CompletionMessage<'a>; 1],

    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Sends a single rendered prompt to an OpenAI compatible chat completions endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    http_client: Client,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    api_key: String,
}
impl CompletionClient {
    pub fn new(http_client: Client, config: &CompletionConfig, api_key: String) -> Self {
        Self {
            http_client,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
        }
    }

    /// Returns the generated text with surrounding whitespace removed.
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_length = prompt.len()))]
    pub async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request_body = CompletionRequest {
            model: &self.model,
            messages: [CompletionMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Sending completion request");
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Completion API error: {status} - {body}");

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    CompletionError::Auth { status, body }
                }
                _ => CompletionError::Api { status, body },
            });
        }

        let body = response.bytes().await?;
        let parsed: CompletionResponse = serde_json::from_slice(&body)
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::Empty)?;

        debug!("Received completion of {} bytes", text.len());
        Ok(text.trim().to_string())
    }
}
