use crate::config::{GatewayAuth, GatewayCredentials, MessagingConfig};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, instrument};

pub const WHATSAPP_CHANNEL: &str = "whatsapp";

#[derive(thiserror::Error, Debug)]
pub enum MessagingError {
    #[error("Messaging gateway network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Messaging gateway rejected credentials ({status}): {body}")]
    Auth { status: StatusCode, body: String },
    #[error("Messaging gateway rejected message ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("Messaging gateway response could not be parsed: {0}")]
    Parse(String),
}

#[derive(Debug, Serialize)]
pub struct Endpoint {
    #[serde(rename = "type")]
    pub endpoint_type: &'static str,
    pub number: String,
}

#[derive(Debug, Serialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub content_type: &'static str,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub content: MessageContent,
}

#[derive(Debug, Serialize)]
pub struct Sandbox {
    pub passphrase: String,
}

/// Request body for the gateway's Messages API.
#[derive(Debug, Serialize)]
pub struct OutboundMessage {
    pub from: Endpoint,
    pub to: Endpoint,
    pub message: MessageBody,
    pub channel: &'static str,
    pub sandbox: Sandbox,
}

#[derive(Clone)]
pub struct MessagingClient {
    http_client: Client,
    url: String,
    auth: GatewayAuth,
    credentials: GatewayCredentials,
}
impl MessagingClient {
    pub fn new(
        http_client: Client,
        config: &MessagingConfig,
        credentials: &GatewayCredentials,
    ) -> Self {
        Self {
            http_client,
            url: config.url.clone(),
            auth: config.auth,
            credentials: credentials.clone(),
        }
    }

    pub fn build_message(&self, to: &str, text: &str) -> OutboundMessage {
        OutboundMessage {
            from: Endpoint {
                endpoint_type: WHATSAPP_CHANNEL,
                number: self.credentials.sender_number.clone(),
            },
            to: Endpoint {
                endpoint_type: WHATSAPP_CHANNEL,
                number: to.to_string(),
            },
            message: MessageBody {
                content: MessageContent {
                    content_type: "text",
                    text: text.to_string(),
                },
            },
            channel: WHATSAPP_CHANNEL,
            sandbox: Sandbox {
                passphrase: self.credentials.sandbox_passphrase.clone(),
            },
        }
    }

    /// Sends `text` to `to` and returns the gateway's parsed JSON response.
    #[instrument(skip(self, to, text), fields(to = %to, text_length = text.len()))]
    pub async fn send(&self, to: &str, text: &str) -> Result<Value, MessagingError> {
        let request_body = self.build_message(to, text);

        let builder = self.http_client.post(&self.url).json(&request_body);
        let builder = match self.auth {
            GatewayAuth::Bearer => builder.bearer_auth(&self.credentials.api_key),
            GatewayAuth::Basic => builder.basic_auth(
                &self.credentials.api_key,
                Some(&self.credentials.api_secret),
            ),
        };

        debug!("Sending message to gateway");
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Messaging gateway error: {status} - {body}");

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    MessagingError::Auth { status, body }
                }
                _ => MessagingError::Rejected { status, body },
            });
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        let parsed: Value =
            serde_json::from_slice(&body).map_err(|e| MessagingError::Parse(e.to_string()))?;

        match parsed.get("message_uuid").and_then(Value::as_str) {
            Some(message_uuid) => debug!("Gateway accepted message {message_uuid}"),
            None => debug!("Gateway accepted message"),
        }
        Ok(parsed)
    }
}
