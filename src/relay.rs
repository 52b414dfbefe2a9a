use crate::completion::{CompletionClient, CompletionError};
use crate::config::AppConfig;
use crate::messaging::{MessagingClient, MessagingError};
use crate::prompt::PromptTemplate;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info, instrument};

/// Inbound gateway callback. Only `message.content.text` is consumed.
#[derive(Debug, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WebhookPayload {
    #[serde(default)]
    pub message: Option<InboundMessage>,
}
impl WebhookPayload {
    pub fn text(&self) -> Result<&str, SkipReason> {
        let message = self.message.as_ref().ok_or(SkipReason::NoMessage)?;
        message
            .content
            .as_ref()
            .and_then(|content| content.text.as_deref())
            .ok_or(SkipReason::NoText)
    }
}

#[derive(Debug, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InboundMessage {
    #[serde(default)]
    pub content: Option<InboundContent>,
}

#[derive(Debug, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InboundContent {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Body was not a JSON object of the expected shape.
    Malformed,
    /// No `message` field, e.g. delivery receipts.
    NoMessage,
    /// A message without text, e.g. images or locations.
    NoText,
}
impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::Malformed => "malformed payload",
            SkipReason::NoMessage => "no message",
            SkipReason::NoText => "message without text",
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Skipped(SkipReason),
    Replied { to: String, reply: String },
}

#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

/// Prompt formatter, completion client and messaging client wired together.
pub struct Relay {
    template: PromptTemplate,
    completion: CompletionClient,
    messaging: MessagingClient,
    recipient: String,
}
impl Relay {
    pub fn new(config: &AppConfig, http_client: Client) -> Self {
        let credentials = &config.credentials;
        Self {
            template: config.completion.persona_template.clone(),
            completion: CompletionClient::new(
                http_client.clone(),
                &config.completion,
                credentials.openai_api_key.clone(),
            ),
            messaging: MessagingClient::new(
                http_client,
                &config.messaging,
                &credentials.gateway,
            ),
            recipient: credentials.recipient_number.clone(),
        }
    }

    /// Generates a persona reply for the payload's text and delivers it to the
    /// configured recipient. Nothing is sent when the payload carries no text,
    /// and nothing is delivered when the completion fails.
    #[instrument(skip(self, payload))]
    pub async fn handle(&self, payload: WebhookPayload) -> Result<RelayOutcome, RelayError> {
        let text = match payload.text() {
            Ok(text) => text,
            Err(reason) => {
                debug!("Skipping webhook: {reason}");
                return Ok(RelayOutcome::Skipped(reason));
            }
        };

        let prompt = self.template.render(text);
        let reply = self.completion.complete(&prompt).await?;

        self.messaging.send(&self.recipient, &reply).await?;
        info!("Relayed reply of {} bytes", reply.len());

        Ok(RelayOutcome::Replied {
            to: self.recipient.clone(),
            reply,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Credentials, GatewayCredentials};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const RECIPIENT: &str = "972500000000";

    pub fn test_config(completion: &MockServer, gateway: &MockServer) -> AppConfig {
        let mut config = AppConfig::default();
        config.completion.base_url = format!("{}/v1", completion.uri());
        config.messaging.url = format!("{}/v0.1/messages", gateway.uri());
        config.credentials = Credentials {
            gateway: GatewayCredentials {
                api_key: "gateway-key".to_string(),
                api_secret: "gateway-secret".to_string(),
                sender_number: "14157386102".to_string(),
                sandbox_passphrase: "open-sesame".to_string(),
            },
            recipient_number: RECIPIENT.to_string(),
            openai_api_key: "sk-test".to_string(),
            http_auth_token: None,
        };
        config
    }

    pub async fn mount_completion(
        server: &MockServer,
        status: u16,
        body: serde_json::Value,
        expect: u64,
    ) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(expect)
            .mount(server)
            .await;
    }

    pub async fn mount_gateway(server: &MockServer, status: u16, expect: u64) {
        Mock::given(method("POST"))
            .and(path("/v0.1/messages"))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(json!({"message_uuid": "uuid-1"})),
            )
            .expect(expect)
            .mount(server)
            .await;
    }

    pub fn completion_reply(content: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    fn payload(value: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_payload_text_extraction() {
        let text = payload(json!({"message": {"content": {"type": "text", "text": "hi"}}}));
        assert_eq!(text.text(), Ok("hi"));

        assert_eq!(payload(json!({})).text(), Err(SkipReason::NoMessage));
        assert_eq!(
            payload(json!({"message": null})).text(),
            Err(SkipReason::NoMessage)
        );
        assert_eq!(
            payload(json!({"message": {}})).text(),
            Err(SkipReason::NoText)
        );
        assert_eq!(
            payload(json!({"message": {"content": {"type": "image", "image": {"url": "x"}}}}))
                .text(),
            Err(SkipReason::NoText)
        );
        assert_eq!(
            payload(json!({"status": "delivered", "message_uuid": "abc"})).text(),
            Err(SkipReason::NoMessage)
        );
    }

    #[tokio::test]
    async fn test_hebrew_message_relayed() {
        let completion = MockServer::start().await;
        let gateway = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "messages": [{
                    "role": "user",
                    "content": PromptTemplate::default().render("אני עצובה היום")
                }]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_reply("  אני פה איתך, תותי. מה קרה?\n")),
            )
            .expect(1)
            .mount(&completion)
            .await;

        Mock::given(method("POST"))
            .and(path("/v0.1/messages"))
            .and(header("Authorization", "Bearer gateway-key"))
            .and(body_partial_json(json!({
                "to": {"type": "whatsapp", "number": RECIPIENT},
                "message": {"content": {"type": "text", "text": "אני פה איתך, תותי. מה קרה?"}},
                "channel": "whatsapp"
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"message_uuid": "uuid-1"})))
            .expect(1)
            .mount(&gateway)
            .await;

        let relay = Relay::new(&test_config(&completion, &gateway), Client::new());
        let outcome = relay
            .handle(payload(
                json!({"message": {"content": {"text": "אני עצובה היום"}}}),
            ))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RelayOutcome::Replied {
                to: RECIPIENT.to_string(),
                reply: "אני פה איתך, תותי. מה קרה?".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_message_makes_no_calls() {
        let completion = MockServer::start().await;
        let gateway = MockServer::start().await;
        mount_completion(&completion, 200, completion_reply("unused"), 0).await;
        mount_gateway(&gateway, 202, 0).await;

        let relay = Relay::new(&test_config(&completion, &gateway), Client::new());

        let outcome = relay.handle(payload(json!({}))).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::NoMessage));

        let outcome = relay
            .handle(payload(json!({"message": {"content": {"type": "image"}}})))
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::NoText));
    }

    #[tokio::test]
    async fn test_completion_auth_failure_skips_messaging() {
        let completion = MockServer::start().await;
        let gateway = MockServer::start().await;
        mount_completion(
            &completion,
            401,
            json!({"error": {"message": "Incorrect API key provided"}}),
            1,
        )
        .await;
        mount_gateway(&gateway, 202, 0).await;

        let relay = Relay::new(&test_config(&completion, &gateway), Client::new());
        let result = relay
            .handle(payload(json!({"message": {"content": {"text": "hello"}}})))
            .await;

        assert!(matches!(
            result,
            Err(RelayError::Completion(CompletionError::Auth { .. }))
        ));
    }

    #[tokio::test]
    async fn test_messaging_failure_propagates() {
        let completion = MockServer::start().await;
        let gateway = MockServer::start().await;
        mount_completion(&completion, 200, completion_reply("reply"), 1).await;
        mount_gateway(&gateway, 500, 1).await;

        let relay = Relay::new(&test_config(&completion, &gateway), Client::new());
        let result = relay
            .handle(payload(json!({"message": {"content": {"text": "hello"}}})))
            .await;

        assert!(matches!(
            result,
            Err(RelayError::Messaging(MessagingError::Rejected { .. }))
        ));
    }
}
