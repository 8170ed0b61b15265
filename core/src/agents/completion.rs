use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::prompt::ChatTurn;
use super::providers::ProviderConfig;
use crate::errors::LearnFlowError;

const GENERIC_FAILURE: &str = "API request failed";

/// Anything that can turn a chat prompt into completion text.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        config: &ProviderConfig,
        api_key: &str,
        turns: &[ChatTurn],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LearnFlowError>;
}

/// HTTP client for OpenAI-compatible chat-completion endpoints.
///
/// One attempt per call: failures are reported, never retried.
pub struct CompletionClient {
    client: Client,
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionReply {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl CompletionClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(45))
            .user_agent(concat!("LearnFlow-Host/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to construct HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CompletionService for CompletionClient {
    async fn complete(
        &self,
        config: &ProviderConfig,
        api_key: &str,
        turns: &[ChatTurn],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LearnFlowError> {
        log::debug!(
            "POST {} model={} turns={}",
            config.endpoint,
            config.model,
            turns.len()
        );
        let payload = ChatCompletionBody {
            model: &config.model,
            messages: turns,
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&config.endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| LearnFlowError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LearnFlowError::ApiRequest {
                status: status.as_u16(),
                message: remote_error_message(&body),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| LearnFlowError::Network(err.to_string()))?;
        extract_content(&body)
    }
}

/// `error.message` from a provider error body, or a generic string.
fn remote_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

/// First choice's message content, verbatim.
fn extract_content(body: &str) -> Result<String, LearnFlowError> {
    let reply: ChatCompletionReply = serde_json::from_str(body).map_err(|err| {
        LearnFlowError::MalformedResponse(format!("unexpected completion body: {err}"))
    })?;
    reply
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            LearnFlowError::MalformedResponse("completion contained no message content".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::prompt::build_chat_prompt;
    use crate::agents::providers::{resolve, Provider};

    #[test]
    fn remote_message_is_extracted_when_present() {
        assert_eq!(
            remote_error_message(r#"{"error":{"message":"Invalid API key","type":"auth"}}"#),
            "Invalid API key"
        );
        assert_eq!(remote_error_message("<html>502</html>"), GENERIC_FAILURE);
        assert_eq!(remote_error_message(r#"{"error":{}}"#), GENERIC_FAILURE);
    }

    #[test]
    fn content_requires_a_choice() {
        assert_eq!(
            extract_content(r#"{"choices":[{"message":{"content":"hi"}},{"message":{"content":"no"}}]}"#)
                .unwrap(),
            "hi"
        );
        assert!(matches!(
            extract_content(r#"{"choices":[]}"#),
            Err(LearnFlowError::MalformedResponse(_))
        ));
        assert!(matches!(
            extract_content("not json"),
            Err(LearnFlowError::MalformedResponse(_))
        ));
    }

    mod http_tests {
        use super::*;
        use serde_json::json;
        use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

        fn config_for(server: &MockServer, provider: Provider) -> ProviderConfig {
            ProviderConfig {
                endpoint: format!("{}/v1/chat/completions", server.uri()),
                ..resolve(provider)
            }
        }

        #[tokio::test]
        async fn posts_openai_shape_with_bearer_token() {
            let server = MockServer::start().await;
            let turns = build_chat_prompt("What is a stack?", "stack");

            Mock::given(matchers::method("POST"))
                .and(matchers::path("/v1/chat/completions"))
                .and(matchers::header("authorization", "Bearer gsk-test"))
                .and(matchers::body_json(json!({
                    "model": "llama-3.3-70b-versatile",
                    "messages": turns,
                    "temperature": 0.5,
                    "max_tokens": 300,
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "LIFO." } }]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let client = CompletionClient::new().unwrap();
            let content = client
                .complete(&config_for(&server, Provider::Groq), "gsk-test", &turns, 300, 0.5)
                .await
                .unwrap();
            assert_eq!(content, "LIFO.");
        }

        #[tokio::test]
        async fn unauthorized_carries_remote_message() {
            let server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .respond_with(
                    ResponseTemplate::new(401)
                        .set_body_string(r#"{"error":{"message":"Invalid API key"}}"#),
                )
                .expect(1)
                .mount(&server)
                .await;

            let client = CompletionClient::new().unwrap();
            let err = client
                .complete(
                    &config_for(&server, Provider::OpenAi),
                    "bad",
                    &[ChatTurn::user("hi")],
                    10,
                    0.7,
                )
                .await
                .unwrap_err();
            match err {
                LearnFlowError::ApiRequest { status, message } => {
                    assert_eq!(status, 401);
                    assert_eq!(message, "Invalid API key");
                }
                other => panic!("expected ApiRequest, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn server_error_without_body_is_generic() {
            let server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;

            let client = CompletionClient::new().unwrap();
            let err = client
                .complete(
                    &config_for(&server, Provider::OpenAi),
                    "key",
                    &[ChatTurn::user("hi")],
                    10,
                    0.7,
                )
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), GENERIC_FAILURE);
        }

        #[tokio::test]
        async fn unreachable_endpoint_is_a_network_error() {
            let config = ProviderConfig {
                endpoint: "http://127.0.0.1:1/v1/chat/completions".into(),
                ..resolve(Provider::OpenAi)
            };
            let client = CompletionClient::new().unwrap();
            let err = client
                .complete(&config, "key", &[ChatTurn::user("hi")], 10, 0.7)
                .await
                .unwrap_err();
            assert!(matches!(err, LearnFlowError::Network(_)), "got {err:?}");
        }
    }
}
