//! HTTP client for the local Ollama server.
//!
//! Every failure at this layer stays inside the client: model listing falls
//! back to an empty list, the health probe reports `false`, and a failed chat
//! stream yields a single terminal [`StreamFragment::Error`].

use std::error::Error as StdError;
use std::fmt::Display;
use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::models::{fetch_models, sort_models};
use crate::api::{ChatRequest, ChatResponse, ModelInfo};
use crate::core::chat_stream::{fragment_stream, StreamFragment};
use crate::core::message::Message;
use crate::tools::ToolDefinition;
use crate::utils::url::construct_api_url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest a chat stream may go without a byte from the server, including
/// the wait for response headers while the model loads.
pub const DEFAULT_STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{}", error_chain(.0))]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("server error: {0}")]
    Server(String),

    #[error("no response from server for {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = extract_error_summary(body).unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });
        TransportError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

/// Walk an error's source chain; reqwest keeps the useful part (e.g.
/// "Connection refused") several levels down.
fn error_chain(error: &dyn StdError) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        let inner_text = inner.to_string();
        if !text.contains(&inner_text) {
            text.push_str(": ");
            text.push_str(&inner_text);
        }
        source = inner.source();
    }
    text
}

fn extract_error_summary(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body.trim()).ok()?;
    let summary = value
        .get("error")
        .and_then(|error| match error {
            serde_json::Value::String(text) => Some(text.clone()),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|message| message.as_str().map(str::to_owned)),
            _ => None,
        })?;
    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// The text shown inline in the conversation when the server can't be
/// reached or answers with an error.
pub fn describe_transport_failure(error: &impl Display) -> String {
    format!("Error communicating with Ollama: {error}")
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applied to non-streaming requests only; streams may legitimately run
    /// for minutes.
    pub request_timeout: Option<Duration>,
    /// Silence allowed between chunks of a streamed reply.
    pub stream_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            stream_idle_timeout: DEFAULT_STREAM_IDLE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Option<Duration>,
    stream_idle_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url,
            request_timeout: config.request_timeout,
            stream_idle_timeout: config.stream_idle_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Installed models, or an empty list (with a logged warning) when the
    /// server can't be queried.
    pub async fn list_models(&self) -> Vec<ModelInfo> {
        match self.try_list_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(base_url = %self.base_url, error = %e, "Failed to list models");
                Vec::new()
            }
        }
    }

    /// Installed models, newest first.
    pub async fn try_list_models(&self) -> Result<Vec<ModelInfo>, TransportError> {
        let response = fetch_models(&self.http, &self.base_url, self.request_timeout).await?;
        let mut models = response.models;
        sort_models(&mut models);
        Ok(models)
    }

    /// Quick health probe for status display. Never gates real requests.
    pub async fn is_available(&self) -> bool {
        let url = construct_api_url(&self.base_url, "api/tags");
        match self.http.get(url).timeout(HEALTH_CHECK_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                false
            }
        }
    }

    /// Stream a chat completion. The request is only sent once the returned
    /// stream is first polled. A server that stays silent for longer than the
    /// idle timeout ends the stream with an error fragment.
    pub fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> BoxStream<'static, StreamFragment> {
        let request = self
            .http
            .post(construct_api_url(&self.base_url, "api/chat"))
            .json(&ChatRequest {
                model,
                messages,
                stream: true,
                tools,
            });

        let idle_timeout = self.stream_idle_timeout;
        stream::once(async move {
            match tokio::time::timeout(idle_timeout, request.send()).await {
                Ok(result) => result.map_err(TransportError::from),
                Err(_) => Err(TransportError::Timeout(idle_timeout)),
            }
        })
        .flat_map(move |result| match result {
            Ok(response) if response.status().is_success() => {
                fragment_stream(response.bytes_stream(), idle_timeout).boxed()
            }
            Ok(response) => stream::once(async move {
                let status = response.status();
                let body = tokio::time::timeout(idle_timeout, response.text())
                    .await
                    .ok()
                    .and_then(Result::ok)
                    .unwrap_or_default();
                let error = TransportError::from_status(status, &body);
                StreamFragment::Error(describe_transport_failure(&error))
            })
            .boxed(),
            Err(error) => {
                stream::iter([StreamFragment::Error(describe_transport_failure(&error))]).boxed()
            }
        })
        .boxed()
    }

    /// Single-shot, non-streaming chat request.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, TransportError> {
        let mut request = self
            .http
            .post(construct_api_url(&self.base_url, "api/chat"))
            .json(&ChatRequest {
                model,
                messages,
                stream: false,
                tools,
            });
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::from_status(status, &body));
        }

        let body = response.json::<ChatResponse>().await?;
        if let Some(error) = body.error {
            return Err(TransportError::Server(error));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{serve_once, unused_base_url, CannedResponse};
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client_for(base_url: String) -> OllamaClient {
        OllamaClient::new(ClientConfig {
            base_url,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Some(Duration::from_secs(5)),
            stream_idle_timeout: Duration::from_secs(5),
        })
        .expect("client")
    }

    #[test]
    fn status_errors_prefer_the_server_message() {
        let error = TransportError::from_status(
            StatusCode::NOT_FOUND,
            r#"{"error":"model \"llama9\" not found, try pulling it first"}"#,
        );
        assert_eq!(
            error.to_string(),
            "HTTP 404: model \"llama9\" not found, try pulling it first"
        );

        let error = TransportError::from_status(StatusCode::BAD_GATEWAY, "");
        assert_eq!(error.to_string(), "HTTP 502: Bad Gateway");

        let error = TransportError::from_status(StatusCode::INTERNAL_SERVER_ERROR, " boom ");
        assert_eq!(error.to_string(), "HTTP 500: boom");
    }

    #[tokio::test]
    async fn stream_chat_posts_history_and_tools_then_yields_fragments() {
        let body = [
            r#"{"model":"llama2","message":{"role":"assistant","content":"4"},"done":false}"#,
            "garbage line",
            r#"{"model":"llama2","message":{"role":"assistant","content":""},"done":true}"#,
        ]
        .join("\n")
            + "\n";
        let server = serve_once(CannedResponse::ndjson(body)).await;
        let client = client_for(server.base_url.clone());

        let messages = vec![Message::user("What's 2+2?")];
        let tools = vec![ToolDefinition {
            name: "noop".into(),
            description: "does nothing".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let fragments: Vec<_> = client
            .stream_chat("llama2", &messages, &tools)
            .collect()
            .await;

        assert_eq!(
            fragments,
            vec![StreamFragment::ContentDelta("4".into()), StreamFragment::Done]
        );

        let request = server.request().await;
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/chat");
        let sent: Value = serde_json::from_str(&request.body).expect("json body");
        assert_eq!(sent["model"], "llama2");
        assert_eq!(sent["stream"], true);
        assert_eq!(
            sent["messages"],
            json!([{"role": "user", "content": "What's 2+2?"}])
        );
        assert_eq!(sent["tools"][0]["function"]["name"], "noop");
    }

    #[tokio::test]
    async fn stream_chat_reports_http_errors_as_one_terminal_fragment() {
        let server = serve_once(CannedResponse::json(
            404,
            r#"{"error":"model 'ghost' not found"}"#,
        ))
        .await;
        let client = client_for(server.base_url.clone());

        let fragments: Vec<_> = client
            .stream_chat("ghost", &[Message::user("hi")], &[])
            .collect()
            .await;

        assert_eq!(
            fragments,
            vec![StreamFragment::Error(
                "Error communicating with Ollama: HTTP 404: model 'ghost' not found".into()
            )]
        );
    }

    #[tokio::test]
    async fn stream_chat_reports_connection_failures_as_one_terminal_fragment() {
        let client = client_for(unused_base_url().await);

        let fragments: Vec<_> = client
            .stream_chat("llama2", &[Message::user("hi")], &[])
            .collect()
            .await;

        assert_eq!(fragments.len(), 1);
        match &fragments[0] {
            StreamFragment::Error(text) => {
                assert!(text.starts_with("Error communicating with Ollama: "))
            }
            other => panic!("expected error fragment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stream_chat_gives_up_on_a_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buffer = [0_u8; 4096];
            let _ = socket.read(&mut buffer).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = OllamaClient::new(ClientConfig {
            base_url: format!("http://{addr}"),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Some(Duration::from_secs(2)),
            stream_idle_timeout: Duration::from_millis(300),
        })
        .expect("client");

        let fragments: Vec<_> = tokio::time::timeout(
            Duration::from_secs(8),
            client.stream_chat("llama2", &[Message::user("hi")], &[]).collect(),
        )
        .await
        .expect("stream should end on its own");

        assert_eq!(
            fragments,
            vec![StreamFragment::Error(
                "Error communicating with Ollama: no response from server for 300ms".into()
            )]
        );
    }

    #[tokio::test]
    async fn stream_chat_gives_up_when_the_body_stalls() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buffer = [0_u8; 4096];
            let _ = socket.read(&mut buffer).await;
            let head = "HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nTransfer-Encoding: chunked\r\n\r\n";
            let line = "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n";
            let chunk = format!("{:x}\r\n{}\r\n", line.len(), line);
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(chunk.as_bytes()).await;
            let _ = socket.flush().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = OllamaClient::new(ClientConfig {
            base_url: format!("http://{addr}"),
            stream_idle_timeout: Duration::from_millis(300),
            ..Default::default()
        })
        .expect("client");

        let fragments: Vec<_> = tokio::time::timeout(
            Duration::from_secs(8),
            client.stream_chat("llama2", &[Message::user("hi")], &[]).collect(),
        )
        .await
        .expect("stream should end on its own");

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0], StreamFragment::ContentDelta("Hel".into()));
        assert!(matches!(&fragments[1], StreamFragment::Error(text) if text.contains("no response from server")));
    }

    #[tokio::test]
    async fn list_models_parses_tags_and_swallows_failures() {
        let server = serve_once(CannedResponse::json(
            200,
            r#"{"models":[{"name":"llama2:latest","size":3825819519,"details":{"family":"llama","parameter_size":"7B"}},{"name":"mistral:7b"}]}"#,
        ))
        .await;
        let client = client_for(server.base_url.clone());
        let models = client.list_models().await;
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["llama2:latest", "mistral:7b"]);
        assert_eq!(server.request().await.path, "/api/tags");

        let offline = client_for(unused_base_url().await);
        assert!(offline.list_models().await.is_empty());
    }

    #[tokio::test]
    async fn health_probe_reflects_server_state() {
        let server = serve_once(CannedResponse::json(200, r#"{"models":[]}"#)).await;
        assert!(client_for(server.base_url.clone()).is_available().await);

        let failing = serve_once(CannedResponse::json(503, "{}")).await;
        assert!(!client_for(failing.base_url.clone()).is_available().await);

        assert!(!client_for(unused_base_url().await).is_available().await);
    }

    #[tokio::test]
    async fn non_streaming_chat_returns_the_whole_reply() {
        let server = serve_once(CannedResponse::json(
            200,
            r#"{"model":"llama2","message":{"role":"assistant","content":"Hello!"},"done":true}"#,
        ))
        .await;
        let client = client_for(server.base_url.clone());

        let response = client
            .chat("llama2", &[Message::user("hi")], &[])
            .await
            .expect("chat");
        assert!(response.done);
        assert_eq!(
            response.message.and_then(|m| m.content).as_deref(),
            Some("Hello!")
        );

        let sent: Value = serde_json::from_str(&server.request().await.body).expect("json");
        assert_eq!(sent["stream"], false);
        assert!(sent.get("tools").is_none());
    }
}
