//! Chat backend abstraction and its HTTP implementation

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;

use crate::{
    error::{Error, Result},
    stream::ByteStream,
    types::ChatRequest,
};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Environment variable overriding the API base URL
pub const BASE_URL_ENV: &str = "NEUROGUIDE_API_URL";

/// Path of the streaming chat endpoint, relative to the base URL
const CHAT_PATH: &str = "ai/chat";

/// Something that can open a streaming chat exchange
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the request and return the response body.
    ///
    /// `Ok(None)` means the backend answered without a readable body.
    async fn open(&self, request: &ChatRequest) -> Result<Option<ByteStream>>;
}

/// Join a base URL and a relative path with exactly one slash
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Build an HTTP client suitable for long-lived event streams.
///
/// Only connect and per-read timeouts are set; a total request timeout would
/// cut off slow but healthy replies.
pub fn build_client(connect_timeout: Duration, read_timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .build()?)
}

/// Talks to the chat service over HTTP
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a backend for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a backend with a preconfigured client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Create from environment variable, falling back to the default URL
    pub fn from_env() -> Self {
        let base_url = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        endpoint(&self.base_url, CHAT_PATH)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn open(&self, request: &ChatRequest) -> Result<Option<ByteStream>> {
        let url = self.chat_url();
        tracing::debug!(
            "Opening chat stream: {} ({} messages, type {})",
            url,
            request.messages.len(),
            request.conversation_type
        );

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), text));
        }

        if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("text/event-stream") {
            tracing::warn!("Unexpected content type for chat stream: {:?}", content_type);
        }

        let body = response.bytes_stream().map(|chunk| chunk.map_err(Error::from));
        Ok(Some(Box::pin(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalizes_slashes() {
        assert_eq!(endpoint("http://h/api", "ai/chat"), "http://h/api/ai/chat");
        assert_eq!(endpoint("http://h/api/", "/ai/chat"), "http://h/api/ai/chat");
        assert_eq!(endpoint("http://h/api//", "conversations"), "http://h/api/conversations");
    }

    #[test]
    fn test_chat_url() {
        let backend = HttpBackend::new("http://localhost:8080/api/");
        assert_eq!(backend.chat_url(), "http://localhost:8080/api/ai/chat");
        assert_eq!(backend.base_url(), "http://localhost:8080/api/");
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_secs(5), Duration::from_secs(60)).is_ok());
    }

    mod http {
        use super::*;
        use crate::frame::decode_events;
        use crate::transport::TransportReader;
        use crate::types::{ConversationType, Message};
        use tokio_util::sync::CancellationToken;
        use wiremock::matchers::{body_partial_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn request() -> ChatRequest {
            ChatRequest::new(
                vec![Message::user("u1", "我最近总是感到焦虑")],
                ConversationType::Analysis,
                None,
            )
        }

        fn server_url(server: &MockServer) -> String {
            format!("{}/api", server.uri())
        }

        #[tokio::test]
        async fn test_open_posts_request_body() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/ai/chat"))
                .and(header("accept", "text/event-stream"))
                .and(body_partial_json(serde_json::json!({
                    "conversation_type": "analysis",
                    "conversation_id": "",
                })))
                .respond_with(ResponseTemplate::new(200).set_body_raw("data: {}\n\n", "text/event-stream"))
                .expect(1)
                .mount(&server)
                .await;

            let backend = HttpBackend::new(server_url(&server));
            assert!(backend.open(&request()).await.unwrap().is_some());
        }

        #[tokio::test]
        async fn test_open_server_error_is_api_error() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/ai/chat"))
                .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
                .expect(1)
                .mount(&server)
                .await;

            let backend = HttpBackend::new(server_url(&server));
            match backend.open(&request()).await {
                Err(Error::Api { status, message }) => {
                    assert_eq!(status, 500);
                    assert_eq!(message, "upstream down");
                }
                other => panic!("expected Api error, got {:?}", other.map(|b| b.is_some())),
            }
        }

        #[tokio::test]
        async fn test_open_no_content_has_no_body() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/ai/chat"))
                .respond_with(ResponseTemplate::new(204))
                .mount(&server)
                .await;

            let backend = HttpBackend::new(server_url(&server));
            assert!(backend.open(&request()).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_open_empty_body_has_no_body() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/ai/chat"))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;

            let backend = HttpBackend::new(server_url(&server));
            assert!(backend.open(&request()).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_open_streams_decodable_events() {
            let body = concat!(
                "event:message\ndata:{\"content\":\"焦\",\"full_content\":\"焦\",\"conversation_id\":\"c1\"}\n\n",
                "data: {\"content\":\"虑\",\"full_content\":\"焦虑\",\"conversation_id\":\"c1\"}\n\n",
                "data: {\"completed\":true,\"conversation_id\":\"c1\",\"messages\":[]}\n\n",
            );
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/ai/chat"))
                .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
                .mount(&server)
                .await;

            let backend = HttpBackend::new(server_url(&server));
            let body = backend.open(&request()).await.unwrap();
            let reader = TransportReader::new(body, CancellationToken::new()).unwrap();
            let events: Vec<_> = decode_events(reader).collect().await;

            assert_eq!(events.len(), 3);
            let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
            assert_eq!(events[1].full_content.as_deref(), Some("焦虑"));
            assert!(events[2].completed);
        }
    }
}
