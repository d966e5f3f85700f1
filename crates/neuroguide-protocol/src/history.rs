//! Conversation history REST client

use serde::Serialize;

use crate::{
    backend::{BASE_URL_ENV, DEFAULT_BASE_URL, endpoint},
    error::{Error, Result},
    types::{Conversation, ConversationType, Message},
};

const CONVERSATIONS_PATH: &str = "conversations";

#[derive(Debug, Serialize)]
struct CreateConversationRequest<'a> {
    #[serde(rename = "type")]
    conversation_type: ConversationType,
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateMessagesRequest<'a> {
    messages: &'a [Message],
}

/// Client for the plain JSON conversation endpoints
#[derive(Clone)]
pub struct HistoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HistoryClient {
    /// Create a client for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client with a preconfigured HTTP client
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

    /// List conversations, optionally restricted to one type
    pub async fn list(&self, conversation_type: Option<ConversationType>) -> Result<Vec<Conversation>> {
        let mut request = self.client.get(self.collection_url());
        if let Some(ty) = conversation_type {
            request = request.query(&[("type", ty.as_str())]);
        }
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Fetch one conversation with its messages
    pub async fn get(&self, id: &str) -> Result<Conversation> {
        let response = check(self.client.get(self.item_url(id)?).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Create an empty conversation
    pub async fn create(&self, conversation_type: ConversationType, title: &str) -> Result<Conversation> {
        let body = CreateConversationRequest {
            conversation_type,
            title,
        };
        let response = check(
            self.client
                .post(self.collection_url())
                .json(&body)
                .send()
                .await?,
        )
        .await?;
        Ok(response.json().await?)
    }

    /// Replace a conversation's messages
    pub async fn update_messages(&self, id: &str, messages: &[Message]) -> Result<Conversation> {
        let body = UpdateMessagesRequest { messages };
        let response = check(self.client.put(self.item_url(id)?).json(&body).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Delete a conversation
    pub async fn delete(&self, id: &str) -> Result<()> {
        check(self.client.delete(self.item_url(id)?).send().await?).await?;
        Ok(())
    }

    fn collection_url(&self) -> String {
        endpoint(&self.base_url, CONVERSATIONS_PATH)
    }

    fn item_url(&self, id: &str) -> Result<String> {
        let id = id.trim();
        if id.is_empty() || id.contains('/') {
            return Err(Error::InvalidConfig(format!("invalid conversation id '{}'", id)));
        }
        Ok(format!("{}/{}", self.collection_url(), id))
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    tracing::debug!("Conversation request failed with {}: {}", status, text);
    Err(Error::api(status.as_u16(), text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = HistoryClient::new("http://localhost:8080/api/");
        assert_eq!(client.collection_url(), "http://localhost:8080/api/conversations");
        assert_eq!(
            client.item_url("c1").unwrap(),
            "http://localhost:8080/api/conversations/c1"
        );
    }

    #[test]
    fn test_item_url_rejects_bad_ids() {
        let client = HistoryClient::new("http://localhost:8080/api");
        assert!(client.item_url("").is_err());
        assert!(client.item_url("../users").is_err());
    }

    #[test]
    fn test_create_body_shape() {
        let body = CreateConversationRequest {
            conversation_type: ConversationType::Mapping,
            title: "正念冥想的神经科学",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "mapping");
        assert_eq!(json["title"], "正念冥想的神经科学");
    }

    #[test]
    fn test_update_body_shape() {
        let messages = vec![Message::user("u1", "hi")];
        let json = serde_json::to_value(UpdateMessagesRequest { messages: &messages }).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }

    mod http {
        use super::*;
        use wiremock::matchers::{body_partial_json, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn conversation(id: &str, ty: &str) -> serde_json::Value {
            serde_json::json!({
                "_id": id,
                "type": ty,
                "title": "我最近总是感到焦虑",
                "messages": [
                    {"id": "m1", "content": "我最近总是感到焦虑", "is_user": true,
                     "created_at": "2024-01-18T10:00:00Z"}
                ],
                "created_at": "2024-01-18T10:00:00Z",
                "updated_at": "2024-01-18T10:01:00Z"
            })
        }

        fn client(server: &MockServer) -> HistoryClient {
            HistoryClient::new(format!("{}/api", server.uri()))
        }

        #[tokio::test]
        async fn test_list_filters_by_type() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/conversations"))
                .and(query_param("type", "mapping"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!([conversation("c1", "mapping")])),
                )
                .expect(1)
                .mount(&server)
                .await;

            let list = client(&server)
                .list(Some(ConversationType::Mapping))
                .await
                .unwrap();
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].id.as_deref(), Some("c1"));
            assert_eq!(list[0].conversation_type, ConversationType::Mapping);
        }

        #[tokio::test]
        async fn test_get_returns_messages() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/conversations/c1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(conversation("c1", "analysis")))
                .expect(1)
                .mount(&server)
                .await;

            let conv = client(&server).get("c1").await.unwrap();
            assert_eq!(conv.messages.len(), 1);
            assert!(conv.messages[0].is_user);
        }

        #[tokio::test]
        async fn test_get_missing_is_api_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/conversations/gone"))
                .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
                .mount(&server)
                .await;

            let err = client(&server).get("gone").await.unwrap_err();
            assert!(matches!(err, Error::Api { status: 404, .. }));
        }

        #[tokio::test]
        async fn test_create_posts_type_and_title() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/conversations"))
                .and(body_partial_json(serde_json::json!({
                    "type": "assistant",
                    "title": "新对话",
                })))
                .respond_with(ResponseTemplate::new(201).set_body_json(conversation("c2", "assistant")))
                .expect(1)
                .mount(&server)
                .await;

            let conv = client(&server)
                .create(ConversationType::Assistant, "新对话")
                .await
                .unwrap();
            assert_eq!(conv.id.as_deref(), Some("c2"));
        }

        #[tokio::test]
        async fn test_update_messages_puts_list() {
            let server = MockServer::start().await;
            Mock::given(method("PUT"))
                .and(path("/api/conversations/c1"))
                .and(body_partial_json(serde_json::json!({
                    "messages": [{"id": "u1", "content": "hi", "is_user": true}],
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(conversation("c1", "analysis")))
                .expect(1)
                .mount(&server)
                .await;

            let messages = vec![Message::user("u1", "hi")];
            let conv = client(&server)
                .update_messages("c1", &messages)
                .await
                .unwrap();
            assert_eq!(conv.id.as_deref(), Some("c1"));
        }

        #[tokio::test]
        async fn test_delete_sends_delete() {
            let server = MockServer::start().await;
            Mock::given(method("DELETE"))
                .and(path("/api/conversations/c1"))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&server)
                .await;

            client(&server).delete("c1").await.unwrap();
        }
    }
}
