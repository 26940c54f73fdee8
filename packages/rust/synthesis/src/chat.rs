//! OpenAI-compatible chat-completions client.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use muninn_shared::{MuninnError, Result};

use crate::TextGenerator;
use crate::prompts::{ChatMessage, PromptTemplate};

/// Matches a fenced block such as ```json ... ```.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("fence regex"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// Text generator that renders a [`PromptTemplate`] and asks a chat model for a JSON object.
pub struct ChatClient {
    client: Client,
    completions_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(
        client: Client,
        base_url: &Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            completions_url: format!("{}/chat/completions", base_url.as_str().trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    #[instrument(skip_all, fields(template = template.name(), model = %self.model))]
    async fn generate(&self, template: PromptTemplate, vars: &[(&str, &str)]) -> Result<Value> {
        let request = ChatRequest {
            model: &self.model,
            messages: template.render(vars)?,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MuninnError::Network(format!("chat completions: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MuninnError::Generation(format!(
                "{}: HTTP {status}: {text}",
                template.name()
            )));
        }

        let payload: ChatResponse = response.json().await.map_err(|e| {
            MuninnError::Generation(format!("{}: unexpected response: {e}", template.name()))
        })?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                MuninnError::Generation(format!("{}: response had no content", template.name()))
            })?;

        debug!(chars = content.len(), "model responded");
        parse_json_content(&content)
            .map_err(|e| MuninnError::Generation(format!("{}: {e}", template.name())))
    }
}

/// Parse model output as JSON, tolerating a surrounding code fence.
fn parse_json_content(content: &str) -> std::result::Result<Value, serde_json::Error> {
    let trimmed = content.trim();
    let inner = FENCE_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());
    serde_json::from_str(inner)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        }))
    }

    fn client(server: &MockServer) -> ChatClient {
        let base = Url::parse(&format!("{}/v1/", server.uri())).unwrap();
        ChatClient::new(Client::new(), &base, "sk-test", "gpt-4o")
    }

    #[tokio::test]
    async fn returns_parsed_json_object() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(completion(r#"{"search_queries": ["a", "b"]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server)
            .generate(PromptTemplate::SupportingDiscovery, &[("message", "claim")])
            .await
            .unwrap();
        assert_eq!(value["search_queries"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn http_error_is_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(PromptTemplate::OpposingDiscovery, &[("message", "claim")])
            .await
            .unwrap_err();
        assert!(matches!(err, MuninnError::Generation(_)));
        assert!(err.to_string().contains("opposing_discovery"));
    }

    #[tokio::test]
    async fn non_json_content_is_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(completion("Sorry, I cannot help with that."))
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(
                PromptTemplate::SearchSynopsis,
                &[("search_query", "q"), ("web_content", "")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MuninnError::Generation(_)));
    }

    #[test]
    fn strips_code_fence() {
        let value = parse_json_content("```json\n{\"synopsis\": \"ok\"}\n```").unwrap();
        assert_eq!(value["synopsis"], "ok");

        let value = parse_json_content("  {\"synopsis\": \"bare\"}  ").unwrap();
        assert_eq!(value["synopsis"], "bare");
    }
}
