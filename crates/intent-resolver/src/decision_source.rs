//! External decision source: a text-generation backend that picks one of the
//! offered candidates. Only the boundary lives here; the engine never retries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;

#[async_trait]
pub trait DecisionSource: Send + Sync {
    /// Raw reply text for one instruction + candidate listing
    async fn decide(&self, instruction: &str, candidates: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

/// OpenAI-compatible chat completions backend
pub struct HttpDecisionSource {
    backend_url: String,
    model: String,
    http_client: reqwest::Client,
}

impl HttpDecisionSource {
    pub fn new(backend_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let backend_url = backend_url.into().trim_end_matches('/').to_string();
        info!("Decision source initialized with backend: {}", backend_url);
        Ok(Self {
            backend_url,
            model: model.into(),
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to build HTTP client")?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.decision_backend_url.clone(),
            config.decision_model.clone(),
            config.decision_timeout(),
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.backend_url)
    }
}

#[async_trait]
impl DecisionSource for HttpDecisionSource {
    async fn decide(&self, instruction: &str, candidates: &str) -> Result<String> {
        debug!("Requesting decision from {}", self.backend_url);
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: instruction.to_string() },
                ChatMessage { role: "user".to_string(), content: candidates.to_string() },
            ],
            max_tokens: 512,
            temperature: 0.0,
            stream: false,
        };

        let response = self
            .http_client
            .post(self.completions_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Decision backend request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Decision backend returned {}: {}", status, body));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse decision backend response: {}", e))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| m.content)
            .context("Decision backend returned no choices")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn source(url: &str) -> HttpDecisionSource {
        HttpDecisionSource::new(url, "local-llm", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_decide_returns_first_choice_content() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "model": "local-llm", "temperature": 0.0, "stream": false })),
                Matcher::Regex("rules".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "{\"decision\": \"OUT_OF_SCOPE\"}"}}]}"#)
            .create_async()
            .await;

        let reply = source(&server.url()).decide("rules", "candidates").await.unwrap();
        assert_eq!(reply, r#"{"decision": "OUT_OF_SCOPE"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_trailing_slash_in_backend_url() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "ok"}}]}"#)
            .create_async()
            .await;

        let reply = source(&format!("{}/", server.url())).decide("a", "b").await.unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let err = source(&server.url()).decide("a", "b").await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        assert!(source(&server.url()).decide("a", "b").await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_error() {
        let source = source("http://127.0.0.1:9");
        assert!(source.decide("a", "b").await.is_err());
    }
}
