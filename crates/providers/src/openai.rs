use crate::{ChatMessage, LlmProvider, ProviderError};
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Any endpoint speaking the OpenAI chat completions dialect.
///
/// `base_url` includes the API version segment, e.g. `https://api.openai.com/v1`
/// or `https://generativelanguage.googleapis.com/v1beta/openai/`.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    cfg: Arc<OpenAiConfig>,
}

impl OpenAiProvider {
    pub fn new(cfg: OpenAiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            cfg: Arc::new(cfg),
        })
    }

    pub fn endpoint(&self) -> String {
        completions_url(&self.cfg.base_url)
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessageResp,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Vec<Choice>,
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model,
            messages,
            temperature: self.cfg.temperature,
        };

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.bytes().await.unwrap_or(Bytes::from_static(b""));
            return Err(ProviderError::RequestFailed(format!(
                "status {} body {:?}",
                status, body
            )));
        }

        let parsed: ChatApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_handles_trailing_slash() {
        assert_eq!(
            completions_url("https://generativelanguage.googleapis.com/v1beta/openai/"),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
        assert_eq!(
            completions_url("http://localhost:1234/v1"),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn request_omits_unset_temperature() {
        let messages = vec![ChatMessage::user("hi")];
        let body = ChatRequest {
            model: "m",
            messages: &messages,
            temperature: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
