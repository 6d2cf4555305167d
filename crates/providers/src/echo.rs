use crate::{ChatMessage, LlmProvider, ProviderError};
use std::time::Duration;

/// Stand-in upstream that echoes the last message back after a fixed delay.
#[derive(Debug, Clone, Default)]
pub struct EchoProvider {
    latency: Duration,
}

impl EchoProvider {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait::async_trait]
impl LlmProvider for EchoProvider {
    async fn chat(&self, _model: &str, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let prompt = messages
            .last()
            .map(|m| m.content.as_str())
            .ok_or_else(|| ProviderError::RequestFailed("empty conversation".into()))?;
        Ok(format!("Echoing your sanitized prompt: {}", prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_last_message() {
        let provider = EchoProvider::new(Duration::ZERO);
        let out = provider
            .chat(
                "any",
                &[ChatMessage::user("first"), ChatMessage::user("second")],
            )
            .await
            .unwrap();
        assert_eq!(out, "Echoing your sanitized prompt: second");
    }

    #[tokio::test]
    async fn empty_conversation_fails() {
        let provider = EchoProvider::default();
        assert!(provider.chat("any", &[]).await.is_err());
    }
}
