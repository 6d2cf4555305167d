//! Provider abstractions for upstream chat models.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod echo;
pub mod openai;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role.eq_ignore_ascii_case("user")
    }
}

#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends the conversation and returns the assistant's reply text.
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    llms: HashMap<String, Arc<dyn LlmProvider>>,
    pub preferred_llm: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, name: &str, provider: Arc<dyn LlmProvider>) -> Self {
        self.llms.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_llm(mut self, name: &str) -> Self {
        self.preferred_llm = Some(name.to_string());
        self
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.llms.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn llm(&self, name: Option<&str>) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_llm.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no llm provider configured".into()))?;
        self.llms
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echo::EchoProvider;
    use std::time::Duration;

    #[test]
    fn registry_falls_back_to_preferred() {
        let reg = ProviderRegistry::new()
            .with_llm("echo", Arc::new(EchoProvider::new(Duration::ZERO)))
            .set_preferred_llm("echo");
        assert!(reg.llm(None).is_ok());
        assert!(reg.llm(Some("echo")).is_ok());
        assert!(matches!(
            reg.llm(Some("missing")),
            Err(ProviderError::UnknownProvider(name)) if name == "missing"
        ));
    }

    #[test]
    fn registry_without_preference_is_an_error() {
        let reg = ProviderRegistry::new();
        assert!(reg.llm(None).is_err());
        assert!(reg.names().is_empty());
    }

    #[test]
    fn user_role_is_case_insensitive() {
        let msg = ChatMessage {
            role: "User".into(),
            content: "hi".into(),
        };
        assert!(msg.is_user());
        assert!(!ChatMessage::assistant("x").is_user());
    }
}
