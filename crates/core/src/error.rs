use providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No messages provided.")]
    NoMessages,
    #[error("Security Alert: Malicious prompt detected.")]
    MaliciousPrompt,
    #[error("upstream model failed: {0}")]
    Upstream(#[from] ProviderError),
    #[error("vault error: {0:#}")]
    Vault(anyhow::Error),
}

impl GatewayError {
    pub fn vault(err: anyhow::Error) -> Self {
        GatewayError::Vault(err)
    }
}
