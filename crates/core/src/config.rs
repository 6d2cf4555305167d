use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds between sweeps of expired vault entries; 0 disables the sweeper.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// SQLite path or URL. `memory` keeps mappings in process memory only.
    #[serde(default = "default_vault_path")]
    pub path: String,
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    #[serde(default)]
    pub max_entries: Option<u64>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: default_vault_path(),
            ttl_seconds: default_ttl(),
            max_entries: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_patterns")]
    pub injection_patterns: Vec<String>,
    /// Directory of extra `*.toml` pattern rules.
    #[serde(default)]
    pub rules_path: Option<String>,
    /// `lexicon`, `llm` or `none`.
    #[serde(default = "default_classifier")]
    pub classifier: String,
    #[serde(default = "default_threshold")]
    pub negative_threshold: f32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            injection_patterns: default_patterns(),
            rules_path: None,
            classifier: default_classifier(),
            negative_threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// `echo` or `openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Overrides the model named in the request when set.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_echo_latency")]
    pub echo_latency_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            api_key_env: default_api_key_env(),
            model: None,
            temperature: None,
            timeout_secs: default_timeout(),
            echo_latency_ms: default_echo_latency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_purge_interval() -> u64 {
    60
}

fn default_vault_path() -> String {
    "./pii_cache/vault.db".to_string()
}

fn default_ttl() -> u64 {
    1800
}

pub const DEFAULT_INJECTION_PATTERNS: &[&str] = &[
    "ignore previous instructions",
    "ignore all previous instructions",
    "system override",
    "you are now",
    "jailbreak",
    "developer mode",
    "do anything now",
    "always answer",
    "unfiltered",
    "dan mode",
];

fn default_patterns() -> Vec<String> {
    DEFAULT_INJECTION_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_classifier() -> String {
    "lexicon".to_string()
}

fn default_threshold() -> f32 {
    0.99
}

fn default_provider() -> String {
    "echo".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_echo_latency() -> u64 {
    500
}

fn default_level() -> String {
    "info".to_string()
}

/// Loads configuration from a file (or `config/default` when present) and
/// `GATEWAY__SECTION__KEY` environment overrides.
pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("GATEWAY")
            .prefix_separator("__")
            .separator("__"),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
