//! TOML configuration.
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:8000"
//! timeout_secs = 30
//!
//! [retry]
//! max_retries = 3
//! backoff_ms = 1000
//!
//! [polling]
//! interval_ms = 3000
//! timeout_secs = 600
//!
//! [upload]
//! max_bytes = 5242880
//! allowed_kinds = ["pdf", "txt", "docx"]
//!
//! [summarize]
//! style = "genz"
//!
//! [session]
//! email = "student@example.com"
//! ```
//!
//! Only `[backend]` is required; every other section has defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use studyflow_core::models::{SummaryStyle, UploadLimits};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub summarize: SummarizeConfig,
    #[serde(default)]
    pub session: Option<SessionConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    1000
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: None,
            timeout_secs: default_poll_timeout_secs(),
        }
    }
}

fn default_interval_ms() -> u64 {
    3000
}
fn default_poll_timeout_secs() -> u64 {
    600
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_allowed_kinds")]
    pub allowed_kinds: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_kinds: default_allowed_kinds(),
        }
    }
}

fn default_max_bytes() -> u64 {
    UploadLimits::default().max_bytes
}
fn default_allowed_kinds() -> Vec<String> {
    UploadLimits::default().allowed_kinds
}

impl UploadConfig {
    pub fn limits(&self) -> UploadLimits {
        UploadLimits {
            max_bytes: self.max_bytes,
            allowed_kinds: self.allowed_kinds.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SummarizeConfig {
    #[serde(default)]
    pub style: SummaryStyle,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl Config {
    /// All-defaults configuration pointing at `base_url`.
    pub fn minimal(base_url: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig {
                base_url: base_url.into(),
                timeout_secs: default_timeout_secs(),
            },
            retry: RetryConfig::default(),
            polling: PollingConfig::default(),
            upload: UploadConfig::default(),
            summarize: SummarizeConfig::default(),
            session: None,
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let url = self.backend.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("backend.base_url must start with http:// or https:// (got '{}')", url);
        }
        if self.backend.timeout_secs == 0 {
            anyhow::bail!("backend.timeout_secs must be > 0");
        }
        if self.polling.interval_ms == 0 {
            anyhow::bail!("polling.interval_ms must be > 0");
        }
        if self.polling.max_attempts == Some(0) {
            anyhow::bail!("polling.max_attempts must be >= 1 when set");
        }
        if self.upload.max_bytes == 0 {
            anyhow::bail!("upload.max_bytes must be > 0");
        }
        if self.upload.allowed_kinds.is_empty() {
            anyhow::bail!("upload.allowed_kinds must list at least one file type");
        }
        if let Some(session) = &self.session {
            if !session.email.contains('@') {
                anyhow::bail!("session.email must be an email address (got '{}')", session.email);
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
