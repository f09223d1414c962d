use crate::channel::{BackoffPolicy, DEFAULT_BASE_DELAY_MS};
use crate::session::{SessionConfig, DEFAULT_LANG};
use anyhow::{Context, Result};
use serde::Deserialize;

/// Prefix for environment overrides, e.g. `LIVE_TRANSCRIPT__CHANNEL__URL`
pub const ENV_PREFIX: &str = "LIVE_TRANSCRIPT";

const DEFAULT_URL: &str = "ws://localhost:8080/ws";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub channel: ChannelConfig,
    pub transcription: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub url: String,
    pub base_delay_ms: u64,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

impl ChannelConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.base_delay_ms, self.max_delay_ms)
    }
}

impl Config {
    /// Load built-in defaults, then `path` (any format, optional), then the environment
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    pub fn load_with_prefix(path: &str, env_prefix: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("channel.url", DEFAULT_URL)?
            .set_default("channel.base_delay_ms", DEFAULT_BASE_DELAY_MS as i64)?
            .set_default("transcription.lang", DEFAULT_LANG)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}
