use std::time::Duration;

use serde::Deserialize;

use crate::services::engine::EngineSharing;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Number of recognition worker threads, fixed for the process lifetime.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// `per_worker` (one engine per thread) or `shared` (one engine, serialized).
    #[serde(default)]
    pub engine_sharing: EngineSharing,

    /// Sleep added after each recognition so out-of-order completion is visible.
    #[serde(default)]
    pub artificial_delay_ms: u64,

    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Cloudflare account ID
    #[serde(default)]
    pub cf_account_id: Option<String>,

    /// Cloudflare Workers AI API token
    #[serde(default)]
    pub cf_api_token: Option<String>,

    /// Base URL of the recognition service (client only).
    #[serde(default = "default_server_url")]
    pub server_url: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_worker_count() -> usize {
    8
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024 // 10 MB
}

fn default_server_url() -> String {
    "http://localhost:3000".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid("WORKER_COUNT must be at least 1"));
        }
        Ok(())
    }

    pub fn artificial_delay(&self) -> Duration {
        Duration::from_millis(self.artificial_delay_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
