//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::fetch::FetcherConfig;
use crate::models::EndpointClass;
use crate::pipeline::PipelineConfig;
use crate::rate_limit::RateLimitConfig;
use crate::riot::DEFAULT_API_HOST;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Environment variable {0} is not set")]
    MissingSecret(String),
}

/// Riot API access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiotConfig {
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Host suffix after the routing value
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Total attempts per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_api_key_env() -> String {
    "RIOT_API_KEY".to_string()
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1_000
}

impl Default for RiotConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            scheme: default_scheme(),
            api_host: default_api_host(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RiotConfig {
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout: Duration::from_secs(self.timeout_seconds),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }

    pub fn api_key(&self) -> Result<String, ConfigError> {
        read_secret(&self.api_key_env)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    /// Environment variable holding the cron bearer secret
    #[serde(default = "default_cron_secret_env")]
    pub cron_secret_env: String,

    /// `s-maxage` on stats responses, in seconds
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,

    /// `stale-while-revalidate` on stats responses, in seconds
    #[serde(default = "default_stale_while_revalidate")]
    pub stale_while_revalidate_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_cron_secret_env() -> String {
    "CRON_SECRET".to_string()
}

fn default_cache_max_age() -> u64 {
    3_600
}

fn default_stale_while_revalidate() -> u64 {
    86_400
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            cron_secret_env: default_cron_secret_env(),
            cache_max_age_secs: default_cache_max_age(),
            stale_while_revalidate_secs: default_stale_while_revalidate(),
        }
    }
}

impl ServerConfig {
    pub fn cron_secret(&self) -> Result<String, ConfigError> {
        read_secret(&self.cron_secret_env)
    }

    /// `Cache-Control` value for stats responses.
    pub fn cache_control(&self) -> String {
        format!(
            "public, s-maxage={}, stale-while-revalidate={}",
            self.cache_max_age_secs, self.stale_while_revalidate_secs
        )
    }
}

fn read_secret(var: &str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::MissingSecret(var.to_string())),
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub riot: RiotConfig,

    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            riot: RiotConfig::default(),
            rate_limits: RateLimitConfig::default(),
            pipeline: PipelineConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.riot.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Riot timeout must be greater than 0".to_string(),
            ));
        }

        if self.riot.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "Riot max_retries must be greater than 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.regions.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one region must be configured".to_string(),
            ));
        }

        if self.pipeline.batch_size == 0 || self.pipeline.top_players == 0 {
            return Err(ConfigError::ValidationError(
                "Pipeline batch_size and top_players must be greater than 0".to_string(),
            ));
        }

        let classes = [
            EndpointClass::Application,
            EndpointClass::League,
            EndpointClass::Summoner,
            EndpointClass::MatchIds,
            EndpointClass::MatchDetail,
        ];
        for class in classes {
            let limit = self.rate_limits.limit_for(class);
            if limit.max_requests == 0 || limit.window_ms == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Rate limit for {} must allow at least one request per non-zero window",
                    class.as_str()
                )));
            }
        }

        Ok(())
    }
}
