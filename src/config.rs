use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub geocode: GeocodeConfig,
}

/// Remote social API endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Name of the environment variable holding the access token.
    pub access_token_env: String,
    #[serde(default = "default_api_version")]
    pub version: String,
}

/// Crawl tuning
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Year the age computation is anchored to.
    pub reference_year: i32,
    #[serde(default = "default_bulk_chunk_size")]
    pub bulk_chunk_size: usize,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Geocoding configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeConfig {
    #[serde(default = "default_geocode_enabled")]
    pub enabled: bool,
    #[serde(default = "default_geocode_base_url")]
    pub base_url: String,
    #[serde(default = "default_geocode_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_geocode_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            enabled: default_geocode_enabled(),
            base_url: default_geocode_base_url(),
            user_agent: default_geocode_user_agent(),
            cache_capacity: default_geocode_cache_capacity(),
        }
    }
}

fn default_api_version() -> String {
    "5.131".to_string()
}

fn default_bulk_chunk_size() -> usize {
    1000
}

fn default_max_in_flight() -> usize {
    8
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_geocode_enabled() -> bool {
    true
}

fn default_geocode_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_geocode_user_agent() -> String {
    concat!("sociograph/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_geocode_cache_capacity() -> usize {
    10_000
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in SOCIOGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("SOCIOGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        // Check both environment variable and .env file (dotenv already loaded in load)
        std::env::var(&self.api.access_token_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with your API access token.",
                self.api.access_token_env
            )
        })?;

        if self.crawl.bulk_chunk_size == 0 || self.crawl.bulk_chunk_size > 1000 {
            anyhow::bail!(
                "crawl.bulk_chunk_size must be between 1 and 1000 (the remote API batch limit)"
            );
        }

        if self.crawl.max_in_flight == 0 {
            anyhow::bail!("crawl.max_in_flight must be greater than 0");
        }

        if self.crawl.request_timeout_secs == 0 {
            anyhow::bail!("crawl.request_timeout_secs must be greater than 0");
        }

        if self.crawl.reference_year < 1900 {
            anyhow::bail!("crawl.reference_year looks implausible: {}", self.crawl.reference_year);
        }

        if self.geocode.enabled && self.geocode.cache_capacity == 0 {
            anyhow::bail!("geocode.cache_capacity must be greater than 0 when geocoding is enabled");
        }

        Ok(())
    }

    /// The configured access token, resolved from the environment.
    pub fn access_token(&self) -> Result<String> {
        std::env::var(&self.api.access_token_env)
            .with_context(|| format!("Environment variable {} not set", self.api.access_token_env))
    }

    /// Per-request deadline for remote calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawl.request_timeout_secs)
    }
}
