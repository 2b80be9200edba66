use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckpointConfig {
    pub path: PathBuf,
}

/// Provider API tuning. `requests_per_hour` and `page_size` differ by
/// credential tier — demo keys get a fraction of a provisioned key's
/// quota, so both are configuration, never constants in the fetch path.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Longest throttle wait honored before the run aborts instead of
    /// sleeping. Past this the run halts with a resumable checkpoint.
    #[serde(default = "default_throttle_ceiling_secs")]
    pub throttle_ceiling_secs: u64,
    /// Which nutrient-code table applies to this API generation:
    /// `"fdc"` or `"legacy"`.
    #[serde(default = "default_nutrient_codes")]
    pub nutrient_codes: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            requests_per_hour: default_requests_per_hour(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            throttle_ceiling_secs: default_throttle_ceiling_secs(),
            nutrient_codes: default_nutrient_codes(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.nal.usda.gov/fdc".to_string()
}
fn default_requests_per_hour() -> u32 {
    1000
}
fn default_page_size() -> u32 {
    100
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    30
}
fn default_throttle_ceiling_secs() -> u64 {
    7200
}
fn default_nutrient_codes() -> String {
    "fdc".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Persist the checkpoint after this many processed items even when
    /// no flush happened, so mid-batch progress is recoverable.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: u64,
    /// Provider classifications processed as partitions, in order.
    #[serde(default = "default_data_types")]
    pub data_types: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            checkpoint_every: default_checkpoint_every(),
            data_types: default_data_types(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}
fn default_checkpoint_every() -> u64 {
    100
}
fn default_data_types() -> Vec<String> {
    vec![
        "Foundation".to_string(),
        "SR Legacy".to_string(),
        "Survey (FNDDS)".to_string(),
        "Branded".to_string(),
    ]
}

impl ApiConfig {
    /// Read the provider credential from the environment.
    pub fn api_key(&self) -> Result<String> {
        std::env::var("FDC_API_KEY").context("FDC_API_KEY environment variable not set")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate api
    if config.api.requests_per_hour == 0 {
        anyhow::bail!("api.requests_per_hour must be > 0");
    }
    if config.api.page_size == 0 || config.api.page_size > 200 {
        anyhow::bail!("api.page_size must be in 1..=200");
    }
    if config.api.throttle_ceiling_secs == 0 {
        anyhow::bail!("api.throttle_ceiling_secs must be > 0");
    }

    match config.api.nutrient_codes.as_str() {
        "fdc" | "legacy" => {}
        other => anyhow::bail!(
            "Unknown nutrient code table: '{}'. Must be fdc or legacy.",
            other
        ),
    }

    // Validate ingest
    if config.ingest.batch_size == 0 {
        anyhow::bail!("ingest.batch_size must be > 0");
    }
    if config.ingest.checkpoint_every == 0 {
        anyhow::bail!("ingest.checkpoint_every must be > 0");
    }
    if config.ingest.data_types.is_empty() {
        anyhow::bail!("ingest.data_types must list at least one classification");
    }

    Ok(config)
}
