use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Unset means the transport default (no explicit timeout).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Skip a pair whose label cell has no `span.txt` instead of failing the ticker.
    #[serde(default)]
    pub skip_malformed_rows: bool,

    #[serde(default = "default_true")]
    pub progress: bool,
}

/// Input/output locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_tickers_file")]
    pub tickers_file: PathBuf,

    #[serde(default = "default_ticker_column")]
    pub ticker_column: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://fundamentus.com.br".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/125.0.0.0 Safari/537.36"
        .to_string()
}
fn default_concurrency() -> usize {
    crate::utils::default_pool_size()
}
fn default_true() -> bool {
    true
}
fn default_tickers_file() -> PathBuf {
    PathBuf::from("stocks-b3.csv")
}
fn default_ticker_column() -> String {
    "Ticker".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            skip_malformed_rows: false,
            progress: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tickers_file: default_tickers_file(),
            ticker_column: default_ticker_column(),
            data_dir: default_data_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("FUNDAMENTUS").separator("__"))
            .build()
            .context("Failed to read configuration")?;

        let mut app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Invalid configuration")?;

        // A zero-sized pool would never run anything.
        if app_cfg.pipeline.concurrency == 0 {
            app_cfg.pipeline.concurrency = 1;
        }
        Ok(app_cfg)
    }
}
