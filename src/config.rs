use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Knobs for one scrape session. All of these have defaults matching the
/// behavior of a plain "scroll, wait a second, re-count" session.
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// How long to wait for the first track row to render before giving up.
    #[serde(default = "default_initial_wait_ms")]
    pub initial_wait_ms: u64,
    /// Pause after each scroll so the surface can render more rows.
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,
    /// Hard budget for the whole scrape. None = unbounded.
    #[serde(default)]
    pub overall_timeout_ms: Option<u64>,
    /// Consecutive no-growth rounds required before declaring convergence.
    #[serde(default = "default_quiet_rounds")]
    pub quiet_rounds: u32,
}

impl ScraperConfig {
    pub fn initial_wait(&self) -> Duration {
        Duration::from_millis(self.initial_wait_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            initial_wait_ms: default_initial_wait_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
            overall_timeout_ms: None,
            quiet_rounds: default_quiet_rounds(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub rapidapi_token: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default)]
    pub scraper: ScraperConfig,
}

pub fn load_config(path: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_initial_wait_ms() -> u64 {
    50_000
}

fn default_scroll_settle_ms() -> u64 {
    1_000
}

fn default_quiet_rounds() -> u32 {
    1
}

fn default_db_path() -> String {
    "data.db".to_string()
}

fn default_download_dir() -> String {
    "downloads".to_string()
}

fn default_check_interval() -> u64 {
    3_600
}
