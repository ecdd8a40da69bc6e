//! Configuration management.
//!
//! Settings load from `{data_dir}/regharvest.toml` with serde defaults for
//! every knob, then secrets are overlaid from the environment (a `.env`
//! file is loaded by main before anything else).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::http::PipelineConfig;
use crate::portal::laserfiche::WeblinkConfig;
use crate::portal::wellfiles::WellFilesConfig;

/// Orchestrator knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    /// Maximum fetch attempts per rolling 24-hour window.
    pub daily_cap: u32,
    /// Per-run cap on each of the new/retry batches.
    pub batch_size: u32,
    /// Maximum fetch attempts per case before terminal `no_order`.
    pub max_attempts: u32,
    /// Base of the exponential retry backoff, in days.
    pub base_backoff_days: i64,
    /// Base inter-case delay in milliseconds.
    pub delay_ms: u64,
    /// Random jitter added to the inter-case delay, in milliseconds.
    pub jitter_ms: u64,
    /// Wall-clock safety budget for one sweep, in seconds. Kept under the
    /// platform scheduler's hard execution limit.
    pub time_budget_secs: u64,
    /// Consecutive non-rate-limit errors before the breaker trips.
    pub circuit_breaker_threshold: u32,
    /// Relief/filing type discovered from the docket feed.
    pub filing_type: String,
    /// Docket statuses eligible for harvesting.
    pub docket_statuses: Vec<String>,
    /// How many `fetched` cases to reconcile per sweep.
    pub reconcile_batch: u32,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            daily_cap: 200,
            batch_size: 50,
            max_attempts: 5,
            base_backoff_days: 3,
            delay_ms: 4000,
            jitter_ms: 3000,
            time_budget_secs: 480,
            circuit_breaker_threshold: 5,
            filing_type: "Pooling".to_string(),
            docket_statuses: vec!["Order Issued".to_string(), "Concluded".to_string()],
            reconcile_batch: 100,
        }
    }
}

impl HarvestSettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeblinkSettings {
    pub base_url: String,
    pub template: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_ttl_mins: i64,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for WeblinkSettings {
    fn default() -> Self {
        Self {
            base_url: "https://imaging.occ.ok.gov".to_string(),
            template: "OAP".to_string(),
            username: None,
            password: None,
            session_ttl_mins: 20,
            poll_interval_ms: 1000,
            poll_max_attempts: 30,
            timeout_secs: 30,
        }
    }
}

impl WeblinkSettings {
    pub fn to_client_config(&self) -> WeblinkConfig {
        WeblinkConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            template: self.template.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            session_ttl_mins: self.session_ttl_mins,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_max_attempts: self.poll_max_attempts,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WellFilesSettings {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_ttl_mins: i64,
    pub page_size: u32,
    pub max_pages: u32,
    pub download_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for WellFilesSettings {
    fn default() -> Self {
        Self {
            base_url: "https://wellbrowse.occ.ok.gov".to_string(),
            username: None,
            password: None,
            session_ttl_mins: 10,
            page_size: 100,
            max_pages: 10,
            download_delay_ms: 500,
            timeout_secs: 30,
        }
    }
}

impl WellFilesSettings {
    pub fn to_client_config(&self) -> WellFilesConfig {
        WellFilesConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            username: self.username.clone(),
            password: self.password.clone(),
            session_ttl_mins: self.session_ttl_mins,
            page_size: self.page_size,
            max_pages: self.max_pages,
            download_delay: Duration::from_millis(self.download_delay_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl PipelineSettings {
    pub fn to_client_config(&self) -> PipelineConfig {
        PipelineConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Run an in-process scheduled sweep every N minutes. `None` leaves
    /// scheduling to the platform (cron hitting POST /trigger).
    pub sweep_interval_mins: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8610,
            sweep_interval_mins: None,
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// Owning user/organization for stored and registered documents.
    pub user_id: String,
    pub harvest: HarvestSettings,
    pub weblink: WeblinkSettings,
    pub well_files: WellFilesSettings,
    pub pipeline: PipelineSettings,
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            user_id: "default".to_string(),
            harvest: HarvestSettings::default(),
            weblink: WeblinkSettings::default(),
            well_files: WellFilesSettings::default(),
            pipeline: PipelineSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Settings {
    /// Path of the SQLite database inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("harvest.db")
    }

    /// Root of the filesystem object store.
    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("regharvest.toml")
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("REGHARVEST_DATA_DIR") {
        return expand_path(&dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("regharvest")
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Load settings, preferring an explicit data dir, then the environment,
/// then the platform data directory.
pub fn load_settings(data_dir: Option<&Path>) -> anyhow::Result<Settings> {
    let data_dir = match data_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_data_dir(),
    };

    let config_path = data_dir.join("regharvest.toml");
    let mut settings = if config_path.exists() {
        let raw = std::fs::read_to_string(&config_path)?;
        toml::from_str(&raw)?
    } else {
        Settings::default()
    };
    settings.data_dir = data_dir;

    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Secrets and deployment-specific endpoints come from the environment so
/// the TOML file can be committed without them.
fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(v) = std::env::var("REGHARVEST_USER_ID") {
        settings.user_id = v;
    }
    if let Ok(v) = std::env::var("WEBLINK_BASE_URL") {
        settings.weblink.base_url = v;
    }
    if let Ok(v) = std::env::var("WEBLINK_USERNAME") {
        settings.weblink.username = Some(v);
    }
    if let Ok(v) = std::env::var("WEBLINK_PASSWORD") {
        settings.weblink.password = Some(v);
    }
    if let Ok(v) = std::env::var("WELLFILES_BASE_URL") {
        settings.well_files.base_url = v;
    }
    if let Ok(v) = std::env::var("WELLFILES_USERNAME") {
        settings.well_files.username = Some(v);
    }
    if let Ok(v) = std::env::var("WELLFILES_PASSWORD") {
        settings.well_files.password = Some(v);
    }
    if let Ok(v) = std::env::var("PIPELINE_BASE_URL") {
        settings.pipeline.base_url = v;
    }
    if let Ok(v) = std::env::var("PIPELINE_API_KEY") {
        settings.pipeline.api_key = v;
    }
}
