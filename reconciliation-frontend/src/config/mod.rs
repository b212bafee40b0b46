use serde::Deserialize;
use service_core::config::{config_directory, load_settings};
use service_core::error::AppError;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub erp_api: ErpApiSettings,
    #[serde(default)]
    pub reconciliation: ReconciliationSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ErpApiSettings {
    /// Base URL of the ERP REST API (e.g., http://erp-api:8000).
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

#[derive(Deserialize, Clone, Debug)]
pub struct ReconciliationSettings {
    /// Maximum number of candidates requested per transaction.
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,
    /// Sessions untouched for this long are dropped.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
    /// Buffered completion events per subscriber.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_suggestion_limit() -> usize {
    10
}

fn default_session_idle_secs() -> u64 {
    1800
}

fn default_purge_interval_secs() -> u64 {
    60
}

fn default_event_buffer() -> usize {
    64
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            suggestion_limit: default_suggestion_limit(),
            session_idle_secs: default_session_idle_secs(),
            purge_interval_secs: default_purge_interval_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

pub fn get_configuration() -> Result<Settings, AppError> {
    let base_path = std::env::current_dir()?;
    load_settings(&config_directory(&base_path, "reconciliation-frontend"))
}
