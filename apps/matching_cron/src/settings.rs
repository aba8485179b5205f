use std::time::Duration;

use anyhow::Result;
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

pub const DEFAULT_SETTINGS_FILE: &str = "matching_cron";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CronSettings {
    pub backend_url: String,
    /// Local time of day, `HH:MM`.
    pub run_at: String,
    pub admin_token: Option<String>,
    /// Seconds before a matching call is abandoned.
    pub request_timeout_seconds: u64,
}

impl CronSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }
}

/// Defaults, then `<name>.toml` if present, then `APP__*` variables.
pub fn load_settings(name: &str) -> Result<CronSettings> {
    layered(Config::builder().add_source(File::with_name(name).required(false)))
}

fn layered(builder: ConfigBuilder<DefaultState>) -> Result<CronSettings> {
    let settings = builder
        .set_default("backend_url", "http://127.0.0.1:8000")?
        .set_default("run_at", "00:00")?
        .set_default("request_timeout_seconds", 30)?
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;
    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
