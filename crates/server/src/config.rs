use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use tracing::warn;

pub const SETTINGS_FILE: &str = "relay.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub backend_url: String,
    pub upstream_timeout_seconds: u64,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            backend_url: "http://127.0.0.1:8000".into(),
            upstream_timeout_seconds: 10,
            max_body_bytes: 64 * 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string(Path::new(SETTINGS_FILE)).ok();
    load_settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then the flat `relay.toml` table, then environment variables.
pub fn load_settings_from(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => apply_file(&mut settings, &file_cfg),
            Err(error) => warn!(%error, file = SETTINGS_FILE, "ignoring unreadable settings file"),
        }
    }

    for key in ["RELAY_BIND", "APP__BIND_ADDR"] {
        if let Some(v) = env(key) {
            settings.server_bind = v;
        }
    }
    for key in ["BACKEND_URL", "APP__BACKEND_URL"] {
        if let Some(v) = env(key) {
            settings.backend_url = v;
        }
    }
    if let Some(v) = env("APP__UPSTREAM_TIMEOUT_SECONDS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.upstream_timeout_seconds = parsed.max(1),
            Err(_) => warn!(value = %v, "APP__UPSTREAM_TIMEOUT_SECONDS is not a number"),
        }
    }
    if let Some(v) = env("APP__MAX_BODY_BYTES") {
        match v.parse::<usize>() {
            Ok(parsed) => settings.max_body_bytes = parsed,
            Err(_) => warn!(value = %v, "APP__MAX_BODY_BYTES is not a number"),
        }
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, toml::Value>) {
    if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
        settings.server_bind = v.to_string();
    }
    if let Some(v) = file_cfg.get("backend_url").and_then(toml::Value::as_str) {
        settings.backend_url = v.to_string();
    }
    if let Some(v) = file_cfg
        .get("upstream_timeout_seconds")
        .and_then(toml::Value::as_integer)
    {
        settings.upstream_timeout_seconds = v.max(1) as u64;
    }
    if let Some(v) = file_cfg.get("max_body_bytes").and_then(toml::Value::as_integer) {
        settings.max_body_bytes = v.max(0) as usize;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
