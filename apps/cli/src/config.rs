use std::{collections::HashMap, fs, path::Path, time::Duration};

use direct_chat::DEFAULT_RECONNECT_DELAY;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "direct_chat.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub page_origin: String,
    pub reconnect_delay: Duration,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_origin: "http://127.0.0.1:8000".into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            log_filter: "info".into(),
        }
    }
}

pub fn load_settings(config_path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => apply_file_config(&mut settings, &file_cfg),
            Err(err) => warn!(path = %config_path.display(), error = %err, "config: ignoring unreadable file"),
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_config(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("page_origin") {
        settings.page_origin = v.clone();
    }
    if let Some(delay) = file_cfg.get("reconnect_delay_ms").and_then(|v| parse_millis(v)) {
        settings.reconnect_delay = delay;
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
}

fn apply_env_overrides(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("APP__PAGE_ORIGIN") {
        settings.page_origin = v;
    }
    if let Some(delay) = env("APP__RECONNECT_DELAY_MS").and_then(|v| parse_millis(&v)) {
        settings.reconnect_delay = delay;
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

fn parse_millis(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_millis)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
