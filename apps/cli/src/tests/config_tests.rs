use super::*;

use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn defaults_match_channel_client_defaults() {
    let settings = Settings::default();
    assert_eq!(settings.reconnect_delay, Duration::from_secs(3));
    assert_eq!(settings.page_origin, "http://127.0.0.1:8000");
}

#[test]
fn missing_file_yields_defaults() {
    let settings = load_settings(Path::new("/nonexistent/direct_chat.toml"));
    assert_eq!(settings.reconnect_delay, DEFAULT_RECONNECT_DELAY);
}

#[test]
fn file_values_are_applied() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("direct_chat_config_test_{suffix}.toml"));
    fs::write(
        &path,
        "page_origin = \"https://learn.example.org\"\nreconnect_delay_ms = \"1500\"\nlog_filter = \"debug\"\n",
    )
    .expect("write config");

    let mut settings = Settings::default();
    let raw = fs::read_to_string(&path).expect("read config");
    let file_cfg: HashMap<String, String> = toml::from_str(&raw).expect("toml");
    apply_file_config(&mut settings, &file_cfg);

    assert_eq!(settings.page_origin, "https://learn.example.org");
    assert_eq!(settings.reconnect_delay, Duration::from_millis(1500));
    assert_eq!(settings.log_filter, "debug");

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn env_overrides_file_values() {
    let mut settings = Settings {
        page_origin: "https://from-file.example".into(),
        reconnect_delay: Duration::from_millis(1500),
        log_filter: "debug".into(),
    };
    apply_env_overrides(
        &mut settings,
        env_from(&[
            ("APP__PAGE_ORIGIN", "https://from-env.example"),
            ("APP__RECONNECT_DELAY_MS", "250"),
        ]),
    );

    assert_eq!(settings.page_origin, "https://from-env.example");
    assert_eq!(settings.reconnect_delay, Duration::from_millis(250));
    assert_eq!(settings.log_filter, "debug");
}

#[test]
fn unparsable_delay_is_ignored() {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings, env_from(&[("APP__RECONNECT_DELAY_MS", "soon")]));
    assert_eq!(settings.reconnect_delay, DEFAULT_RECONNECT_DELAY);
}
