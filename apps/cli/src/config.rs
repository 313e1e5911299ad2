//! CLI configuration: built-in defaults, then `cat62.toml`, then environment.

use std::collections::HashMap;
use std::fs;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub server_url: String,
    /// Whole-request timeout for gateway calls. `None` leaves large
    /// datablocks free to take as long as the service needs.
    pub request_timeout_seconds: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_owned(),
            request_timeout_seconds: None,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string("cat62.toml") {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(
        &mut settings,
        std::env::var("CAT62_SERVER_URL").ok(),
        std::env::var("CAT62_REQUEST_TIMEOUT_SECONDS").ok(),
    );
    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(table) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        tracing::warn!("config: cat62.toml is not valid toml, ignoring it");
        return;
    };
    if let Some(url) = table.get("server_url").and_then(|value| value.as_str()) {
        settings.server_url = url.to_owned();
    }
    if let Some(timeout) = table
        .get("request_timeout_seconds")
        .and_then(|value| value.as_integer())
    {
        if let Ok(parsed) = u64::try_from(timeout) {
            settings.request_timeout_seconds = Some(parsed);
        }
    }
}

fn apply_env_overrides(
    settings: &mut Settings,
    server_url: Option<String>,
    timeout_seconds: Option<String>,
) {
    if let Some(url) = server_url {
        settings.server_url = url;
    }
    if let Some(timeout) = timeout_seconds {
        match timeout.parse::<u64>() {
            Ok(parsed) => settings.request_timeout_seconds = Some(parsed),
            Err(_) => tracing::warn!(
                value = %timeout,
                "config: CAT62_REQUEST_TIMEOUT_SECONDS is not a number, ignoring it"
            ),
        }
    }
}
