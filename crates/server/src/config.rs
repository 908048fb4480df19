use std::{collections::HashMap, fs, net::SocketAddr, time::Duration};

use anyhow::Context;
use notifier::MailRelayConfig;
use serde::Deserialize;
use server_api::defaults::DEFAULT_VENUE_LOCATION;
use storage::ReconnectPolicy;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub venue_location: String,
    pub mail_relay_url: Option<String>,
    pub mail_user: Option<String>,
    pub mail_pass: Option<String>,
    pub notify_email: Option<String>,
    pub store_timeout_secs: u64,
    pub connect_attempts: u32,
    pub connect_retry_delay_ms: u64,
    pub cors_origin: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:3001".into(),
            database_url: "sqlite://./data/wedding.db".into(),
            venue_location: DEFAULT_VENUE_LOCATION.into(),
            mail_relay_url: None,
            mail_user: None,
            mail_pass: None,
            notify_email: None,
            store_timeout_secs: 5,
            connect_attempts: 3,
            connect_retry_delay_ms: 500,
            cors_origin: None,
        }
    }
}

impl Settings {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server_bind
            .parse()
            .with_context(|| format!("invalid bind address '{}'", self.server_bind))
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            attempts: self.connect_attempts.max(1),
            delay: Duration::from_millis(self.connect_retry_delay_ms),
            timeout: Duration::from_secs(self.store_timeout_secs.max(1)),
        }
    }

    /// Mail is only sent when the relay, both credentials and the recipient are set.
    pub fn mail_relay(&self) -> Option<MailRelayConfig> {
        Some(MailRelayConfig {
            relay_url: non_empty(self.mail_relay_url.as_deref())?,
            username: non_empty(self.mail_user.as_deref())?,
            password: non_empty(self.mail_pass.as_deref())?,
            recipient: non_empty(self.notify_email.as_deref())?,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_config(&mut settings, &file_cfg);
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_config(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("venue_location") {
        settings.venue_location = v.clone();
    }
    if let Some(v) = file_cfg.get("mail_relay_url") {
        settings.mail_relay_url = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("notify_email") {
        settings.notify_email = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("cors_origin") {
        settings.cors_origin = Some(v.clone());
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }
    if let Some(port) = var("PORT").and_then(|v| v.parse::<u16>().ok()) {
        settings.server_bind = with_port(&settings.server_bind, port);
    }

    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = var("VENUE_LOCATION") {
        settings.venue_location = v;
    }

    if let Some(v) = var("MAIL_RELAY_URL") {
        settings.mail_relay_url = Some(v);
    }
    if let Some(v) = var("MAIL_USER") {
        settings.mail_user = Some(v);
    }
    if let Some(v) = var("MAIL_PASS") {
        settings.mail_pass = Some(v);
    }
    if let Some(v) = var("NOTIFY_EMAIL") {
        settings.notify_email = Some(v);
    }

    if let Some(parsed) = var("APP__STORE_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
        settings.store_timeout_secs = parsed;
    }
    if let Some(parsed) = var("APP__CONNECT_ATTEMPTS").and_then(|v| v.parse::<u32>().ok()) {
        settings.connect_attempts = parsed;
    }
    if let Some(parsed) = var("APP__CONNECT_RETRY_DELAY_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.connect_retry_delay_ms = parsed;
    }
    if let Some(v) = var("APP__CORS_ORIGIN") {
        settings.cors_origin = Some(v);
    }
}

fn with_port(bind: &str, port: u16) -> String {
    let host = match bind.rsplit_once(':') {
        Some((host, _)) => host,
        None => bind,
    };
    format!("{host}:{port}")
}

/// Normalizes the url and creates its parent directory. A directory that can't
/// be created is only logged: the store then starts out disconnected.
pub fn prepare_database_url(raw_database_url: &str) -> String {
    let database_url = normalize_database_url(raw_database_url);
    if let Err(error) = storage::ensure_sqlite_parent_dir_exists(&database_url) {
        warn!(%database_url, error = %format!("{error:#}"), "could not prepare database directory");
    }
    database_url
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        if is_windows_absolute(path) {
            return format!("sqlite:{}", path.replace('\\', "/"));
        }
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        if is_windows_absolute(&path) {
            return format!("sqlite:{path}");
        }
        return format!("sqlite://{path}");
    }

    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url.replace('\\', "/");
    if is_windows_absolute(&path) {
        return format!("sqlite:{path}");
    }
    format!("sqlite://{path}")
}

fn is_windows_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
