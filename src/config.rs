//! Service configuration with layered resolution.
//!
//! Resolution order (highest priority first):
//! 1. Environment variables (`MEDCHECK_*`)
//! 2. Config file (`MEDCHECK_CONFIG`, or `medcheck.toml` in the working directory)
//! 3. Compiled defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{BootstrapAdmin, DEFAULT_PBKDF2_ITERATIONS, DEFAULT_SESSION_TTL_MINUTES};
use crate::export::{DEFAULT_TTS_URL, DEFAULT_VOICE_ID};

pub const APP_NAME: &str = "MedCheck";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CONFIG_FILE_NAME: &str = "medcheck.toml";
pub const CONFIG_PATH_ENV: &str = "MEDCHECK_CONFIG";
pub const DEFAULT_LOG_FILTER: &str = "medcheck=info,medcheck_lib=info,tower_http=info";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {message}")]
    FileRead { path: String, message: String },

    #[error("Invalid TOML in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("Cannot determine home directory for the default database path")]
    NoHomeDir,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub scheduler: SchedulerSettings,
    pub notifications: NotificationSettings,
    pub voice: VoiceSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub rate_per_minute: u32,
    pub rate_per_hour: u32,
    /// Take the client address from `X-Forwarded-For`. Only enable behind
    /// a reverse proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".into(),
            rate_per_minute: 100,
            rate_per_hour: 1000,
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Defaults to `~/MedCheck/medcheck.db`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub session_ttl_minutes: i64,
    pub pbkdf2_iterations: u32,
    pub bootstrap_admin: Option<BootstrapAdminSettings>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            bootstrap_admin: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdminSettings {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl From<&BootstrapAdminSettings> for BootstrapAdmin {
    fn from(s: &BootstrapAdminSettings) -> Self {
        Self {
            username: s.username.clone(),
            email: s.email.clone(),
            password: s.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub push_gateway_url: Option<String>,
    pub mail_relay_url: Option<String>,
    pub sender: String,
    pub timeout_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            push_gateway_url: None,
            mail_relay_url: None,
            sender: "medcheck@localhost".into(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub voice_id: String,
    pub timeout_secs: u64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_TTS_URL.into(),
            api_key: None,
            voice_id: DEFAULT_VOICE_ID.into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

impl Settings {
    /// Load defaults, then the config file when present, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut settings = match &explicit {
            // An explicitly named file must exist.
            Some(path) => Self::from_file(path)?,
            None => {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                if local.exists() {
                    Self::from_file(&local)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse {
            path: "<string>".into(),
            message: e.to_string(),
        })
    }

    /// Apply `MEDCHECK_*` overrides read through `lookup`.
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MEDCHECK_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("MEDCHECK_DB_PATH") {
            self.database.path = Some(PathBuf::from(v));
        }
        parse_env(&lookup, "MEDCHECK_TRUST_FORWARDED_FOR", &mut self.server.trust_forwarded_for);
        parse_env(&lookup, "MEDCHECK_SESSION_TTL_MINUTES", &mut self.auth.session_ttl_minutes);
        parse_env(&lookup, "MEDCHECK_PBKDF2_ITERATIONS", &mut self.auth.pbkdf2_iterations);
        parse_env(&lookup, "MEDCHECK_SCHEDULER_ENABLED", &mut self.scheduler.enabled);
        parse_env(&lookup, "MEDCHECK_SCHEDULER_INTERVAL_SECS", &mut self.scheduler.interval_secs);

        if let (Some(username), Some(email), Some(password)) = (
            lookup("MEDCHECK_ADMIN_USERNAME"),
            lookup("MEDCHECK_ADMIN_EMAIL"),
            lookup("MEDCHECK_ADMIN_PASSWORD"),
        ) {
            self.auth.bootstrap_admin = Some(BootstrapAdminSettings {
                username,
                email,
                password,
            });
        }

        if let Some(v) = lookup("MEDCHECK_PUSH_GATEWAY_URL") {
            self.notifications.push_gateway_url = Some(v);
        }
        if let Some(v) = lookup("MEDCHECK_MAIL_RELAY_URL") {
            self.notifications.mail_relay_url = Some(v);
        }
        if let Some(v) = lookup("MEDCHECK_MAIL_SENDER") {
            self.notifications.sender = v;
        }

        if let Some(v) = lookup("MEDCHECK_TTS_URL") {
            self.voice.url = v;
        }
        if let Some(v) = lookup("MEDCHECK_TTS_API_KEY").or_else(|| lookup("ELEVENLABS_API_KEY")) {
            self.voice.api_key = Some(v);
        }
        if let Some(v) = lookup("MEDCHECK_TTS_VOICE_ID") {
            self.voice.voice_id = v;
        }

        if let Some(v) = lookup("MEDCHECK_LOG") {
            self.logging.filter = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(invalid("server.bind", "must be a socket address like 127.0.0.1:8080"));
        }
        if self.server.rate_per_minute == 0 || self.server.rate_per_hour == 0 {
            return Err(invalid("server.rate_per_minute", "rate limits must be greater than 0"));
        }
        if self.auth.session_ttl_minutes <= 0 {
            return Err(invalid("auth.session_ttl_minutes", "must be greater than 0"));
        }
        if self.auth.pbkdf2_iterations == 0 {
            return Err(invalid("auth.pbkdf2_iterations", "must be greater than 0"));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(invalid("scheduler.interval_secs", "must be greater than 0"));
        }
        if let Some(admin) = &self.auth.bootstrap_admin {
            if admin.username.trim().is_empty() || admin.password.is_empty() {
                return Err(invalid(
                    "auth.bootstrap_admin",
                    "username and password are required",
                ));
            }
        }
        Ok(())
    }

    /// Configured database path, or `~/MedCheck/medcheck.db`.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_data_dir()?.join("medcheck.db")),
        }
    }
}

/// `~/MedCheck/`, visible to the user on every platform.
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(APP_NAME))
        .ok_or(ConfigError::NoHomeDir)
}

fn parse_env<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(v) => *target = v,
            Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparsable environment override"),
        }
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.server.bind, "127.0.0.1:8080");
        assert_eq!(settings.auth.session_ttl_minutes, 480);
        assert_eq!(settings.auth.pbkdf2_iterations, 100_000);
        assert_eq!(settings.scheduler.interval_secs, 3600);
        assert!(settings.voice.api_key.is_none());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let settings = Settings::from_toml(
            r#"
            [server]
            bind = "0.0.0.0:9000"

            [scheduler]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(settings.server.bind, "0.0.0.0:9000");
        assert_eq!(settings.server.rate_per_minute, 100);
        assert!(!settings.scheduler.enabled);
        assert_eq!(settings.scheduler.interval_secs, 3600);
    }

    #[test]
    fn bootstrap_admin_from_toml() {
        let settings = Settings::from_toml(
            r#"
            [auth.bootstrap_admin]
            username = "admin"
            email = "admin@hospital.test"
            password = "change-me-now"
            "#,
        )
        .unwrap();
        let admin = settings.auth.bootstrap_admin.unwrap();
        assert_eq!(admin.username, "admin");
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = Settings::from_toml("[server\nbind=").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut settings = Settings::from_toml("[server]\nbind = \"0.0.0.0:9000\"").unwrap();
        settings.apply_env(env(&[
            ("MEDCHECK_BIND", "127.0.0.1:7000"),
            ("MEDCHECK_SCHEDULER_INTERVAL_SECS", "60"),
            ("MEDCHECK_TTS_API_KEY", "key"),
            ("MEDCHECK_DB_PATH", "/tmp/mc.db"),
            ("MEDCHECK_TRUST_FORWARDED_FOR", "true"),
        ]));
        assert_eq!(settings.server.bind, "127.0.0.1:7000");
        assert!(settings.server.trust_forwarded_for);
        assert_eq!(settings.scheduler.interval_secs, 60);
        assert_eq!(settings.voice.api_key.as_deref(), Some("key"));
        assert_eq!(settings.database_path().unwrap(), PathBuf::from("/tmp/mc.db"));
    }

    #[test]
    fn unparsable_env_value_is_ignored() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[("MEDCHECK_SCHEDULER_INTERVAL_SECS", "soon")]));
        assert_eq!(settings.scheduler.interval_secs, 3600);
    }

    #[test]
    fn bootstrap_admin_needs_all_three_env_vars() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[("MEDCHECK_ADMIN_USERNAME", "admin")]));
        assert!(settings.auth.bootstrap_admin.is_none());

        settings.apply_env(env(&[
            ("MEDCHECK_ADMIN_USERNAME", "admin"),
            ("MEDCHECK_ADMIN_EMAIL", "a@h.test"),
            ("MEDCHECK_ADMIN_PASSWORD", "change-me-now"),
        ]));
        assert!(settings.auth.bootstrap_admin.is_some());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.server.bind = "not-an-address".into();
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid { .. })));

        let mut settings = Settings::default();
        settings.scheduler.interval_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.auth.session_ttl_minutes = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[logging]\nfilter = \"debug\"\n").unwrap();
        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.logging.filter, "debug");

        let missing = Settings::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::FileRead { .. }));
    }
}
