//! Client settings load/save for `~/.juris/config.yaml`, with environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::waiter::WaitPolicy;

/// Retrieval parameters sent with every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Retrieve {
    /// Number of documents to retrieve.
    pub k: u32,
    pub temperature: f64,
}

impl Default for Retrieve {
    fn default() -> Self {
        Self {
            k: 15,
            temperature: 0.5,
        }
    }
}

/// Per-request timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub probe_secs: u64,
    pub stream_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe_secs: 3,
            stream_secs: 300,
        }
    }
}

/// Polling budget for the availability waiter, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessSection {
    pub max_wait_secs: u64,
    pub interval_secs: u64,
}

impl Default for ReadinessSection {
    fn default() -> Self {
        Self {
            max_wait_secs: 60,
            interval_secs: 5,
        }
    }
}

/// Full client config. Every field falls back to its default when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub retrieve: Retrieve,
    pub log_level: String,
    pub timeouts: Timeouts,
    pub readiness: ReadinessSection,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".into(),
            retrieve: Retrieve::default(),
            log_level: "INFO".into(),
            timeouts: Timeouts::default(),
            readiness: ReadinessSection::default(),
        }
    }
}

impl Settings {
    /// Base URL without a trailing slash.
    pub fn api_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.probe_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.stream_secs)
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_secs(self.readiness.max_wait_secs),
            Duration::from_secs(self.readiness.interval_secs),
        )
    }

    /// Default `tracing` directive for `log_level`: `ERROR` and `DEBUG` are
    /// honoured, anything else means `info`.
    pub fn log_directive(&self) -> &'static str {
        match self.log_level.trim().to_ascii_uppercase().as_str() {
            "ERROR" => "error",
            "DEBUG" => "debug",
            _ => "info",
        }
    }

    /// Apply `API_URL`, `RETRIEVE__K`, `RETRIEVE__TEMPERATURE` and `LOG_LEVEL`
    /// from `lookup` (normally the process environment).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(url) = lookup("API_URL") {
            self.api_url = url;
        }
        if let Some(k) = lookup("RETRIEVE__K") {
            self.retrieve.k = k
                .trim()
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("RETRIEVE__K={k}: {e}")))?;
        }
        if let Some(t) = lookup("RETRIEVE__TEMPERATURE") {
            self.retrieve.temperature = t
                .trim()
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("RETRIEVE__TEMPERATURE={t}: {e}")))?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(self.api_url())
            .map_err(|e| ConfigError::Invalid(format!("api_url {:?}: {e}", self.api_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "api_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.retrieve.k == 0 {
            return Err(ConfigError::Invalid("retrieve.k must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.retrieve.temperature) {
            return Err(ConfigError::Invalid(format!(
                "retrieve.temperature must be within 0.0..=2.0, got {}",
                self.retrieve.temperature
            )));
        }
        if self.timeouts.probe_secs == 0 || self.timeouts.stream_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if self.readiness.interval_secs == 0 || self.readiness.max_wait_secs == 0 {
            return Err(ConfigError::Invalid(
                "readiness.max_wait_secs and readiness.interval_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Returns the default config file path: `~/.juris/config.yaml` (platform-specific).
pub fn default_config_path() -> Option<PathBuf> {
    let home = home_dir()?;
    Some(home.join(".juris").join("config.yaml"))
}

#[cfg(unix)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(windows)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE").map(PathBuf::from)
}

#[cfg(not(any(unix, windows)))]
fn home_dir() -> Option<PathBuf> {
    None
}

/// Load settings from a YAML file.
pub fn load(path: &Path) -> Result<Settings, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&contents)?)
}

/// Like [`load`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> Result<Settings, ConfigError> {
    match load(path) {
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(Settings::default())
        }
        other => other,
    }
}

/// Save settings to a YAML file. Creates parent directory if missing.
pub fn save(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(settings)?;
    std::fs::write(path, contents)?;
    Ok(())
}
