//! Check settings loader.
//!
//! Settings come from a JSON file (explicit path or the default location)
//! and are then overridden field by field from the command line.

use crate::error::{Error, Result};
use crate::probe::executor::DEFAULT_MAX_WORKERS;
use crate::probe::ranking::{PreferredFilter, DEFAULT_PREFERRED_MAX_MS};
use crate::probe::worker::{DEFAULT_CHECK_URL, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the settings file inside the config directory.
const CONFIG_FILE: &str = "config.json";

/// Settings consumed by one check run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    /// Check endpoint; `?proxyip=<host>:<port>` is appended
    pub check_url: String,
    /// Per-probe timeout in seconds
    pub timeout_secs: u64,
    /// Maximum number of probes in flight
    pub max_workers: usize,
    /// Preferred set keeps responses strictly faster than this
    pub preferred_max_response_time_ms: i64,
    /// Preferred set port allow-list; empty allows every port
    pub preferred_ports: Vec<String>,
    /// Country kept from the iptest CSV; empty keeps all
    pub preferred_country: String,
    /// Datacenter kept from CSV input; empty keeps all
    pub preferred_datacenter: String,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            check_url: DEFAULT_CHECK_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_workers: DEFAULT_MAX_WORKERS,
            preferred_max_response_time_ms: DEFAULT_PREFERRED_MAX_MS,
            preferred_ports: Vec::new(),
            preferred_country: String::new(),
            preferred_datacenter: String::new(),
        }
    }
}

impl CheckSettings {
    /// Reject settings that would make a run meaningless.
    ///
    /// # Errors
    ///
    /// Returns a config error naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::config("max_workers must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be at least 1"));
        }
        if !self.check_url.starts_with("http://") && !self.check_url.starts_with("https://") {
            return Err(Error::config(format!(
                "check_url must be an http(s) URL, got `{}`",
                self.check_url
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn preferred_filter(&self) -> PreferredFilter {
        PreferredFilter {
            max_response_time_ms: self.preferred_max_response_time_ms,
            ports: self.preferred_ports.clone(),
        }
    }

    #[must_use]
    pub fn country(&self) -> Option<&str> {
        non_empty(&self.preferred_country)
    }

    #[must_use]
    pub fn datacenter(&self) -> Option<&str> {
        non_empty(&self.preferred_datacenter)
    }

    /// Apply command-line overrides.
    pub fn apply(&mut self, overrides: SettingsOverrides) {
        if let Some(url) = overrides.check_url {
            self.check_url = url;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout_secs = secs;
        }
        if let Some(workers) = overrides.max_workers {
            self.max_workers = workers;
        }
        if let Some(ms) = overrides.preferred_max_response_time_ms {
            self.preferred_max_response_time_ms = ms;
        }
        if let Some(ports) = overrides.preferred_ports {
            self.preferred_ports = parse_port_list(&ports);
        }
        if let Some(country) = overrides.preferred_country {
            self.preferred_country = country.trim().to_string();
        }
        if let Some(dc) = overrides.preferred_datacenter {
            self.preferred_datacenter = dc.trim().to_string();
        }
    }
}

/// Per-field overrides from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub check_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_workers: Option<usize>,
    pub preferred_max_response_time_ms: Option<i64>,
    /// Comma-separated port list
    pub preferred_ports: Option<String>,
    pub preferred_country: Option<String>,
    pub preferred_datacenter: Option<String>,
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

/// Split a comma-separated port list, dropping blanks.
///
/// # Example
///
/// ```ignore
/// assert_eq!(parse_port_list(" 443, ,8443"), vec!["443", "8443"]);
/// ```
#[must_use]
pub fn parse_port_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Settings file loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<CheckSettings> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let settings: CheckSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from `path`, or from the default location.
    ///
    /// An explicit path must exist. Without one, a missing default file
    /// yields the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<CheckSettings> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        let default = Self::default_path();
        if default.exists() {
            tracing::debug!("loading settings from {}", default.display());
            Self::load_from_file(default)
        } else {
            Ok(CheckSettings::default())
        }
    }

    /// Persist settings as pretty JSON, creating parent folders.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(settings: &CheckSettings, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Get the config directory path.
    #[must_use]
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("proxyprobe")
    }

    /// Default settings file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::config_dir().join(CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CheckSettings::default();
        assert_eq!(settings.max_workers, 10);
        assert_eq!(settings.timeout(), Duration::from_secs(10));
        assert_eq!(settings.preferred_max_response_time_ms, 350);
        assert!(settings.preferred_ports.is_empty());
        assert!(settings.country().is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_workers": 32, "preferred_ports": ["443"]}"#).unwrap();

        let settings = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(settings.max_workers, 32);
        assert_eq!(settings.preferred_ports, ["443"]);
        assert_eq!(settings.timeout_secs, 10);
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigLoader::load(Some(&dir.path().join("nope.json"))).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let settings = CheckSettings {
            preferred_country: "HK".into(),
            ..CheckSettings::default()
        };
        ConfigLoader::save(&settings, &path).unwrap();
        assert_eq!(ConfigLoader::load_from_file(&path).unwrap(), settings);
    }

    #[test]
    fn test_apply_overrides() {
        let mut settings = CheckSettings::default();
        settings.apply(SettingsOverrides {
            max_workers: Some(4),
            preferred_ports: Some("443, 8443,,".into()),
            preferred_country: Some(" US ".into()),
            ..SettingsOverrides::default()
        });
        assert_eq!(settings.max_workers, 4);
        assert_eq!(settings.preferred_ports, ["443", "8443"]);
        assert_eq!(settings.country(), Some("US"));
        assert_eq!(settings.timeout_secs, 10);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let settings = CheckSettings {
            max_workers: 0,
            ..CheckSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = CheckSettings {
            timeout_secs: 0,
            ..CheckSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = CheckSettings {
            check_url: "ftp://x".into(),
            ..CheckSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_port_list() {
        assert_eq!(parse_port_list(" 443, ,8443"), ["443", "8443"]);
        assert!(parse_port_list("").is_empty());
    }
}
