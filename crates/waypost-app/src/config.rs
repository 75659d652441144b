//! Settings parser for config.toml
//!
//! Configuration lives at `~/.config/waypost/config.toml` (platform
//! equivalent) and every field has a default, so a missing file means a
//! fully usable default setup pointed at the Device's stock address.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use waypost_core::prelude::*;
use waypost_core::FixRequest;

const CONFIG_DIR: &str = "waypost";
const CONFIG_FILENAME: &str = "config.toml";

/// Application settings (config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub source: SourceSettings,
}

/// Device connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceSettings {
    /// Bare host or host:port the Device listens on.
    #[serde(default = "default_address")]
    pub address: String,

    /// Per-request timeout for the probe and delivery endpoints, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            address: default_address(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl DeviceSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_address() -> String {
    // The access point address the Device firmware ships with.
    "192.168.4.1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    5
}

/// Location source settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceSettings {
    /// Prefer the high-accuracy positioning mode.
    #[serde(default = "default_true")]
    pub high_accuracy: bool,

    /// How long to wait for a fix, in seconds.
    #[serde(default = "default_fix_timeout_secs")]
    pub timeout_secs: u64,

    /// Accept a cached fix no older than this, in seconds. Zero demands a
    /// fresh fix.
    #[serde(default)]
    pub max_cache_age_secs: u64,

    /// Position reported by the preset source.
    #[serde(default)]
    pub preset: PresetFix,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            high_accuracy: default_true(),
            timeout_secs: default_fix_timeout_secs(),
            max_cache_age_secs: 0,
            preset: PresetFix::default(),
        }
    }
}

impl SourceSettings {
    pub fn fix_request(&self) -> FixRequest {
        FixRequest {
            high_accuracy: self.high_accuracy,
            timeout: Duration::from_secs(self.timeout_secs),
            max_cache_age: Duration::from_secs(self.max_cache_age_secs),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_fix_timeout_secs() -> u64 {
    10
}

/// Coordinates reported by the preset source
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PresetFix {
    #[serde(default)]
    pub latitude: f64,

    #[serde(default)]
    pub longitude: f64,

    #[serde(default)]
    pub accuracy: f64,
}

/// Load settings from the default config path.
///
/// Missing or unreadable configuration is not fatal: the coordinator runs
/// with defaults and the problem is logged.
pub fn load_settings() -> Settings {
    let Some(config_path) = default_config_path() else {
        debug!("No config directory on this platform, using default settings");
        return Settings::default();
    };

    if !config_path.exists() {
        debug!(
            "No config file at {}, using default settings",
            config_path.display()
        );
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str::<Settings>(&content) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Failed to parse {}: {err}", config_path.display());
                Settings::default()
            }
        },
        Err(err) => {
            warn!("Failed to read {}: {err}", config_path.display());
            Settings::default()
        }
    }
}

/// Load settings from an explicit path.
///
/// Used for `--config`: when the operator names a file, a missing or
/// malformed file is an error rather than a silent fallback.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| Error::config(format!("failed to read {}: {err}", path.display())))?;
    toml::from_str(&content).map_err(|err| {
        Error::config_invalid(format!("failed to parse {}: {err}", path.display()))
    })
}

/// Default config file location, `None` on platforms without a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.device.address, "192.168.4.1");
        assert_eq!(settings.device.request_timeout_secs, 5);
        assert!(settings.source.high_accuracy);
        assert_eq!(settings.source.timeout_secs, 10);
        assert_eq!(settings.source.max_cache_age_secs, 0);
        assert_eq!(settings.source.preset.latitude, 0.0);
    }

    #[test]
    fn test_full_config_parses() {
        let (_dir, path) = write_config(
            r#"
[device]
address = "10.0.0.9:8080"
request_timeout_secs = 3

[source]
high_accuracy = false
timeout_secs = 20
max_cache_age_secs = 60

[source.preset]
latitude = 40.7484
longitude = -73.9857
accuracy = 15.0
"#,
        );

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.device.address, "10.0.0.9:8080");
        assert_eq!(settings.device.request_timeout(), Duration::from_secs(3));
        assert!(!settings.source.high_accuracy);
        assert_eq!(settings.source.timeout_secs, 20);
        assert_eq!(settings.source.max_cache_age_secs, 60);
        assert_eq!(settings.source.preset.latitude, 40.7484);
        assert_eq!(settings.source.preset.longitude, -73.9857);
        assert_eq!(settings.source.preset.accuracy, 15.0);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let (_dir, path) = write_config(
            r#"
[device]
address = "192.168.1.50"
"#,
        );

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.device.address, "192.168.1.50");
        assert_eq!(settings.device.request_timeout_secs, 5);
        assert!(settings.source.high_accuracy);
        assert_eq!(settings.source.timeout_secs, 10);
    }

    #[test]
    fn test_unknown_keys_tolerated() {
        let (_dir, path) = write_config(
            r#"
[device]
address = "192.168.1.50"
future_knob = true
"#,
        );

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.device.address, "192.168.1.50");
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(load_settings_from(&path).is_err());
    }

    #[test]
    fn test_explicit_malformed_file_is_error() {
        let (_dir, path) = write_config("this is not toml [[[");
        let err = load_settings_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_fix_request_mapping() {
        let source = SourceSettings {
            high_accuracy: false,
            timeout_secs: 7,
            max_cache_age_secs: 30,
            preset: PresetFix::default(),
        };

        let request = source.fix_request();
        assert!(!request.high_accuracy);
        assert_eq!(request.timeout, Duration::from_secs(7));
        assert_eq!(request.max_cache_age, Duration::from_secs(30));
    }
}
