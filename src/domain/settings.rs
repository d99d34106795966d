use crate::domain::models::{AdvFrame, AdvertisedPeripheral};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "beacon_coordinator".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    // Coordinator Settings
    #[serde(default = "default_clear_scan_delay_ms")]
    pub clear_scan_delay_ms: u64,
    /// `None` lets a connection attempt run until the radio reports an outcome
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub scan_on_startup: bool,

    // Simulated Radio Settings
    #[serde(default = "default_simulated_beacons")]
    pub simulated_beacons: Vec<AdvertisedPeripheral>,
    #[serde(default = "default_simulated_scan_interval_ms")]
    pub simulated_scan_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            clear_scan_delay_ms: default_clear_scan_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            scan_on_startup: default_true(),
            simulated_beacons: default_simulated_beacons(),
            simulated_scan_interval_ms: default_simulated_scan_interval_ms(),
        }
    }
}

fn default_clear_scan_delay_ms() -> u64 {
    5000
}
fn default_connect_timeout_ms() -> Option<u64> {
    Some(30_000)
}
fn default_simulated_scan_interval_ms() -> u64 {
    1000
}
fn default_simulated_beacons() -> Vec<AdvertisedPeripheral> {
    vec![
        AdvertisedPeripheral {
            address: "C3:00:00:1A:2B:01".to_string(),
            name: Some("Beacon1".to_string()),
            frames: vec![AdvFrame::Tlm { battery_mv: 3010 }],
        },
        AdvertisedPeripheral {
            address: "C3:00:00:1A:2B:02".to_string(),
            name: Some("Beacon2".to_string()),
            frames: vec![AdvFrame::Url {
                url: "https://beacon.example/2".to_string(),
            }],
        },
    ]
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load(settings_path))
    }

    /// Load from `settings_path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("BeaconCoordinator");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let json = r#"{"clear_scan_delay_ms": 250, "log_settings": {"level": "debug"}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.clear_scan_delay_ms, 250);
        assert_eq!(settings.connect_timeout_ms, Some(30_000));
        assert!(settings.scan_on_startup);
        assert_eq!(settings.log_settings.level, "debug");
        assert!(settings.log_settings.console_logging_enabled);
        assert_eq!(settings.simulated_beacons.len(), 2);
    }

    #[test]
    fn null_timeout_disables_it() {
        let json = r#"{"connect_timeout_ms": null}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.connect_timeout_ms, None);
    }

    #[test]
    fn missing_file_loads_defaults_and_saves() {
        let name = format!("beacon_settings_{}", std::process::id());
        let dir = std::env::temp_dir().join(name);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        let _ = fs::remove_file(&path);

        let service = SettingsService::load(path.clone());
        assert_eq!(service.get().clear_scan_delay_ms, 5000);
        service.save().unwrap();
        assert!(path.exists());

        fs::write(&path, r#"{"scan_on_startup": false}"#).unwrap();
        let reloaded = SettingsService::load(path);
        assert!(!reloaded.get().scan_on_startup);
        assert_eq!(reloaded.get().clear_scan_delay_ms, 5000);
        let _ = fs::remove_dir_all(&dir);
    }
}
