// MouseDirectionBinder Settings Module
// Persisted user settings loaded from TOML

#![cfg(feature = "pure-rust")]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineOptions;
use crate::input::BrandList;
use crate::key::Key;
use crate::translate::{DeadZonePolicy, DEFAULT_DEAD_ZONE};

const DEFAULT_POINTER_ALLOW: &str = "Logitech, SteelSeries, Razer, ASUS, Synaptics, ELAN, Apple, \
    Microsoft, Lenovo, HP, Dell, Glorious, Zowie, Touchpad, Mouse";
const DEFAULT_KEYBOARD_ALLOW: &str = "Logitech, SteelSeries, Razer, ASUS, Corsair, MSI, Keychron, \
    Anne, Ducky, Vortex, Apple, Lenovo, Dell, Keyboard";
const DEFAULT_BLOCK: &str = "Virtual, uinput, seat, test, dummy, MouseDirectionBinder";

/// Settings for the binder
///
/// Loaded from a TOML file (default: ~/.config/mdbind/settings.toml).
/// Missing sections and keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub activation_key: Key,
    pub randomizer_enabled: bool,
    pub randomizer_minimum: i32,
    pub randomizer_maximum: i32,
    pub pointer_allow: BrandList,
    pub pointer_block: BrandList,
    pub keyboard_allow: BrandList,
    pub keyboard_block: BrandList,
    pub dead_zone: f64,
    pub idle_release: Duration,
    pub poll_timeout: Duration,
    pub dead_zone_policy: DeadZonePolicy,

    /// Path to the settings file (for reload)
    source_path: Option<PathBuf>,
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),
}

/// TOML representation for (de)serializing settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct SettingsToml {
    #[serde(default)]
    input: InputSection,
    #[serde(default)]
    randomizer: RandomizerSection,
    #[serde(default)]
    devices: DevicesSection,
    #[serde(default)]
    engine: EngineSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct InputSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    activation_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct RandomizerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    minimum: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    maximum: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct DevicesSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pointer_allow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pointer_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keyboard_allow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keyboard_block: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct EngineSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dead_zone: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    idle_release_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    poll_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dead_zone_policy: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Create settings with every default in place
    pub fn new() -> Self {
        let options = EngineOptions::default();
        Self {
            activation_key: options.activation_key,
            randomizer_enabled: options.randomizer_enabled,
            randomizer_minimum: options.randomizer_range.0,
            randomizer_maximum: options.randomizer_range.1,
            pointer_allow: BrandList::parse(DEFAULT_POINTER_ALLOW),
            pointer_block: BrandList::parse(DEFAULT_BLOCK),
            keyboard_allow: BrandList::parse(DEFAULT_KEYBOARD_ALLOW),
            keyboard_block: BrandList::parse(DEFAULT_BLOCK),
            dead_zone: DEFAULT_DEAD_ZONE,
            idle_release: options.idle_release,
            poll_timeout: options.poll_timeout,
            dead_zone_policy: options.dead_zone_policy,
            source_path: None,
        }
    }

    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(&path)?;
        let mut settings = Self::from_toml(&content)?;
        settings.source_path = Some(path.as_ref().to_path_buf());
        Ok(settings)
    }

    /// Load settings from TOML string
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let parsed: SettingsToml =
            toml::from_str(content).map_err(|e| SettingsError::TomlParse(e.to_string()))?;

        let mut settings = Self::new();

        if let Some(name) = parsed.input.activation_key {
            let key: Key = name
                .parse()
                .map_err(|e| SettingsError::InvalidValue(format!("activation_key: {}", e)))?;
            settings.activation_key = key;
        }

        let randomizer = parsed.randomizer;
        if let Some(enabled) = randomizer.enabled {
            settings.randomizer_enabled = enabled;
        }
        if let Some(minimum) = randomizer.minimum {
            settings.randomizer_minimum = minimum.clamp(0, 100);
        }
        if let Some(maximum) = randomizer.maximum {
            settings.randomizer_maximum = maximum.clamp(0, 100);
        }

        let devices = parsed.devices;
        replace_list(&mut settings.pointer_allow, devices.pointer_allow);
        replace_list(&mut settings.pointer_block, devices.pointer_block);
        replace_list(&mut settings.keyboard_allow, devices.keyboard_allow);
        replace_list(&mut settings.keyboard_block, devices.keyboard_block);

        let engine = parsed.engine;
        if let Some(dead_zone) = engine.dead_zone {
            if !dead_zone.is_finite() || dead_zone < 0.0 {
                return Err(SettingsError::InvalidValue(format!(
                    "dead_zone must be a non-negative number, got {}",
                    dead_zone
                )));
            }
            settings.dead_zone = dead_zone;
        }
        if let Some(ms) = engine.idle_release_ms {
            settings.idle_release = Duration::from_millis(ms);
        }
        if let Some(ms) = engine.poll_timeout_ms {
            if ms == 0 {
                return Err(SettingsError::InvalidValue(
                    "poll_timeout_ms must be greater than zero".to_string(),
                ));
            }
            settings.poll_timeout = Duration::from_millis(ms);
        }
        if let Some(policy) = engine.dead_zone_policy {
            settings.dead_zone_policy = policy.parse().map_err(SettingsError::InvalidValue)?;
        }

        Ok(settings)
    }

    /// Get the default settings path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mdbind").join("settings.toml"))
    }

    /// Load from default location (~/.config/mdbind/settings.toml)
    pub fn load_default() -> Result<Self, SettingsError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }
        // Return default settings if file doesn't exist
        Ok(Self::new())
    }

    /// Reload settings from the original file
    pub fn reload(&mut self) -> Result<(), SettingsError> {
        if let Some(ref path) = self.source_path {
            *self = Self::from_file(path)?;
            Ok(())
        } else {
            Err(SettingsError::InvalidValue("No source path set".to_string()))
        }
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Serialize to the TOML layout `from_toml` reads.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        let document = SettingsToml {
            input: InputSection {
                activation_key: Some(self.activation_key.to_string()),
            },
            randomizer: RandomizerSection {
                enabled: Some(self.randomizer_enabled),
                minimum: Some(self.randomizer_minimum),
                maximum: Some(self.randomizer_maximum),
            },
            devices: DevicesSection {
                pointer_allow: Some(join_list(&self.pointer_allow)),
                pointer_block: Some(join_list(&self.pointer_block)),
                keyboard_allow: Some(join_list(&self.keyboard_allow)),
                keyboard_block: Some(join_list(&self.keyboard_block)),
            },
            engine: EngineSection {
                dead_zone: Some(self.dead_zone),
                idle_release_ms: Some(self.idle_release.as_millis() as u64),
                poll_timeout_ms: Some(self.poll_timeout.as_millis() as u64),
                dead_zone_policy: Some(self.dead_zone_policy.as_str().to_string()),
            },
        };
        toml::to_string_pretty(&document).map_err(|e| SettingsError::TomlSerialize(e.to_string()))
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Engine startup options carrying these settings.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            activation_key: self.activation_key,
            dead_zone: self.dead_zone,
            dead_zone_policy: self.dead_zone_policy,
            idle_release: self.idle_release,
            poll_timeout: self.poll_timeout,
            randomizer_enabled: self.randomizer_enabled,
            randomizer_range: (self.randomizer_minimum, self.randomizer_maximum),
            pointer_allow: self.pointer_allow.clone(),
            pointer_block: self.pointer_block.clone(),
            keyboard_allow: self.keyboard_allow.clone(),
            keyboard_block: self.keyboard_block.clone(),
            ..EngineOptions::default()
        }
    }
}

/// Commented settings file written on first run.
pub fn default_settings_content() -> String {
    format!(
        r#"# MouseDirectionBinder settings
#
# Hold the activation key and move the mouse sideways: moving left holds A,
# moving right holds D.

[input]
# Key name (LEFT_SHIFT, SPACE, CAPSLOCK, F1, ...) or a raw key code
activation_key = "LEFT_SHIFT"

[randomizer]
# When enabled, only some motion is applied. A percentage is drawn from
# [minimum, maximum] for every motion event.
enabled = false
minimum = 70
maximum = 90

[devices]
# Comma or semicolon separated, case-insensitive name fragments.
# An empty allow list admits every device; the block list always wins.
pointer_allow = "{pointer_allow}"
pointer_block = "{block}"
keyboard_allow = "{keyboard_allow}"
keyboard_block = "{block}"

[engine]
# Minimum horizontal delta treated as motion
dead_zone = 0.4
# Release the held key after this long without motion
idle_release_ms = 120
poll_timeout_ms = 20
# "release" lets go as soon as motion drops under the dead zone,
# "hold" keeps the key until idle_release_ms elapses
dead_zone_policy = "release"
"#,
        pointer_allow = DEFAULT_POINTER_ALLOW,
        keyboard_allow = DEFAULT_KEYBOARD_ALLOW,
        block = DEFAULT_BLOCK,
    )
}

/// An empty or blank list keeps the default.
fn replace_list(target: &mut BrandList, value: Option<String>) {
    if let Some(value) = value {
        let parsed = BrandList::parse(&value);
        if !parsed.is_empty() {
            *target = parsed;
        }
    }
}

fn join_list(list: &BrandList) -> String {
    list.iter().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_settings_new() {
        let settings = Settings::new();
        assert_eq!(settings.activation_key, Key::LEFT_SHIFT);
        assert!(!settings.randomizer_enabled);
        assert_eq!((settings.randomizer_minimum, settings.randomizer_maximum), (70, 90));
        assert!(settings.pointer_allow.matches("Logitech G502"));
        assert!(settings.keyboard_block.matches("MouseDirectionBinder Virtual Keyboard"));
        assert_eq!(settings.idle_release, Duration::from_millis(120));
        assert_eq!(settings.dead_zone_policy, DeadZonePolicy::Release);
    }

    #[test]
    fn test_settings_from_toml() {
        let settings = Settings::from_toml(
            r#"
            [input]
            activation_key = "space"

            [randomizer]
            enabled = true
            minimum = 150
            maximum = 20

            [devices]
            pointer_allow = "Logitech; razer, LOGITECH"
            keyboard_block = "  "

            [engine]
            dead_zone = 1.5
            dead_zone_policy = "hold"
            "#,
        )
        .unwrap();

        assert_eq!(settings.activation_key, Key::SPACE);
        assert!(settings.randomizer_enabled);
        assert_eq!(settings.randomizer_minimum, 100);
        assert_eq!(settings.randomizer_maximum, 20);
        assert_eq!(settings.pointer_allow.len(), 2);
        assert_eq!(settings.keyboard_block, BrandList::parse(DEFAULT_BLOCK));
        assert_eq!(settings.dead_zone, 1.5);
        assert_eq!(settings.dead_zone_policy, DeadZonePolicy::HoldUntilIdle);
    }

    #[test]
    fn test_raw_key_code() {
        let settings = Settings::from_toml("[input]\nactivation_key = \"58\"").unwrap();
        assert_eq!(settings.activation_key, Key(58));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Settings::from_toml("[input]\nactivation_key = \"NOPE\""),
            Err(SettingsError::InvalidValue(_))
        ));
        assert!(matches!(
            Settings::from_toml("[engine]\ndead_zone = -1.0"),
            Err(SettingsError::InvalidValue(_))
        ));
        assert!(matches!(
            Settings::from_toml("[engine]\ndead_zone_policy = \"sticky\""),
            Err(SettingsError::InvalidValue(_))
        ));
        assert!(matches!(
            Settings::from_toml("[randomizer\nenabled = true"),
            Err(SettingsError::TomlParse(_))
        ));
    }

    #[test]
    fn test_default_content_matches_defaults() {
        let settings = Settings::from_toml(&default_settings_content()).unwrap();
        assert_eq!(settings, Settings::new());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::new();
        settings.activation_key = Key::SPACE;
        settings.randomizer_enabled = true;
        settings.pointer_allow = BrandList::parse("Glorious");
        settings.save(&path).unwrap();

        let mut loaded = Settings::from_file(&path).unwrap();
        assert_eq!(loaded.activation_key, Key::SPACE);
        assert!(loaded.randomizer_enabled);
        assert_eq!(loaded.pointer_allow, BrandList::parse("glorious"));
        assert_eq!(loaded.source_path(), Some(path.as_path()));

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "\n[extra]\nignored = 1").unwrap();
        loaded.reload().unwrap();
        assert_eq!(loaded.activation_key, Key::SPACE);
    }

    #[test]
    fn test_engine_options() {
        let mut settings = Settings::new();
        settings.randomizer_minimum = 10;
        settings.randomizer_maximum = 30;
        let options = settings.engine_options();
        assert_eq!(options.randomizer_range, (10, 30));
        assert_eq!(options.left_key, Key::A);
        assert_eq!(options.right_key, Key::D);
        assert_eq!(options.pointer_allow, settings.pointer_allow);
    }
}
