// Command Settings - Remembered per-command values
// Values are passed into each command and handed back for the caller to keep

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Key the decimate command's settings are stored under
pub const DECIMATE_SETTINGS_KEY: &str = "decimate";

/// Key the reclock command's settings are stored under
pub const RECLOCK_SETTINGS_KEY: &str = "reclock";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Settings for the decimate command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimateSettings {
    /// Minimum time between kept points, in milliseconds
    pub interval_ms: f64,

    /// Skip tracks that are not editable
    pub editable_only: bool,
}

impl Default for DecimateSettings {
    fn default() -> Self {
        DecimateSettings {
            interval_ms: 10.0,
            editable_only: true,
        }
    }
}

/// Settings for the reclock command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReclockSettings {
    /// Track whose note onsets define the grid
    pub guide_track: usize,
}

impl Default for ReclockSettings {
    fn default() -> Self {
        ReclockSettings { guide_track: 1 }
    }
}

/// Keyed store of command settings
///
/// Holds raw JSON so settings of different commands can live side by side and
/// be persisted by the caller in one piece.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandSettings {
    values: BTreeMap<String, serde_json::Value>,
}

impl CommandSettings {
    pub fn new() -> Self {
        CommandSettings::default()
    }

    /// Settings stored under `key`, or `None` if nothing was stored
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SettingsError> {
        match self.values.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Settings stored under `key`, falling back to defaults if missing or unreadable
    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.get(key) {
            Ok(Some(settings)) => settings,
            Ok(None) => T::default(),
            Err(e) => {
                log::warn!("Ignoring stored '{}' settings: {}", key, e);
                T::default()
            }
        }
    }

    /// Remember settings under `key`
    pub fn store<T: Serialize>(&mut self, key: &str, settings: &T) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), serde_json::to_value(settings)?);
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_loads_defaults() {
        let settings = CommandSettings::new();
        let decimate: DecimateSettings = settings.load(DECIMATE_SETTINGS_KEY);
        assert_eq!(decimate, DecimateSettings::default());
    }

    #[test]
    fn test_store_then_load() {
        let mut settings = CommandSettings::new();
        let reclock = ReclockSettings { guide_track: 3 };
        settings.store(RECLOCK_SETTINGS_KEY, &reclock).unwrap();

        let loaded: ReclockSettings = settings.load(RECLOCK_SETTINGS_KEY);
        assert_eq!(loaded.guide_track, 3);
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let json = r#"{"decimate": {"interval_ms": 25.0}}"#;
        let settings = CommandSettings::from_json(json).unwrap();
        let decimate: DecimateSettings = settings.load(DECIMATE_SETTINGS_KEY);
        assert!((decimate.interval_ms - 25.0).abs() < 1e-9);
        assert!(decimate.editable_only);
    }

    #[test]
    fn test_unreadable_settings_fall_back() {
        let json = r#"{"reclock": {"guide_track": "bass"}}"#;
        let settings = CommandSettings::from_json(json).unwrap();
        assert!(settings.get::<ReclockSettings>(RECLOCK_SETTINGS_KEY).is_err());

        let reclock: ReclockSettings = settings.load(RECLOCK_SETTINGS_KEY);
        assert_eq!(reclock, ReclockSettings::default());
    }

    #[test]
    fn test_json_persistence() {
        let mut settings = CommandSettings::new();
        let decimate = DecimateSettings {
            interval_ms: 50.0,
            editable_only: false,
        };
        settings.store(DECIMATE_SETTINGS_KEY, &decimate).unwrap();

        let restored = CommandSettings::from_json(&settings.to_json().unwrap()).unwrap();
        assert_eq!(restored, settings);
    }
}
