//! User settings persisted between sessions.
//!
//! Settings live in a YAML file inside the add-on's configuration
//! directory; missing files fall back to defaults so a fresh install works
//! without any setup.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::services::export::EXPORT_FOLDER_NAME;

/// User-facing settings consumed by the validation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Enables the USD-oriented warning rules; required for USD, Maya,
    /// and Unreal Engine delivery.
    #[serde(rename = "USD Export", default)]
    pub usd_export: bool,

    /// Name of the export directory created next to the asset file.
    #[serde(rename = "Export Folder", default = "default_export_folder")]
    pub export_folder: String,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            usd_export: false,
            export_folder: default_export_folder(),
            debug_mode: false,
        }
    }
}

fn default_export_folder() -> String {
    EXPORT_FOLDER_NAME.to_string()
}

/// Loads and saves the settings YAML file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl SettingsStore {
    /// Creates a store rooted at `config_dir`, creating the directory if
    /// needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {config_dir}"))?;
        }
        Ok(Self {
            settings_path: config_dir.join("charval Config.yaml"),
            config_dir,
        })
    }

    /// Loads the settings file, or defaults if it does not exist.
    pub fn load(&self) -> Result<SessionSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(SessionSettings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: SessionSettings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Saves the settings file.
    pub fn save(&self, settings: &SessionSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SettingsStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap();
        let store = SettingsStore::new(&config_path).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let (store, _temp_dir) = create_test_store();
        let settings = store.load().unwrap();
        assert_eq!(settings, SessionSettings::default());
        assert_eq!(settings.export_folder, EXPORT_FOLDER_NAME);
    }

    #[test]
    fn settings_round_trip_through_yaml() {
        let (store, _temp_dir) = create_test_store();
        let settings = SessionSettings {
            usd_export: true,
            export_folder: "upload_data".to_string(),
            debug_mode: true,
        };
        store.save(&settings).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let (store, _temp_dir) = create_test_store();
        fs::write(store.config_dir().join("charval Config.yaml"), "USD Export: true\n").unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.usd_export);
        assert_eq!(loaded.export_folder, EXPORT_FOLDER_NAME);
    }
}
