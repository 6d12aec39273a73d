//! Preset and settings persistence.
//!
//! The host client owns the actual store (browser storage, config
//! directory, whatever); this module owns the blob formats: a
//! versioned JSON library of named roll presets and a small settings
//! blob carrying the active crit behavior. File-backed save/load is
//! provided as a convenience for hosts with a filesystem.

use crate::crit::CritBehavior;
use crate::groups::DiceGroup;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current preset-library blob version.
const LIBRARY_VERSION: u32 = 1;

/// Current settings blob version.
const SETTINGS_VERSION: u32 = 1;

/// A named, reusable roll configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollPreset {
    pub name: String,
    pub groups: Vec<DiceGroup>,
}

impl RollPreset {
    pub fn new(name: impl Into<String>, groups: Vec<DiceGroup>) -> Self {
        Self {
            name: name.into(),
            groups,
        }
    }
}

/// Sort order for the preset list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    NameAscending,
    NameDescending,
}

/// The user's saved roll presets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetLibrary {
    version: u32,
    pub presets: Vec<RollPreset>,
}

impl Default for PresetLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl PresetLibrary {
    pub fn new() -> Self {
        Self {
            version: LIBRARY_VERSION,
            presets: Vec::new(),
        }
    }

    /// Add a preset, replacing any existing preset with the same name.
    pub fn upsert(&mut self, preset: RollPreset) {
        if let Some(existing) = self.presets.iter_mut().find(|p| p.name == preset.name) {
            *existing = preset;
        } else {
            self.presets.push(preset);
        }
    }

    pub fn get(&self, name: &str) -> Option<&RollPreset> {
        self.presets.iter().find(|p| p.name == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<RollPreset> {
        let index = self.presets.iter().position(|p| p.name == name)?;
        Some(self.presets.remove(index))
    }

    /// Sort the list for display. Case-insensitive on names.
    pub fn sort(&mut self, order: SortOrder) {
        self.presets
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        if order == SortOrder::NameDescending {
            self.presets.reverse();
        }
    }

    /// Serialize to the blob handed to the host's store.
    pub fn to_blob(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a stored blob. A blank blob (nothing saved
    /// yet) yields an empty library.
    pub fn from_blob(blob: &str) -> Result<Self, PersistError> {
        if blob.trim().is_empty() {
            return Ok(Self::new());
        }
        let library: Self = serde_json::from_str(blob)?;
        if library.version != LIBRARY_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: LIBRARY_VERSION,
                found: library.version,
            });
        }
        Ok(library)
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        Self::from_blob(&content)
    }
}

/// Panel settings persisted alongside the presets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSettings {
    version: u32,
    pub crit_behavior: CritBehavior,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            crit_behavior: CritBehavior::None,
        }
    }
}

impl PanelSettings {
    pub fn to_blob(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a stored blob, defaulting when nothing has
    /// been saved yet.
    pub fn from_blob(blob: &str) -> Result<Self, PersistError> {
        if blob.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_json::from_str(blob)?;
        if settings.version != SETTINGS_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SETTINGS_VERSION,
                found: settings.version,
            });
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::DieKind;

    fn sample_preset(name: &str) -> RollPreset {
        RollPreset::new(
            name,
            vec![DiceGroup::new("Damage")
                .with_count(DieKind::D6, 2)
                .with_modifier(3)],
        )
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let mut library = PresetLibrary::new();
        library.upsert(sample_preset("Sword"));
        library.upsert(sample_preset("Bow"));
        assert_eq!(library.presets.len(), 2);

        let mut replacement = sample_preset("Sword");
        replacement.groups[0].modifier = 7;
        library.upsert(replacement);
        assert_eq!(library.presets.len(), 2);
        assert_eq!(library.get("Sword").unwrap().groups[0].modifier, 7);
    }

    #[test]
    fn test_remove() {
        let mut library = PresetLibrary::new();
        library.upsert(sample_preset("Sword"));
        assert!(library.remove("Sword").is_some());
        assert!(library.remove("Sword").is_none());
        assert!(library.presets.is_empty());
    }

    #[test]
    fn test_sort_is_case_insensitive() {
        let mut library = PresetLibrary::new();
        library.upsert(sample_preset("sword"));
        library.upsert(sample_preset("Axe"));
        library.upsert(sample_preset("Bow"));

        library.sort(SortOrder::NameAscending);
        let names: Vec<&str> = library.presets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Axe", "Bow", "sword"]);

        library.sort(SortOrder::NameDescending);
        let names: Vec<&str> = library.presets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["sword", "Bow", "Axe"]);
    }

    #[test]
    fn test_blob_round_trip() {
        let mut library = PresetLibrary::new();
        library.upsert(sample_preset("Sword"));
        let blob = library.to_blob().unwrap();
        let back = PresetLibrary::from_blob(&blob).unwrap();
        assert_eq!(back, library);
    }

    #[test]
    fn test_blank_blob_is_empty_library() {
        let library = PresetLibrary::from_blob("").unwrap();
        assert!(library.presets.is_empty());
        let library = PresetLibrary::from_blob("  \n").unwrap();
        assert!(library.presets.is_empty());
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let blob = r#"{"version":99,"presets":[]}"#;
        let err = PresetLibrary::from_blob(blob).unwrap_err();
        assert!(matches!(
            err,
            PersistError::VersionMismatch {
                expected: 1,
                found: 99
            }
        ));
    }

    #[test]
    fn test_settings_blob_round_trip() {
        let settings = PanelSettings {
            crit_behavior: CritBehavior::MaxPlus,
            ..Default::default()
        };
        let blob = settings.to_blob().unwrap();
        assert!(blob.contains("max-plus"));
        let back = PanelSettings::from_blob(&blob).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_settings_default_on_blank_blob() {
        let settings = PanelSettings::from_blob("").unwrap();
        assert_eq!(settings.crit_behavior, CritBehavior::None);
    }

    #[test]
    fn test_settings_blob_with_unknown_behavior_degrades_to_none() {
        // A newer client may have saved a behavior this version does
        // not know; the load must still succeed.
        let settings =
            PanelSettings::from_blob(r#"{"version":1,"critBehavior":"quintuple-total"}"#).unwrap();
        assert_eq!(settings.crit_behavior, CritBehavior::None);
    }

    #[tokio::test]
    async fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");

        let mut library = PresetLibrary::new();
        library.upsert(sample_preset("Sword"));
        library.save_json(&path).await.unwrap();

        let back = PresetLibrary::load_json(&path).await.unwrap();
        assert_eq!(back, library);
    }
}
