//! Persisted user settings.
//!
//! The CLI edits them through [`SettingsStore`]. The daemon reads them from
//! a [`SettingsCache`] filled at startup and refreshed on a
//! `reload_settings` request, so the engine never touches the disk.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::{debug, info};

use super::document::JsonDocumentStore;
use super::error::StoreError;
use crate::daemon::SettingsSource;
use crate::types::Settings;

/// Document key holding the settings record.
pub const SETTINGS_KEY: &str = "settings";

/// Settings record backed by `settings.json`.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Loads the settings, falling back to defaults when the document or
    /// any field is missing. Loaded values are clamped into range.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let settings = read_settings(&path)?;
        Ok(Self { path, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies a mutation, clamps the result, and persists it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written. The in-memory
    /// settings are left unchanged in that case.
    pub fn update<F>(&mut self, mutate: F) -> Result<&Settings, StoreError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut next = self.settings.clone();
        mutate(&mut next);
        next.normalize();

        let mut document = JsonDocumentStore::open(&self.path)?;
        document.set(SETTINGS_KEY, &next)?;
        document.save()?;

        info!("Settings saved: {}", self.path.display());
        self.settings = next;
        Ok(&self.settings)
    }
}

// ============================================================================
// SettingsCache
// ============================================================================

/// Daemon-side copy of the settings.
///
/// Reads are in-memory; only [`SettingsCache::reload`] touches the file.
#[derive(Debug)]
pub struct SettingsCache {
    path: PathBuf,
    settings: RwLock<Settings>,
}

impl SettingsCache {
    /// Loads the settings once.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let settings = read_settings(&path)?;
        Ok(Self {
            path,
            settings: RwLock::new(settings),
        })
    }

    /// Re-reads the document. Blocking; run it off the async workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or parsed. The
    /// cached values are kept in that case.
    pub fn reload(&self) -> Result<Settings, StoreError> {
        let settings = read_settings(&self.path)?;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        debug!("Settings reloaded: {}", self.path.display());
        Ok(settings)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsSource for SettingsCache {
    fn current(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn read_settings(path: &Path) -> Result<Settings, StoreError> {
    let document = JsonDocumentStore::open(path)?;
    let mut settings = document
        .get::<Settings>(SETTINGS_KEY)?
        .unwrap_or_default();
    settings.normalize();
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_document_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn test_update_persists_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = SettingsStore::load(&path).unwrap();
        store
            .update(|s| {
                s.activity_monitoring = true;
                s.activity_threshold = 10;
                s.music_volume = 0.8;
            })
            .unwrap();

        let reloaded = SettingsStore::load(&path).unwrap();
        assert!(reloaded.settings().activity_monitoring);
        assert_eq!(reloaded.settings().activity_threshold, 60);
        assert_eq!(reloaded.settings().music_volume, 0.8);
    }

    #[test]
    fn test_camel_case_document_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"settings":{"activityMonitoring":true,"activityThreshold":120,"musicFilePath":"/tmp/a.mp3","musicAutoPlay":true}}"#,
        )
        .unwrap();

        let store = SettingsStore::load(&path).unwrap();
        let settings = store.settings();
        assert_eq!(settings.activity_threshold, 120);
        assert_eq!(settings.autoplay_track(), Some("/tmp/a.mp3"));
        assert_eq!(settings.music_volume, 0.5);
    }

    mod cache_tests {
        use super::*;

        #[test]
        fn test_cache_sees_changes_only_after_reload() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("settings.json");

            let cache = SettingsCache::load(&path).unwrap();
            let mut cli_view = SettingsStore::load(&path).unwrap();
            cli_view.update(|s| s.music_loop = true).unwrap();

            assert!(!cache.current().music_loop);
            let reloaded = cache.reload().unwrap();
            assert!(reloaded.music_loop);
            assert!(cache.current().music_loop);
        }

        #[test]
        fn test_current_does_not_read_the_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("settings.json");

            let mut store = SettingsStore::load(&path).unwrap();
            store.update(|s| s.music_volume = 0.2).unwrap();
            let cache = SettingsCache::load(&path).unwrap();
            std::fs::remove_file(&path).unwrap();
            std::fs::create_dir(&path).unwrap();

            assert_eq!(cache.current().music_volume, 0.2);
        }

        #[test]
        fn test_failed_reload_keeps_cached_values() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("settings.json");

            let mut store = SettingsStore::load(&path).unwrap();
            store.update(|s| s.music_volume = 0.2).unwrap();
            let cache = SettingsCache::load(&path).unwrap();
            std::fs::write(&path, "{ not json").unwrap();

            assert!(cache.reload().is_err());
            assert_eq!(cache.current().music_volume, 0.2);
        }
    }
}
