use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf, MAIN_SEPARATOR_STR},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const MANIFEST_FILE_NAME: &str = "composer.json";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// The project the user picked: its directory and the path of its manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub dir: PathBuf,
    #[serde(rename = "fileName")]
    pub file_name: PathBuf,
}

impl Settings {
    /// Build settings from a selected manifest path. Returns `None` when the
    /// file is not named `composer.json`.
    pub fn from_manifest(file_name: &Path) -> Option<Self> {
        if file_name.file_name()? != MANIFEST_FILE_NAME {
            return None;
        }

        // keep the trailing separator so `dir` reads as a directory
        let mut dir: OsString = file_name.parent()?.as_os_str().to_owned();
        if dir.is_empty() {
            dir.push(".");
        }
        if !dir.to_string_lossy().ends_with(MAIN_SEPARATOR_STR) {
            dir.push(MAIN_SEPARATOR_STR);
        }

        Some(Self {
            dir: PathBuf::from(dir),
            file_name: file_name.to_path_buf(),
        })
    }
}

/// Reads and writes the persisted [`Settings`] file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/rcomposer/settings.json`, or `settings.json` next to the
    /// executable when no config directory is known.
    pub fn default_path() -> PathBuf {
        if let Some(config) = dirs::config_dir() {
            return config.join("rcomposer").join(SETTINGS_FILE_NAME);
        }

        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_default()
            .join(SETTINGS_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt settings both mean "nothing selected yet".
    pub fn load(&self) -> Option<Settings> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                debug!(path = %self.path.display(), %err, "no settings file");
                return None;
            }
        };

        let settings: Settings = match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "ignoring corrupt settings file");
                return None;
            }
        };

        // `fileName` must be a composer.json and `dir` its parent
        if Settings::from_manifest(&settings.file_name).as_ref() != Some(&settings) {
            warn!(path = %self.path.display(), ?settings, "ignoring inconsistent settings file");
            return None;
        }

        Some(settings)
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string(settings)?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))?;

        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    /// Deleting settings that were never written is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "settings removed");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}
