//! Application file locations.

use std::path::{Path, PathBuf};

use super::error::StoreError;

/// Environment variable overriding the base directory.
pub const HOME_ENV: &str = "FOCUSRUN_HOME";

/// Directory name under the user's home directory.
const DEFAULT_DIR_NAME: &str = ".focusrun";

const SESSIONS_FILE: &str = "sessions.json";
const SETTINGS_FILE: &str = "settings.json";
const SOCKET_FILE: &str = "focusrun.sock";

/// Resolved locations of the documents and the daemon socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    base: PathBuf,
}

impl AppPaths {
    /// Resolves the base directory: `$FOCUSRUN_HOME` if set and non-empty,
    /// otherwise `~/.focusrun`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::HomeDirectoryNotFound` if neither is available.
    pub fn resolve() -> Result<Self, StoreError> {
        if let Some(base) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::from_base(PathBuf::from(base)));
        }
        let home = dirs::home_dir().ok_or(StoreError::HomeDirectoryNotFound)?;
        Ok(Self::from_base(home.join(DEFAULT_DIR_NAME)))
    }

    /// Uses an explicit base directory.
    pub fn from_base(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn sessions_file(&self) -> PathBuf {
        self.base.join(SESSIONS_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base.join(SETTINGS_FILE)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.base.join(SOCKET_FILE)
    }

    /// Creates the base directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created.
    pub fn ensure_base_dir(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.base).map_err(|source| StoreError::Io {
            path: self.base.clone(),
            source,
        })
    }
}
