//! Keyed JSON document store.
//!
//! A document is a JSON object mapping keys to values. The whole document
//! is rewritten on `save`, via a temporary file and a rename so readers
//! never observe a half-written file.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::error::StoreError;

/// A JSON object file of key -> value.
#[derive(Debug, Clone)]
pub struct JsonDocumentStore {
    path: PathBuf,
    document: Map<String, Value>,
}

impl JsonDocumentStore {
    /// Opens a document. A missing or empty file is an empty document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file cannot be read and
    /// `StoreError::Parse` if it is not a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let document = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Map::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Parse` if the value has an unexpected shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.document.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|source| StoreError::Parse {
                    path: self.path.clone(),
                    source,
                }),
        }
    }

    /// Stores `value` under `key` in memory. Call [`save`](Self::save) to persist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Parse` if the value cannot be serialized.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        self.document.insert(key.to_string(), value);
        Ok(())
    }

    /// Removes `key`. Returns true if it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.document.remove(key).is_some()
    }

    /// Writes the document to disk, creating the parent directory as needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file cannot be written.
    pub fn save(&self) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let content =
            serde_json::to_string_pretty(&self.document).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content).map_err(io_error)?;
        std::fs::rename(&tmp_path, &self.path).map_err(io_error)?;

        debug!("Saved {}", self.path.display());
        Ok(())
    }
}
