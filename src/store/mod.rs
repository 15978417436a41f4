//! Durable storage for sessions and settings.
//!
//! Both documents are small JSON files under the application directory
//! (see [`AppPaths`]). The CLI owns all writes; the daemon only reads
//! settings through [`crate::daemon::SettingsSource`].

mod document;
mod error;
mod paths;
mod sessions;
mod settings;

pub use document::JsonDocumentStore;
pub use error::StoreError;
pub use paths::{AppPaths, HOME_ENV};
pub use sessions::{SessionStore, SESSIONS_KEY};
pub use settings::{SettingsCache, SettingsStore, SETTINGS_KEY};
