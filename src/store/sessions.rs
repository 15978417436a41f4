//! Persisted session list.

use std::path::PathBuf;

use tracing::info;

use super::document::JsonDocumentStore;
use super::error::StoreError;
use crate::types::Session;

/// Document key holding the session list.
pub const SESSIONS_KEY: &str = "sessions";

/// Ordered, id-unique collection of sessions backed by `sessions.json`.
///
/// Every mutation is persisted before it returns.
#[derive(Debug)]
pub struct SessionStore {
    document: JsonDocumentStore,
    sessions: Vec<Session>,
}

impl SessionStore {
    /// Opens the store. A missing file is an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let document = JsonDocumentStore::open(path)?;
        let sessions = document.get::<Vec<Session>>(SESSIONS_KEY)?.unwrap_or_default();
        Ok(Self { document, sessions })
    }

    /// All sessions in stored order.
    pub fn list(&self) -> &[Session] {
        &self.sessions
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Finds a session by exact id or by a unique id prefix.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing matches and
    /// `StoreError::AmbiguousId` if the prefix matches several sessions.
    pub fn resolve(&self, query: &str) -> Result<&Session, StoreError> {
        if let Some(session) = self.get(query) {
            return Ok(session);
        }
        if query.is_empty() {
            return Err(StoreError::NotFound(query.to_string()));
        }

        let mut matches = self.sessions.iter().filter(|s| s.id.starts_with(query));
        match (matches.next(), matches.next()) {
            (Some(session), None) => Ok(session),
            (Some(_), Some(_)) => Err(StoreError::AmbiguousId(query.to_string())),
            (None, _) => Err(StoreError::NotFound(query.to_string())),
        }
    }

    /// Appends a session.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidSession` for a blank name or an empty
    /// task list, and `StoreError::DuplicateId` if the id is taken.
    pub fn add(&mut self, mut session: Session) -> Result<(), StoreError> {
        validate(&session)?;
        if self.get(&session.id).is_some() {
            return Err(StoreError::DuplicateId(session.id));
        }
        session.normalize();

        info!("Session added: {} ({})", session.name, session.id);
        self.sessions.push(session);
        self.persist()
    }

    /// Replaces the session with the same id, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no session has this id, or
    /// `StoreError::InvalidSession` as for [`add`](Self::add).
    pub fn update(&mut self, mut session: Session) -> Result<(), StoreError> {
        validate(&session)?;
        let slot = self
            .sessions
            .iter_mut()
            .find(|s| s.id == session.id)
            .ok_or_else(|| StoreError::NotFound(session.id.clone()))?;
        session.normalize();

        info!("Session updated: {} ({})", session.name, session.id);
        *slot = session;
        self.persist()
    }

    /// Removes and returns the session with this id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no session has this id.
    pub fn delete(&mut self, id: &str) -> Result<Session, StoreError> {
        let index = self
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let removed = self.sessions.remove(index);
        info!("Session deleted: {} ({})", removed.name, removed.id);
        self.persist()?;
        Ok(removed)
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        self.document.set(SESSIONS_KEY, &self.sessions)?;
        self.document.save()
    }
}

fn validate(session: &Session) -> Result<(), StoreError> {
    if session.name.trim().is_empty() {
        return Err(StoreError::InvalidSession("名前が空です".to_string()));
    }
    if session.tasks.is_empty() {
        return Err(StoreError::InvalidSession("タスクがありません".to_string()));
    }
    Ok(())
}
