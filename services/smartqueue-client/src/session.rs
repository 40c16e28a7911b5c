//! Session-scoped storage of the customer's active appointment id
//!
//! A session holds at most one id. Setting a new id replaces the previous one.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

/// Key under which the active appointment id is stored
pub const SESSION_KEY: &str = "appointmentId";

/// Storage for the active appointment id
pub trait SessionStore: Send + Sync {
    /// The stored appointment id, if any
    fn active_appointment(&self) -> Result<Option<String>>;

    /// Store `id` as the active appointment, replacing any previous one
    fn set_active_appointment(&self, id: &str) -> Result<()>;

    /// Forget the active appointment
    fn clear(&self) -> Result<()>;
}

/// In-process session, lost when the process exits
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    id: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: &str) -> Self {
        Self {
            id: Mutex::new(Some(id.to_string())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.id
            .lock()
            .map_err(|_| QueueError::Session("session lock poisoned".to_string()))
    }
}

impl SessionStore for MemorySessionStore {
    fn active_appointment(&self) -> Result<Option<String>> {
        Ok(self.lock()?.clone())
    }

    fn set_active_appointment(&self, id: &str) -> Result<()> {
        *self.lock()? = Some(id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(rename = "appointmentId", default, skip_serializing_if = "Option::is_none")]
    appointment_id: Option<String>,
}

/// Session persisted as a small JSON file so it survives restarts
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<SessionFile> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(SessionFile::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                QueueError::Session(format!("Corrupt session file {:?}: {}", self.path, e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionFile::default()),
            Err(e) => Err(QueueError::Io(e)),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn active_appointment(&self) -> Result<Option<String>> {
        Ok(self.read()?.appointment_id)
    }

    fn set_active_appointment(&self, id: &str) -> Result<()> {
        let file = SessionFile {
            appointment_id: Some(id.to_string()),
        };
        std::fs::write(&self.path, serde_json::to_string(&file)?)?;
        tracing::debug!("Stored {} in {:?}", SESSION_KEY, self.path);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Removed session file {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(QueueError::Io(e)),
        }
    }
}
