//! JSON file session backend.
//!
//! The record is written to a sibling temp file, fsync'd and renamed over the
//! target, so a crash mid-save leaves either the old or the new session.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Session, SessionStore};
use crate::error::{DroppError, Result};

/// File name used under the platform config directory.
pub const SESSION_FILE_NAME: &str = "session.json";

pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/dropp/session.json`, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("dropp").join(SESSION_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| SESSION_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn store_err(&self, err: impl std::fmt::Display) -> DroppError {
        DroppError::SessionStore(format!("{}: {}", self.path.display(), err))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.store_err(e)),
        };
        let session: Session = serde_json::from_slice(&data).map_err(|e| self.store_err(e))?;
        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.store_err(e))?;
            }
        }

        let data = serde_json::to_vec_pretty(session).map_err(|e| self.store_err(e))?;
        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp).map_err(|e| self.store_err(e))?;
            file.write_all(&data).map_err(|e| self.store_err(e))?;
            file.sync_all().map_err(|e| self.store_err(e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.store_err(e))?;

        log::debug!("Session written to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.store_err(e)),
        }
    }
}
