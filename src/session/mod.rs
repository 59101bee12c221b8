//! Per-URL cookie and local-storage persistence, so revisits resume
//! continuity (consent banners, soft logins) instead of starting cold.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::SessionError;

/// A browser cookie, decoupled from the automation driver's own type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Unix timestamp, absent for session cookies
    #[serde(default)]
    pub expiry: Option<i64>,
}

/// Saved state for one URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub cookies: Vec<Cookie>,
    pub local_storage: HashMap<String, String>,
}

/// Filesystem-backed session store keyed by an encoded URL.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("sessions"),
        }
    }

    fn path_for(&self, url: &str) -> PathBuf {
        self.dir
            .join(format!("session_{}.json", urlencoding::encode(url)))
    }

    /// Whole-file overwrite; intermediate directories are created as needed.
    pub fn save(&self, url: &str, record: &SessionRecord) -> Result<(), SessionError> {
        let path = self.path_for(url);

        std::fs::create_dir_all(&self.dir).map_err(|e| SessionError::Write {
            path: self.dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let json = serde_json::to_string_pretty(record).map_err(|e| SessionError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        std::fs::write(&path, json).map_err(|e| SessionError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!("Session saved to {}", path.display());
        Ok(())
    }

    /// `Ok(None)` when no prior record exists; any other read failure is an
    /// error for the caller to degrade on.
    pub fn load(&self, url: &str) -> Result<Option<SessionRecord>, SessionError> {
        let path = self.path_for(url);

        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::Read {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let record = serde_json::from_str(&data).map_err(|e| SessionError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Some(record))
    }
}
