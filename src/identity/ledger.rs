use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::IdentityError;
use crate::identity::sources::ProxyCandidate;

/// File-backed, append-only records of proxies that are permanently broken
/// (`invalid_proxies.json`) or already assigned this process (`used_proxies.json`).
/// Both are JSON arrays of `"address:port"` strings, loaded fresh on every
/// call so concurrent crawl runs in the same process see each other's marks.
#[derive(Debug, Clone)]
pub struct ProxyLedger {
    invalid_path: PathBuf,
    used_path: PathBuf,
}

impl ProxyLedger {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            invalid_path: data_dir.join("invalid_proxies.json"),
            used_path: data_dir.join("used_proxies.json"),
        }
    }

    pub fn load_invalid(&self) -> Result<Vec<String>, IdentityError> {
        load_keys(&self.invalid_path)
    }

    pub fn load_used(&self) -> Result<Vec<String>, IdentityError> {
        load_keys(&self.used_path)
    }

    /// Permanently exclude a candidate from future selection.
    pub fn mark_invalid(&self, candidate: &ProxyCandidate) -> Result<(), IdentityError> {
        debug!("Blacklisting proxy {}", candidate.key());
        append_key(&self.invalid_path, candidate.key())
    }

    /// Record a candidate as assigned for the remainder of the process.
    pub fn mark_used(&self, candidate: &ProxyCandidate) -> Result<(), IdentityError> {
        debug!("Marking proxy {} as used", candidate.key());
        append_key(&self.used_path, candidate.key())
    }

    /// True when the candidate appears in either list.
    pub fn is_excluded(
        &self,
        candidate: &ProxyCandidate,
        invalid: &[String],
        used: &[String],
    ) -> bool {
        let key = candidate.key();
        invalid.contains(&key) || used.contains(&key)
    }
}

fn load_keys(path: &Path) -> Result<Vec<String>, IdentityError> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(IdentityError::Ledger(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };

    if data.trim().is_empty() {
        warn!("Ledger file {} is empty", path.display());
        return Ok(Vec::new());
    }

    serde_json::from_str(&data).map_err(|e| {
        IdentityError::Ledger(format!("failed to parse {}: {e}", path.display()))
    })
}

fn append_key(path: &Path, key: String) -> Result<(), IdentityError> {
    let mut keys = load_keys(path)?;
    if !keys.contains(&key) {
        keys.push(key);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            IdentityError::Ledger(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let json = serde_json::to_string_pretty(&keys)
        .map_err(|e| IdentityError::Ledger(e.to_string()))?;

    std::fs::write(path, json).map_err(|e| {
        IdentityError::Ledger(format!("failed to write {}: {e}", path.display()))
    })
}
