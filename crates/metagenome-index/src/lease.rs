// SPDX-License-Identifier: Apache-2.0

//! Build lease: a marker file next to the store holding
//! `{owner_token, acquired_at}`. Created atomically; a marker older than the
//! timeout belongs to a crashed build and may be taken over once.

use metagenome_core::fs::{unique_suffix, write_atomic_file};
use metagenome_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub owner_token: String,
    /// Seconds since the unix epoch.
    pub acquired_at: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[must_use]
pub fn lease_path_for(store: &Path) -> PathBuf {
    let mut name = store.as_os_str().to_os_string();
    name.push(".lease");
    PathBuf::from(name)
}

/// Reads the marker; a marker that is unreadable or half-written falls back
/// to its modification time.
pub fn read_lease(path: &Path) -> Result<Option<LeaseRecord>> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(format!("failed to read lease {}: {e}", path.display()))),
    };
    if let Ok(record) = serde_json::from_slice::<LeaseRecord>(&raw) {
        return Ok(Some(record));
    }
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::io(e.to_string()))?;
    let acquired_at = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok(Some(LeaseRecord {
        owner_token: String::new(),
        acquired_at,
    }))
}

#[must_use]
pub fn is_stale(record: &LeaseRecord, timeout: Duration) -> bool {
    now_secs().saturating_sub(record.acquired_at) > timeout.as_secs()
}

/// True when another worker holds a lease younger than `timeout`.
pub fn is_live(path: &Path, timeout: Duration) -> Result<bool> {
    Ok(read_lease(path)?.is_some_and(|r| !is_stale(&r, timeout)))
}

/// Held build lease; released on drop.
#[derive(Debug)]
pub struct BuildLease {
    path: PathBuf,
    record: LeaseRecord,
    released: bool,
}

impl BuildLease {
    /// `Ok(None)` means a live lease is held elsewhere.
    pub fn try_acquire(path: &Path, timeout: Duration) -> Result<Option<Self>> {
        for attempt in 0..2 {
            match Self::create(path)? {
                Some(lease) => return Ok(Some(lease)),
                None if attempt == 0 => {
                    let Some(existing) = read_lease(path)? else {
                        // Released between our create and read.
                        continue;
                    };
                    if !is_stale(&existing, timeout) {
                        debug!(lease = %path.display(), owner = %existing.owner_token, "build lease held elsewhere");
                        return Ok(None);
                    }
                    warn!(
                        lease = %path.display(),
                        owner = %existing.owner_token,
                        age_secs = now_secs().saturating_sub(existing.acquired_at),
                        "removing stale build lease"
                    );
                    match std::fs::remove_file(path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => return Err(Error::io(e.to_string())),
                    }
                }
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    fn create(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = LeaseRecord {
            owner_token: unique_suffix(),
            acquired_at: now_secs(),
        };
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(mut f) => {
                f.write_all(&serde_json::to_vec(&record)?)?;
                f.sync_all()?;
                Ok(Some(Self {
                    path: path.to_path_buf(),
                    record,
                    released: false,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(Error::io(format!(
                "failed to create lease {}: {e}",
                path.display()
            ))),
        }
    }

    #[must_use]
    pub fn owner_token(&self) -> &str {
        &self.record.owner_token
    }

    /// Pushes `acquired_at` forward. Fails if the marker no longer names us.
    pub fn renew(&mut self) -> Result<()> {
        match read_lease(&self.path)? {
            Some(current) if current.owner_token == self.record.owner_token => {}
            _ => {
                return Err(Error::internal(format!(
                    "build lease {} was taken over",
                    self.path.display()
                )))
            }
        }
        self.record.acquired_at = now_secs();
        write_atomic_file(&self.path, &serde_json::to_vec(&self.record)?)
    }

    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match read_lease(&self.path)? {
            Some(current) if current.owner_token == self.record.owner_token => {
                std::fs::remove_file(&self.path)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Drop for BuildLease {
    fn drop(&mut self) {
        let _ = self.release_inner();
    }
}
