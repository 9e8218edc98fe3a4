// SPDX-License-Identifier: Apache-2.0

//! Artifact file discipline shared by every index writer: write to a temp path
//! in the destination directory, then publish with a single atomic step so
//! readers observe either nothing or a complete file.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per process and call, so concurrent writers never share a temp file.
#[must_use]
pub fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!(
        "{}.{}.{:08x}",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
        nanos
    )
}

/// Temp path next to `target` (same filesystem, so the publish step is a
/// rename/link rather than a copy).
pub fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let parent = target
        .parent()
        .ok_or_else(|| Error::internal("artifact path missing parent"))?;
    let name = target
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::internal("artifact path missing file name"))?;
    Ok(parent.join(format!(".{name}.tmp.{}", unique_suffix())))
}

pub fn write_atomic_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::internal("atomic write missing parent"))?;
    std::fs::create_dir_all(parent)?;
    let tmp = temp_path_for(path)?;
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Moves a finished temp artifact to its canonical path without ever
/// replacing an artifact another writer already published.
///
/// Returns `true` when this call published the artifact and `false` when the
/// canonical path was already taken (the temp file is discarded either way).
pub fn publish_no_clobber(tmp: &Path, canonical: &Path) -> Result<bool> {
    match std::fs::hard_link(tmp, canonical) {
        Ok(()) => {
            std::fs::remove_file(tmp)?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            let _ = std::fs::remove_file(tmp);
            Ok(false)
        }
        Err(_) if !canonical.exists() => {
            // Filesystems without hard links.
            std::fs::rename(tmp, canonical)?;
            Ok(true)
        }
        Err(_) => {
            let _ = std::fs::remove_file(tmp);
            Ok(false)
        }
    }
}

/// Adds `link` as a second directory entry for the bytes at `existing`.
/// Returns `false` when `link` already exists.
pub fn link_shared(existing: &Path, link: &Path) -> Result<bool> {
    match std::fs::hard_link(existing, link) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(Error::io(format!(
            "failed to link {} -> {}: {e}",
            link.display(),
            existing.display()
        ))),
    }
}
