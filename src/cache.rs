// Purpose: Implement cache directory resolution, hashing, and locking primitives.
// Inputs/Outputs: Resolves on-disk cache locations and guards persisted cache writes.
// Invariants: Cache format and locking behavior must prevent partial-write corruption.
// Gotchas: File-open flags and truncation policy are critical for Windows compatibility.

use anyhow::Context;
use directories::ProjectDirs;
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// OS-level cache root, used when a project-local cache cannot be created.
pub fn cache_root() -> anyhow::Result<PathBuf> {
    if let Ok(p) = std::env::var("JOLT_CACHE_DIR") {
        return Ok(PathBuf::from(p));
    }
    let pd =
        ProjectDirs::from("dev", "jolt", "jolt").context("cannot determine OS cache directory")?;
    Ok(pd.cache_dir().to_path_buf())
}

/// Cache directory for a project root: `.jolt/cache` next to `jolt.toml`.
/// `JOLT_CACHE_DIR` still wins so CI can redirect all cache traffic.
pub fn cache_dir_for_root(project_root: &Path) -> anyhow::Result<PathBuf> {
    if let Ok(p) = std::env::var("JOLT_CACHE_DIR") {
        let dir = PathBuf::from(p);
        ensure_dir(&dir)?;
        return Ok(dir);
    }
    let dir = project_root.join(".jolt").join("cache");
    if ensure_dir(&dir).is_ok() {
        return Ok(dir);
    }
    let fallback = cache_root()?;
    ensure_dir(&fallback)?;
    Ok(fallback)
}

pub fn ensure_dir(p: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(p)?;
    Ok(())
}

pub fn hash_bytes_sha256(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

pub fn hash_file_sha256(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(hash_bytes_sha256(&bytes))
}

pub fn trace_enabled() -> bool {
    std::env::var("JOLT_TRACE")
        .ok()
        .as_deref()
        .map(|v| v == "1")
        .unwrap_or(false)
}

pub fn trace(msg: &str) {
    if trace_enabled() {
        eprintln!("[jolt] {}", msg);
    }
}

pub struct CacheLock {
    _file: File,
}

impl CacheLock {
    pub fn acquire(root: &Path) -> anyhow::Result<Self> {
        ensure_dir(root)?;
        let lock_path = root.join("cache.lock");
        let f = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)?;
        f.lock_exclusive()?;
        Ok(Self { _file: f })
    }
}
