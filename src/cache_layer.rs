// Purpose: Maintain the last-changed stamp consumed by downstream dev tooling.
// Inputs/Outputs: Reads/writes cache-layer.json under the project cache directory.
// Invariants: The stamp never decreases, even across clock adjustments.
// Gotchas: Consumers poll this file; an undecodable stamp must read as "unknown", not panic.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cache::{CacheLock, ensure_dir, trace};

pub const STAMP_SCHEMA: u32 = 1;
const STAMP_FILE: &str = "cache-layer.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stamp {
    schema: u32,
    last_changed_milliseconds: u64,
}

/// Timestamp-based invalidation signal. External consumers (a dev server,
/// typically) compare the stored value against their own snapshot and drop
/// in-memory caches when it moves.
#[derive(Debug)]
pub struct CacheLayer {
    cache_dir: PathBuf,
}

impl CacheLayer {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    pub fn stamp_path(&self) -> PathBuf {
        self.cache_dir.join(STAMP_FILE)
    }

    /// Bump the stamp to "now", clamped to be monotone non-decreasing.
    /// Returns the value written.
    pub fn touch(&self) -> anyhow::Result<u64> {
        ensure_dir(&self.cache_dir)?;
        let _lock = CacheLock::acquire(&self.cache_dir)?;
        let now = now_millis();
        let value = match self.read_stamp() {
            Some(prev) if prev >= now => prev + 1,
            _ => now,
        };
        let stamp = Stamp {
            schema: STAMP_SCHEMA,
            last_changed_milliseconds: value,
        };
        let path = self.stamp_path();
        fs::write(&path, serde_json::to_string_pretty(&stamp)?)
            .with_context(|| format!("write {}", path.display()))?;
        trace(&format!("cache layer touch: {}", value));
        Ok(value)
    }

    /// Last-changed time in ms since epoch, or None when the stamp is absent
    /// or unreadable.
    pub fn last_changed(&self) -> Option<u64> {
        self.read_stamp()
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        let path = self.stamp_path();
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
        }
        Ok(())
    }

    fn read_stamp(&self) -> Option<u64> {
        let text = fs::read_to_string(self.stamp_path()).ok()?;
        let stamp = serde_json::from_str::<Stamp>(&text).ok()?;
        if stamp.schema != STAMP_SCHEMA {
            return None;
        }
        Some(stamp.last_changed_milliseconds)
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time drift")
            .as_nanos();
        std::env::temp_dir().join(format!("jolt-{}-{}-{}", prefix, std::process::id(), nonce))
    }

    #[test]
    fn absent_stamp_reads_as_none() {
        let dir = temp_dir("stamp-absent");
        let layer = CacheLayer::new(&dir);
        assert_eq!(layer.last_changed(), None);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn touch_then_read_roundtrips() {
        let dir = temp_dir("stamp-roundtrip");
        let layer = CacheLayer::new(&dir);
        let written = layer.touch().expect("touch");
        assert_eq!(layer.last_changed(), Some(written));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn repeated_touches_are_strictly_monotone() {
        let dir = temp_dir("stamp-monotone");
        let layer = CacheLayer::new(&dir);
        let a = layer.touch().expect("touch #1");
        let b = layer.touch().expect("touch #2");
        let c = layer.touch().expect("touch #3");
        assert!(b > a, "stamp must advance ({} then {})", a, b);
        assert!(c > b, "stamp must advance ({} then {})", b, c);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn clear_removes_stamp_and_tolerates_repeats() {
        let dir = temp_dir("stamp-clear");
        let layer = CacheLayer::new(&dir);
        layer.touch().expect("touch");
        layer.clear().expect("clear");
        assert_eq!(layer.last_changed(), None);
        layer.clear().expect("clear again");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_stamp_reads_as_none() {
        let dir = temp_dir("stamp-corrupt");
        fs::create_dir_all(&dir).expect("mkdir");
        let layer = CacheLayer::new(&dir);
        fs::write(layer.stamp_path(), "oops").expect("write");
        assert_eq!(layer.last_changed(), None);
        let _ = fs::remove_dir_all(dir);
    }
}
