// Purpose: Persist the per-file transpile status map between runs.
// Inputs/Outputs: Loads/stores status.json in the project cache directory.
// Invariants: An unreadable or mismatched status file yields an empty map, never an error.
// Gotchas: Entries must only be written after the target artifact is fully on disk.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::{CacheLock, ensure_dir, trace};

pub const STATUS_SCHEMA: u32 = 1;
const STATUS_FILE: &str = "status.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusEntry {
    pub source_hash: String,
    pub target_milliseconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusDocument {
    schema: u32,
    fingerprint: String,
    entries: BTreeMap<String, StatusEntry>,
}

/// In-memory status map bound to its on-disk location.
#[derive(Debug)]
pub struct StatusMap {
    cache_dir: PathBuf,
    fingerprint: String,
    pub entries: BTreeMap<String, StatusEntry>,
}

impl StatusMap {
    /// Load the persisted map, discarding it wholesale on schema or compiler
    /// fingerprint mismatch. Corruption is a cache miss, not a failure.
    pub fn load(cache_dir: &Path, fingerprint: &str) -> Self {
        let path = cache_dir.join(STATUS_FILE);
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<StatusDocument>(&text) {
                Ok(doc) if doc.schema != STATUS_SCHEMA => {
                    trace(&format!(
                        "status schema {} != {}; starting empty",
                        doc.schema, STATUS_SCHEMA
                    ));
                    BTreeMap::new()
                }
                Ok(doc) if doc.fingerprint != fingerprint => {
                    trace("compiler fingerprint changed; starting empty");
                    BTreeMap::new()
                }
                Ok(doc) => doc.entries,
                Err(err) => {
                    trace(&format!(
                        "failed to decode {}: {}; starting empty",
                        path.display(),
                        err
                    ));
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self {
            cache_dir: cache_dir.to_path_buf(),
            fingerprint: fingerprint.to_string(),
            entries,
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        ensure_dir(&self.cache_dir)?;
        let _lock = CacheLock::acquire(&self.cache_dir)?;
        let doc = StatusDocument {
            schema: STATUS_SCHEMA,
            fingerprint: self.fingerprint.clone(),
            entries: self.entries.clone(),
        };
        let path = self.status_path();
        fs::write(&path, serde_json::to_string_pretty(&doc)?)
            .with_context(|| format!("write {}", path.display()))?;
        trace(&format!(
            "status store: {} ({} entries)",
            path.display(),
            self.entries.len()
        ));
        Ok(())
    }

    pub fn status_path(&self) -> PathBuf {
        self.cache_dir.join(STATUS_FILE)
    }

    pub fn get(&self, key: &str) -> Option<&StatusEntry> {
        self.entries.get(key)
    }

    pub fn record(&mut self, key: String, source_hash: String, target_milliseconds: u64) {
        self.entries.insert(
            key,
            StatusEntry {
                source_hash,
                target_milliseconds,
            },
        );
    }

    pub fn forget(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }
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
    fn roundtrip_preserves_entries() {
        let dir = temp_dir("status-roundtrip");
        let mut map = StatusMap::load(&dir, "fp-1");
        map.record("/src/a.ts".into(), "abc".into(), 42);
        map.record("/src/b.ts".into(), "def".into(), 43);
        map.save().expect("save");

        let loaded = StatusMap::load(&dir, "fp-1");
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(
            loaded.get("/src/a.ts"),
            Some(&StatusEntry {
                source_hash: "abc".into(),
                target_milliseconds: 42
            })
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn fingerprint_mismatch_discards_entries() {
        let dir = temp_dir("status-fp");
        let mut map = StatusMap::load(&dir, "fp-1");
        map.record("/src/a.ts".into(), "abc".into(), 42);
        map.save().expect("save");

        let loaded = StatusMap::load(&dir, "fp-2");
        assert!(loaded.entries.is_empty());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_status_file_starts_empty() {
        let dir = temp_dir("status-corrupt");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join(STATUS_FILE), "{not json").expect("write");

        let loaded = StatusMap::load(&dir, "fp-1");
        assert!(loaded.entries.is_empty());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn forget_removes_only_named_entry() {
        let dir = temp_dir("status-forget");
        let mut map = StatusMap::load(&dir, "fp-1");
        map.record("/src/a.ts".into(), "abc".into(), 1);
        map.record("/src/b.ts".into(), "def".into(), 2);
        assert!(map.forget("/src/a.ts"));
        assert!(!map.forget("/src/a.ts"));
        assert!(map.get("/src/b.ts").is_some());
        let _ = fs::remove_dir_all(dir);
    }
}
