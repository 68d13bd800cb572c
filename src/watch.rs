// Purpose: Run the transpiler continuously, recompiling as sources change on disk.
// Inputs/Outputs: Polls the source tree and applies incremental passes until terminated.
// Invariants: Every iteration leaves the status file and artifacts mutually consistent.
// Gotchas: Transient scan errors must not kill the loop; sources appear and vanish
// mid-edit under most editors' save strategies.

use std::thread;
use std::time::Duration;

use crate::cache::trace;
use crate::transpiler::{PassSummary, Transpiler};

/// One watch iteration: a full incremental pass, with errors downgraded to
/// log lines so the loop survives editor-induced races.
pub fn tick(transpiler: &mut Transpiler) -> Option<PassSummary> {
    match transpiler.pass() {
        Ok(summary) => {
            if summary.changed() {
                trace(&format!(
                    "watch: compiled {} pruned {} failed {}",
                    summary.compiled, summary.pruned, summary.failed
                ));
            }
            Some(summary)
        }
        Err(err) => {
            eprintln!("jolt: watch pass failed: {:#}", err);
            None
        }
    }
}

/// Poll loop. Runs until the process is terminated; each completed pass has
/// already flushed status to disk, so an abrupt exit loses nothing.
pub fn run(transpiler: &mut Transpiler) -> ! {
    let interval = Duration::from_millis(transpiler.config().poll_ms.max(1));
    loop {
        tick(transpiler);
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time drift")
            .as_nanos();
        std::env::temp_dir().join(format!("jolt-{}-{}-{}", prefix, std::process::id(), nonce))
    }

    #[test]
    fn tick_applies_incremental_changes() {
        let root = temp_dir("watch-tick");
        fs::create_dir_all(root.join("axon/js")).expect("mkdir");
        fs::write(
            root.join("jolt.toml"),
            "repos = [\"axon\"]\noutput = \"dist\"\n",
        )
        .expect("config");
        fs::write(root.join("axon/js/a.ts"), "const a = 1;\n").expect("a");

        let mut t = Transpiler::open(&root).expect("open");
        let first = tick(&mut t).expect("tick #1");
        assert_eq!(first.compiled, 1);

        // New file shows up between ticks.
        fs::write(root.join("axon/js/b.ts"), "const b = 2;\n").expect("b");
        let second = tick(&mut t).expect("tick #2");
        assert_eq!(second.compiled, 1);
        assert!(root.join("dist/axon/js/b.js").exists());

        // Deletion is picked up too.
        fs::remove_file(root.join("axon/js/a.ts")).expect("remove");
        let third = tick(&mut t).expect("tick #3");
        assert_eq!(third.pruned, 1);
        assert!(!root.join("dist/axon/js/a.js").exists());
        let _ = fs::remove_dir_all(root);
    }
}
