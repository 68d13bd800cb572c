// Purpose: Drive incremental transpilation of scanned sources through an external compiler.
// Inputs/Outputs: Walks configured repos, compiles stale files, and updates status + cache layer.
// Invariants: A status entry is recorded only after its target artifact is fully written.
// Gotchas: Target mtime is re-read after the write; recording a pre-write time would
// make every artifact look touched on the next pass.

use anyhow::{Context, bail};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::UNIX_EPOCH;

use crate::cache::{cache_dir_for_root, hash_file_sha256, trace};
use crate::cache_layer::CacheLayer;
use crate::config::{Config, compiler_fingerprint};
use crate::paths::{normalize_path, target_for};
use crate::status::StatusMap;

/// Seam between the cache and whatever actually transpiles a file.
pub trait Compiler {
    fn compile(&self, source: &Path, target: &Path) -> anyhow::Result<()>;
}

/// Shells out to the configured program; `{input}` in an arg is replaced by
/// the source path, and the transpiled output is read from stdout.
pub struct ExternalCompiler {
    program: String,
    args: Vec<String>,
}

impl ExternalCompiler {
    pub fn new(program: &str, args: &[String]) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
        }
    }
}

impl Compiler for ExternalCompiler {
    fn compile(&self, source: &Path, target: &Path) -> anyhow::Result<()> {
        let mut cmd = Command::new(&self.program);
        let mut saw_input = false;
        for arg in &self.args {
            if arg == "{input}" {
                cmd.arg(source);
                saw_input = true;
            } else {
                cmd.arg(arg);
            }
        }
        if !saw_input {
            cmd.arg(source);
        }
        let out = cmd
            .output()
            .with_context(|| format!("failed to execute {}", self.program))?;
        if !out.status.success() {
            bail!(
                "{} failed for {}: {}",
                self.program,
                source.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        write_target(target, &out.stdout)
    }
}

/// Copies source bytes through unchanged. Selected by `program = "passthrough"`;
/// useful for dry runs and exercised heavily by tests.
pub struct PassthroughCompiler;

impl Compiler for PassthroughCompiler {
    fn compile(&self, source: &Path, target: &Path) -> anyhow::Result<()> {
        let bytes = fs::read(source).with_context(|| format!("read {}", source.display()))?;
        write_target(target, &bytes)
    }
}

fn write_target(target: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).with_context(|| format!("mkdir {}", parent.display()))?;
    }
    fs::write(target, bytes).with_context(|| format!("write {}", target.display()))?;
    Ok(())
}

pub fn compiler_for(config: &Config) -> Box<dyn Compiler> {
    if config.compiler.program == "passthrough" {
        Box::new(PassthroughCompiler)
    } else {
        Box::new(ExternalCompiler::new(
            &config.compiler.program,
            &config.compiler.args,
        ))
    }
}

/// One scanned source file with its derived identity and artifact location.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub key: String,
    pub target: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Untracked,
    SourceChanged,
    TargetMissing,
    TargetTouched,
}

impl Staleness {
    pub fn reason(self) -> &'static str {
        match self {
            Staleness::Fresh => "fresh",
            Staleness::Untracked => "untracked",
            Staleness::SourceChanged => "source changed",
            Staleness::TargetMissing => "target missing",
            Staleness::TargetTouched => "target touched",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub compiled: usize,
    pub failed: usize,
    pub pruned: usize,
    pub fresh: usize,
}

impl PassSummary {
    pub fn changed(&self) -> bool {
        self.compiled > 0 || self.pruned > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub tracked: usize,
    pub fresh: usize,
    pub stale: usize,
}

pub struct Transpiler {
    project_root: PathBuf,
    config: Config,
    output_root: PathBuf,
    status: StatusMap,
    cache_layer: CacheLayer,
    compiler: Box<dyn Compiler>,
}

impl Transpiler {
    pub fn open(project_root: &Path) -> anyhow::Result<Self> {
        let config = Config::load(project_root)?;
        let compiler = compiler_for(&config);
        Self::with_compiler(project_root, config, compiler)
    }

    pub fn with_compiler(
        project_root: &Path,
        config: Config,
        compiler: Box<dyn Compiler>,
    ) -> anyhow::Result<Self> {
        let cache_dir = cache_dir_for_root(project_root)?;
        let fingerprint = compiler_fingerprint(&config);
        let status = StatusMap::load(&cache_dir, &fingerprint);
        let cache_layer = CacheLayer::new(&cache_dir);
        let output_root = config.output_root(project_root);
        Ok(Self {
            project_root: project_root.to_path_buf(),
            config,
            output_root,
            status,
            cache_layer,
            compiler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn cache_layer(&self) -> &CacheLayer {
        &self.cache_layer
    }

    pub fn tracked(&self) -> usize {
        self.status.entries.len()
    }

    /// Walk configured repos/subdirs and collect every matching source, in a
    /// deterministic order. `node_modules`, `.git`, and the output root are
    /// never descended into.
    pub fn scan(&self) -> anyhow::Result<Vec<SourceFile>> {
        let mut out = Vec::new();
        // Emitted artifacts must never be rescanned as sources, even when the
        // output root nests inside a scanned subdir.
        let output_key = normalize_path(&self.output_root);
        for repo in self.repos()? {
            let repo_root = self.project_root.join(&repo);
            for subdir in &self.config.subdirs {
                let base = repo_root.join(subdir);
                if !base.is_dir() || normalize_path(&base) == output_key {
                    continue;
                }
                self.collect_sources(&repo, &repo_root, &base, &output_key, &mut out)?;
            }
        }
        Ok(out)
    }

    fn repos(&self) -> anyhow::Result<Vec<String>> {
        if !self.config.repos.is_empty() {
            return Ok(self.config.repos.clone());
        }
        let mut out = Vec::new();
        let entries = fs::read_dir(&self.project_root)
            .with_context(|| format!("read_dir {}", self.project_root.display()))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if name.starts_with('.') || self.output_root.starts_with(&path) {
                continue;
            }
            if self.config.subdirs.iter().any(|s| path.join(s).is_dir()) {
                out.push(name.to_string());
            }
        }
        out.sort();
        Ok(out)
    }

    fn collect_sources(
        &self,
        repo: &str,
        repo_root: &Path,
        dir: &Path,
        output_key: &str,
        out: &mut Vec<SourceFile>,
    ) -> anyhow::Result<()> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
            paths.push(entry?.path());
        }
        paths.sort();
        for path in paths {
            if path.is_dir() {
                let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
                if name == "node_modules" || name == ".git" || normalize_path(&path) == output_key
                {
                    continue;
                }
                self.collect_sources(repo, repo_root, &path, output_key, out)?;
                continue;
            }
            let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
                continue;
            };
            if !self.config.extensions.iter().any(|e| e == ext) {
                continue;
            }
            let rel = path
                .strip_prefix(repo_root)
                .with_context(|| format!("strip_prefix {}", path.display()))?
                .to_path_buf();
            let target = target_for(
                &self.output_root,
                repo,
                &rel,
                &self.config.module_prefixes,
            );
            out.push(SourceFile {
                key: normalize_path(&path),
                path,
                target,
            });
        }
        Ok(())
    }

    /// The four-way staleness check. A file is recompiled iff it is untracked,
    /// its content digest moved, its artifact is gone, or the artifact's mtime
    /// differs from what was recorded when it was written.
    pub fn staleness(&self, file: &SourceFile, source_hash: &str) -> Staleness {
        let Some(entry) = self.status.get(&file.key) else {
            return Staleness::Untracked;
        };
        if entry.source_hash != source_hash {
            return Staleness::SourceChanged;
        }
        if !file.target.exists() {
            return Staleness::TargetMissing;
        }
        match mtime_millis(&file.target) {
            Ok(ms) if ms == entry.target_milliseconds => Staleness::Fresh,
            _ => Staleness::TargetTouched,
        }
    }

    fn compile_one(&mut self, file: &SourceFile, source_hash: String) -> anyhow::Result<()> {
        self.compiler.compile(&file.path, &file.target)?;
        let ms = mtime_millis(&file.target)?;
        self.status.record(file.key.clone(), source_hash, ms);
        Ok(())
    }

    /// One incremental pass: compile every stale source, prune entries and
    /// artifacts for vanished sources, and persist status + cache stamp iff
    /// anything changed. Per-file compile failures are reported and skipped;
    /// their entries stay untouched so the next pass retries.
    pub fn pass(&mut self) -> anyhow::Result<PassSummary> {
        let files = self.scan()?;
        let mut summary = PassSummary::default();
        let mut seen = BTreeSet::new();
        for file in &files {
            seen.insert(file.key.clone());
            let source_hash = match hash_file_sha256(&file.path) {
                Ok(h) => h,
                Err(err) => {
                    // Source vanished between scan and hash; the prune on the
                    // next pass will drop it.
                    trace(&format!("skip {}: {}", file.path.display(), err));
                    summary.failed += 1;
                    continue;
                }
            };
            let staleness = self.staleness(file, &source_hash);
            if staleness == Staleness::Fresh {
                summary.fresh += 1;
                continue;
            }
            trace(&format!(
                "transpile {} ({})",
                file.path.display(),
                staleness.reason()
            ));
            match self.compile_one(file, source_hash) {
                Ok(()) => summary.compiled += 1,
                Err(err) => {
                    eprintln!("jolt: {}: {:#}", file.path.display(), err);
                    summary.failed += 1;
                }
            }
        }

        let gone = self
            .status
            .entries
            .keys()
            .filter(|k| !seen.contains(*k))
            .cloned()
            .collect::<Vec<_>>();
        for key in gone {
            if let Some(target) = self.target_for_key(&key)
                && target.exists()
            {
                let _ = fs::remove_file(&target);
            }
            trace(&format!("prune {}", key));
            self.status.forget(&key);
            summary.pruned += 1;
        }

        if summary.changed() {
            self.cache_layer.touch()?;
            self.status.save()?;
        }
        Ok(summary)
    }

    /// Count fresh/stale sources without compiling anything.
    pub fn report(&self) -> anyhow::Result<StatusReport> {
        let files = self.scan()?;
        let mut report = StatusReport {
            tracked: self.status.entries.len(),
            ..StatusReport::default()
        };
        for file in &files {
            let source_hash = match hash_file_sha256(&file.path) {
                Ok(h) => h,
                Err(_) => {
                    report.stale += 1;
                    continue;
                }
            };
            if self.staleness(file, &source_hash) == Staleness::Fresh {
                report.fresh += 1;
            } else {
                report.stale += 1;
            }
        }
        Ok(report)
    }

    /// Remove the output root, the status map, and the cache stamp.
    pub fn clean(&mut self) -> anyhow::Result<()> {
        if self.output_root.exists() {
            fs::remove_dir_all(&self.output_root)
                .with_context(|| format!("remove {}", self.output_root.display()))?;
        }
        self.status.entries.clear();
        let status_path = self.status.status_path();
        if status_path.exists() {
            fs::remove_file(&status_path)
                .with_context(|| format!("remove {}", status_path.display()))?;
        }
        self.cache_layer.clear()?;
        trace("clean: output, status, cache stamp removed");
        Ok(())
    }

    // Recover the artifact path for a vanished source from its status key.
    fn target_for_key(&self, key: &str) -> Option<PathBuf> {
        let root = normalize_path(&self.project_root);
        let rest = key.strip_prefix(&root)?.strip_prefix('/')?;
        let (repo, rel) = rest.split_once('/')?;
        Some(target_for(
            &self.output_root,
            repo,
            Path::new(rel),
            &self.config.module_prefixes,
        ))
    }
}

pub fn mtime_millis(path: &Path) -> anyhow::Result<u64> {
    let meta = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    let modified = meta
        .modified()
        .with_context(|| format!("mtime {}", path.display()))?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0))
}
