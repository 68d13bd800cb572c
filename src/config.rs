use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "jolt.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Repository directories (relative to the project root) to scan. Empty
    /// means every immediate subdirectory that contains one of `subdirs`.
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default = "default_subdirs")]
    pub subdirs: Vec<String>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_output")]
    pub output: String,
    /// Project-relative path prefixes (starting with the repo directory,
    /// e.g. `"build-tools"` or `"axon/js/scripts"`) whose artifacts are
    /// emitted as `.mjs`.
    #[serde(default)]
    pub module_prefixes: Vec<String>,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    #[serde(default)]
    pub compiler: CompilerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompilerConfig {
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments passed to the compiler; the literal `{input}` is replaced by
    /// the source path. The transpiled output is read from stdout.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
        }
    }
}

fn default_subdirs() -> Vec<String> {
    vec!["js".to_string()]
}

fn default_extensions() -> Vec<String> {
    vec!["ts".to_string(), "tsx".to_string(), "js".to_string()]
}

fn default_output() -> String {
    "dist/js".to_string()
}

fn default_poll_ms() -> u64 {
    250
}

fn default_program() -> String {
    // Built-in copy-through compiler; real projects point this at babel/swc.
    "passthrough".to_string()
}

impl Config {
    pub fn parse(toml_text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str::<Config>(toml_text)?)
    }

    pub fn load(project_root: &Path) -> anyhow::Result<Self> {
        let path = project_root.join(CONFIG_FILE);
        let text =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse {}", path.display()))
    }

    pub fn output_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.output)
    }
}

pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut cur = if start.is_dir() {
        start.to_path_buf()
    } else {
        start.parent()?.to_path_buf()
    };
    loop {
        if cur.join(CONFIG_FILE).exists() {
            return Some(cur);
        }
        if !cur.pop() {
            break;
        }
    }
    None
}

/// Identity of the configured compiler. Folded into the persisted status file
/// so a compiler change invalidates every recorded entry.
pub fn compiler_fingerprint(config: &Config) -> String {
    let mut out = format!("jolt/{}", env!("CARGO_PKG_VERSION"));
    if let Some(commit) = option_env!("JOLT_GIT_COMMIT") {
        let commit = commit.trim();
        if !commit.is_empty() {
            out.push('#');
            out.push_str(commit);
        }
    }
    out.push('|');
    out.push_str(&config.compiler.program);
    for arg in &config.compiler.args {
        out.push(' ');
        out.push_str(arg);
    }
    out
}
