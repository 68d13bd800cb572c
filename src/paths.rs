use std::path::{Path, PathBuf};

/// Canonical, forward-slash form of a path. Used as the status-map key so the
/// same file observed through different relative spellings collapses to one
/// entry.
pub fn normalize_path(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .replace('\\', "/")
}

/// Project-relative path (`repo/...`) as a forward-slash string, for prefix
/// matching.
pub fn project_relative_key(repo: &str, rel: &Path) -> String {
    format!("{}/{}", repo, rel.to_string_lossy().replace('\\', "/"))
}

/// Derive the artifact path for a source file: mirror `repo/rel` under the
/// output root, substituting the extension. Sources whose project-relative
/// path starts with a configured module prefix become `.mjs`; everything else
/// becomes `.js`.
pub fn target_for(
    output_root: &Path,
    repo: &str,
    rel: &Path,
    module_prefixes: &[String],
) -> PathBuf {
    let key = project_relative_key(repo, rel);
    let ext = if module_prefixes.iter().any(|p| {
        key.strip_prefix(p.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }) {
        "mjs"
    } else {
        "js"
    };
    output_root.join(repo).join(rel).with_extension(ext)
}
