//! Project-relative paths and the `.trellis/` state directory

use std::path::{Component, Path, PathBuf};

/// State directory: .trellis/
pub const STATE_DIR: &str = ".trellis";

/// Log file used by background modes
pub const LOG_FILE: &str = "trellis.log";

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

pub fn log_path(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join(LOG_FILE)
}

pub fn ensure_state_dir(root: &Path) -> std::io::Result<PathBuf> {
    let dir = state_dir(root);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Remove the state directory. Missing directory is not an error.
pub fn clear_state(root: &Path) -> std::io::Result<()> {
    let dir = state_dir(root);
    if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
    }
    Ok(())
}

/// Normalize a project-relative path: `/` separators, no `.` segments, `..` resolved.
///
/// Returns `None` if the path escapes the root or is empty.
pub fn normalize_rel_path(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Express `path` relative to `root`, using `/` separators.
///
/// Relative inputs are taken as already project-relative. Absolute inputs must
/// live under `root`; the parent directory is canonicalized so that a deleted
/// file still resolves.
pub fn relativize(root: &Path, path: &Path) -> Option<String> {
    if path.is_relative() {
        return normalize_rel_path(&path.to_string_lossy());
    }
    if let Ok(rest) = path.strip_prefix(root) {
        return components_to_rel(rest);
    }
    let canonical_root = root.canonicalize().ok()?;
    let file_name = path.file_name()?;
    let parent = path.parent()?.canonicalize().ok()?;
    let rest = parent.join(file_name);
    let rest = rest.strip_prefix(&canonical_root).ok()?;
    components_to_rel(rest)
}

fn components_to_rel(rest: &Path) -> Option<String> {
    let parts: Vec<String> = rest
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    normalize_rel_path(&parts.join("/"))
}
