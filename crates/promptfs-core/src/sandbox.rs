//! Workspace path confinement
//!
//! Every path handed to the executor goes through [`PathSandbox`]. Lexical
//! checks reject obvious escapes up front; the candidate (or its deepest
//! existing ancestor) is then canonicalized and compared against the
//! canonical workspace root, which catches symlink and case tricks that a
//! string comparison would miss.

use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Bind a sandbox to an existing workspace root.
    pub fn new(workspace_root: &Path) -> CoreResult<Self> {
        let root = workspace_root.canonicalize().map_err(|e| {
            CoreError::NotFound(format!(
                "workspace root {} ({})",
                workspace_root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    /// Canonical workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path to an absolute path inside the root.
    ///
    /// The returned path is the lexical join of the cleaned relative path onto
    /// the canonical root, so an in-workspace symlink is addressed as the link
    /// itself rather than its target.
    pub fn resolve(&self, relative: &str) -> CoreResult<PathBuf> {
        let clean = sanitize_relative(relative)?;
        let candidate = self.root.join(&clean);
        let anchor = canonicalize_existing(&candidate)?;

        if !anchor.starts_with(&self.root) {
            return Err(CoreError::Validation(format!(
                "path escapes workspace: {}",
                relative
            )));
        }

        Ok(candidate)
    }

    /// Like [`resolve`](Self::resolve), but an empty path (or `.`) names the root itself.
    pub fn resolve_dir(&self, relative: &str) -> CoreResult<PathBuf> {
        let trimmed = relative.trim().trim_matches('/');
        if trimmed.is_empty() || trimmed == "." {
            return Ok(self.root.clone());
        }
        self.resolve(relative)
    }

    /// Workspace-relative form of an absolute path under the root, `/`-separated.
    pub fn relative_of(&self, absolute: &Path) -> Option<String> {
        let rel = absolute.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(parts.join("/"))
    }
}

/// Normalize a caller-supplied relative path or reject it.
///
/// Strips NUL bytes, turns `\` into `/`, drops empty and `.` segments.
/// Rejects absolute paths, home-relative paths, anything containing `..`,
/// drive prefixes and network paths.
pub fn sanitize_relative(raw: &str) -> CoreResult<String> {
    let path = raw.replace('\0', "").replace('\\', "/");
    let path = path.trim();

    if path.starts_with('/') {
        return Err(CoreError::Validation(format!(
            "absolute paths are not allowed: {}",
            raw
        )));
    }
    if path.starts_with('~') {
        return Err(CoreError::Validation(format!(
            "home directory references are not allowed: {}",
            raw
        )));
    }
    if path.contains("..") {
        return Err(CoreError::Validation(format!(
            "parent directory references are not allowed: {}",
            raw
        )));
    }
    if has_drive_prefix(path) {
        return Err(CoreError::Validation(format!(
            "drive-qualified paths are not allowed: {}",
            raw
        )));
    }

    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.is_empty() {
        return Err(CoreError::Validation("path is empty".to_string()));
    }

    Ok(segments.join("/"))
}

fn has_drive_prefix(path: &str) -> bool {
    let mut chars = path.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

/// Canonicalize `path` if it exists (as an entry, links included), otherwise
/// its deepest existing ancestor.
fn canonicalize_existing(path: &Path) -> CoreResult<PathBuf> {
    let mut current = path.to_path_buf();
    while std::fs::symlink_metadata(&current).is_err() {
        if !current.pop() {
            return Err(CoreError::Validation(format!(
                "path has no existing parent: {}",
                path.display()
            )));
        }
    }
    // A dangling link fails here, which keeps writes from following it out.
    current.canonicalize().map_err(|e| {
        CoreError::Validation(format!("failed to resolve {}: {}", current.display(), e))
    })
}
