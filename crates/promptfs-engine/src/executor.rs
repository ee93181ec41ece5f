//! Filesystem operations against one workspace.
//!
//! Every method returns an [`OperationResult`]; sandbox rejections and I/O
//! errors become `success = false` with a message, never an `Err`.

use chrono::{DateTime, Utc};
use promptfs_core::{
    BoxFuture, CoreError, ErrorCode, FileEntry, OperationDescriptor, OperationKind, OperationResult,
    PathSandbox,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, Default)]
pub struct OperationExecutor;

impl OperationExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Dispatch one descriptor. Missing content counts as empty.
    pub async fn execute(&self, root: &Path, op: &OperationDescriptor) -> OperationResult {
        let content = op.content.as_deref().unwrap_or("");
        let result = match op.kind {
            OperationKind::Create => self.create(root, &op.path, content).await,
            OperationKind::Edit => self.edit(root, &op.path, content).await,
            OperationKind::Append => self.append(root, &op.path, content).await,
            OperationKind::Delete => self.delete(root, &op.path).await,
            OperationKind::Rename => match op.new_path.as_deref() {
                Some(new_path) => self.rename(root, &op.path, new_path).await,
                None => OperationResult::failed(
                    OperationKind::Rename,
                    &op.path,
                    ErrorCode::Validation,
                    format!("Rename of {} requires a new path", op.path),
                ),
            },
            OperationKind::List => self.list(root, &op.path).await,
        };

        if result.success {
            tracing::debug!(op = %op.kind, path = %op.path, "{}", result.message);
        } else {
            tracing::warn!(op = %op.kind, path = %op.path, "{}", result.message);
        }
        result
    }

    /// Write the full content, creating parent directories; overwrites.
    pub async fn create(&self, root: &Path, path: &str, content: &str) -> OperationResult {
        let kind = OperationKind::Create;
        let target = match sandboxed(root, path) {
            Ok((_, target)) => target,
            Err(err) => return rejected(kind, path, "Failed to create file", err),
        };

        let written = async {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, content).await
        }
        .await;

        match written {
            Ok(()) => OperationResult::ok(kind, path, format!("File {} created successfully", path)),
            Err(e) => io_failure(kind, path, format!("Failed to create file: {}", e)),
        }
    }

    /// Replace the full content of an existing file.
    pub async fn edit(&self, root: &Path, path: &str, content: &str) -> OperationResult {
        let kind = OperationKind::Edit;
        let target = match sandboxed(root, path) {
            Ok((_, target)) => target,
            Err(err) => return rejected(kind, path, "Failed to edit file", err),
        };
        if !exists(&target).await {
            return not_found(kind, path, format!("File {} does not exist", path));
        }

        match tokio::fs::write(&target, content).await {
            Ok(()) => OperationResult::ok(kind, path, format!("File {} edited successfully", path)),
            Err(e) => io_failure(kind, path, format!("Failed to edit file: {}", e)),
        }
    }

    /// Append to the end of an existing file. Never creates.
    pub async fn append(&self, root: &Path, path: &str, content: &str) -> OperationResult {
        let kind = OperationKind::Append;
        let target = match sandboxed(root, path) {
            Ok((_, target)) => target,
            Err(err) => return rejected(kind, path, "Failed to append to file", err),
        };
        if !exists(&target).await {
            return not_found(kind, path, format!("File {} does not exist", path));
        }

        let appended = async {
            let mut file = tokio::fs::OpenOptions::new()
                .append(true)
                .open(&target)
                .await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await
        }
        .await;

        match appended {
            Ok(()) => OperationResult::ok(
                kind,
                path,
                format!("Content appended to {} successfully", path),
            ),
            Err(e) => io_failure(kind, path, format!("Failed to append to file: {}", e)),
        }
    }

    /// Remove a file, or a directory recursively.
    pub async fn delete(&self, root: &Path, path: &str) -> OperationResult {
        let kind = OperationKind::Delete;
        let target = match sandboxed(root, path) {
            Ok((_, target)) => target,
            Err(err) => return rejected(kind, path, &format!("Failed to delete {}", path), err),
        };
        let metadata = match tokio::fs::symlink_metadata(&target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return not_found(kind, path, format!("File {} does not exist", path));
            }
            Err(e) => return io_failure(kind, path, format!("Failed to delete {}: {}", path, e)),
        };

        let is_dir = metadata.is_dir();
        let removed = if is_dir {
            tokio::fs::remove_dir_all(&target).await
        } else {
            tokio::fs::remove_file(&target).await
        };

        match removed {
            Ok(()) => OperationResult::ok(
                kind,
                path,
                format!(
                    "{} {} deleted successfully",
                    if is_dir { "Directory" } else { "File" },
                    path
                ),
            ),
            Err(e) => io_failure(kind, path, format!("Failed to delete {}: {}", path, e)),
        }
    }

    /// Move `path` to `new_path`; the destination must not exist.
    pub async fn rename(&self, root: &Path, path: &str, new_path: &str) -> OperationResult {
        let kind = OperationKind::Rename;
        let with_dest = |result: OperationResult| result.with_new_path(Some(new_path.to_string()));
        let failure = format!("Failed to rename {}", path);

        let (sandbox, source) = match sandboxed(root, path) {
            Ok(resolved) => resolved,
            Err(err) => return with_dest(rejected(kind, path, &failure, err)),
        };
        let dest = match sandbox.resolve(new_path) {
            Ok(dest) => dest,
            Err(err) => return with_dest(rejected(kind, path, &failure, err)),
        };

        if !entry_exists(&source).await {
            return with_dest(not_found(kind, path, format!("File {} does not exist", path)));
        }
        if entry_exists(&dest).await {
            return with_dest(OperationResult::failed(
                kind,
                path,
                ErrorCode::Conflict,
                format!("Target path {} already exists", new_path),
            ));
        }

        let moved = async {
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::rename(&source, &dest).await
        }
        .await;

        match moved {
            Ok(()) => with_dest(OperationResult::ok(
                kind,
                path,
                format!("Renamed {} to {} successfully", path, new_path),
            )),
            Err(e) => with_dest(io_failure(kind, path, format!("{}: {}", failure, e))),
        }
    }

    /// Immediate children of a directory; an empty path lists the workspace root.
    pub async fn list(&self, root: &Path, path: &str) -> OperationResult {
        let kind = OperationKind::List;
        let sandbox = match PathSandbox::new(root) {
            Ok(sandbox) => sandbox,
            Err(err) => return rejected(kind, path, "Failed to list directory", err),
        };
        let dir = match sandbox.resolve_dir(path) {
            Ok(dir) => dir,
            Err(err) => return rejected(kind, path, "Failed to list directory", err),
        };
        let shown = if path.trim_matches('/').is_empty() {
            "/"
        } else {
            path
        };

        match tokio::fs::metadata(&dir).await {
            Ok(metadata) if !metadata.is_dir() => {
                return OperationResult::failed(
                    kind,
                    path,
                    ErrorCode::NotADirectory,
                    format!("{} is not a directory", shown),
                );
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return not_found(kind, path, format!("Directory {} does not exist", shown));
            }
            Err(e) => return io_failure(kind, path, format!("Failed to list directory: {}", e)),
        }

        match read_entries(&sandbox, &dir).await {
            Ok(files) => OperationResult::ok(
                kind,
                path,
                format!("Listed {} items in {}", files.len(), shown),
            )
            .with_files(files),
            Err(e) => io_failure(kind, path, format!("Failed to list directory: {}", e)),
        }
    }
}

/// File primitives the prompt pipeline dispatches to.
pub trait FileOperations: Send + Sync {
    fn create<'a>(
        &'a self,
        root: &'a Path,
        path: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, OperationResult>;

    fn edit<'a>(
        &'a self,
        root: &'a Path,
        path: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, OperationResult>;

    fn delete<'a>(&'a self, root: &'a Path, path: &'a str) -> BoxFuture<'a, OperationResult>;

    fn rename<'a>(
        &'a self,
        root: &'a Path,
        path: &'a str,
        new_path: &'a str,
    ) -> BoxFuture<'a, OperationResult>;

    fn list<'a>(&'a self, root: &'a Path, path: &'a str) -> BoxFuture<'a, OperationResult>;
}

impl FileOperations for OperationExecutor {
    fn create<'a>(
        &'a self,
        root: &'a Path,
        path: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, OperationResult> {
        Box::pin(OperationExecutor::create(self, root, path, content))
    }

    fn edit<'a>(
        &'a self,
        root: &'a Path,
        path: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, OperationResult> {
        Box::pin(OperationExecutor::edit(self, root, path, content))
    }

    fn delete<'a>(&'a self, root: &'a Path, path: &'a str) -> BoxFuture<'a, OperationResult> {
        Box::pin(OperationExecutor::delete(self, root, path))
    }

    fn rename<'a>(
        &'a self,
        root: &'a Path,
        path: &'a str,
        new_path: &'a str,
    ) -> BoxFuture<'a, OperationResult> {
        Box::pin(OperationExecutor::rename(self, root, path, new_path))
    }

    fn list<'a>(&'a self, root: &'a Path, path: &'a str) -> BoxFuture<'a, OperationResult> {
        Box::pin(OperationExecutor::list(self, root, path))
    }
}

async fn read_entries(sandbox: &PathSandbox, dir: &Path) -> std::io::Result<Vec<FileEntry>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        let entry_path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let path = sandbox
            .relative_of(&entry_path)
            .unwrap_or_else(|| name.clone());

        files.push(FileEntry {
            name,
            path,
            is_directory: metadata.is_dir(),
            size: metadata.is_file().then(|| metadata.len()),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

fn sandboxed(root: &Path, path: &str) -> Result<(PathSandbox, PathBuf), CoreError> {
    let sandbox = PathSandbox::new(root)?;
    let target = sandbox.resolve(path)?;
    Ok((sandbox, target))
}

/// Follows links, like the checks in edit/append.
async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Counts the entry itself, link or not.
async fn entry_exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

fn rejected(kind: OperationKind, path: &str, prefix: &str, err: CoreError) -> OperationResult {
    OperationResult::failed(kind, path, err.code(), format!("{}: {}", prefix, err))
}

fn not_found(kind: OperationKind, path: &str, message: String) -> OperationResult {
    OperationResult::failed(kind, path, ErrorCode::NotFound, message)
}

fn io_failure(kind: OperationKind, path: &str, message: String) -> OperationResult {
    OperationResult::failed(kind, path, ErrorCode::Io, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_then_edit_overwrites() {
        let dir = tempdir().unwrap();
        let exec = OperationExecutor::new();

        assert!(exec.create(dir.path(), "p.txt", "X").await.success);
        assert!(exec.edit(dir.path(), "p.txt", "Y").await.success);
        assert_eq!(fs::read_to_string(dir.path().join("p.txt")).unwrap(), "Y");
    }

    #[tokio::test]
    async fn test_create_makes_parents_and_overwrites() {
        let dir = tempdir().unwrap();
        let exec = OperationExecutor::new();

        let result = exec.create(dir.path(), "a/b/c.txt", "long original").await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.message, "File a/b/c.txt created successfully");

        exec.create(dir.path(), "a/b/c.txt", "short").await;
        assert_eq!(
            fs::read_to_string(dir.path().join("a/b/c.txt")).unwrap(),
            "short"
        );
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("log.txt"), "start:").unwrap();
        let exec = OperationExecutor::new();

        assert!(exec.append(dir.path(), "log.txt", "A").await.success);
        assert!(exec.append(dir.path(), "log.txt", "B").await.success);
        let content = fs::read_to_string(dir.path().join("log.txt")).unwrap();
        assert!(content.ends_with("AB"));
        assert_eq!(content, "start:AB");
    }

    #[tokio::test]
    async fn test_append_and_edit_never_create() {
        let dir = tempdir().unwrap();
        let exec = OperationExecutor::new();

        let appended = exec.append(dir.path(), "missing.txt", "A").await;
        assert!(!appended.success);
        assert_eq!(appended.error, Some(ErrorCode::NotFound));

        let edited = exec.edit(dir.path(), "missing.txt", "A").await;
        assert_eq!(edited.message, "File missing.txt does not exist");
        assert!(!dir.path().join("missing.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_file_and_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f.txt"), "x").unwrap();
        fs::create_dir_all(dir.path().join("d/inner")).unwrap();
        fs::write(dir.path().join("d/inner/g.txt"), "y").unwrap();
        let exec = OperationExecutor::new();

        let file = exec.delete(dir.path(), "f.txt").await;
        assert_eq!(file.message, "File f.txt deleted successfully");
        let tree = exec.delete(dir.path(), "d").await;
        assert_eq!(tree.message, "Directory d deleted successfully");
        assert!(!dir.path().join("d").exists());

        let again = exec.delete(dir.path(), "f.txt").await;
        assert_eq!(again.error, Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_rename_conflict_leaves_both_untouched() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("old.txt"), "old").unwrap();
        fs::write(dir.path().join("new.txt"), "new").unwrap();
        let exec = OperationExecutor::new();

        let result = exec.rename(dir.path(), "old.txt", "new.txt").await;
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorCode::Conflict));
        assert_eq!(result.new_path.as_deref(), Some("new.txt"));
        assert_eq!(fs::read_to_string(dir.path().join("old.txt")).unwrap(), "old");
        assert_eq!(fs::read_to_string(dir.path().join("new.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_rename_moves_into_new_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let exec = OperationExecutor::new();

        let result = exec.rename(dir.path(), "a.txt", "archive/a.txt").await;
        assert!(result.success, "{}", result.message);
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("archive/a.txt")).unwrap(),
            "a"
        );

        let missing = exec.rename(dir.path(), "a.txt", "b.txt").await;
        assert_eq!(missing.error, Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_list_is_shallow_and_sorted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "bb").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        fs::write(dir.path().join("sub/deeper/hidden.txt"), "z").unwrap();
        let exec = OperationExecutor::new();

        let result = exec.list(dir.path(), "").await;
        assert!(result.success, "{}", result.message);
        let files = result.files.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
        assert_eq!(files[1].size, Some(2));
        assert!(files[2].is_directory);
        assert_eq!(files[2].size, None);
        assert!(files[0].modified_at.is_some());

        let nested = exec.list(dir.path(), "sub").await;
        let nested_files = nested.files.unwrap();
        assert_eq!(nested_files.len(), 1);
        assert_eq!(nested_files[0].path, "sub/deeper");
    }

    #[tokio::test]
    async fn test_list_failures() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("plain.txt"), "x").unwrap();
        let exec = OperationExecutor::new();

        let missing = exec.list(dir.path(), "nowhere").await;
        assert_eq!(missing.error, Some(ErrorCode::NotFound));
        let file = exec.list(dir.path(), "plain.txt").await;
        assert_eq!(file.error, Some(ErrorCode::NotADirectory));
        assert_eq!(file.message, "plain.txt is not a directory");
    }

    #[tokio::test]
    async fn test_escaping_paths_fail_without_io() {
        let outer = tempdir().unwrap();
        let root = outer.path().join("ws");
        fs::create_dir_all(&root).unwrap();
        let exec = OperationExecutor::new();

        let result = exec.create(&root, "../escape.txt", "x").await;
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorCode::Validation));
        assert!(!outer.path().join("escape.txt").exists());

        let renamed = exec
            .rename(&root, "a.txt", "/tmp/elsewhere.txt")
            .await;
        assert_eq!(renamed.error, Some(ErrorCode::Validation));
    }

    #[tokio::test]
    async fn test_execute_rename_without_destination() {
        let dir = tempdir().unwrap();
        let exec = OperationExecutor::new();
        let op = OperationDescriptor::new(OperationKind::Rename, "a.txt");

        let result = exec.execute(dir.path(), &op).await;
        assert_eq!(result.error, Some(ErrorCode::Validation));
    }
}
