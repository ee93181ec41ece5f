//! Workspace registry
//!
//! The registry is an explicit object built at startup and shared by handle.
//! Its metadata index lives in `<base_dir>/.workspaces.json`, rewritten under
//! an exclusive file lock with a read-modify-write so several processes can
//! share one base directory. Only workspace metadata is stored there.

use anyhow::Context;
use chrono::Utc;
use fs2::FileExt;
use promptfs_core::{CoreError, CoreResult, Workspace};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

const INDEX_FILE: &str = ".workspaces.json";
const LOCK_FILE: &str = ".workspaces.lock";
const INDEX_LOCK_TIMEOUT_SECS: u64 = 10;
const INDEX_LOCK_RETRY_MS: u64 = 25;

type Index = BTreeMap<String, Workspace>;

pub struct WorkspaceStore {
    base_dir: PathBuf,
    entries: RwLock<HashMap<String, Workspace>>,
    run_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

struct IndexLock {
    file: fs::File,
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl WorkspaceStore {
    /// Open (creating if needed) the base directory and load the registry.
    ///
    /// Entries whose directory has disappeared are dropped.
    pub fn open(base_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(base_dir).with_context(|| {
            format!("Failed to create workspaces directory {}", base_dir.display())
        })?;
        let base_dir = base_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", base_dir.display()))?;

        let store = Self {
            base_dir,
            entries: RwLock::new(HashMap::new()),
            run_locks: Mutex::new(HashMap::new()),
        };

        // Startup only; nothing shares the store yet.
        let loaded = write_index(&store.base_dir, |index| {
            index.retain(|_, ws| ws.path.is_dir());
        })?;
        tracing::info!(
            base_dir = %store.base_dir.display(),
            workspaces = loaded.len(),
            "Workspace store opened"
        );
        store.replace_entries(loaded);
        Ok(store)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create an empty workspace under a fresh opaque id.
    pub async fn create(&self, name: &str) -> anyhow::Result<Workspace> {
        let workspace_id = Uuid::new_v4().simple().to_string();
        let path = self.base_dir.join(&workspace_id);
        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("Failed to create workspace directory {}", path.display()))?;

        let workspace = Workspace {
            workspace_id: workspace_id.clone(),
            name: name.trim().to_string(),
            path,
            created_at: Utc::now(),
            file_count: 0,
        };

        let to_insert = workspace.clone();
        let index = self
            .update_index(move |index| {
                index.insert(to_insert.workspace_id.clone(), to_insert);
            })
            .await?;
        self.replace_entries(index);

        tracing::info!(workspace_id = %workspace_id, name = %workspace.name, "Created workspace");
        Ok(workspace)
    }

    pub fn get(&self, workspace_id: &str) -> Option<Workspace> {
        self.read_entries().get(workspace_id).cloned()
    }

    /// Like [`get`](Self::get) but unknown ids are a `NotFound` error.
    pub fn require(&self, workspace_id: &str) -> CoreResult<Workspace> {
        self.get(workspace_id)
            .ok_or_else(|| CoreError::NotFound(format!("workspace {}", workspace_id)))
    }

    /// Root directory of a known workspace.
    pub fn root(&self, workspace_id: &str) -> CoreResult<PathBuf> {
        self.require(workspace_id).map(|ws| ws.path)
    }

    /// All workspaces, oldest first.
    pub fn list(&self) -> Vec<Workspace> {
        let mut all: Vec<Workspace> = self.read_entries().values().cloned().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.workspace_id.cmp(&b.workspace_id))
        });
        all
    }

    /// Remove the registry entry and the whole directory tree.
    ///
    /// Waits for any batch or prompt run holding the workspace's run lock, so
    /// a run in flight cannot recreate the tree after it is removed.
    pub async fn delete(&self, workspace_id: &str) -> CoreResult<Workspace> {
        self.require(workspace_id)?;
        let run_lock = self.run_lock(workspace_id);
        let _guard = run_lock.lock().await;
        let workspace = self.require(workspace_id)?;

        match tokio::fs::remove_dir_all(&workspace.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(CoreError::Io(e)),
        }

        let id = workspace_id.to_string();
        let updated = self
            .update_index(move |index| {
                index.remove(&id);
            })
            .await;
        match updated {
            Ok(index) => self.replace_entries(index),
            Err(err) => {
                tracing::warn!(workspace_id, "Failed to update workspace index: {:#}", err);
                self.write_entries().remove(workspace_id);
            }
        }
        if let Ok(mut locks) = self.run_locks.lock() {
            locks.remove(workspace_id);
        }

        tracing::info!(workspace_id, "Deleted workspace");
        Ok(workspace)
    }

    /// Recount regular files under the workspace and cache the number.
    pub async fn refresh_file_count(&self, workspace_id: &str) -> CoreResult<usize> {
        let workspace = self.require(workspace_id)?;
        let root = workspace.path;
        let count = tokio::task::spawn_blocking(move || count_files(&root))
            .await
            .map_err(|e| CoreError::Unexpected(format!("file count task failed: {}", e)))?;

        if let Some(entry) = self.write_entries().get_mut(workspace_id) {
            entry.file_count = count;
        }
        let id = workspace_id.to_string();
        let persisted = self
            .update_index(move |index| {
                if let Some(entry) = index.get_mut(&id) {
                    entry.file_count = count;
                }
            })
            .await;
        if let Err(err) = persisted {
            tracing::warn!(workspace_id, "Failed to persist file count: {:#}", err);
        }
        Ok(count)
    }

    /// Mutex serializing runs against one workspace.
    ///
    /// Batches and prompt pipelines hold it for their whole run; runs against
    /// different workspaces do not contend.
    pub fn run_lock(&self, workspace_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.run_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(workspace_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Workspace>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Workspace>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn replace_entries(&self, index: Index) {
        *self.write_entries() = index.into_iter().collect();
    }

    /// [`write_index`] on the blocking pool.
    async fn update_index<F>(&self, mutate: F) -> anyhow::Result<Index>
    where
        F: FnOnce(&mut Index) + Send + 'static,
    {
        let base_dir = self.base_dir.clone();
        tokio::task::spawn_blocking(move || write_index(&base_dir, mutate))
            .await
            .context("Workspace index task failed")?
    }
}

/// Read-modify-write of the on-disk index under an exclusive lock.
/// Returns the index as written. Blocking.
fn write_index<F>(base_dir: &Path, mutate: F) -> anyhow::Result<Index>
where
    F: FnOnce(&mut Index),
{
    let _lock = lock_index(base_dir)?;
    let index_path = base_dir.join(INDEX_FILE);

    let mut index: Index = match fs::read_to_string(&index_path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(index) => index,
            Err(err) => {
                tracing::warn!(
                    path = %index_path.display(),
                    "Workspace index was corrupted ({}); rebuilding it",
                    err
                );
                Index::new()
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Index::new(),
        Err(e) => return Err(e).context("Failed to read workspace index"),
    };

    mutate(&mut index);

    let content = serde_json::to_string_pretty(&index)?;
    write_atomic(&index_path, &content)?;
    Ok(index)
}

fn lock_index(base_dir: &Path) -> anyhow::Result<IndexLock> {
    let lock_path = base_dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;

    let start = Instant::now();
    loop {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => break,
            Err(err) => {
                if err.kind() != ErrorKind::WouldBlock {
                    return Err(err.into());
                }
                if start.elapsed() >= Duration::from_secs(INDEX_LOCK_TIMEOUT_SECS) {
                    return Err(anyhow::anyhow!(
                        "Timed out waiting for workspace index lock ({}s)",
                        INDEX_LOCK_TIMEOUT_SECS
                    ));
                }
                std::thread::sleep(Duration::from_millis(INDEX_LOCK_RETRY_MS));
            }
        }
    }

    Ok(IndexLock { file })
}

fn count_files(root: &Path) -> usize {
    walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .count()
}

fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content)?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_makes_directory_and_entry() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();

        let ws = store.create("  demo ").await.unwrap();
        assert_eq!(ws.name, "demo");
        assert!(ws.path.is_dir());
        assert_eq!(ws.path.file_name().unwrap().to_string_lossy(), ws.workspace_id);
        assert_ne!(ws.workspace_id, "demo");
        assert_eq!(store.get(&ws.workspace_id), Some(ws));
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_opaque() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();

        let a = store.create("same").await.unwrap();
        let b = store.create("same").await.unwrap();
        assert_ne!(a.workspace_id, b.workspace_id);
        assert_eq!(a.workspace_id.len(), 32);
        assert_eq!(store.list().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_entry_and_tree() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        let ws = store.create("doomed").await.unwrap();
        fs::create_dir_all(ws.path.join("sub")).unwrap();
        fs::write(ws.path.join("sub").join("f.txt"), "x").unwrap();

        store.delete(&ws.workspace_id).await.unwrap();
        assert!(!ws.path.exists());
        assert!(store.get(&ws.workspace_id).is_none());

        let err = store.delete(&ws.workspace_id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reopen_restores_registry_and_drops_missing_roots() {
        let dir = tempdir().unwrap();
        let (kept, lost) = {
            let store = WorkspaceStore::open(dir.path()).unwrap();
            let kept = store.create("kept").await.unwrap();
            let lost = store.create("lost").await.unwrap();
            (kept, lost)
        };
        fs::remove_dir_all(&lost.path).unwrap();

        let reopened = WorkspaceStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&kept.workspace_id), Some(kept));
        assert!(reopened.get(&lost.workspace_id).is_none());
    }

    #[tokio::test]
    async fn test_refresh_file_count_counts_nested_files() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        let ws = store.create("count").await.unwrap();
        fs::write(ws.path.join("a.txt"), "a").unwrap();
        fs::create_dir_all(ws.path.join("nested")).unwrap();
        fs::write(ws.path.join("nested").join("b.txt"), "b").unwrap();

        assert_eq!(store.refresh_file_count(&ws.workspace_id).await.unwrap(), 2);
        assert_eq!(store.get(&ws.workspace_id).unwrap().file_count, 2);

        let reopened = WorkspaceStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&ws.workspace_id).unwrap().file_count, 2);
    }

    #[tokio::test]
    async fn test_delete_waits_for_running_batch() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        let ws = store.create("busy").await.unwrap();

        let run_lock = store.run_lock(&ws.workspace_id);
        let guard = run_lock.lock().await;
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            store.delete(&ws.workspace_id),
        )
        .await;
        assert!(blocked.is_err());
        assert!(ws.path.is_dir());
        assert!(store.get(&ws.workspace_id).is_some());

        drop(guard);
        store.delete(&ws.workspace_id).await.unwrap();
        assert!(!ws.path.exists());
    }

    #[test]
    fn test_unknown_workspace_is_not_found() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.require("nope"),
            Err(CoreError::NotFound(_))
        ));
        assert!(store.root("nope").is_err());
    }

    #[test]
    fn test_run_lock_is_shared_per_workspace() {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        let a1 = store.run_lock("a");
        let a2 = store.run_lock("a");
        let b = store.run_lock("b");
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
    }
}
