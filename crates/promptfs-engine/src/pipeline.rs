//! Prompt execution: translate, dispatch each typed operation, summarize.

use crate::executor::FileOperations;
use crate::translator::PromptTranslator;
use futures::FutureExt;
use promptfs_adapters::WorkspaceStore;
use promptfs_core::{
    CoreError, CoreResult, DeleteTarget, PathSandbox, PromptOperation, PromptOutcome,
    TranslationContext, TranslationResult,
};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

/// One successful step of a prompt run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Created(String),
    Edited(String),
    Deleted(String),
    DeletedAll { count: usize },
    Renamed { from: String, to: String },
    Listed { target: String, count: usize },
}

impl LogEntry {
    /// Whether this step changed the workspace.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, LogEntry::Listed { .. })
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEntry::Created(path) => write!(f, "Created file: {}", path),
            LogEntry::Edited(path) => write!(f, "Edited file: {}", path),
            LogEntry::Deleted(path) => write!(f, "Deleted file: {}", path),
            LogEntry::DeletedAll { count } => write!(f, "Deleted {} files from workspace", count),
            LogEntry::Renamed { from, to } => write!(f, "Renamed {} to {}", from, to),
            LogEntry::Listed { target, count } if target.trim_matches('/').is_empty() => {
                write!(f, "Listed {} files in workspace", count)
            }
            LogEntry::Listed { target, count } => write!(f, "Listed {} files in {}", count, target),
        }
    }
}

/// Accumulated state of one run.
#[derive(Debug, Default)]
struct RunLog {
    entries: Vec<LogEntry>,
    errors: Vec<String>,
    /// Absolute paths of created, edited or renamed files, in order
    touched: Vec<String>,
}

impl RunLog {
    fn count(&self, pred: impl Fn(&LogEntry) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(e)).count()
    }

    fn success_message(&self, file_path: &str) -> String {
        if !self.errors.is_empty() {
            let n = self.errors.len();
            return if self.entries.iter().any(LogEntry::is_mutation) {
                format!("Operation partially completed with {} errors", n)
            } else {
                format!("Operation failed with {} errors", n)
            };
        }

        let created = self.count(|e| matches!(e, LogEntry::Created(_)));
        let edited = self.count(|e| matches!(e, LogEntry::Edited(_)));
        let deleted = self.count(|e| matches!(e, LogEntry::Deleted(_) | LogEntry::DeletedAll { .. }));
        let renamed = self.count(|e| matches!(e, LogEntry::Renamed { .. }));
        let listed = self.count(|e| matches!(e, LogEntry::Listed { .. }));

        if created == 1 {
            format!("Successfully created file: {}", file_path)
        } else if created > 1 {
            format!("Successfully created {} files", created)
        } else if edited > 0 {
            format!("Successfully edited {} file(s)", edited)
        } else if deleted > 0 {
            format!("Successfully deleted {} file(s)", deleted)
        } else if renamed > 0 {
            format!("Successfully renamed {} file(s)", renamed)
        } else if listed > 0 {
            "Files listed successfully".to_string()
        } else {
            "Operation completed successfully".to_string()
        }
    }
}

pub struct PromptPipeline {
    store: Arc<WorkspaceStore>,
    translator: Arc<PromptTranslator>,
    executor: Arc<dyn FileOperations>,
}

impl PromptPipeline {
    pub fn new(
        store: Arc<WorkspaceStore>,
        translator: Arc<PromptTranslator>,
        executor: Arc<dyn FileOperations>,
    ) -> Self {
        Self {
            store,
            translator,
            executor,
        }
    }

    /// Fails only on the whole-run preconditions: unknown workspace
    /// (`NotFound`) or no usable translation (`ServiceUnavailable`).
    pub async fn run(&self, workspace_id: &str, prompt: &str) -> CoreResult<PromptOutcome> {
        let workspace = self.store.require(workspace_id)?;
        let run_lock = self.store.run_lock(workspace_id);
        let _guard = run_lock.lock().await;

        let context = TranslationContext {
            workspace_path: Some(workspace.path.display().to_string()),
        };
        let translation = self.translator.translate(prompt, &context).await;
        if !translation.is_usable() {
            let detail = match translation.error.as_deref() {
                Some(err) if err != TranslationResult::UNAVAILABLE => {
                    format!("{}: {}", translation.reasoning, err)
                }
                _ => translation.reasoning.clone(),
            };
            tracing::warn!(workspace_id, "Prompt translation unusable: {}", detail);
            return Err(CoreError::ServiceUnavailable(detail));
        }

        let root = workspace.path.as_path();
        let mut log = RunLog::default();
        for op in &translation.operations {
            tracing::info!(
                workspace_id,
                description = op.description().unwrap_or_default(),
                "Processing operation: {}",
                op
            );
            let step = AssertUnwindSafe(self.apply(root, op, &mut log))
                .catch_unwind()
                .await;
            if let Err(panic) = step {
                let detail = panic_message(panic.as_ref());
                tracing::error!(workspace_id, "Operation {} aborted: {}", op, detail);
                log.errors.push(format!("Error executing operation {}: {}", op, detail));
            }
        }

        if let Err(err) = self.store.refresh_file_count(workspace_id).await {
            tracing::warn!(workspace_id, "Failed to refresh file count: {}", err);
        }

        let file_path = log.touched.first().cloned().unwrap_or_default();
        let success_message = log.success_message(&file_path);
        Ok(PromptOutcome {
            success: log.errors.is_empty(),
            operations: log.entries.iter().map(ToString::to_string).collect(),
            errors: log.errors,
            confidence: translation.confidence,
            reasoning: translation.reasoning,
            method: translation.method,
            file_path,
            success_message,
        })
    }

    async fn apply(&self, root: &Path, op: &PromptOperation, log: &mut RunLog) {
        match op {
            PromptOperation::Create {
                target, content, ..
            } => {
                let result = self.executor.create(root, target, content).await;
                if result.success {
                    log.entries.push(LogEntry::Created(target.clone()));
                    log.touched.push(absolute_path(root, target));
                } else {
                    log.errors
                        .push(format!("Failed to create file: {} ({})", target, result.message));
                }
            }
            PromptOperation::Edit {
                target, content, ..
            } => {
                let result = self.executor.edit(root, target, content).await;
                if result.success {
                    log.entries.push(LogEntry::Edited(target.clone()));
                    log.touched.push(absolute_path(root, target));
                } else {
                    log.errors
                        .push(format!("Failed to edit file: {} ({})", target, result.message));
                }
            }
            PromptOperation::Delete {
                target: DeleteTarget::AllFiles,
                ..
            } => self.delete_all_files(root, log).await,
            PromptOperation::Delete {
                target: DeleteTarget::Path(target),
                ..
            } => {
                let result = self.executor.delete(root, target).await;
                if result.success {
                    log.entries.push(LogEntry::Deleted(target.clone()));
                } else {
                    log.errors
                        .push(format!("Failed to delete file: {} ({})", target, result.message));
                }
            }
            PromptOperation::Rename {
                target,
                new_name: None,
                ..
            } => {
                log.errors
                    .push(format!("Missing new name for rename operation: {}", target));
            }
            PromptOperation::Rename {
                target,
                new_name: Some(new_name),
                ..
            } => {
                let result = self.executor.rename(root, target, new_name).await;
                if result.success {
                    log.entries.push(LogEntry::Renamed {
                        from: target.clone(),
                        to: new_name.clone(),
                    });
                    log.touched.push(absolute_path(root, new_name));
                } else {
                    log.errors.push(format!(
                        "Failed to rename {} to {} ({})",
                        target, new_name, result.message
                    ));
                }
            }
            PromptOperation::List { target, .. } => {
                let result = self.executor.list(root, target).await;
                match result.files {
                    Some(files) if result.success => log.entries.push(LogEntry::Listed {
                        target: target.clone(),
                        count: files.len(),
                    }),
                    _ => log
                        .errors
                        .push(format!("Failed to list files: {}", result.message)),
                }
            }
            PromptOperation::Unsupported { kind } => {
                tracing::debug!("Skipping unsupported operation type '{}'", kind);
            }
            PromptOperation::Malformed { reason, .. } => {
                log.errors.push(format!("Skipped malformed operation: {}", reason));
            }
        }
    }

    /// Deletes every non-directory entry directly under the root.
    async fn delete_all_files(&self, root: &Path, log: &mut RunLog) {
        let listing = self.executor.list(root, "").await;
        let Some(entries) = listing.files.filter(|_| listing.success) else {
            log.errors.push(format!(
                "Failed to list files for deletion: {}",
                listing.message
            ));
            return;
        };

        let mut deleted = 0usize;
        let mut failed = 0usize;
        for entry in entries.iter().filter(|e| !e.is_directory) {
            if self.executor.delete(root, &entry.path).await.success {
                deleted += 1;
            } else {
                failed += 1;
            }
        }

        if deleted > 0 {
            log.entries.push(LogEntry::DeletedAll { count: deleted });
        }
        if failed > 0 {
            log.errors.push(format!("Failed to delete {} files", failed));
        }
    }
}

fn absolute_path(root: &Path, relative: &str) -> String {
    PathSandbox::new(root)
        .and_then(|sandbox| sandbox.resolve(relative))
        .unwrap_or_else(|_| root.join(relative))
        .display()
        .to_string()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic".to_string()
    }
}
