//! Operation execution and prompt orchestration for promptfs.

use promptfs_adapters::{Config, WorkspaceStore};
use promptfs_core::protocol::{BoxFuture, WorkspaceEngine};
use promptfs_core::{
    BatchOutcome, CoreResult, HealthStatus, OperationDescriptor, OperationResult, PromptOutcome,
};
use std::sync::Arc;

pub mod batch;
pub mod executor;
pub mod llm;
pub mod pipeline;
pub mod translator;

pub use batch::BatchRunner;
pub use executor::{FileOperations, OperationExecutor};
pub use pipeline::{LogEntry, PromptPipeline};
pub use translator::PromptTranslator;

/// Store, batch runner and prompt pipeline behind one handle.
pub struct Engine {
    store: Arc<WorkspaceStore>,
    translator: Arc<PromptTranslator>,
    executor: OperationExecutor,
    runner: BatchRunner,
    pipeline: PromptPipeline,
}

impl Engine {
    pub fn new(store: Arc<WorkspaceStore>, translator: Arc<PromptTranslator>) -> Self {
        let executor = OperationExecutor::new();
        Self {
            pipeline: PromptPipeline::new(store.clone(), translator.clone(), Arc::new(executor)),
            runner: BatchRunner::new(executor),
            executor,
            store,
            translator,
        }
    }

    /// Open the configured workspaces directory and model backend.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = Arc::new(WorkspaceStore::open(&config.workspaces_dir)?);
        let translator = Arc::new(PromptTranslator::from_config(config)?);
        Ok(Self::new(store, translator))
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    /// List one directory of a workspace (root when `path` is empty).
    pub async fn list_files(&self, workspace_id: &str, path: &str) -> CoreResult<OperationResult> {
        let root = self.store.root(workspace_id)?;
        Ok(self.executor.list(&root, path).await)
    }

    pub async fn run_batch(
        &self,
        workspace_id: &str,
        operations: &[OperationDescriptor],
    ) -> CoreResult<BatchOutcome> {
        let root = self.store.root(workspace_id)?;
        let run_lock = self.store.run_lock(workspace_id);
        let _guard = run_lock.lock().await;

        let outcome = self.runner.run(&root, operations).await;
        if operations.iter().any(|op| op.kind.is_mutating()) {
            if let Err(err) = self.store.refresh_file_count(workspace_id).await {
                tracing::warn!(workspace_id, "Failed to refresh file count: {}", err);
            }
        }
        Ok(outcome)
    }
}

impl WorkspaceEngine for Engine {
    fn execute_batch<'a>(
        &'a self,
        workspace_id: &'a str,
        operations: Vec<OperationDescriptor>,
    ) -> BoxFuture<'a, CoreResult<BatchOutcome>> {
        Box::pin(async move { self.run_batch(workspace_id, &operations).await })
    }

    fn execute_prompt<'a>(
        &'a self,
        workspace_id: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, CoreResult<PromptOutcome>> {
        Box::pin(self.pipeline.run(workspace_id, prompt))
    }

    fn translator_health(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(self.translator.health())
    }
}
