use crate::executor::OperationExecutor;
use promptfs_core::{BatchOutcome, OperationDescriptor};
use std::path::Path;

/// Runs descriptors strictly in order. No short-circuit, no rollback.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchRunner {
    executor: OperationExecutor,
}

impl BatchRunner {
    pub fn new(executor: OperationExecutor) -> Self {
        Self { executor }
    }

    pub async fn run(&self, root: &Path, operations: &[OperationDescriptor]) -> BatchOutcome {
        let mut results = Vec::with_capacity(operations.len());
        for op in operations {
            results.push(self.executor.execute(root, op).await);
        }

        let outcome = BatchOutcome::from_results(results);
        tracing::info!(
            total = outcome.results.len(),
            failed = outcome.errors.len(),
            "{}",
            outcome.message
        );
        outcome
    }
}
