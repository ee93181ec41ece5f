use crate::error::CoreResult;
use crate::operation::{BatchOutcome, OperationDescriptor};
use crate::prompt::{HealthStatus, PromptOutcome};
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Contract consumed by outer surfaces (CLI, HTTP).
pub trait WorkspaceEngine: Send + Sync {
    /// Run descriptors in order without rollback.
    ///
    /// Errs only when the workspace is unknown; per-operation failures are
    /// reported inside the outcome.
    fn execute_batch<'a>(
        &'a self,
        workspace_id: &'a str,
        operations: Vec<OperationDescriptor>,
    ) -> BoxFuture<'a, CoreResult<BatchOutcome>>;

    /// Translate free text into operations and run them.
    ///
    /// Errs with `NotFound` for an unknown workspace and with
    /// `ServiceUnavailable` when translation is disabled or failed.
    fn execute_prompt<'a>(
        &'a self,
        workspace_id: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, CoreResult<PromptOutcome>>;

    fn translator_health(&self) -> BoxFuture<'_, HealthStatus>;
}
