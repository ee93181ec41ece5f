//! Core domain model and contracts for promptfs.

pub mod error;
pub mod operation;
pub mod prompt;
pub mod protocol;
pub mod sandbox;
pub mod workspace;

pub use error::{CoreError, CoreResult, ErrorCode};
pub use operation::{BatchOutcome, FileEntry, OperationDescriptor, OperationKind, OperationResult};
pub use prompt::{
    DeleteTarget, HealthStatus, PromptOperation, PromptOutcome, RawTranslation,
    TranslationContext, TranslationMethod, TranslationResult,
};
pub use protocol::{BoxFuture, WorkspaceEngine};
pub use sandbox::PathSandbox;
pub use workspace::Workspace;
