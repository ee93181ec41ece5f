use crate::error::ErrorCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Edit,
    Append,
    Delete,
    Rename,
    List,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Edit => "edit",
            OperationKind::Append => "append",
            OperationKind::Delete => "delete",
            OperationKind::Rename => "rename",
            OperationKind::List => "list",
        }
    }

    /// Whether a successful run of this kind changes the workspace.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, OperationKind::List)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured operation as submitted in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    #[serde(rename = "operation")]
    pub kind: OperationKind,
    /// Workspace-relative path
    #[serde(default)]
    pub path: String,
    /// Content for create/edit/append
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Destination for rename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
}

impl OperationDescriptor {
    pub fn new(kind: OperationKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            content: None,
            new_path: None,
        }
    }

    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(OperationKind::Create, path).with_content(content)
    }

    pub fn edit(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(OperationKind::Edit, path).with_content(content)
    }

    pub fn append(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(OperationKind::Append, path).with_content(content)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(OperationKind::Delete, path)
    }

    pub fn rename(path: impl Into<String>, new_path: impl Into<String>) -> Self {
        let mut op = Self::new(OperationKind::Rename, path);
        op.new_path = Some(new_path.into());
        op
    }

    pub fn list(path: impl Into<String>) -> Self {
        Self::new(OperationKind::List, path)
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Workspace-relative, `/`-separated
    pub path: String,
    pub is_directory: bool,
    /// Only set for regular files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Outcome of a single executed descriptor. Never an `Err`: failures are data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    #[serde(rename = "operation")]
    pub kind: OperationKind,
    pub path: String,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    /// Populated by successful `list` runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntry>>,
}

impl OperationResult {
    pub fn ok(kind: OperationKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            success: true,
            message: message.into(),
            new_path: None,
            error: None,
            files: None,
        }
    }

    pub fn failed(
        kind: OperationKind,
        path: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            success: false,
            message: message.into(),
            new_path: None,
            error: Some(code),
            files: None,
        }
    }

    pub fn with_new_path(mut self, new_path: Option<String>) -> Self {
        self.new_path = new_path;
        self
    }

    pub fn with_files(mut self, files: Vec<FileEntry>) -> Self {
        self.files = Some(files);
        self
    }
}

/// Aggregate of a batch run; `results` keeps submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub success: bool,
    pub message: String,
    pub results: Vec<OperationResult>,
    pub errors: Vec<String>,
}

impl BatchOutcome {
    pub fn from_results(results: Vec<OperationResult>) -> Self {
        let errors: Vec<String> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.message.clone())
            .collect();
        Self {
            success: errors.is_empty(),
            message: format!("Executed {} operations", results.len()),
            results,
            errors,
        }
    }
}
