use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A sandboxed directory tree addressed by an opaque id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Random token, independent of `name`
    pub workspace_id: String,
    pub name: String,
    /// `<base_dir>/<workspace_id>`
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Regular files under `path`, as of the last refresh
    pub file_count: usize,
}
