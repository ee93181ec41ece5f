//! Prompt translation model
//!
//! The model answers with loosely-typed JSON. Each entry of its
//! `operations` array is converted right away into the closed
//! [`PromptOperation`] enum, so nothing downstream inspects raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Target of a model-requested delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum DeleteTarget {
    /// Every regular file directly under the workspace root
    AllFiles,
    Path(String),
}

impl DeleteTarget {
    /// `*`, `all`, or any phrase mentioning "all files" (case-insensitive)
    /// means every file; anything else is a literal path.
    pub fn parse(target: &str) -> Self {
        let trimmed = target.trim();
        let lower = trimmed.to_lowercase();
        if trimmed == "*" || lower == "all" || lower.contains("all files") {
            DeleteTarget::AllFiles
        } else {
            DeleteTarget::Path(target.to_string())
        }
    }
}

/// One operation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum PromptOperation {
    Create {
        target: String,
        content: String,
        description: Option<String>,
    },
    Edit {
        target: String,
        content: String,
        description: Option<String>,
    },
    Delete {
        target: DeleteTarget,
        description: Option<String>,
    },
    Rename {
        target: String,
        new_name: Option<String>,
        description: Option<String>,
    },
    List {
        target: String,
        description: Option<String>,
    },
    /// Anything the pipeline does not act on (the model over-generated)
    Unsupported { kind: String },
    /// A recognizable entry whose fields have the wrong shape
    Malformed { kind: String, reason: String },
}

impl PromptOperation {
    pub fn kind(&self) -> &str {
        match self {
            PromptOperation::Create { .. } => "create",
            PromptOperation::Edit { .. } => "edit",
            PromptOperation::Delete { .. } => "delete",
            PromptOperation::Rename { .. } => "rename",
            PromptOperation::List { .. } => "list",
            PromptOperation::Unsupported { kind } | PromptOperation::Malformed { kind, .. } => kind,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            PromptOperation::Create { description, .. }
            | PromptOperation::Edit { description, .. }
            | PromptOperation::Delete { description, .. }
            | PromptOperation::Rename { description, .. }
            | PromptOperation::List { description, .. } => description.as_deref(),
            PromptOperation::Unsupported { .. } | PromptOperation::Malformed { .. } => None,
        }
    }
}

impl fmt::Display for PromptOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptOperation::Create { target, .. } => write!(f, "create {}", target),
            PromptOperation::Edit { target, .. } => write!(f, "edit {}", target),
            PromptOperation::Delete {
                target: DeleteTarget::AllFiles,
                ..
            } => write!(f, "delete all files"),
            PromptOperation::Delete {
                target: DeleteTarget::Path(path),
                ..
            } => write!(f, "delete {}", path),
            PromptOperation::Rename {
                target, new_name, ..
            } => match new_name {
                Some(new_name) => write!(f, "rename {} -> {}", target, new_name),
                None => write!(f, "rename {}", target),
            },
            PromptOperation::List { target, .. } => write!(f, "list {}", target),
            PromptOperation::Unsupported { kind } => write!(f, "unsupported '{}'", kind),
            PromptOperation::Malformed { kind, .. } if kind.is_empty() => {
                write!(f, "malformed operation")
            }
            PromptOperation::Malformed { kind, .. } => write!(f, "malformed '{}'", kind),
        }
    }
}

impl PromptOperation {
    /// Convert one entry of the reply's `operations` array.
    ///
    /// Never fails: an entry with the wrong shape becomes
    /// [`PromptOperation::Malformed`] so its siblings still run.
    pub fn from_value(value: Value) -> Self {
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return PromptOperation::Malformed {
                    kind: String::new(),
                    reason: format!("operation must be an object, got {}", json_type(&other)),
                }
            }
        };

        let kind = match fields.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => String::new(),
        };
        let description = fields
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        let normalized = kind.trim().to_lowercase();
        let parsed = match normalized.as_str() {
            "create" | "edit" => required_str(&fields, &normalized, "target").and_then(|target| {
                let content = optional_str(&fields, &normalized, "content")?.unwrap_or_default();
                Ok(if normalized == "create" {
                    PromptOperation::Create {
                        target,
                        content,
                        description,
                    }
                } else {
                    PromptOperation::Edit {
                        target,
                        content,
                        description,
                    }
                })
            }),
            "delete" => required_str(&fields, &normalized, "target").map(|target| {
                PromptOperation::Delete {
                    target: DeleteTarget::parse(&target),
                    description,
                }
            }),
            "rename" => required_str(&fields, &normalized, "target").and_then(|target| {
                let new_name = optional_str(&fields, &normalized, "new_name")?
                    .filter(|n| !n.trim().is_empty());
                Ok(PromptOperation::Rename {
                    target,
                    new_name,
                    description,
                })
            }),
            // A list without a target means the workspace root.
            "list" => optional_str(&fields, &normalized, "target").map(|target| {
                PromptOperation::List {
                    target: target.unwrap_or_default(),
                    description,
                }
            }),
            _ => Ok(PromptOperation::Unsupported { kind: kind.clone() }),
        };

        parsed.unwrap_or_else(|reason| PromptOperation::Malformed { kind, reason })
    }
}

fn required_str(fields: &Map<String, Value>, kind: &str, key: &str) -> Result<String, String> {
    optional_str(fields, kind, key)?.ok_or_else(|| format!("{} is missing '{}'", kind, key))
}

/// Absent and `null` both read as `None`; any other non-string is an error.
fn optional_str(
    fields: &Map<String, Value>,
    kind: &str,
    key: &str,
) -> Result<Option<String>, String> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!(
            "{} '{}' must be a string, got {}",
            kind,
            key,
            json_type(other)
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Wire shape of the whole model reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTranslation {
    /// Kept untyped so one bad entry cannot sink the whole reply
    #[serde(default)]
    pub operations: Vec<Value>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationMethod {
    /// A model produced (or failed to produce) the operations
    Llm,
    /// No model call was possible
    None,
}

impl TranslationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationMethod::Llm => "llm",
            TranslationMethod::None => "none",
        }
    }
}

impl fmt::Display for TranslationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub operations: Vec<PromptOperation>,
    /// 0.0 ..= 1.0
    pub confidence: f64,
    pub reasoning: String,
    pub method: TranslationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranslationResult {
    pub const UNAVAILABLE: &'static str = "unavailable";

    /// Result shape used whenever no usable model reply could be obtained.
    pub fn unavailable(reasoning: impl Into<String>) -> Self {
        Self {
            operations: Vec::new(),
            confidence: 0.0,
            reasoning: reasoning.into(),
            method: TranslationMethod::None,
            error: Some(Self::UNAVAILABLE.to_string()),
        }
    }

    pub fn parse_failure(detail: impl Into<String>) -> Self {
        Self {
            operations: Vec::new(),
            confidence: 0.0,
            reasoning: "parse failure".to_string(),
            method: TranslationMethod::Llm,
            error: Some(detail.into()),
        }
    }

    pub fn from_raw(raw: RawTranslation) -> Self {
        let confidence = if raw.confidence.is_finite() {
            raw.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            operations: raw.operations.into_iter().map(PromptOperation::from_value).collect(),
            confidence,
            reasoning: raw.reasoning,
            method: TranslationMethod::Llm,
            error: None,
        }
    }

    /// Whether the pipeline may act on this translation.
    pub fn is_usable(&self) -> bool {
        self.method != TranslationMethod::None && self.error.is_none()
    }
}

/// Context handed to the translator alongside the prompt text.
#[derive(Debug, Clone, Default)]
pub struct TranslationContext {
    pub workspace_path: Option<String>,
}

/// What a prompt request reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptOutcome {
    pub success: bool,
    /// Display strings of the operation log, in execution order
    pub operations: Vec<String>,
    pub errors: Vec<String>,
    pub confidence: f64,
    pub reasoning: String,
    pub method: TranslationMethod,
    /// Absolute path of the first file created, edited or renamed; empty if none
    pub file_path: String,
    pub success_message: String,
}

/// Translator health probe result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub available: bool,
    pub method: TranslationMethod,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_delete_target_sentinels() {
        for target in ["*", "all", "ALL", " all ", "all files", "Delete All Files please"] {
            assert_eq!(DeleteTarget::parse(target), DeleteTarget::AllFiles, "{}", target);
        }
        for target in ["notes.txt", "all.txt", "allfiles", "call"] {
            assert_eq!(
                DeleteTarget::parse(target),
                DeleteTarget::Path(target.to_string()),
                "{}",
                target
            );
        }
    }

    #[test]
    fn test_entries_become_typed_variants() {
        let create = PromptOperation::from_value(json!({"type": "create", "target": "a.txt"}));
        assert_eq!(
            create,
            PromptOperation::Create {
                target: "a.txt".into(),
                content: String::new(),
                description: None,
            }
        );

        let delete = PromptOperation::from_value(json!({"type": "Delete", "target": "*"}));
        assert!(matches!(
            delete,
            PromptOperation::Delete {
                target: DeleteTarget::AllFiles,
                ..
            }
        ));

        let append = PromptOperation::from_value(json!({"type": "append", "target": "a.txt"}));
        assert_eq!(
            append,
            PromptOperation::Unsupported {
                kind: "append".into()
            }
        );

        let untyped = PromptOperation::from_value(json!({"target": "a.txt"}));
        assert_eq!(untyped, PromptOperation::Unsupported { kind: String::new() });
    }

    #[test]
    fn test_description_is_carried() {
        let op = PromptOperation::from_value(
            json!({"type": "list", "target": "docs", "description": "look around"}),
        );
        assert_eq!(op.description(), Some("look around"));
        assert_eq!(op.kind(), "list");
    }

    #[test]
    fn test_null_or_missing_list_target_is_root() {
        for entry in [json!({"type": "list", "target": null}), json!({"type": "list"})] {
            assert_eq!(
                PromptOperation::from_value(entry),
                PromptOperation::List {
                    target: String::new(),
                    description: None,
                }
            );
        }
    }

    #[test]
    fn test_wrongly_shaped_entries_are_malformed() {
        let not_object = PromptOperation::from_value(json!("done"));
        assert_eq!(
            not_object,
            PromptOperation::Malformed {
                kind: String::new(),
                reason: "operation must be an object, got string".into(),
            }
        );
        assert_eq!(not_object.to_string(), "malformed operation");

        let null_target = PromptOperation::from_value(json!({"type": "create", "target": null}));
        assert_eq!(
            null_target,
            PromptOperation::Malformed {
                kind: "create".into(),
                reason: "create is missing 'target'".into(),
            }
        );

        let numeric_content =
            PromptOperation::from_value(json!({"type": "edit", "target": "a.txt", "content": 42}));
        assert_eq!(
            numeric_content,
            PromptOperation::Malformed {
                kind: "edit".into(),
                reason: "edit 'content' must be a string, got number".into(),
            }
        );
        assert_eq!(numeric_content.to_string(), "malformed 'edit'");

        let list_array = PromptOperation::from_value(json!({"type": "list", "target": ["a"]}));
        assert!(matches!(list_array, PromptOperation::Malformed { .. }));
    }

    #[test]
    fn test_blank_rename_target_counts_as_missing() {
        let typed = PromptOperation::from_value(
            json!({"type": "rename", "target": "a.txt", "new_name": "  "}),
        );
        assert!(matches!(typed, PromptOperation::Rename { new_name: None, .. }));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let result = TranslationResult::from_raw(RawTranslation {
            confidence: 3.5,
            ..Default::default()
        });
        assert_eq!(result.confidence, 1.0);
        assert!(result.is_usable());
    }

    #[test]
    fn test_unavailable_shape() {
        let result = TranslationResult::unavailable("no credential");
        assert_eq!(result.method, TranslationMethod::None);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.error.as_deref(), Some("unavailable"));
        assert!(!result.is_usable());
    }
}
