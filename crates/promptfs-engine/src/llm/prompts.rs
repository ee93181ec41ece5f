use promptfs_core::TranslationContext;

pub const HEALTH_CHECK_PROMPT: &str = "Hello";
pub const HEALTH_CHECK_MAX_TOKENS: u32 = 10;

const TRANSLATE_TEMPLATE: &str = r#"You are a file system assistant. Parse this user request and extract file operations.

User Request: "{prompt}"
Workspace Path: {workspace}

Respond with exactly one JSON object in this format:
{
    "operations": [
        {
            "type": "create|edit|delete|rename|list",
            "target": "filename or pattern",
            "content": "file content (for create/edit)",
            "new_name": "new filename (for rename)",
            "description": "what this operation does"
        }
    ],
    "confidence": 0.0-1.0,
    "reasoning": "why these operations were chosen"
}

Targets are paths relative to the workspace. Use "*" as the delete target to remove every file.
Only include operations that are clearly requested. Be conservative."#;

pub fn translation_prompt(prompt: &str, context: &TranslationContext) -> String {
    let workspace = context.workspace_path.as_deref().unwrap_or("unknown");
    TRANSLATE_TEMPLATE
        .replace("{workspace}", workspace)
        .replace("{prompt}", prompt)
}
