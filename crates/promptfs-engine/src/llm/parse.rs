//! Pulling the translation object out of a free-form model reply.

use promptfs_core::{RawTranslation, TranslationResult};

/// Return the first `{` that closes a balanced object, skipping braces
/// inside string literals. Unbalanced openers are skipped.
pub fn extract_first_json_object(content: &str) -> Option<&str> {
    content
        .char_indices()
        .filter(|(_, ch)| *ch == '{')
        .find_map(|(idx, _)| balanced_object_at(content, idx))
}

fn balanced_object_at(content: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&content[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Turn a raw reply into a translation. Never fails: an unusable reply
/// becomes a parse-failure result.
pub fn parse_translation(reply: &str) -> TranslationResult {
    let Some(candidate) = extract_first_json_object(reply) else {
        return TranslationResult::parse_failure("No JSON object found in model response");
    };

    match serde_json::from_str::<RawTranslation>(candidate) {
        Ok(raw) => TranslationResult::from_raw(raw),
        Err(err) => {
            tracing::debug!("Model reply was not valid translation JSON: {}", err);
            TranslationResult::parse_failure(format!("Invalid JSON response from model: {}", err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptfs_core::{PromptOperation, TranslationMethod};

    #[test]
    fn test_extracts_object_surrounded_by_prose() {
        let reply = r#"Sure! {"operations": [{"type":"create","target":"a.txt"}], "confidence": 0.8} Thanks."#;
        let result = parse_translation(reply);

        assert_eq!(result.method, TranslationMethod::Llm);
        assert!(result.error.is_none());
        assert_eq!(result.confidence, 0.8);
        assert_eq!(result.operations.len(), 1);
        assert!(matches!(
            &result.operations[0],
            PromptOperation::Create { target, .. } if target == "a.txt"
        ));
    }

    #[test]
    fn test_non_json_reply_is_parse_failure() {
        let result = parse_translation("I cannot help with that.");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, TranslationMethod::Llm);
        assert!(result.operations.is_empty());
        assert!(result.error.is_some());
        assert_eq!(result.reasoning, "parse failure");
    }

    #[test]
    fn test_first_object_wins_over_greedy_span() {
        let reply = r#"{"operations": [], "confidence": 0.3} and later {"confidence": 0.9}"#;
        assert_eq!(
            extract_first_json_object(reply),
            Some(r#"{"operations": [], "confidence": 0.3}"#)
        );
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let reply = r#"x {"reasoning": "uses } and { and \" quotes", "confidence": 1} y"#;
        let extracted = extract_first_json_object(reply).unwrap();
        assert!(extracted.ends_with("\"confidence\": 1}"));
        assert_eq!(parse_translation(reply).reasoning, r#"uses } and { and " quotes"#);
    }

    #[test]
    fn test_unclosed_opener_is_skipped() {
        let reply = r#"draft { not closed... final {"confidence": 0.5}"#;
        assert_eq!(extract_first_json_object(reply), Some(r#"{"confidence": 0.5}"#));
    }

    #[test]
    fn test_null_list_target_keeps_whole_reply() {
        let reply = r#"{"operations":[{"type":"create","target":"a.txt","content":"x"},{"type":"list","target":null}],"confidence":0.9}"#;
        let result = parse_translation(reply);

        assert!(result.is_usable());
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.operations.len(), 2);
        assert_eq!(result.operations[0].kind(), "create");
        assert!(matches!(
            &result.operations[1],
            PromptOperation::List { target, .. } if target.is_empty()
        ));
    }

    #[test]
    fn test_bad_entry_becomes_malformed_not_parse_failure() {
        let reply = r#"{"operations":[{"type":"create","target":"a.txt","content":"x"},"done",{"type":"delete","target":5}],"confidence":0.7}"#;
        let result = parse_translation(reply);

        assert!(result.is_usable());
        assert_eq!(result.operations.len(), 3);
        assert!(matches!(
            &result.operations[0],
            PromptOperation::Create { target, content, .. } if target == "a.txt" && content == "x"
        ));
        assert!(matches!(
            &result.operations[1],
            PromptOperation::Malformed { kind, .. } if kind.is_empty()
        ));
        assert!(matches!(
            &result.operations[2],
            PromptOperation::Malformed { kind, reason }
                if kind == "delete" && reason == "delete 'target' must be a string, got number"
        ));
    }

    #[test]
    fn test_wrong_shape_is_parse_failure() {
        let result = parse_translation(r#"{"operations": "create a.txt"}"#);
        assert!(result.error.is_some());
        assert!(!result.is_usable());
    }
}
