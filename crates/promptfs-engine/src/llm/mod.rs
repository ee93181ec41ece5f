//! Model access for prompt translation.

mod client;
mod parse;
mod prompts;
mod retry;

pub use client::{ChatBackend, OpenAiCompatibleBackend};
pub use parse::{extract_first_json_object, parse_translation};
pub use prompts::{translation_prompt, HEALTH_CHECK_MAX_TOKENS, HEALTH_CHECK_PROMPT};
pub use retry::RetryPolicy;
