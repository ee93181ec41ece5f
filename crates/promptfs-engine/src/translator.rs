//! Natural-language prompt to typed operations.

use crate::llm::{
    parse_translation, translation_prompt, ChatBackend, OpenAiCompatibleBackend, RetryPolicy,
    HEALTH_CHECK_MAX_TOKENS, HEALTH_CHECK_PROMPT,
};
use promptfs_adapters::Config;
use promptfs_core::{HealthStatus, TranslationContext, TranslationMethod, TranslationResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub struct PromptTranslator {
    backend: Option<Arc<dyn ChatBackend>>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl PromptTranslator {
    pub fn new(
        backend: Option<Arc<dyn ChatBackend>>,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            retry,
            call_timeout,
        }
    }

    /// Translator that never calls a model.
    pub fn disabled() -> Self {
        Self::new(None, RetryPolicy::none(), Duration::from_secs(1))
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let backend = OpenAiCompatibleBackend::from_settings(&config.llm)?;
        match &backend {
            Some(b) => tracing::info!(model = b.model(), "Prompt translation enabled"),
            None => tracing::warn!("No model API key configured. Prompt translation is disabled."),
        }
        Ok(Self::new(
            backend.map(|b| Arc::new(b) as Arc<dyn ChatBackend>),
            RetryPolicy::from(&config.retry),
            config.llm.timeout(),
        ))
    }

    /// Never returns an error: failures are encoded in the result.
    pub async fn translate(&self, prompt: &str, context: &TranslationContext) -> TranslationResult {
        let Some(backend) = &self.backend else {
            return TranslationResult::unavailable("Model service not available");
        };

        let request = translation_prompt(prompt, context);
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match timeout(self.call_timeout, backend.complete(&request, None)).await {
                Ok(Ok(reply)) => {
                    let result = parse_translation(&reply);
                    tracing::info!(
                        attempt,
                        operations = result.operations.len(),
                        confidence = result.confidence,
                        "Prompt translated"
                    );
                    return result;
                }
                Ok(Err(err)) => last_error = format!("{:#}", err),
                Err(_) => {
                    last_error = format!(
                        "model call timed out after {}s",
                        self.call_timeout.as_secs_f64()
                    )
                }
            }

            if attempt < attempts {
                let delay = self.retry.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    "Model call failed: {}",
                    last_error
                );
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(attempts, "Model call failed: {}", last_error);
        TranslationResult::unavailable(format!(
            "Model call failed after {} attempts: {}",
            attempts, last_error
        ))
    }

    /// One short completion, no retries.
    pub async fn health(&self) -> HealthStatus {
        let Some(backend) = &self.backend else {
            return HealthStatus {
                available: false,
                method: TranslationMethod::None,
            };
        };

        let probe = backend.complete(HEALTH_CHECK_PROMPT, Some(HEALTH_CHECK_MAX_TOKENS));
        let available = match timeout(self.call_timeout, probe).await {
            Ok(Ok(reply)) => !reply.trim().is_empty(),
            Ok(Err(err)) => {
                tracing::error!("Model health check failed: {:#}", err);
                false
            }
            Err(_) => {
                tracing::error!("Model health check timed out");
                false
            }
        };

        HealthStatus {
            available,
            method: TranslationMethod::Llm,
        }
    }
}
