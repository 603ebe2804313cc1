use crate::constants::compactor;
use crate::error::Result;
use crate::llm::{CompletionOptions, LlmClient, Message, RetryPolicy};
use std::sync::Arc;

/// Rewrites one narrator reply into a shorter equivalent before it is stored.
///
/// Runs after every turn so the context grows by compacted replies only.
pub struct HistoryCompactor {
    llm: Arc<dyn LlmClient>,
    options: CompletionOptions,
    retry: RetryPolicy,
}

impl HistoryCompactor {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            options: CompletionOptions {
                model: model.into(),
                temperature: compactor::TEMPERATURE,
                max_tokens: compactor::MAX_TOKENS,
            },
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn instruction(raw_text: &str) -> String {
        compactor::INSTRUCTION.replace("{text}", raw_text)
    }

    /// Compact `raw_text`. Falls back to the input unchanged when the model
    /// returns no candidates.
    pub async fn compact(&self, raw_text: &str) -> Result<String> {
        let messages = [Message::user(Self::instruction(raw_text))];

        let response = self
            .retry
            .run(
                "compactor",
                || self.llm.chat(&messages, &self.options),
                |_, _| {},
            )
            .await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "compaction usage"
            );
        }

        match response.first_candidate() {
            Some(text) => {
                tracing::debug!(
                    raw_chars = raw_text.len(),
                    compacted_chars = text.len(),
                    "compacted narration"
                );
                Ok(text.to_string())
            }
            None => {
                tracing::warn!("compactor returned no candidates, keeping raw narration");
                Ok(raw_text.to_string())
            }
        }
    }
}
