use crate::constants::{models, narrator};
use crate::context::ConversationStore;
use crate::engine::HistoryCompactor;
use crate::error::{Result, TaleError};
use crate::llm::{CompletionOptions, LlmClient, Message, RetryPolicy, StreamEvent};
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Events emitted while a turn is played - the interface the front end renders.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A fragment of narration, in arrival order.
    TextDelta(String),
    Retrying {
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
    Compacting,
    Complete {
        narration_chars: usize,
        committed_chars: usize,
    },
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnResponse {
    /// The reply exactly as streamed to the player.
    pub narration: String,
    /// The text committed to the store (compacted unless compaction is off).
    pub committed: String,
}

/// Plays single turns against the narrator model.
pub struct TurnEngine {
    narrator: Arc<dyn LlmClient>,
    options: CompletionOptions,
    system_prompt: String,
    compactor: Option<HistoryCompactor>,
    retry: RetryPolicy,
}

impl TurnEngine {
    pub fn new(narrator: Arc<dyn LlmClient>) -> Self {
        Self {
            narrator,
            options: CompletionOptions {
                model: models::DEFAULT_NARRATOR_MODEL.to_string(),
                temperature: narrator::TEMPERATURE,
                max_tokens: narrator::MAX_TOKENS,
            },
            system_prompt: narrator::SYSTEM_PROMPT.to_string(),
            compactor: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_compactor(mut self, compactor: HistoryCompactor) -> Self {
        self.compactor = Some(compactor);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn compaction_enabled(&self) -> bool {
        self.compactor.is_some()
    }

    /// Play one player command.
    ///
    /// The `{User, command}` / `{Assistant, reply}` pair is committed only
    /// once the reply has been streamed and compacted; on any failure the
    /// store is left untouched.
    pub async fn run_turn(
        &self,
        store: &mut ConversationStore,
        command: &str,
        events: &UnboundedSender<TurnEvent>,
    ) -> Result<TurnResponse> {
        if command.trim().is_empty() {
            return Err(TaleError::InvalidInput("command is empty".into()));
        }

        let user = Message::user(command);
        let response = self.narrate(store, user.clone(), events).await?;

        store.append(user);
        store.append(Message::assistant(response.committed.clone()));

        tracing::debug!(
            messages = store.len(),
            estimated_tokens = store.estimate_tokens(),
            "turn committed"
        );
        Ok(response)
    }

    /// Generate the opening scene for `theme`. Only the narrator's reply is
    /// committed; the seed instruction itself never enters the store.
    pub async fn open_scene(
        &self,
        store: &mut ConversationStore,
        theme: &str,
        events: &UnboundedSender<TurnEvent>,
    ) -> Result<TurnResponse> {
        let theme = theme.trim();
        if theme.is_empty() {
            return Err(TaleError::InvalidInput("theme is empty".into()));
        }

        let seed = Message::user(narrator::SEED_PROMPT.replace("{theme}", theme));
        let response = self.narrate(store, seed, events).await?;
        store.append(Message::assistant(response.committed.clone()));

        tracing::debug!(theme, messages = store.len(), "opening scene committed");
        Ok(response)
    }

    async fn narrate(
        &self,
        store: &ConversationStore,
        pending: Message,
        events: &UnboundedSender<TurnEvent>,
    ) -> Result<TurnResponse> {
        let mut messages = Vec::with_capacity(store.len() + 2);
        messages.push(Message::system(&self.system_prompt));
        messages.extend_from_slice(store.as_context());
        messages.push(pending);

        // A failure before the first fragment has shown the player nothing,
        // so it is retried like a failed request. Later failures are not.
        let narrator = self.narrator.as_ref();
        let options = &self.options;
        let context = messages.as_slice();
        let max_attempts = self.retry.max_attempts;
        let (mut stream, first) = self
            .retry
            .run(
                "narrator",
                move || async move {
                    let mut stream = narrator.chat_stream(context, options).await?;
                    let first = first_fragment(&mut stream).await?;
                    Ok::<_, TaleError>((stream, first))
                },
                |attempt, err| {
                    let _ = events.send(TurnEvent::Retrying {
                        attempt,
                        max_attempts,
                        error: err.to_string(),
                    });
                },
            )
            .await
            .inspect_err(|e| {
                let _ = events.send(TurnEvent::Error(e.to_string()));
            })?;

        let mut narration = String::new();
        if let Some(delta) = first {
            narration.push_str(&delta);
            let _ = events.send(TurnEvent::TextDelta(delta));
            loop {
                match stream.next().await {
                    Some(StreamEvent::TextDelta(delta)) => {
                        narration.push_str(&delta);
                        let _ = events.send(TurnEvent::TextDelta(delta));
                    }
                    Some(StreamEvent::Done) => break,
                    Some(StreamEvent::Error { message, .. }) => {
                        let _ = events.send(TurnEvent::Error(message.clone()));
                        return Err(TaleError::Llm(format!("narration interrupted: {message}")));
                    }
                    None => {
                        let message = "narration stream closed before completion";
                        let _ = events.send(TurnEvent::Error(message.to_string()));
                        return Err(TaleError::Llm(message.to_string()));
                    }
                }
            }
        }

        if narration.trim().is_empty() {
            let err = TaleError::Llm("narrator returned an empty reply".into());
            let _ = events.send(TurnEvent::Error(err.to_string()));
            return Err(err);
        }

        let committed = match &self.compactor {
            Some(compactor) => {
                let _ = events.send(TurnEvent::Compacting);
                compactor.compact(&narration).await.inspect_err(|e| {
                    let _ = events.send(TurnEvent::Error(e.to_string()));
                })?
            }
            None => narration.clone(),
        };

        let _ = events.send(TurnEvent::Complete {
            narration_chars: narration.len(),
            committed_chars: committed.len(),
        });

        Ok(TurnResponse {
            narration,
            committed,
        })
    }
}

/// Wait for the first fragment of a fresh stream. `None` means the narrator
/// finished without producing any text.
async fn first_fragment(stream: &mut UnboundedReceiver<StreamEvent>) -> Result<Option<String>> {
    match stream.next().await {
        Some(StreamEvent::TextDelta(delta)) => Ok(Some(delta)),
        Some(StreamEvent::Done) => Ok(None),
        Some(StreamEvent::Error {
            message,
            transient: true,
        }) => Err(TaleError::TransientService(message)),
        Some(StreamEvent::Error { message, .. }) => Err(TaleError::Llm(message)),
        None => Err(TaleError::TransientService(
            "narration stream closed before any text".into(),
        )),
    }
}
