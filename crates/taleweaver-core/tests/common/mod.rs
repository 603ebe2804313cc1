#![allow(dead_code)]

use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use taleweaver_core::{
    CompletionOptions, LlmClient, LlmResponse, Message, StreamEvent, TaleError, TurnEvent,
};
use tokio::sync::mpsc::UnboundedReceiver as EventReceiver;

/// How a scripted call should fail.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Transient,
    Permanent,
}

impl Failure {
    fn to_error(self) -> TaleError {
        match self {
            Failure::Transient => TaleError::TransientService("429 Too Many Requests".into()),
            Failure::Permanent => TaleError::Llm("401 Unauthorized".into()),
        }
    }
}

/// A recorded request.
#[derive(Debug, Clone)]
pub struct Call {
    pub messages: Vec<Message>,
    pub options: CompletionOptions,
}

/// Mock LLM that plays back pre-programmed narrator streams and compactor
/// replies, and records every request it sees.
#[derive(Default)]
pub struct MockLlm {
    streams: Mutex<VecDeque<Result<Vec<StreamEvent>, Failure>>>,
    chats: Mutex<VecDeque<Result<Vec<String>, Failure>>>,
    /// Returned once `streams` is exhausted.
    stream_fallback: Mutex<Option<Failure>>,
    stream_calls: Mutex<Vec<Call>>,
    chat_calls: Mutex<Vec<Call>>,
    attempts: AtomicUsize,
}

impl MockLlm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a successful narrator stream made of `fragments`.
    pub fn narrate(&self, fragments: &[&str]) -> &Self {
        let mut events: Vec<StreamEvent> = fragments
            .iter()
            .map(|f| StreamEvent::TextDelta(f.to_string()))
            .collect();
        events.push(StreamEvent::Done);
        self.streams.lock().unwrap().push_back(Ok(events));
        self
    }

    pub fn stream_events(&self, events: Vec<StreamEvent>) -> &Self {
        self.streams.lock().unwrap().push_back(Ok(events));
        self
    }

    pub fn fail_stream(&self, failure: Failure) -> &Self {
        self.streams.lock().unwrap().push_back(Err(failure));
        self
    }

    pub fn always_fail_stream(&self, failure: Failure) -> &Self {
        *self.stream_fallback.lock().unwrap() = Some(failure);
        self
    }

    /// Queue a compactor reply with the given candidates.
    pub fn compact_to(&self, candidates: &[&str]) -> &Self {
        self.chats
            .lock()
            .unwrap()
            .push_back(Ok(candidates.iter().map(|c| c.to_string()).collect()));
        self
    }

    pub fn fail_chat(&self, failure: Failure) -> &Self {
        self.chats.lock().unwrap().push_back(Err(failure));
        self
    }

    pub fn stream_calls(&self) -> Vec<Call> {
        self.stream_calls.lock().unwrap().clone()
    }

    pub fn chat_calls(&self) -> Vec<Call> {
        self.chat_calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlm {
    async fn chat(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<LlmResponse, TaleError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.chat_calls.lock().unwrap().push(Call {
            messages: messages.to_vec(),
            options: options.clone(),
        });

        let next = self.chats.lock().unwrap().pop_front();
        match next {
            Some(Ok(candidates)) => Ok(LlmResponse {
                candidates,
                usage: None,
            }),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Ok(LlmResponse {
                candidates: vec!["compacted".to_string()],
                usage: None,
            }),
        }
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<UnboundedReceiver<StreamEvent>, TaleError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.stream_calls.lock().unwrap().push(Call {
            messages: messages.to_vec(),
            options: options.clone(),
        });

        let next = self.streams.lock().unwrap().pop_front();
        let events = match next {
            Some(Ok(events)) => events,
            Some(Err(failure)) => return Err(failure.to_error()),
            None => match *self.stream_fallback.lock().unwrap() {
                Some(failure) => return Err(failure.to_error()),
                None => vec![StreamEvent::Done],
            },
        };

        let (tx, rx) = unbounded();
        for event in events {
            tx.unbounded_send(event).unwrap();
        }
        Ok(rx)
    }
}

/// Drain everything the engine has emitted so far.
pub fn drain(rx: &mut EventReceiver<TurnEvent>) -> Vec<TurnEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
