pub mod error;
pub mod constants;
pub mod llm;
pub mod context;
pub mod engine;
pub mod session;
pub mod config;

// Re-export key types
pub use error::{Result, TaleError};
pub use llm::{CompletionOptions, LlmClient, LlmResponse, Message, RetryPolicy, Role, StreamEvent};
pub use context::{ConversationStore, SaveFile};
pub use engine::{HistoryCompactor, TurnEngine, TurnEvent, TurnResponse};
pub use session::{InputOutcome, PlayerInput, Session, SessionState};
pub use config::Settings;
