use crate::constants::input;
use crate::context::{ConversationStore, SaveFile};
use crate::engine::{TurnEngine, TurnEvent, TurnResponse};
use crate::error::{Result, TaleError};
use tokio::sync::mpsc::UnboundedSender;

/// Where the session loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Bootstrapping,
    AwaitingCommand,
    Processing,
    Saving,
    Loading,
    Terminated,
}

/// One line of player input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerInput {
    Save,
    Load,
    Command(String),
}

impl PlayerInput {
    /// `save` and `load` are matched case-insensitively after trimming;
    /// anything else non-blank is forwarded verbatim.
    pub fn parse(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(TaleError::InvalidInput("empty command".into()));
        }
        if trimmed.eq_ignore_ascii_case(input::SAVE) {
            Ok(Self::Save)
        } else if trimmed.eq_ignore_ascii_case(input::LOAD) {
            Ok(Self::Load)
        } else {
            Ok(Self::Command(line.to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    Saved { messages: usize },
    Loaded { messages: usize },
    Narrated(TurnResponse),
}

/// A single game: the active store plus everything needed to advance it.
pub struct Session {
    store: ConversationStore,
    engine: TurnEngine,
    save_file: SaveFile,
    state: SessionState,
}

impl Session {
    pub fn new(engine: TurnEngine, save_file: SaveFile) -> Self {
        Self {
            store: ConversationStore::new(),
            engine,
            save_file,
            state: SessionState::Bootstrapping,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn save_file(&self) -> &SaveFile {
        &self.save_file
    }

    pub fn has_saved_game(&self) -> bool {
        self.save_file.exists()
    }

    /// Bootstrap from the saved game. On error the session stays in
    /// `Bootstrapping` so the caller can fall back to [`Session::new_game`].
    pub fn resume(&mut self) -> Result<usize> {
        self.expect_state(SessionState::Bootstrapping)?;
        self.store = self.save_file.load()?;
        self.transition(SessionState::AwaitingCommand);
        Ok(self.store.len())
    }

    /// Bootstrap a fresh game by narrating the opening scene for `theme`.
    pub async fn new_game(
        &mut self,
        theme: &str,
        events: &UnboundedSender<TurnEvent>,
    ) -> Result<TurnResponse> {
        self.expect_state(SessionState::Bootstrapping)?;
        let mut store = ConversationStore::new();
        let response = self.engine.open_scene(&mut store, theme, events).await?;
        self.store = store;
        self.transition(SessionState::AwaitingCommand);
        Ok(response)
    }

    /// Service one line of input. Whatever happens the session returns to
    /// `AwaitingCommand` afterwards.
    pub async fn handle_input(
        &mut self,
        line: &str,
        events: &UnboundedSender<TurnEvent>,
    ) -> Result<InputOutcome> {
        self.expect_state(SessionState::AwaitingCommand)?;

        let outcome = match PlayerInput::parse(line)? {
            PlayerInput::Save => {
                self.transition(SessionState::Saving);
                self.save_file
                    .save(&self.store)
                    .map(|_| InputOutcome::Saved {
                        messages: self.store.len(),
                    })
            }
            PlayerInput::Load => {
                self.transition(SessionState::Loading);
                self.save_file.load().map(|store| {
                    self.store = store;
                    InputOutcome::Loaded {
                        messages: self.store.len(),
                    }
                })
            }
            PlayerInput::Command(command) => {
                self.transition(SessionState::Processing);
                self.engine
                    .run_turn(&mut self.store, &command, events)
                    .await
                    .map(InputOutcome::Narrated)
            }
        };

        self.transition(SessionState::AwaitingCommand);
        outcome
    }

    pub fn terminate(&mut self) {
        self.transition(SessionState::Terminated);
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TaleError::InvalidInput(format!(
                "session is {:?}, expected {:?}",
                self.state, expected
            )))
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_are_case_insensitive() {
        assert_eq!(PlayerInput::parse("save").unwrap(), PlayerInput::Save);
        assert_eq!(PlayerInput::parse("SAVE").unwrap(), PlayerInput::Save);
        assert_eq!(PlayerInput::parse("  Load \n").unwrap(), PlayerInput::Load);
    }

    #[test]
    fn other_input_is_forwarded_verbatim() {
        assert_eq!(
            PlayerInput::parse("save the princess").unwrap(),
            PlayerInput::Command("save the princess".into())
        );
        assert_eq!(
            PlayerInput::parse("go north").unwrap(),
            PlayerInput::Command("go north".into())
        );
    }

    #[test]
    fn blank_input_is_invalid() {
        assert!(matches!(
            PlayerInput::parse("   "),
            Err(TaleError::InvalidInput(_))
        ));
    }
}
