mod history;
pub mod persistence;

pub use history::ConversationStore;
pub use persistence::{SaveFile, SavedMessage};
