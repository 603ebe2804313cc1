mod compactor;
mod turn;

pub use compactor::HistoryCompactor;
pub use turn::{TurnEngine, TurnEvent, TurnResponse};
