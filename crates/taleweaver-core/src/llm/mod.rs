mod traits;
mod openai;
pub mod retry;

pub use traits::*;
pub use openai::OpenAIClient;
pub use retry::RetryPolicy;
