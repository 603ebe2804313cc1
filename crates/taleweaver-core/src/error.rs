use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaleError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Rate limits, timeouts and other faults worth retrying.
    #[error("Transient service error: {0}")]
    TransientService(String),

    #[error("Service unavailable after {attempts} attempts: {message}")]
    FatalService { attempts: u32, message: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("No saved game at {0}")]
    NotFound(String),

    #[error("Saved game is corrupt: {0}")]
    CorruptData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TaleError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientService(_))
    }

    /// Classify a transport failure. Timeouts and refused connections are
    /// retryable, anything else is passed through as-is.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::TransientService(err.to_string())
        } else {
            Self::Http(err)
        }
    }

    /// Classify a non-success HTTP status returned by a model endpoint.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("API error ({status}): {body}");
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            Self::TransientService(message)
        } else {
            Self::Llm(message)
        }
    }
}

pub type Result<T> = std::result::Result<T, TaleError>;
