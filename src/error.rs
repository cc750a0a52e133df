use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReminderBotError {
    #[error("configuration error: {0}")]
    Config(String),
    /// A remote call failed in a way retrying will not fix.
    #[error("http error: {0}")]
    Http(String),
    /// A remote call failed in a way that may clear up: rate limits, 5xx
    /// responses, dropped connections.
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid tool arguments: {0}")]
    InvalidToolArguments(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ReminderBotError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReminderBotError::Timeout(_) | ReminderBotError::Unavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReminderBotError>;
