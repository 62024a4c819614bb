use thiserror::Error;

pub type Result<T> = std::result::Result<T, RealtimeError>;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connect timed out: {0}")]
    Timeout(#[from] resilience::TimeoutError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("query key error: {0}")]
    QueryKey(#[from] cache_invalidation::InvalidationError),

    #[error("desktop notification failed: {0}")]
    Notifier(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        RealtimeError::Transport(e.to_string())
    }
}
