use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("discord error: {0}")]
    Discord(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
