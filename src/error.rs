use thiserror::Error;

/// Main error type for Refactory operations
#[derive(Error, Debug)]
pub enum RefactoryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scanner error: {0}")]
    Scanner(String),

    #[error("Offset {offset} is out of bounds or not a character boundary (content length {len})")]
    InvalidOffset { offset: usize, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Chat endpoint error: {0}")]
    Chat(String),

    #[error("Output generation error: {0}")]
    Output(String),
}

pub type Result<T> = std::result::Result<T, RefactoryError>;
