use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum KvError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, KvError>;

// Error conversions for common error types

impl From<bincode::error::EncodeError> for KvError {
    fn from(e: bincode::error::EncodeError) -> Self {
        KvError::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for KvError {
    fn from(e: bincode::error::DecodeError) -> Self {
        KvError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for KvError {
    fn from(e: serde_json::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}
