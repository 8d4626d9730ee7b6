use thiserror::Error;

/// Errors raised by a key-value storage backend.
#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid storage data: {message}")]
    InvalidData { message: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Network unreachable, connection reset, or the body failed mid-read.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("{}", upstream_text(.status, .message))]
    Upstream { status: u16, message: String },

    #[error("a response is still streaming")]
    ExchangeInProgress,

    #[error("nothing to send")]
    EmptySubmission,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported image file: {0}")]
    UnsupportedImage(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn upstream_text(status: &u16, message: &str) -> String {
    if message.is_empty() {
        format!("server returned HTTP {}", status)
    } else {
        format!("server returned HTTP {}: {}", status, message)
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
