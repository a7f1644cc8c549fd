use std::path::PathBuf;

/// Result alias that carries the custom [`AutoCutError`] type.
pub type Result<T> = std::result::Result<T, AutoCutError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum AutoCutError {
    /// The template document or application configuration could not be used.
    /// Raised while constructing an engine, so no partial engine escapes.
    #[error("configuration error: {0}")]
    Config(String),
    /// Source media handed to a detection collaborator does not exist.
    #[error("media not found: {}", .0.display())]
    MediaNotFound(PathBuf),
    /// Beat detection or transcription failed on an existing file.
    #[error("analysis failed: {0}")]
    Analysis(String),
    /// A timeline document could not be written (non-finite numbers) or read back.
    #[error("invalid timeline document: {0}")]
    Timeline(String),
    /// Free-form failure without a more specific variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON encoding and decoding errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper around YAML encoding and decoding errors.
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AutoCutError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    pub fn analysis<T: Into<String>>(msg: T) -> Self {
        Self::Analysis(msg.into())
    }
}

impl From<&str> for AutoCutError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for AutoCutError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
