//! Error types for framestep.
//!
//! Only fatal conditions live here. Content rejections (no input, short input,
//! low power, only silence) are normal outcomes carried by
//! [`ResultStatus`](crate::decode::instance::ResultStatus), never errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FramestepError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio input errors
    #[error("Failed to read audio: {message}")]
    AudioInput { message: String },

    // Scheduler errors
    #[error("Trellis initialization failed for instance {instance}: {message}")]
    TrellisInit { instance: String, message: String },

    #[error("Stream {stream} is not part of the engine context")]
    UnknownStream { stream: usize },

    #[error("Search failed for instance {instance}: {message}")]
    SearchFailed { instance: String, message: String },

    // Streaming feeder errors
    #[error("Feeder channel disconnected")]
    FeederDisconnected,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FramestepError>;
