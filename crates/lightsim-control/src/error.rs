//! Error types for the simulator
use thiserror::Error;

/// Simulator errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// DMX start address outside 1-512
    #[error("DMX address out of range: {0} (must be 1-512)")]
    AddressOutOfRange(u16),

    /// DMX channel outside 1-512
    #[error("DMX channel out of range: {0} (must be 1-512)")]
    ChannelOutOfRange(u32),

    /// DMX error
    #[error("DMX error: {0}")]
    DmxError(String),

    /// Entertainment stream error
    #[error("Stream error: {0}")]
    StreamError(String),

    /// HTTP API error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ControlError {
    /// Whether this error is a DMX range validation failure
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            ControlError::AddressOutOfRange(_) | ControlError::ChannelOutOfRange(_)
        )
    }
}

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, ControlError>;
