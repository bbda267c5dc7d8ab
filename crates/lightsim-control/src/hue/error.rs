use thiserror::Error;

#[derive(Error, Debug)]
pub enum HueError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Stream socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Light '{0}' has no entertainment channel")]
    ChannelNotFound(String),
    #[error("Invalid bridge address: {0}")]
    InvalidAddress(String),
}
