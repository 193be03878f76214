use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API error: {code} - {message}")]
    ApiError { code: i32, message: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Failed to read request body for signing: {0}")]
    BodyReadError(String),

    #[error("WebSocket connection failed: {0}")]
    ConnectError(String),

    #[error("WebSocket connection timed out: {0}")]
    ConnectionTimeout(String),

    #[error("Failed to send WebSocket message: {0}")]
    SendError(String),

    #[error("Channel {0} already subscribed")]
    AlreadySubscribed(String),

    #[error("Channel {0} not subscribed")]
    NotSubscribed(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),

    #[error("Other error: {0}")]
    Other(String),
}

impl ExchangeError {
    /// Whether the dial exceeded its deadline rather than being refused outright
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout(_))
    }
}
