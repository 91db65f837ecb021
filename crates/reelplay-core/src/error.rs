//! Error types for Reelplay Core

use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, Error>;

/// Library error types
#[derive(Error, Debug)]
pub enum Error {
    // Catalogue errors
    #[error("Video not found: {id}")]
    VideoNotFound { id: i64 },

    #[error("API request failed: {url}")]
    Api { url: String, source: reqwest::Error },

    #[error("API returned status {status} for {url}")]
    ApiStatus { url: String, status: u16 },

    #[error("Invalid API URL: {0}")]
    InvalidApiUrl(#[from] url::ParseError),

    // Playback errors
    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Playback speed out of range: {speed}")]
    InvalidSpeed { speed: f32 },

    #[error("Player session has shut down")]
    SessionClosed,

    // Network errors
    #[error("Reachability probe failed: {0}")]
    Probe(#[source] reqwest::Error),

    // Persistence errors
    #[error("State store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if retrying the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Api { .. } | Error::ApiStatus { .. } | Error::Probe(_) | Error::Io(_)
        )
    }

    /// Returns the error code used in logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::VideoNotFound { .. } => "VIDEO_NOT_FOUND",
            Error::Api { .. } => "API_REQUEST",
            Error::ApiStatus { .. } => "API_STATUS",
            Error::InvalidApiUrl(_) => "API_URL",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::InvalidSpeed { .. } => "INVALID_SPEED",
            Error::SessionClosed => "SESSION_CLOSED",
            Error::Probe(_) => "PROBE",
            Error::Store(_) => "STORE",
            Error::Serialization(_) => "SERIALIZATION",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Io(_) => "IO",
        }
    }
}
