//! Error types and handling
//!
//! Errors reported to callers of the player.

use crate::config::ConfigError;
use crate::quiz::BundleError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Player error type
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("The quiz has no questions")]
    EmptyQuiz,

    #[error("Playback already started; restart first")]
    AlreadyStarted,

    #[error("Playback is running; restart first")]
    NotIdle,

    #[error("The player has shut down")]
    Closed,

    #[error("Quiz error: {0}")]
    Bundle(#[from] BundleError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response for the UI and the binary's stderr
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<PlayerError> for ErrorResponse {
    fn from(error: PlayerError) -> Self {
        let code = match &error {
            PlayerError::EmptyQuiz => "EMPTY_QUIZ",
            PlayerError::AlreadyStarted => "ALREADY_STARTED",
            PlayerError::NotIdle => "NOT_IDLE",
            PlayerError::Closed => "PLAYER_CLOSED",
            PlayerError::Bundle(_) => "QUIZ_ERROR",
            PlayerError::Config(_) => "CONFIG_ERROR",
            PlayerError::Io(_) => "IO_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using PlayerError
pub type PlayerResult<T> = Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_codes() {
        let response = ErrorResponse::from(PlayerError::EmptyQuiz);
        assert_eq!(response.code, "EMPTY_QUIZ");
        assert_eq!(response.message, "The quiz has no questions");

        let response = ErrorResponse::from(PlayerError::from(BundleError::MissingFile(
            "quiz.json".to_string(),
        )));
        assert_eq!(response.code, "QUIZ_ERROR");
    }
}
