//! MediaLive API error types

use thiserror::Error;

/// Error returned by a [`MediaLiveApi`](crate::MediaLiveApi) call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("NotFoundException: {0}")]
    NotFound(String),

    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("request failed: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the service reported the entity as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
