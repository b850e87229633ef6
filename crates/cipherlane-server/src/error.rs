//! Server error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cipherlane_engine::Error as EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Missing x-caller header")]
    MissingCaller,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Shadow mode is disabled")]
    ShadowDisabled,

    #[error("Metrics recorder not installed")]
    MetricsDisabled,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Config error: {0}")]
    Config(#[from] cipherlane_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::MissingCaller => StatusCode::UNAUTHORIZED,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::ShadowDisabled | ServerError::MetricsDisabled => StatusCode::NOT_FOUND,
            ServerError::Engine(e) => match e {
                EngineError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                EngineError::UnknownRecord(_)
                | EngineError::UnknownConfig(_)
                | EngineError::UnknownRequest(_) => StatusCode::NOT_FOUND,
                EngineError::AlreadyRevealed(_) => StatusCode::CONFLICT,
                EngineError::InvalidProof(_) | EngineError::MalformedBundle(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                EngineError::Oracle(_) => StatusCode::BAD_GATEWAY,
            },
            ServerError::Config(_) | ServerError::Io(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
