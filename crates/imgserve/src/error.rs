//! Error types for the image server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use image_info::ExtractError;
use std::fmt;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug)]
pub enum ServerError {
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Io(err) => write!(f, "IO error: {}", err),
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Io(err) => Some(err.as_ref()),
            ServerError::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Failures of `GET /info/{name}`, rendered as plain-text responses
#[derive(Debug)]
pub enum InfoError {
    EmptyName,
    InvalidName(String),
    Extract(Arc<ExtractError>),
}

impl InfoError {
    pub fn status(&self) -> StatusCode {
        match self {
            InfoError::EmptyName | InfoError::InvalidName(_) => StatusCode::BAD_REQUEST,
            InfoError::Extract(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            InfoError::Extract(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for InfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoError::EmptyName => write!(f, "name can not be empty"),
            InfoError::InvalidName(name) => write!(f, "invalid image name '{}'", name),
            InfoError::Extract(e) => write!(f, "{}", e),
        }
    }
}

impl From<Arc<ExtractError>> for InfoError {
    fn from(err: Arc<ExtractError>) -> Self {
        InfoError::Extract(err)
    }
}

impl IntoResponse for InfoError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            error!(error = %message, "Image info extraction failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "Rejected image info request");
        }

        (status, message).into_response()
    }
}
