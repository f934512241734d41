//! Error types for metadata extraction and speed tracking

use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// Errors raised while extracting metadata for an image
#[derive(Debug)]
pub enum ExtractError {
    /// The image does not exist under the served directory
    NotFound(PathBuf),
    /// The extraction tool could not be started
    Launch(Box<std::io::Error>),
    /// The extraction tool exited unsuccessfully
    ToolFailure { status: ExitStatus, stderr: String },
    /// The extraction tool did not finish in time and was killed
    Timeout(Duration),
    /// The tool output is not a usable metadata document
    Parse(String),
}

impl ExtractError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(_) => write!(f, "image not found"),
            Self::Launch(e) => write!(f, "failed to run qemu-img: {}", e),
            Self::ToolFailure { status, stderr } => {
                write!(f, "error while reading output of qemu-img command: {}", status)?;
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            Self::Timeout(after) => write!(f, "qemu-img timed out after {:?}", after),
            Self::Parse(msg) => write!(f, "invalid qemu-img output: {}", msg),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Launch(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExtractError {
    fn from(err: std::io::Error) -> Self {
        Self::Launch(Box::new(err))
    }
}

impl From<serde_json::Error> for ExtractError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Reasons an average download speed could not be computed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeedError {
    /// Elapsed whole seconds were zero or negative
    NonPositiveDuration(i64),
    /// No cached metadata exists for the image
    UnknownImage(String),
}

impl fmt::Display for SpeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveDuration(secs) => write!(f, "unexpected duration {}", secs),
            Self::UnknownImage(name) => write!(f, "No info about image '{}'", name),
        }
    }
}

impl std::error::Error for SpeedError {}

pub type Result<T> = std::result::Result<T, ExtractError>;
