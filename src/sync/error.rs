use crate::generation::ServiceError;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the sync controller. None of them is fatal: every
/// failure path leaves the controller idle and re-triggerable.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid input: {0}")]
    InvalidInputKind(String),

    #[error("{0} must not be empty")]
    EmptyInput(&'static str),

    #[error("Generation failed: {0}")]
    GenerationService(#[from] ServiceError),

    #[error("Could not resolve link: {0}")]
    LinkResolution(String),

    #[error("Generation cycle crashed: {0}")]
    CycleCrashed(String),

    #[error("Sync controller is not running")]
    ControllerStopped,
}

/// Category of the message held in the controller's "last error" slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidInputKind,
    EmptyInput,
    GenerationServiceError,
    PartialParseWarning,
    LinkResolutionError,
    Internal,
}

/// What the presentation layer shows for the most recent failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn partial_parse(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::PartialParseWarning,
            message: message.into(),
        }
    }

    pub fn is_warning(&self) -> bool {
        self.kind == ErrorKind::PartialParseWarning
    }
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::InvalidInputKind(_) => ErrorKind::InvalidInputKind,
            SyncError::EmptyInput(_) => ErrorKind::EmptyInput,
            SyncError::GenerationService(_) => ErrorKind::GenerationServiceError,
            SyncError::LinkResolution(_) => ErrorKind::LinkResolutionError,
            SyncError::CycleCrashed(_) | SyncError::ControllerStopped => ErrorKind::Internal,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}
