//! Error types for ping-buddy

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Message shown to the user for any failure that is not an input problem.
pub const GENERIC_FAILURE_MESSAGE: &str = "There was an issue processing your request.";

/// Main error type for ping-buddy operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Process invocation error: {0}")]
    ProcessInvocation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("External service error ({service}): {message}")]
    ExternalService { service: String, message: String },

    #[error("Invalid input: {0}")]
    UserInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error category, used for diagnostics at the presentation boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ProcessInvocation,
    Parse,
    ExternalService,
    UserInput,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::ProcessInvocation => write!(f, "process_invocation"),
            ErrorCategory::Parse => write!(f, "parse"),
            ErrorCategory::ExternalService => write!(f, "external_service"),
            ErrorCategory::UserInput => write!(f, "user_input"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

impl Error {
    /// Create a process invocation error
    pub fn process_invocation(msg: impl Into<String>) -> Self {
        Error::ProcessInvocation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create an external service error
    pub fn external_service(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::ExternalService {
            service: service.into(),
            message: msg.into(),
        }
    }

    /// Create a user input error
    pub fn user_input(msg: impl Into<String>) -> Self {
        Error::UserInput(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a vector index error
    pub fn vector_index(msg: impl Into<String>) -> Self {
        Error::VectorIndex(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ProcessInvocation(_) => ErrorCategory::ProcessInvocation,
            Error::Parse(_) | Error::Serialization(_) => ErrorCategory::Parse,
            Error::ExternalService { .. } => ErrorCategory::ExternalService,
            Error::UserInput(_) => ErrorCategory::UserInput,
            Error::Config(_) | Error::VectorIndex(_) | Error::InvalidState(_) | Error::Io(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Text safe to show to the user.
    ///
    /// Input problems are reported as-is so the user can correct them;
    /// everything else collapses to one generic message.
    pub fn user_message(&self) -> String {
        match self {
            Error::UserInput(msg) => msg.clone(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}
