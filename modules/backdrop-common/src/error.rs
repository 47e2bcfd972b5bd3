use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackdropError>;

/// Prefix of every user-facing generation failure.
pub const GENERATION_FAILED_PREFIX: &str = "Failed to generate image. Please try again.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackdropError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("No image generated in the response.")]
    EmptyResult,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Diagnostic classification of a [`BackdropError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Io,
    Service,
    EmptyResult,
    Config,
}

impl BackdropError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackdropError::Validation(_) => ErrorKind::Validation,
            BackdropError::Io(_) => ErrorKind::Io,
            BackdropError::Service(_) => ErrorKind::Service,
            BackdropError::EmptyResult => ErrorKind::EmptyResult,
            BackdropError::Config(_) => ErrorKind::Config,
        }
    }

    /// Text shown to the user. Service and empty-result failures share one
    /// prefix and keep the underlying detail.
    pub fn user_message(&self) -> String {
        match self {
            BackdropError::Service(detail) => format!("{GENERATION_FAILED_PREFIX} {detail}"),
            BackdropError::EmptyResult => format!("{GENERATION_FAILED_PREFIX} {self}"),
            BackdropError::Validation(detail) => detail.clone(),
            BackdropError::Io(detail) => format!("Could not load the image. {detail}"),
            BackdropError::Config(_) => self.to_string(),
        }
    }
}

impl From<std::io::Error> for BackdropError {
    fn from(e: std::io::Error) -> Self {
        BackdropError::Io(e.to_string())
    }
}
