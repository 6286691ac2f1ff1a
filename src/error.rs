//! Error taxonomy for recognition and automation.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutomationError {
    /// Window closed or invalid, zero-size region, or the OS capture call failed.
    #[error("Capture failed: {0}")]
    CaptureFailure(String),

    #[error("No template loaded for {category} '{key}'")]
    TemplateMissing { category: String, key: String },

    #[error("No match found: {0}")]
    NoMatchFound(String),

    #[error("Grid geometry not found: {0}")]
    GeometryNotFound(String),

    #[error("Timed out after {attempts} attempts waiting for {what}")]
    Timeout { what: String, attempts: u32 },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Input dispatch failed: {0}")]
    Input(String),
}

impl AutomationError {
    /// Errors that end the whole run instead of the current step.
    pub fn is_run_terminating(&self) -> bool {
        matches!(
            self,
            AutomationError::CaptureFailure(_)
                | AutomationError::InvalidConfig(_)
                | AutomationError::Cancelled
                | AutomationError::Input(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AutomationError>;
