//! Recorder errors with structured context.
//!
//! Every error carries a category, a suggestion for the operator and a
//! sysexits.h-compliant exit code. A busy session is not an error: it is a
//! normal outcome, see `SessionOutcome::Busy`.

use std::io;
use std::path::PathBuf;

use serde_json::{Value, json};
use term_recorder_pty::PtyError;
use thiserror::Error;

use crate::common::{ErrorCategory, exit_codes};
use crate::session::lock::LockError;
use crate::session::paths::SessionIdError;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Terminal ID not provided")]
    MissingSessionId,

    #[error("Invalid terminal ID: {0}")]
    InvalidSessionId(#[from] SessionIdError),

    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputDir { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("Failed to initialize session log {}: {source}", path.display())]
    LogInit { path: PathBuf, source: io::Error },

    #[error("Failed to install signal handlers: {0}")]
    SignalSetup(io::Error),

    #[error("Terminal error: {0}")]
    Terminal(io::Error),

    #[error(transparent)]
    Pty(#[from] PtyError),
}

impl RecorderError {
    /// Returns the error category for programmatic handling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            RecorderError::MissingSessionId | RecorderError::InvalidSessionId(_) => {
                ErrorCategory::InvalidInput
            }
            RecorderError::Lock(LockError::Busy { .. }) => ErrorCategory::Busy,
            RecorderError::SignalSetup(_) => ErrorCategory::Internal,
            RecorderError::OutputDir { .. }
            | RecorderError::Lock(_)
            | RecorderError::LogInit { .. }
            | RecorderError::Terminal(_)
            | RecorderError::Pty(_) => ErrorCategory::External,
        }
    }

    /// Returns structured context about the error for debugging.
    pub fn context(&self) -> Value {
        match self {
            RecorderError::MissingSessionId => json!({ "operation": "parse_args" }),
            RecorderError::InvalidSessionId(e) => json!({
                "operation": "parse_args",
                "reason": e.to_string()
            }),
            RecorderError::OutputDir { path, source } => json!({
                "operation": "create_output_dir",
                "path": path.display().to_string(),
                "reason": source.to_string()
            }),
            RecorderError::Lock(e) => json!({
                "operation": "lock",
                "reason": e.to_string()
            }),
            RecorderError::LogInit { path, source } => json!({
                "operation": "init_log",
                "path": path.display().to_string(),
                "reason": source.to_string()
            }),
            RecorderError::SignalSetup(e) => json!({
                "operation": "signal_setup",
                "reason": e.to_string()
            }),
            RecorderError::Terminal(e) => json!({
                "operation": "terminal",
                "reason": e.to_string()
            }),
            RecorderError::Pty(e) => e.context(),
        }
    }

    /// Returns a helpful suggestion for resolving the error.
    pub fn suggestion(&self) -> String {
        match self {
            RecorderError::MissingSessionId => {
                "Pass a terminal ID, e.g. 'term-recorder 42'.".to_string()
            }
            RecorderError::InvalidSessionId(_) => {
                "Use a terminal ID without '/' so it forms a plain file name.".to_string()
            }
            RecorderError::OutputDir { .. } | RecorderError::LogInit { .. } => {
                "Check that the output directory is writable or pass a different one.".to_string()
            }
            RecorderError::Lock(_) => {
                "Check permissions on the lock file in the output directory.".to_string()
            }
            RecorderError::SignalSetup(_) => {
                "Signal registration failed. This is likely a bug; please report it.".to_string()
            }
            RecorderError::Terminal(_) => {
                "Terminal mode error. Try running 'reset' and starting again.".to_string()
            }
            RecorderError::Pty(e) => e.suggestion(),
        }
    }

    /// Converts to an exit code. A missing ID keeps the historical status 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            RecorderError::MissingSessionId => exit_codes::GENERAL_ERROR,
            _ => self.category().exit_code(),
        }
    }

    /// Returns structured JSON representation of this error.
    pub fn to_json(&self) -> Value {
        json!({
            "message": self.to_string(),
            "category": self.category().as_str(),
            "context": self.context(),
            "suggestion": self.suggestion()
        })
    }
}
