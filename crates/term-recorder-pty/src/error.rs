//! PTY errors with structured context.
//!
//! Every variant carries the OS reason as text so the recorder can print it
//! and attach it to structured log events.

use serde_json::{Value, json};
use thiserror::Error;

/// PTY operation errors with structured context.
#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open PTY: {0}")]
    Open(String),
    #[error("Failed to spawn process: {0}")]
    Spawn(String),
    #[error("Failed to write to PTY: {0}")]
    Write(String),
    #[error("Failed to read from PTY: {0}")]
    Read(String),
    #[error("Failed to resize PTY: {0}")]
    Resize(String),
    #[error("Failed to write to terminal: {0}")]
    Output(String),
    #[error("Failed to wait for child process: {0}")]
    Wait(String),
}

impl PtyError {
    /// Returns structured context about the error for debugging.
    pub fn context(&self) -> Value {
        json!({
            "operation": self.operation(),
            "reason": self.reason()
        })
    }

    /// Returns a helpful suggestion for resolving the error.
    pub fn suggestion(&self) -> String {
        match self {
            PtyError::Open(_) => {
                "PTY allocation failed. Check system resource limits (ulimit -n) or /dev/ptmx permissions."
                    .to_string()
            }
            PtyError::Spawn(reason) => {
                if reason.contains("not found") || reason.contains("No such file") {
                    "Shell not found. Check the --shell path or TERM_RECORDER_SHELL.".to_string()
                } else if reason.contains("Permission denied") {
                    "Permission denied. Check file permissions.".to_string()
                } else {
                    "Shell spawn failed. Check the shell path and its arguments.".to_string()
                }
            }
            PtyError::Write(_) | PtyError::Read(_) | PtyError::Wait(_) => {
                "The shell session ended unexpectedly. Start a new session.".to_string()
            }
            PtyError::Resize(_) => "Failed to resize terminal. Try resizing again.".to_string(),
            PtyError::Output(_) => {
                "The controlling terminal is no longer writable. Check that stdout is still open."
                    .to_string()
            }
        }
    }

    /// Whether the failure happened before the child shell existed.
    pub fn is_setup_failure(&self) -> bool {
        matches!(self, PtyError::Open(_) | PtyError::Spawn(_))
    }

    /// Returns the operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            PtyError::Open(_) => "open",
            PtyError::Spawn(_) => "spawn",
            PtyError::Write(_) => "write",
            PtyError::Read(_) => "read",
            PtyError::Resize(_) => "resize",
            PtyError::Output(_) => "output",
            PtyError::Wait(_) => "wait",
        }
    }

    /// Returns the underlying reason/message for the error.
    pub fn reason(&self) -> &str {
        match self {
            PtyError::Open(r)
            | PtyError::Spawn(r)
            | PtyError::Write(r)
            | PtyError::Read(r)
            | PtyError::Resize(r)
            | PtyError::Output(r)
            | PtyError::Wait(r) => r,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_error_context() {
        let err = PtyError::Spawn("command not found".into());
        let ctx = err.context();
        assert_eq!(ctx["operation"], "spawn");
        assert_eq!(ctx["reason"], "command not found");
    }

    #[test]
    fn test_pty_error_suggestion_not_found() {
        let err = PtyError::Spawn("No such file or directory".into());
        assert!(err.suggestion().contains("not found"));
    }

    #[test]
    fn test_pty_error_suggestion_permission() {
        let err = PtyError::Spawn("Permission denied".into());
        assert!(err.suggestion().contains("Permission"));
    }

    #[test]
    fn test_pty_error_setup_failure() {
        assert!(PtyError::Open("failed".into()).is_setup_failure());
        assert!(PtyError::Spawn("not found".into()).is_setup_failure());
        assert!(!PtyError::Read("eio".into()).is_setup_failure());
        assert!(!PtyError::Output("broken pipe".into()).is_setup_failure());
    }

    #[test]
    fn test_pty_error_operation() {
        assert_eq!(PtyError::Open("x".into()).operation(), "open");
        assert_eq!(PtyError::Spawn("x".into()).operation(), "spawn");
        assert_eq!(PtyError::Write("x".into()).operation(), "write");
        assert_eq!(PtyError::Read("x".into()).operation(), "read");
        assert_eq!(PtyError::Resize("x".into()).operation(), "resize");
        assert_eq!(PtyError::Output("x".into()).operation(), "output");
        assert_eq!(PtyError::Wait("x".into()).operation(), "wait");
    }

    #[test]
    fn test_pty_error_reason() {
        let err = PtyError::Open("allocation failed".into());
        assert_eq!(err.reason(), "allocation failed");
    }
}
