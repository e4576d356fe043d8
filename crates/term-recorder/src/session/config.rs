//! Resolved recorder configuration and the child shell's environment.

use std::collections::HashMap;
use std::path::PathBuf;

use term_recorder_pty::SpawnRequest;

use crate::session::paths::SessionId;
use crate::session::paths::SessionPaths;

/// Set to `1` in the shell so prompts and rc files can show recording status.
pub const RECORDING_FLAG_VAR: &str = "TERMINAL_RECORDING";
/// Carries the session identifier into the shell.
pub const SESSION_ID_VAR: &str = "FTERMID";

pub const DEFAULT_SHELL: &str = "/bin/bash";
pub const DEFAULT_SHELL_ARGS: &[&str] = &["--login"];
const DEFAULT_TERM: &str = "xterm-256color";

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub session_id: SessionId,
    pub output_dir: PathBuf,
    pub shell: String,
    pub shell_args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Environment the shell inherits before the recorder's own variables.
    pub base_env: HashMap<String, String>,
}

impl RecorderConfig {
    /// Login shell defaults, the current directory and the current environment.
    pub fn new(session_id: SessionId, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_id,
            output_dir: output_dir.into(),
            shell: DEFAULT_SHELL.to_string(),
            shell_args: DEFAULT_SHELL_ARGS.iter().map(|s| s.to_string()).collect(),
            cwd: std::env::current_dir().ok(),
            base_env: inherited_env(),
        }
    }

    /// Replaces the shell; empty `args` keeps the login default.
    pub fn with_shell(mut self, shell: impl Into<String>, args: Vec<String>) -> Self {
        self.shell = shell.into();
        if !args.is_empty() {
            self.shell_args = args;
        }
        self
    }

    pub fn paths(&self) -> SessionPaths {
        SessionPaths::new(&self.output_dir, &self.session_id)
    }

    pub fn child_env(&self) -> HashMap<String, String> {
        let mut env = self.base_env.clone();
        env.insert(RECORDING_FLAG_VAR.to_string(), "1".to_string());
        env.insert(SESSION_ID_VAR.to_string(), self.session_id.to_string());
        env.entry("TERM".to_string())
            .or_insert_with(|| DEFAULT_TERM.to_string());
        env
    }

    pub fn spawn_request(&self, cols: u16, rows: u16) -> SpawnRequest {
        SpawnRequest {
            command: self.shell.clone(),
            args: self.shell_args.clone(),
            env: self.child_env(),
            cwd: self.cwd.clone(),
            cols,
            rows,
        }
    }
}

/// The recorder's environment. Variables that are not valid UTF-8 are skipped.
fn inherited_env() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}
