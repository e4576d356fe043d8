//! Session identifiers and the filesystem layout derived from them.

use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

/// Directory under `$HOME` used when no output directory is given.
pub const DEFAULT_OUTPUT_DIR: &str = "~/terminal_logs";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionIdError {
    #[error("Terminal ID must not be empty")]
    Empty,
    #[error("Terminal ID {0:?} must not contain '/' or NUL")]
    Separator(String),
    #[error("Terminal ID {0:?} is reserved")]
    Reserved(String),
}

/// Caller-chosen name of a recording session.
///
/// Only values that yield plain file names are accepted, so every artifact
/// stays inside the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, SessionIdError> {
        if raw.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if raw.contains('/') || raw.contains('\0') {
            return Err(SessionIdError::Separator(raw.to_string()));
        }
        if raw == "." || raw == ".." {
            return Err(SessionIdError::Reserved(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lock, owner-record and log paths for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    dir: PathBuf,
    lock: PathBuf,
    owner: PathBuf,
    log: PathBuf,
}

impl SessionPaths {
    pub fn new(dir: impl Into<PathBuf>, id: &SessionId) -> Self {
        let dir = dir.into();
        Self {
            lock: dir.join(format!("terminal_{id}.lock")),
            owner: dir.join(format!("terminal_{id}.pid")),
            log: dir.join(format!("terminal_{id}.log")),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock(&self) -> &Path {
        &self.lock
    }

    pub fn owner(&self) -> &Path {
        &self.owner
    }

    pub fn log(&self) -> &Path {
        &self.log
    }

    /// Creates the output directory and any missing parents.
    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }
}

/// Expands a leading `~` to `home`. Other paths are returned unchanged.
pub fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Resolves the output directory: the given path, or the default, with `~` expanded.
pub fn resolve_output_dir(requested: Option<&Path>) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let path = requested.unwrap_or_else(|| Path::new(DEFAULT_OUTPUT_DIR));
    expand_home(path, home.as_deref())
}
