//! Diagnostics for the recorder itself, never for the recorded shell.
//!
//! Lock contention, session state changes, signal handling, PTY resizes and
//! log write failures are emitted as `tracing` events. During a session the
//! controlling terminal is in raw mode and owned by the shell, so events on
//! stderr land between shell output; `TERM_RECORDER_LOG` sends them to a
//! file instead.

use std::io::IsTerminal;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Environment variable naming a file that receives diagnostics instead of stderr.
pub const LOG_FILE_ENV: &str = "TERM_RECORDER_LOG";

#[derive(Debug)]
pub struct TelemetryGuard {
    _guard: Option<WorkerGuard>,
}

impl TelemetryGuard {
    fn disabled() -> Self {
        Self { _guard: None }
    }
}

/// Installs the global subscriber at `default_level` unless `RUST_LOG` says
/// otherwise. Keep the guard alive until exit so the file writer flushes.
pub fn init_tracing(default_level: &str) -> TelemetryGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (writer, guard, to_file) = match log_file_path_from_env() {
        Some(path) => match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                (BoxMakeWriter::new(non_blocking), Some(guard), true)
            }
            Err(err) => {
                eprintln!(
                    "Warning: failed to open log file {}: {}",
                    path.display(),
                    err
                );
                (BoxMakeWriter::new(std::io::stderr), None, false)
            }
        },
        None => (BoxMakeWriter::new(std::io::stderr), None, false),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(!to_file && std::io::stderr().is_terminal())
        .with_writer(writer);

    if subscriber.try_init().is_err() {
        return TelemetryGuard::disabled();
    }

    tracing::debug!(
        destination = if to_file { "file" } else { "stderr" },
        "Recorder diagnostics enabled"
    );
    TelemetryGuard { _guard: guard }
}

fn log_file_path_from_env() -> Option<PathBuf> {
    std::env::var(LOG_FILE_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
