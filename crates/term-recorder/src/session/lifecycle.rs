//! Session lifecycle: lock, log, relay, cleanup.
//!
//! ```text
//! Init ──lock──> Locked ──log+signals+spawn──> Running ──> CleaningUp ──> Done
//!   └──busy──> LockingFailed
//! ```
//!
//! Cleanup runs on every path out of `Locked` or `Running`: child exit, a
//! shutdown signal, an error, or a panic (through `Drop`). It can run more
//! than once; repeats find nothing left to remove.

use std::io;
use std::io::Write;
use std::os::fd::RawFd;

use term_recorder_pty::PtyBridge;
use term_recorder_pty::RelayEnd;
use term_recorder_pty::RelayObserver;
use term_recorder_pty::shell_exit_code;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::common::Colors;
use crate::common::exit_codes;
use crate::error::RecorderError;
use crate::session::config::RecorderConfig;
use crate::session::lock::CleanupReport;
use crate::session::lock::LockError;
use crate::session::lock::SessionLock;
use crate::session::log::SessionLog;
use crate::session::paths::SessionPaths;
use crate::session::signals::ShutdownReason;
use crate::session::signals::ShutdownSignal;
use crate::session::terminal;
use crate::session::terminal::TerminalGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    Locked,
    Running,
    CleaningUp,
    Done,
    LockingFailed,
}

/// Result of [`SessionRecorder::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Acquired,
    Busy { owner_pid: Option<u32> },
}

/// How a session ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Another process is recording this identifier. Nothing was touched.
    Busy { owner_pid: Option<u32> },
    /// The shell exited with this status.
    ChildExited { exit_code: i32 },
    /// A termination signal ended the session.
    Signalled(ShutdownReason),
}

impl SessionOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionOutcome::Busy { .. } => exit_codes::SUCCESS,
            SessionOutcome::ChildExited { exit_code } => *exit_code,
            SessionOutcome::Signalled(reason) => reason.exit_code(),
        }
    }
}

pub struct SessionRecorder {
    config: RecorderConfig,
    paths: SessionPaths,
    state: LifecycleState,
    lock: Option<SessionLock>,
    log: Option<SessionLog>,
    shutdown: Option<ShutdownSignal>,
}

impl SessionRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        let paths = config.paths();
        Self {
            config,
            paths,
            state: LifecycleState::Init,
            lock: None,
            log: None,
            shutdown: None,
        }
    }

    /// Uses `shutdown` instead of installing process signal handlers.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    pub fn shutdown(&self) -> Option<&ShutdownSignal> {
        self.shutdown.as_ref()
    }

    /// Runs a whole session on the process's own terminal.
    pub fn run(mut self) -> Result<SessionOutcome, RecorderError> {
        if let LockStatus::Busy { owner_pid } = self.start()? {
            return Ok(SessionOutcome::Busy { owner_pid });
        }

        let result = self.prepare().and_then(|()| {
            eprintln!(
                "{} Recording session to {}",
                Colors::dim("[term-recorder]"),
                Colors::path(&self.paths.log().display().to_string())
            );
            let guard = TerminalGuard::new().map_err(RecorderError::Terminal)?;
            let mut stdout = io::stdout().lock();
            let outcome = self.relay(Some(libc::STDIN_FILENO), &mut stdout);
            drop(guard);
            outcome
        });

        if let Err(e) = &result {
            warn!(error = %e, context = %e.context(), "Session ended with an error");
        }
        self.cleanup();
        result
    }

    /// `Init -> Locked`, or `Init -> LockingFailed` when the lock is taken.
    ///
    /// A busy identifier leaves every session file untouched.
    pub fn start(&mut self) -> Result<LockStatus, RecorderError> {
        self.paths
            .ensure_dir()
            .map_err(|source| RecorderError::OutputDir {
                path: self.paths.dir().to_path_buf(),
                source,
            })?;

        match SessionLock::acquire(&self.paths) {
            Ok(lock) => {
                self.lock = Some(lock);
                self.state = LifecycleState::Locked;
                debug!(session = %self.config.session_id, "Session locked");
                Ok(LockStatus::Acquired)
            }
            Err(LockError::Busy { owner_pid, .. }) => {
                self.state = LifecycleState::LockingFailed;
                info!(
                    session = %self.config.session_id,
                    owner_pid = ?owner_pid,
                    "Session already active"
                );
                Ok(LockStatus::Busy { owner_pid })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Truncates the log and routes termination signals to the shutdown request.
    pub fn prepare(&mut self) -> Result<(), RecorderError> {
        debug_assert_eq!(self.state, LifecycleState::Locked);

        let log = SessionLog::init(self.paths.log()).map_err(|source| RecorderError::LogInit {
            path: self.paths.log().to_path_buf(),
            source,
        })?;
        self.log = Some(log);

        if self.shutdown.is_none() {
            let shutdown = ShutdownSignal::install().map_err(RecorderError::SignalSetup)?;
            self.shutdown = Some(shutdown);
        }
        Ok(())
    }

    /// `Locked -> Running`: spawns the shell and relays until it ends.
    ///
    /// `input` is read for keystrokes; `output` receives everything the
    /// shell prints, which is also appended to the session log.
    pub fn relay<W: Write>(
        &mut self,
        input: Option<RawFd>,
        output: &mut W,
    ) -> Result<SessionOutcome, RecorderError> {
        let (Some(log), Some(shutdown)) = (self.log.as_ref(), self.shutdown.as_ref()) else {
            return Err(RecorderError::Terminal(io::Error::other(
                "session was not prepared before relaying",
            )));
        };

        let (cols, rows) = terminal::initial_size();
        let request = self.config.spawn_request(cols, rows);
        let mut bridge = PtyBridge::spawn(&request, input)?;
        self.state = LifecycleState::Running;
        info!(
            session = %self.config.session_id,
            shell = %request.command,
            pid = ?bridge.pid(),
            "Session running"
        );

        let mut observer = Recording {
            log,
            shutdown,
            log_failing: false,
        };
        let end = bridge.run(output, &mut observer)?;
        drop(bridge);

        let outcome = match end {
            RelayEnd::Exited(status) => SessionOutcome::ChildExited {
                exit_code: shell_exit_code(&status),
            },
            RelayEnd::Stopped => {
                SessionOutcome::Signalled(shutdown.requested().unwrap_or(ShutdownReason::Terminate))
            }
        };
        debug!(outcome = ?outcome, "Relay finished");
        Ok(outcome)
    }

    /// Releases the lock and removes the lock and owner files.
    ///
    /// Returns `None` when there was never anything to clean up. Safe to
    /// call repeatedly.
    pub fn cleanup(&mut self) -> Option<CleanupReport> {
        if matches!(
            self.state,
            LifecycleState::Init | LifecycleState::LockingFailed
        ) {
            return None;
        }
        self.state = LifecycleState::CleaningUp;
        let report = self.lock.as_mut().map(SessionLock::release);
        self.state = LifecycleState::Done;
        debug!(report = ?report, "Session cleaned up");
        report
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Feeds shell output into the log and surfaces shutdown requests.
struct Recording<'a> {
    log: &'a SessionLog,
    shutdown: &'a ShutdownSignal,
    log_failing: bool,
}

impl RelayObserver for Recording<'_> {
    fn on_output(&mut self, chunk: &[u8]) {
        match self.log.append(chunk) {
            Ok(()) if self.log_failing => {
                self.log_failing = false;
                info!(path = %self.log.path().display(), "Session log is writable again");
            }
            Ok(()) => {}
            Err(e) if !self.log_failing => {
                self.log_failing = true;
                warn!(
                    path = %self.log.path().display(),
                    error = %e,
                    "Failed to write session log; output is not being recorded"
                );
            }
            Err(_) => {}
        }
    }

    fn stop_requested(&mut self) -> bool {
        self.shutdown.requested().is_some()
    }

    fn window_size(&mut self) -> Option<(u16, u16)> {
        terminal::window_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::lock::CleanupStep;
    use crate::session::paths::SessionId;
    use tempfile::TempDir;

    fn recorder(dir: &TempDir, id: &str, script: &str) -> SessionRecorder {
        let config = RecorderConfig::new(SessionId::parse(id).unwrap(), dir.path())
            .with_shell("/bin/sh", vec!["-c".to_string(), script.to_string()]);
        SessionRecorder::new(config).with_shutdown(ShutdownSignal::detached())
    }

    #[test]
    fn test_full_session_records_output_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let mut session = recorder(&dir, "42", "echo hello");

        assert_eq!(session.start().unwrap(), LockStatus::Acquired);
        assert_eq!(session.state(), LifecycleState::Locked);
        assert!(session.paths().lock().exists());
        assert!(session.paths().owner().exists());

        session.prepare().unwrap();
        assert_eq!(std::fs::metadata(session.paths().log()).unwrap().len(), 0);

        let mut terminal = Vec::new();
        let outcome = session.relay(None, &mut terminal).unwrap();
        assert_eq!(outcome, SessionOutcome::ChildExited { exit_code: 0 });
        assert_eq!(session.state(), LifecycleState::Running);

        let logged = std::fs::read(session.paths().log()).unwrap();
        assert_eq!(logged, terminal);
        assert!(String::from_utf8_lossy(&logged).contains("hello"));

        session.cleanup();
        assert_eq!(session.state(), LifecycleState::Done);
        assert!(!session.paths().lock().exists());
        assert!(!session.paths().owner().exists());
        assert!(session.paths().log().exists());
    }

    #[test]
    fn test_busy_session_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let mut first = recorder(&dir, "7", "true");
        first.start().unwrap();
        std::fs::write(first.paths().log(), b"first session").unwrap();
        let owner_before = std::fs::read(first.paths().owner()).unwrap();

        let mut second = recorder(&dir, "7", "true");
        let status = second.start().unwrap();

        assert_eq!(
            status,
            LockStatus::Busy {
                owner_pid: Some(std::process::id())
            }
        );
        assert_eq!(second.state(), LifecycleState::LockingFailed);
        assert_eq!(second.cleanup(), None);
        assert_eq!(std::fs::read(first.paths().log()).unwrap(), b"first session");
        assert_eq!(std::fs::read(first.paths().owner()).unwrap(), owner_before);
        assert!(first.paths().lock().exists());
    }

    #[test]
    fn test_cleanup_twice_matches_cleanup_once() {
        let dir = TempDir::new().unwrap();
        let mut session = recorder(&dir, "5", "true");
        session.start().unwrap();

        let first = session.cleanup().unwrap();
        assert!(first.is_clean());
        let listing_after_first: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        let second = session.cleanup().unwrap();
        assert!(second.is_clean());
        assert_eq!(second.lock_file, CleanupStep::Skipped);
        let listing_after_second: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(listing_after_first, listing_after_second);
        assert_eq!(session.state(), LifecycleState::Done);
    }

    #[test]
    fn test_shutdown_request_stops_session() {
        let dir = TempDir::new().unwrap();
        let mut session = recorder(&dir, "9", "sleep 30");
        session.start().unwrap();
        session.prepare().unwrap();
        session
            .shutdown()
            .unwrap()
            .request(ShutdownReason::Terminate);

        let outcome = session.relay(None, &mut Vec::new()).unwrap();

        assert_eq!(outcome, SessionOutcome::Signalled(ShutdownReason::Terminate));
        assert_eq!(outcome.exit_code(), 0);
        session.cleanup();
        assert!(!session.paths().lock().exists());
        assert!(!session.paths().owner().exists());
    }

    #[test]
    fn test_child_exit_code_is_outcome() {
        let dir = TempDir::new().unwrap();
        let mut session = recorder(&dir, "3", "exit 4");
        session.start().unwrap();
        session.prepare().unwrap();

        let outcome = session.relay(None, &mut Vec::new()).unwrap();

        assert_eq!(outcome.exit_code(), 4);
    }

    #[test]
    fn test_killed_child_reports_signal_status() {
        let dir = TempDir::new().unwrap();
        let mut session = recorder(&dir, "13", "kill -KILL $$");
        session.start().unwrap();
        session.prepare().unwrap();

        let outcome = session.relay(None, &mut Vec::new()).unwrap();

        assert_eq!(outcome, SessionOutcome::ChildExited { exit_code: 137 });
    }

    #[test]
    fn test_log_write_failure_does_not_end_session() {
        let dir = TempDir::new().unwrap();
        let mut session = recorder(&dir, "14", "echo one; sleep 0.2; echo two");
        session.start().unwrap();
        session.prepare().unwrap();
        std::fs::remove_file(session.paths().log()).unwrap();
        std::fs::create_dir(session.paths().log()).unwrap();

        let mut terminal = Vec::new();
        let outcome = session.relay(None, &mut terminal).unwrap();

        assert_eq!(outcome, SessionOutcome::ChildExited { exit_code: 0 });
        let shown = String::from_utf8_lossy(&terminal);
        assert!(shown.contains("one"));
        assert!(shown.contains("two"));
        assert!(session.paths().log().is_dir());
    }

    #[test]
    fn test_spawn_failure_still_cleans_up_on_drop() {
        let dir = TempDir::new().unwrap();
        let config = RecorderConfig::new(SessionId::parse("11").unwrap(), dir.path())
            .with_shell("/nonexistent/shell", vec![]);
        let mut session = SessionRecorder::new(config).with_shutdown(ShutdownSignal::detached());
        session.start().unwrap();
        session.prepare().unwrap();
        let lock = session.paths().lock().to_path_buf();
        let owner = session.paths().owner().to_path_buf();

        let result = session.relay(None, &mut Vec::new());
        assert!(matches!(result, Err(RecorderError::Pty(_))));
        drop(session);

        assert!(!lock.exists());
        assert!(!owner.exists());
    }

    #[test]
    fn test_relay_requires_prepare() {
        let dir = TempDir::new().unwrap();
        let mut session = recorder(&dir, "12", "true");
        session.start().unwrap();

        let result = session.relay(None, &mut Vec::new());
        assert!(matches!(result, Err(RecorderError::Terminal(_))));
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(SessionOutcome::Busy { owner_pid: None }.exit_code(), 0);
        assert_eq!(SessionOutcome::ChildExited { exit_code: 2 }.exit_code(), 2);
        assert_eq!(
            SessionOutcome::Signalled(ShutdownReason::Interrupt).exit_code(),
            130
        );
    }
}
