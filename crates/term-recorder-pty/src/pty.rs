use std::collections::HashMap;
use std::ffi::CStr;
use std::io;
use std::io::Read;
use std::io::Write;
use std::os::fd::RawFd;
use std::path::PathBuf;

use portable_pty::Child;
use portable_pty::CommandBuilder;
use portable_pty::ExitStatus;
use portable_pty::MasterPty;
use portable_pty::PtySize;
use portable_pty::native_pty_system;
use tracing::debug;

use crate::error::PtyError;

/// Everything the child process gets from its parent, spelled out.
///
/// Nothing is inherited implicitly: the environment map replaces the
/// recorder's own environment and `cwd` is applied as given.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub cols: u16,
    pub rows: u16,
}

impl SpawnRequest {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            cwd: None,
            cols: 80,
            rows: 24,
        }
    }
}

/// Result of a single non-blocking read from the master side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(usize),
    Pending,
    /// Every slave descriptor is closed (EOF or EIO on Linux).
    Closed,
}

pub struct PtyHandle {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
    size: PtySize,
    master_fd: RawFd,
    exit_status: Option<ExitStatus>,
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.kill();
        }
    }
}

impl PtyHandle {
    pub fn spawn(request: &SpawnRequest) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();

        let size = PtySize {
            rows: request.rows,
            cols: request.cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = pty_system
            .openpty(size)
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&request.command);
        cmd.args(&request.args);
        cmd.env_clear();
        for (key, value) in &request.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &request.cwd {
            cmd.cwd(dir);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        // The master must be the last holder of the pair so EOF follows child exit.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let master_fd = pair
            .master
            .as_raw_fd()
            .ok_or_else(|| PtyError::Open("Failed to get master fd".to_string()))?;

        set_non_blocking(master_fd)?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Open(e.to_string()))?;

        debug!(
            command = %request.command,
            pid = ?child.process_id(),
            cols = request.cols,
            rows = request.rows,
            "Spawned child in PTY"
        );

        Ok(Self {
            master: pair.master,
            child,
            reader,
            writer,
            size,
            master_fd,
            exit_status: None,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    pub fn master_fd(&self) -> RawFd {
        self.master_fd
    }

    pub fn size(&self) -> (u16, u16) {
        (self.size.cols, self.size.rows)
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    /// Non-blocking exit check. The status is cached once observed.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, PtyError> {
        if let Some(status) = &self.exit_status {
            return Ok(Some(status.clone()));
        }
        let status = self
            .child
            .try_wait()
            .map_err(|e| PtyError::Wait(e.to_string()))?;
        self.exit_status = status.clone();
        Ok(status)
    }

    pub fn wait(&mut self) -> Result<ExitStatus, PtyError> {
        if let Some(status) = &self.exit_status {
            return Ok(status.clone());
        }
        let status = self
            .child
            .wait()
            .map_err(|e| PtyError::Wait(e.to_string()))?;
        self.exit_status = Some(status.clone());
        Ok(status)
    }

    /// Writes as much of `data` as the PTY accepts right now.
    ///
    /// Returns `Ok(0)` when the child's input queue is full. Never blocks.
    pub fn write_some(&mut self, data: &[u8]) -> Result<usize, PtyError> {
        if data.is_empty() {
            return Ok(0);
        }
        loop {
            match self.writer.write(data) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
                Err(e) => return Err(PtyError::Write(e.to_string())),
            }
        }
    }

    /// One read from the master. Never blocks: the descriptor is non-blocking.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, PtyError> {
        if buf.is_empty() {
            return Ok(ReadOutcome::Pending);
        }
        loop {
            match self.reader.read(buf) {
                Ok(0) => return Ok(ReadOutcome::Closed),
                Ok(n) => return Ok(ReadOutcome::Data(n)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(ReadOutcome::Pending),
                Err(e) if e.raw_os_error() == Some(libc::EIO) => return Ok(ReadOutcome::Closed),
                Err(e) => return Err(PtyError::Read(e.to_string())),
            }
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self.master
            .resize(self.size)
            .map_err(|e| PtyError::Resize(e.to_string()))
    }

    pub fn kill(&mut self) -> Result<(), PtyError> {
        if !self.is_running() {
            return Ok(());
        }

        self.child
            .kill()
            .map_err(|e| PtyError::Spawn(e.to_string()))
    }
}

fn set_non_blocking(fd: RawFd) -> Result<(), PtyError> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(PtyError::Open(io::Error::last_os_error().to_string()));
    }

    if flags & libc::O_NONBLOCK != 0 {
        return Ok(());
    }

    let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if result < 0 {
        return Err(PtyError::Open(io::Error::last_os_error().to_string()));
    }

    Ok(())
}

/// Waits until any descriptor in `fds` has events or the timeout expires.
///
/// Returns the number of ready descriptors. A signal arriving during the
/// wait counts as a timeout so the caller can check its shutdown state.
pub(crate) fn poll_fds(fds: &mut [libc::pollfd], timeout_ms: i32) -> Result<usize, PtyError> {
    for fd in fds.iter_mut() {
        fd.revents = 0;
    }

    let result = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(0);
        }
        return Err(PtyError::Read(err.to_string()));
    }

    Ok(result as usize)
}

/// Exit status the way a shell reports it: the child's own code, or
/// `128 + signo` when a signal ended it.
pub fn shell_exit_code(status: &ExitStatus) -> i32 {
    if status.success() {
        return 0;
    }
    // portable-pty keeps only the strsignal(3) text of a fatal signal.
    let description = status.to_string();
    match description.strip_prefix("Terminated by ") {
        Some(name) => signal_number(name).map_or(1, |signo| 128 + signo),
        None => i32::try_from(status.exit_code()).unwrap_or(1),
    }
}

const MAX_SIGNAL: libc::c_int = 64;

fn signal_number(description: &str) -> Option<i32> {
    if let Some(number) = description.strip_prefix("Signal ") {
        return number.parse().ok();
    }
    (1..=MAX_SIGNAL).find(|&signo| {
        // SAFETY: strsignal returns a NUL-terminated string or null.
        let name = unsafe { libc::strsignal(signo) };
        !name.is_null() && unsafe { CStr::from_ptr(name) }.to_string_lossy() == description
    })
}
