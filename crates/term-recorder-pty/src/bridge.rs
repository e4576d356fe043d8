//! Relay loop between the controlling terminal and a child in a PTY.
//!
//! One thread drives everything: `poll(2)` waits on the PTY master and the
//! input descriptor, with a short timeout so stop requests and terminal
//! size changes are picked up even when both sides are idle. Nothing in the
//! loop blocks: input the child has not taken yet waits in a buffer while
//! output keeps flowing.

use std::io;
use std::io::Write;
use std::os::fd::RawFd;

use portable_pty::ExitStatus;
use tracing::debug;
use tracing::warn;

use crate::error::PtyError;
use crate::pty::PtyHandle;
use crate::pty::ReadOutcome;
use crate::pty::SpawnRequest;
use crate::pty::poll_fds;

/// Largest chunk handed to the observer and written to the terminal at once.
pub const RELAY_CHUNK_SIZE: usize = 4096;

const POLL_INTERVAL_MS: i32 = 100;

const READABLE: libc::c_short = libc::POLLIN | libc::POLLHUP | libc::POLLERR;

/// Hooks the relay loop calls while a session is live.
pub trait RelayObserver {
    /// Receives every chunk of child output before it reaches the terminal.
    fn on_output(&mut self, chunk: &[u8]);

    /// Checked at every wake; `true` tears the session down.
    fn stop_requested(&mut self) -> bool {
        false
    }

    /// Current size of the controlling terminal as `(cols, rows)`.
    fn window_size(&mut self) -> Option<(u16, u16)> {
        None
    }
}

#[derive(Debug)]
pub enum RelayEnd {
    /// The child exited on its own.
    Exited(ExitStatus),
    /// The observer asked to stop; the child was killed.
    Stopped,
}

enum Flow {
    Open,
    Closed,
}

pub struct PtyBridge {
    pty: PtyHandle,
    input: Option<RawFd>,
    /// Input read from `input` that the child has not accepted yet.
    pending_input: Vec<u8>,
}

impl PtyBridge {
    /// Spawns the child and prepares to relay `input` into it.
    ///
    /// `input` is usually stdin; `None` runs the child without input.
    pub fn spawn(request: &SpawnRequest, input: Option<RawFd>) -> Result<Self, PtyError> {
        let pty = PtyHandle::spawn(request)?;
        Ok(Self {
            pty,
            input,
            pending_input: Vec::new(),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pty.pid()
    }

    pub fn pty_size(&self) -> (u16, u16) {
        self.pty.size()
    }

    /// Relays until the child exits or the observer requests a stop.
    pub fn run<W, O>(&mut self, output: &mut W, observer: &mut O) -> Result<RelayEnd, PtyError>
    where
        W: Write,
        O: RelayObserver,
    {
        let mut buf = [0u8; RELAY_CHUNK_SIZE];
        let master_fd = self.pty.master_fd();

        loop {
            if observer.stop_requested() {
                debug!(pid = ?self.pty.pid(), "Stop requested, tearing down PTY");
                if let Err(e) = self.pty.kill() {
                    warn!(error = %e, "Failed to kill child process");
                }
                return Ok(RelayEnd::Stopped);
            }

            self.sync_window_size(observer);

            let mut master_events = libc::POLLIN;
            if !self.pending_input.is_empty() {
                master_events |= libc::POLLOUT;
            }
            let mut fds = Vec::with_capacity(2);
            fds.push(libc::pollfd {
                fd: master_fd,
                events: master_events,
                revents: 0,
            });
            // Stop reading input until the child has taken the previous chunk.
            if let Some(fd) = self.input.filter(|_| self.pending_input.is_empty()) {
                fds.push(libc::pollfd {
                    fd,
                    events: libc::POLLIN,
                    revents: 0,
                });
            }

            if poll_fds(&mut fds, POLL_INTERVAL_MS)? > 0 {
                let master = fds[0].revents;
                if master & READABLE != 0 {
                    if let Flow::Closed = self.pump_output(&mut buf, output, observer)? {
                        let status = self.pty.wait()?;
                        debug!(exit_code = status.exit_code(), "PTY closed, child exited");
                        return Ok(RelayEnd::Exited(status));
                    }
                }

                if master & libc::POLLOUT != 0 {
                    self.flush_input();
                }

                if let Some(input_fd) = fds.get(1) {
                    if input_fd.revents & libc::POLLNVAL != 0 {
                        debug!("Input descriptor is invalid, no longer relaying input");
                        self.input = None;
                    } else if input_fd.revents & READABLE != 0 {
                        self.pump_input(input_fd.fd, &mut buf)?;
                    }
                }
            }

            if let Some(status) = self.pty.try_wait()? {
                self.drain(&mut buf, output, observer)?;
                debug!(exit_code = status.exit_code(), "Child exited");
                return Ok(RelayEnd::Exited(status));
            }
        }
    }

    fn pump_output<W, O>(
        &mut self,
        buf: &mut [u8],
        output: &mut W,
        observer: &mut O,
    ) -> Result<Flow, PtyError>
    where
        W: Write,
        O: RelayObserver,
    {
        match self.pty.read_chunk(buf)? {
            ReadOutcome::Data(n) => {
                emit(&buf[..n], output, observer)?;
                Ok(Flow::Open)
            }
            ReadOutcome::Pending => Ok(Flow::Open),
            ReadOutcome::Closed => Ok(Flow::Closed),
        }
    }

    /// Flushes output the child left in the PTY after it exited.
    fn drain<W, O>(&mut self, buf: &mut [u8], output: &mut W, observer: &mut O) -> Result<(), PtyError>
    where
        W: Write,
        O: RelayObserver,
    {
        while let ReadOutcome::Data(n) = self.pty.read_chunk(buf)? {
            emit(&buf[..n], output, observer)?;
        }
        Ok(())
    }

    fn pump_input(&mut self, fd: RawFd, buf: &mut [u8]) -> Result<(), PtyError> {
        match read_fd(fd, buf) {
            Ok(0) => {
                debug!("Input reached EOF, no longer relaying input");
                self.input = None;
                Ok(())
            }
            Ok(n) => {
                self.pending_input.extend_from_slice(&buf[..n]);
                self.flush_input();
                Ok(())
            }
            Err(e)
                if e.kind() == io::ErrorKind::Interrupted
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to read input, no longer relaying input");
                self.input = None;
                Ok(())
            }
        }
    }

    /// Hands buffered input to the child until it stops accepting more.
    fn flush_input(&mut self) {
        while !self.pending_input.is_empty() {
            match self.pty.write_some(&self.pending_input) {
                Ok(0) => break,
                Ok(written) => {
                    self.pending_input.drain(..written);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        dropped = self.pending_input.len(),
                        "Child no longer accepts input, no longer relaying input"
                    );
                    self.pending_input.clear();
                    self.input = None;
                }
            }
        }
    }

    fn sync_window_size<O: RelayObserver>(&mut self, observer: &mut O) {
        let Some((cols, rows)) = observer.window_size() else {
            return;
        };
        if cols == 0 || rows == 0 || (cols, rows) == self.pty.size() {
            return;
        }
        match self.pty.resize(cols, rows) {
            Ok(()) => debug!(cols, rows, "Resized PTY"),
            Err(e) => warn!(error = %e, "Failed to resize PTY"),
        }
    }
}

fn emit<W, O>(chunk: &[u8], output: &mut W, observer: &mut O) -> Result<(), PtyError>
where
    W: Write,
    O: RelayObserver,
{
    observer.on_output(chunk);
    output
        .write_all(chunk)
        .and_then(|()| output.flush())
        .map_err(|e| PtyError::Output(e.to_string()))
}

fn read_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: `buf` is valid for writes of `buf.len()` bytes for the duration of the call.
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}
