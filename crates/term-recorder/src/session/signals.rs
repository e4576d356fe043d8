//! Termination signals as a shutdown request the relay loop polls.
//!
//! The handlers installed here only store the signal number in an atomic
//! cell. All cleanup runs on the main thread after the relay loop notices.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use signal_hook::SigId;
use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGTERM;
use tracing::debug;

use crate::common::exit_codes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGTERM: clean up and exit with status 0.
    Terminate,
    /// SIGINT: clean up and exit as interrupted.
    Interrupt,
}

impl ShutdownReason {
    pub fn from_signal(signal: i32) -> Option<Self> {
        match signal {
            SIGTERM => Some(ShutdownReason::Terminate),
            SIGINT => Some(ShutdownReason::Interrupt),
            _ => None,
        }
    }

    pub fn signal(&self) -> i32 {
        match self {
            ShutdownReason::Terminate => SIGTERM,
            ShutdownReason::Interrupt => SIGINT,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Terminate => exit_codes::SUCCESS,
            ShutdownReason::Interrupt => exit_codes::INTERRUPTED,
        }
    }
}

/// Pending shutdown request, set from signal context.
#[derive(Debug)]
pub struct ShutdownSignal {
    pending: Arc<AtomicUsize>,
    registrations: Vec<SigId>,
}

impl ShutdownSignal {
    /// A request cell with no handlers attached.
    pub fn detached() -> Self {
        Self {
            pending: Arc::new(AtomicUsize::new(0)),
            registrations: Vec::new(),
        }
    }

    /// Routes SIGTERM and SIGINT into this request cell.
    pub fn install() -> Result<Self, std::io::Error> {
        let mut shutdown = Self::detached();
        for signal in [SIGTERM, SIGINT] {
            let id = signal_hook::flag::register_usize(
                signal,
                Arc::clone(&shutdown.pending),
                signal as usize,
            )?;
            shutdown.registrations.push(id);
        }
        debug!("Installed SIGTERM/SIGINT handlers");
        Ok(shutdown)
    }

    /// Posts a request without a signal. The first request wins.
    pub fn request(&self, reason: ShutdownReason) {
        let _ = self.pending.compare_exchange(
            0,
            reason.signal() as usize,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn requested(&self) -> Option<ShutdownReason> {
        match self.pending.load(Ordering::SeqCst) {
            0 => None,
            signal => ShutdownReason::from_signal(signal as i32),
        }
    }
}

impl Drop for ShutdownSignal {
    fn drop(&mut self) {
        for id in self.registrations.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}
