#![deny(clippy::all)]

mod bridge;
pub mod error;
mod pty;

pub use bridge::PtyBridge;
pub use bridge::RELAY_CHUNK_SIZE;
pub use bridge::RelayEnd;
pub use bridge::RelayObserver;
pub use error::PtyError;
pub use portable_pty::ExitStatus;
pub use pty::PtyHandle;
pub use pty::ReadOutcome;
pub use pty::SpawnRequest;
pub use pty::shell_exit_code;

pub type Result<T> = std::result::Result<T, PtyError>;
