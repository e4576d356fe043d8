//! One recording session: its files, its lock, its lifecycle.

pub mod config;
pub mod lifecycle;
pub mod lock;
pub mod log;
pub mod paths;
pub mod signals;
pub mod terminal;

pub use config::RecorderConfig;
pub use lifecycle::LifecycleState;
pub use lifecycle::LockStatus;
pub use lifecycle::SessionOutcome;
pub use lifecycle::SessionRecorder;
pub use lock::CleanupReport;
pub use lock::CleanupStep;
pub use lock::LockError;
pub use lock::SessionLock;
pub use log::SessionLog;
pub use paths::SessionId;
pub use paths::SessionIdError;
pub use paths::SessionPaths;
pub use signals::ShutdownReason;
pub use signals::ShutdownSignal;
