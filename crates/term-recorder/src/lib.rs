#![deny(clippy::all)]

pub mod app;
pub mod common;
pub mod error;
pub mod session;

pub use app::Application;

pub use common::Colors;
pub use error::RecorderError;
pub use session::RecorderConfig;
pub use session::SessionId;
pub use session::SessionOutcome;
pub use session::SessionRecorder;
