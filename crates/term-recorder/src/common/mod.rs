//! Shared helpers: colors, error categories, telemetry.

mod color;
pub mod error_codes;
pub mod telemetry;

pub use color::Colors;
pub use color::init as color_init;
pub use error_codes::ErrorCategory;
pub use error_codes::exit_codes;
