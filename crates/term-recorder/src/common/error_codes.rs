//! Error categories and their sysexits.h exit codes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidInput,
    Busy,
    Internal,
    External,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::Busy => "busy",
            ErrorCategory::Internal => "internal",
            ErrorCategory::External => "external",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCategory::InvalidInput => exit_codes::USAGE,
            ErrorCategory::Busy => exit_codes::CANTCREAT,
            ErrorCategory::Internal => exit_codes::SOFTWARE,
            ErrorCategory::External => exit_codes::IOERR,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exit codes following sysexits.h.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const USAGE: i32 = 64;
    pub const SOFTWARE: i32 = 70;
    pub const CANTCREAT: i32 = 73;
    pub const IOERR: i32 = 74;
    /// Shell convention for a process ended by SIGINT (128 + 2).
    pub const INTERRUPTED: i32 = 130;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_exit_codes() {
        assert_eq!(ErrorCategory::InvalidInput.exit_code(), 64);
        assert_eq!(ErrorCategory::Busy.exit_code(), 73);
        assert_eq!(ErrorCategory::Internal.exit_code(), 70);
        assert_eq!(ErrorCategory::External.exit_code(), 74);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::External.to_string(), "external");
    }
}
