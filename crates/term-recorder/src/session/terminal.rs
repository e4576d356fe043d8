//! The controlling terminal: raw mode for the session and its current size.

use std::io;
use std::io::IsTerminal;
use std::io::Write;

use crossterm::terminal;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use tracing::debug;

const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Puts the controlling terminal in raw mode and restores it on drop.
///
/// Raw mode hands every keystroke, including Ctrl+C, to the child shell
/// untouched. When stdin is not a terminal the guard does nothing.
#[must_use = "TerminalGuard must be held for the duration of the session"]
pub struct TerminalGuard {
    raw: bool,
}

impl TerminalGuard {
    pub fn new() -> io::Result<Self> {
        if !io::stdin().is_terminal() {
            debug!("stdin is not a terminal, leaving terminal mode unchanged");
            return Ok(Self { raw: false });
        }
        enable_raw_mode()?;
        Ok(Self { raw: true })
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if !self.raw {
            return;
        }
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = stdout.flush();
    }
}

/// Current `(cols, rows)` of the controlling terminal, if there is one.
pub fn window_size() -> Option<(u16, u16)> {
    if !io::stdout().is_terminal() {
        return None;
    }
    terminal::size().ok().filter(|(cols, rows)| *cols > 0 && *rows > 0)
}

/// Size for a new PTY: the controlling terminal's, or 80x24.
pub fn initial_size() -> (u16, u16) {
    window_size().unwrap_or(FALLBACK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_size_is_never_zero() {
        let (cols, rows) = initial_size();
        assert!(cols > 0);
        assert!(rows > 0);
    }
}
