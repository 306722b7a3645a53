//! Host seam for screen output
//!
//! The interpreter never draws anything itself. Text routed to output
//! stream 1 and every window opcode end up as calls on a [`Screen`], which
//! the embedding program implements. Everything except `print` has a
//! no-op default so a minimal host only has to collect text.

use crate::error::ZError;
use std::fmt;
use thiserror::Error;

/// Contents of the V1-3 status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub location: String,
    /// Score, or hours for time games
    pub first: i16,
    /// Turns, or minutes for time games
    pub second: u16,
    pub is_time: bool,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_time {
            write!(f, "{}  Time: {}:{:02}", self.location, self.first, self.second)
        } else {
            write!(f, "{}  Score: {}  Moves: {}", self.location, self.first, self.second)
        }
    }
}

pub trait Screen {
    /// Print text to the current window
    fn print(&mut self, text: &str) -> Result<(), DisplayError>;

    /// Split the screen so the upper window has `lines` lines
    fn split_window(&mut self, _lines: u16) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Select the window text goes to (0 = lower, 1 = upper)
    fn set_window(&mut self, _window: u16) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Erase a window (-1 = unsplit and clear all, -2 = clear all)
    fn erase_window(&mut self, _window: i16) -> Result<(), DisplayError> {
        Ok(())
    }

    fn erase_line(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }

    /// 1-based cursor position in the upper window
    fn set_cursor(&mut self, _line: u16, _column: u16) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Returns (line, column), 1-based
    fn get_cursor(&mut self) -> Result<(u16, u16), DisplayError> {
        Ok((1, 1))
    }

    /// 0 = roman, 1 = reverse, 2 = bold, 4 = italic, 8 = fixed pitch
    fn set_text_style(&mut self, _style: u16) -> Result<(), DisplayError> {
        Ok(())
    }

    fn set_buffer_mode(&mut self, _buffered: bool) -> Result<(), DisplayError> {
        Ok(())
    }

    fn set_colour(&mut self, _foreground: u16, _background: u16) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Whether a font can be selected (1 = normal, 4 = fixed pitch)
    fn font_available(&self, font: u16) -> bool {
        font == 1 || font == 4
    }

    fn show_status(&mut self, _status: &StatusLine) -> Result<(), DisplayError> {
        Ok(())
    }

    fn sound_effect(&mut self, _number: u16, _effect: u16, _volume: u16) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Output stream 2
    fn transcript(&mut self, _text: &str) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Output stream 4: commands as typed
    fn record_command(&mut self, _command: &str) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Drain text printed so far, for hosts that buffer it
    fn take_output(&mut self) -> String {
        String::new()
    }
}

/// Display error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Display error: {message}")]
pub struct DisplayError {
    pub message: String,
}

impl DisplayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for DisplayError {
    fn from(error: std::io::Error) -> Self {
        Self::new(format!("I/O error: {}", error))
    }
}

impl From<DisplayError> for ZError {
    fn from(error: DisplayError) -> ZError {
        ZError::Display(error.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use test_log::test;

    #[test]
    fn test_display_error_message_and_conversion() {
        let error = DisplayError::new("window 7 does not exist");
        assert_eq!(error.to_string(), "Display error: window 7 does not exist");
        let io: DisplayError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed").into();
        assert_eq!(io.message, "I/O error: closed");

        let zerror = ZError::from(error);
        assert_eq!(zerror, ZError::Display("window 7 does not exist".to_string()));
        assert_eq!(zerror.category(), ErrorCategory::Host);
    }
}
