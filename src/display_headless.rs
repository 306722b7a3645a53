//! Headless screen for tests and non-interactive embedding
//!
//! Collects everything the interpreter prints without displaying it.

use crate::display_trait::{DisplayError, Screen, StatusLine};
use log::debug;

#[derive(Debug, Default, Clone)]
pub struct HeadlessScreen {
    output: String,
    transcript: String,
    commands: Vec<String>,
    status: Option<StatusLine>,
    cursor: (u16, u16),
    upper_window_lines: u16,
    current_window: u16,
    text_style: u16,
}

impl HeadlessScreen {
    pub fn new() -> Self {
        Self {
            cursor: (1, 1),
            ..Default::default()
        }
    }

    /// Everything printed since the last `take_output`
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn transcript_text(&self) -> &str {
        &self.transcript
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    pub fn current_window(&self) -> u16 {
        self.current_window
    }

    pub fn upper_window_lines(&self) -> u16 {
        self.upper_window_lines
    }

    pub fn text_style(&self) -> u16 {
        self.text_style
    }
}

impl Screen for HeadlessScreen {
    fn print(&mut self, text: &str) -> Result<(), DisplayError> {
        if self.current_window == 1 {
            let width = text.chars().count() as u16;
            self.cursor.1 = self.cursor.1.saturating_add(width);
        }
        self.output.push_str(text);
        Ok(())
    }

    fn split_window(&mut self, lines: u16) -> Result<(), DisplayError> {
        debug!("Headless: split_window({})", lines);
        self.upper_window_lines = lines;
        Ok(())
    }

    fn set_window(&mut self, window: u16) -> Result<(), DisplayError> {
        debug!("Headless: set_window({})", window);
        self.current_window = window;
        if window == 1 {
            self.cursor = (1, 1);
        }
        Ok(())
    }

    fn erase_window(&mut self, window: i16) -> Result<(), DisplayError> {
        debug!("Headless: erase_window({})", window);
        if window == -1 {
            self.upper_window_lines = 0;
            self.current_window = 0;
        }
        Ok(())
    }

    fn set_cursor(&mut self, line: u16, column: u16) -> Result<(), DisplayError> {
        self.cursor = (line, column);
        Ok(())
    }

    fn get_cursor(&mut self) -> Result<(u16, u16), DisplayError> {
        Ok(self.cursor)
    }

    fn set_text_style(&mut self, style: u16) -> Result<(), DisplayError> {
        self.text_style = if style == 0 { 0 } else { self.text_style | style };
        Ok(())
    }

    fn show_status(&mut self, status: &StatusLine) -> Result<(), DisplayError> {
        debug!("Headless: status {}", status);
        self.status = Some(status.clone());
        Ok(())
    }

    fn transcript(&mut self, text: &str) -> Result<(), DisplayError> {
        self.transcript.push_str(text);
        Ok(())
    }

    fn record_command(&mut self, command: &str) -> Result<(), DisplayError> {
        self.commands.push(command.to_string());
        Ok(())
    }

    fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}
