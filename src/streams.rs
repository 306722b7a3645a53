//! Output stream selection
//!
//! Stream 1 is the screen, stream 2 the transcript (mirrored in flags2
//! bit 0 so the game can switch it too), stream 3 redirects text into a
//! table in dynamic memory and stream 4 records the player's commands.
//! While any stream 3 table is open it receives all text and the other
//! streams get none.

use crate::error::{ZError, ZResult};
use crate::header::{FLAGS2, FLAGS2_TRANSCRIPT};
use crate::vm::VM;
use log::{debug, warn};

/// Stream 3 tables that may be open at once
pub const MAX_MEMORY_STREAMS: usize = 16;

/// An open stream 3 table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStream {
    pub table: u32,
    /// Characters written so far
    pub len: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputStreams {
    screen: bool,
    command_script: bool,
    memory: Vec<MemoryStream>,
    /// 0 = keyboard, 1 = command file
    input: u16,
}

impl Default for OutputStreams {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputStreams {
    pub fn new() -> Self {
        OutputStreams {
            screen: true,
            command_script: false,
            memory: Vec::new(),
            input: 0,
        }
    }

    /// `output_stream`: positive numbers select, negative deselect
    pub fn select(&mut self, vm: &mut VM, number: i16, table: Option<u32>) -> ZResult<()> {
        debug!("output_stream {} {:?}", number, table);
        match number {
            0 => {}
            1 => self.screen = true,
            -1 => self.screen = false,
            2 | -2 => {
                let flags2 = vm.read_word(FLAGS2 as u32)?;
                let flags2 = if number > 0 {
                    flags2 | FLAGS2_TRANSCRIPT
                } else {
                    flags2 & !FLAGS2_TRANSCRIPT
                };
                vm.write_word(FLAGS2 as u32, flags2)?;
            }
            3 => {
                if self.memory.len() >= MAX_MEMORY_STREAMS {
                    return Err(ZError::StreamNesting {
                        depth: MAX_MEMORY_STREAMS,
                    });
                }
                let table = table.ok_or(ZError::MissingOperand {
                    name: "output_stream",
                    expected: 2,
                    found: 1,
                })?;
                vm.write_word(table, 0)?;
                self.memory.push(MemoryStream { table, len: 0 });
            }
            -3 => match self.memory.pop() {
                Some(stream) => vm.write_word(stream.table, stream.len)?,
                None => warn!("output_stream -3 with no table open"),
            },
            4 => self.command_script = true,
            -4 => self.command_script = false,
            _ => warn!("output_stream {} does not exist", number),
        }
        Ok(())
    }

    /// `input_stream`
    pub fn select_input(&mut self, number: u16) {
        if number > 1 {
            warn!("input_stream {} does not exist", number);
            return;
        }
        debug!("input_stream {}", number);
        self.input = number;
    }

    pub fn input_stream(&self) -> u16 {
        self.input
    }

    /// Send ZSCII text to the innermost stream 3 table, if one is open.
    /// Returns whether the text was taken.
    pub fn capture(&mut self, vm: &mut VM, codes: &[u16]) -> ZResult<bool> {
        let Some(stream) = self.memory.last_mut() else {
            return Ok(false);
        };
        for &code in codes {
            let byte = if code > 0xFF { b'?' } else { code as u8 };
            vm.write_byte(stream.table + 2 + stream.len as u32, byte)?;
            stream.len = stream.len.wrapping_add(1);
        }
        // Keep the length word current so reads before close see it
        vm.write_word(stream.table, stream.len)?;
        Ok(true)
    }

    pub fn screen_enabled(&self) -> bool {
        self.screen
    }

    pub fn transcript_enabled(&self, vm: &VM) -> bool {
        vm.read_word(FLAGS2 as u32)
            .map_or(false, |flags2| flags2 & FLAGS2_TRANSCRIPT != 0)
    }

    pub fn command_script_enabled(&self) -> bool {
        self.command_script
    }

    pub fn memory_depth(&self) -> usize {
        self.memory.len()
    }
}
