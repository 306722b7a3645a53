use std::fmt::Display;
use std::fmt::Error;
use std::fmt::Formatter;

use log::{debug, info};

use crate::config::InterpreterConfig;
use crate::error::{ZError, ZResult};
use crate::version::VersionProfile;

pub const HEADER_SIZE: usize = 64;

pub const FLAGS1: usize = 0x01;
pub const RELEASE: usize = 0x02;
pub const HIGH_MEMORY: usize = 0x04;
pub const INITIAL_PC: usize = 0x06;
pub const DICTIONARY: usize = 0x08;
pub const OBJECT_TABLE: usize = 0x0A;
pub const GLOBALS: usize = 0x0C;
pub const STATIC_MEMORY: usize = 0x0E;
pub const FLAGS2: usize = 0x10;
pub const SERIAL: usize = 0x12;
pub const ABBREVIATIONS: usize = 0x18;
pub const FILE_LENGTH: usize = 0x1A;
pub const CHECKSUM: usize = 0x1C;
pub const INTERPRETER_NUMBER: usize = 0x1E;
pub const INTERPRETER_VERSION: usize = 0x1F;
pub const SCREEN_HEIGHT_LINES: usize = 0x20;
pub const SCREEN_WIDTH_CHARS: usize = 0x21;
pub const SCREEN_WIDTH_UNITS: usize = 0x22;
pub const SCREEN_HEIGHT_UNITS: usize = 0x24;
pub const FONT_WIDTH: usize = 0x26;
pub const FONT_HEIGHT: usize = 0x27;
pub const ROUTINES_OFFSET: usize = 0x28;
pub const STRINGS_OFFSET: usize = 0x2A;
pub const TERMINATING_CHARS: usize = 0x2E;
pub const STREAM3_WIDTH: usize = 0x30;
pub const STANDARD_REVISION: usize = 0x32;
pub const ALPHABET_TABLE: usize = 0x34;
pub const EXTENSION_TABLE: usize = 0x36;

/// Flags2 bits the game may set and the interpreter must preserve across restart
pub const FLAGS2_TRANSCRIPT: u16 = 0x0001;
pub const FLAGS2_FIXED_PITCH: u16 = 0x0002;
/// Flags2 bits for features this interpreter does not offer
const FLAGS2_UNSUPPORTED: u16 = 0x0008 | 0x0020 | 0x0080 | 0x0100;

pub(crate) fn word_at(bytes: &[u8], addr: usize) -> u16 {
    match (bytes.get(addr), bytes.get(addr + 1)) {
        (Some(&hi), Some(&lo)) => ((hi as u16) << 8) | lo as u16,
        _ => 0,
    }
}

fn put_word(bytes: &mut [u8], addr: usize, value: u16) {
    if addr + 1 < bytes.len() {
        bytes[addr] = (value >> 8) as u8;
        bytes[addr + 1] = value as u8;
    }
}

/// Parsed story header. Fields reflect the image as loaded; the live
/// copies of flags2 and the interpreter declarations sit in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub flags1: u8,
    pub release: u16,
    pub serial: String,
    pub base_high_mem: u16,
    pub base_static_mem: u16,
    pub initial_pc: u16,
    pub abbrev_table: u16,
    /// File length in bytes, already scaled for the version
    pub len_file: usize,
    pub checksum_file: u16,
    pub flags2: u16,
    pub standard_revision_number: u16,
    pub dictionary: u16,
    pub object_table_addr: u16,
    pub global_variables: u16,
    pub routines_offset: u16,
    pub strings_offset: u16,
    pub terminating_chars_table: u16,
    pub alphabet_table: u16,
    pub extension_table: u16,
    /// Unicode translation table from the header extension (word 3), 0 when absent
    pub unicode_table: u16,
    pub profile: VersionProfile,
}

impl Header {
    /// Parse and validate the header of a raw story image
    pub fn parse(bytes: &[u8]) -> ZResult<Header> {
        if bytes.len() < HEADER_SIZE {
            return Err(ZError::MalformedImage(format!(
                "image is {} bytes, shorter than the {HEADER_SIZE}-byte header",
                bytes.len()
            )));
        }
        let version = bytes[0];
        let profile = VersionProfile::new(
            version,
            word_at(bytes, ROUTINES_OFFSET),
            word_at(bytes, STRINGS_OFFSET),
        )?;

        let extension_table = if version >= 5 {
            word_at(bytes, EXTENSION_TABLE)
        } else {
            0
        };
        let unicode_table = if extension_table != 0
            && word_at(bytes, extension_table as usize) >= 3
        {
            word_at(bytes, extension_table as usize + 6)
        } else {
            0
        };

        let header = Header {
            version,
            flags1: bytes[FLAGS1],
            release: word_at(bytes, RELEASE),
            serial: bytes[SERIAL..SERIAL + 6].iter().map(|&b| b as char).collect(),
            base_high_mem: word_at(bytes, HIGH_MEMORY),
            base_static_mem: word_at(bytes, STATIC_MEMORY),
            initial_pc: word_at(bytes, INITIAL_PC),
            abbrev_table: word_at(bytes, ABBREVIATIONS),
            len_file: word_at(bytes, FILE_LENGTH) as usize * profile.file_length_multiplier,
            checksum_file: word_at(bytes, CHECKSUM),
            flags2: word_at(bytes, FLAGS2),
            standard_revision_number: word_at(bytes, STANDARD_REVISION),
            dictionary: word_at(bytes, DICTIONARY),
            object_table_addr: word_at(bytes, OBJECT_TABLE),
            global_variables: word_at(bytes, GLOBALS),
            routines_offset: word_at(bytes, ROUTINES_OFFSET),
            strings_offset: word_at(bytes, STRINGS_OFFSET),
            terminating_chars_table: if version >= 5 {
                word_at(bytes, TERMINATING_CHARS)
            } else {
                0
            },
            alphabet_table: if version >= 5 {
                word_at(bytes, ALPHABET_TABLE)
            } else {
                0
            },
            extension_table,
            unicode_table,
            profile,
        };
        header.validate(bytes.len())?;
        Ok(header)
    }

    fn validate(&self, image_len: usize) -> ZResult<()> {
        let static_base = self.base_static_mem as usize;
        if static_base < HEADER_SIZE || static_base > image_len {
            return Err(ZError::MalformedImage(format!(
                "static memory base {static_base:#06x} outside image of {image_len:#07x} bytes"
            )));
        }
        if self.base_high_mem as usize > image_len {
            return Err(ZError::MalformedImage(format!(
                "high memory base {:#06x} outside image of {image_len:#07x} bytes",
                self.base_high_mem
            )));
        }
        if (self.global_variables as usize) + 480 > static_base {
            return Err(ZError::MalformedImage(format!(
                "global table at {:#06x} does not fit in dynamic memory",
                self.global_variables
            )));
        }
        if self.object_table_addr as usize >= static_base {
            return Err(ZError::MalformedImage(format!(
                "object table at {:#06x} is not in dynamic memory",
                self.object_table_addr
            )));
        }
        Ok(())
    }

    /// Sum of bytes 0x40..file length, modulo 0x10000
    pub fn compute_checksum(&self, bytes: &[u8]) -> u16 {
        let end = if self.len_file == 0 {
            bytes.len()
        } else {
            self.len_file.min(bytes.len())
        };
        bytes
            .get(HEADER_SIZE..end)
            .unwrap_or(&[])
            .iter()
            .fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
    }

    /// Check the declared checksum; a zero checksum means "not set"
    pub fn verify_checksum(&self, bytes: &[u8]) -> ZResult<()> {
        if self.checksum_file == 0 {
            return Ok(());
        }
        let actual = self.compute_checksum(bytes);
        if actual != self.checksum_file {
            return Err(ZError::ChecksumMismatch {
                expected: self.checksum_file,
                actual,
            });
        }
        Ok(())
    }
}

/// Write the interpreter's capability declarations into a live header.
///
/// Called on load and again after restart, since restart reloads the
/// header bytes from the original image.
pub fn declare_capabilities(memory: &mut [u8], config: &InterpreterConfig) {
    if memory.len() < HEADER_SIZE {
        return;
    }
    let version = memory[0];
    if version <= 3 {
        // status line available, no split screen, fixed-pitch default
        memory[FLAGS1] &= !(0x10 | 0x20 | 0x40);
    } else {
        // bold, italic, fixed-space and timed input; no colours, pictures or sound
        memory[FLAGS1] = (memory[FLAGS1] & 0x40) | 0x04 | 0x08 | 0x10 | 0x80;
    }

    let flags2 = word_at(memory, FLAGS2) & !FLAGS2_UNSUPPORTED;
    put_word(memory, FLAGS2, flags2);

    if version >= 4 {
        memory[INTERPRETER_NUMBER] = config.interpreter_number;
        memory[INTERPRETER_VERSION] = config.interpreter_version;
        memory[SCREEN_HEIGHT_LINES] = config.screen_height;
        memory[SCREEN_WIDTH_CHARS] = config.screen_width;
    }
    if version >= 5 {
        put_word(memory, SCREEN_WIDTH_UNITS, config.screen_width as u16);
        put_word(memory, SCREEN_HEIGHT_UNITS, config.screen_height as u16);
        memory[FONT_WIDTH] = 1;
        memory[FONT_HEIGHT] = 1;
    }
    memory[STANDARD_REVISION] = 1;
    memory[STANDARD_REVISION + 1] = 1;
    debug!(
        "Declared capabilities: flags1={:#04x} flags2={:#06x}",
        memory[FLAGS1],
        word_at(memory, FLAGS2)
    );
}

/// Log a one-line load summary
pub(crate) fn log_summary(header: &Header) {
    info!(
        "Loaded v{} story release {} serial {} ({} bytes, checksum {:#06x})",
        header.version, header.release, header.serial, header.len_file, header.checksum_file
    );
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "
Z-code version:           {}
Interpreter flags:        {:#04x}
Release number:           {}
Size of resident memory:  {:#06x}
Start PC:                 {:#06x}
Dictionary address:       {:#06x}
Object table address:     {:#06x}
Global variables address: {:#06x}
Size of dynamic memory:   {:#06x}
Game flags:               {:#06x}
Serial number:            {}
Abbreviations address:    {:#06x}
File size:                {:#07x}
Checksum:                 {:#06x}
",
            self.version,
            self.flags1,
            self.release,
            self.base_high_mem,
            self.initial_pc,
            self.dictionary,
            self.object_table_addr,
            self.global_variables,
            self.base_static_mem,
            self.flags2,
            self.serial,
            self.abbrev_table,
            self.len_file,
            self.checksum_file,
        )
    }
}
