//! Quetzal chunk definitions

use crate::error::{ZError, ZResult};
use crate::header::{word_at, CHECKSUM, RELEASE, SERIAL};
use crate::vm::{CallFrame, ReturnTarget, MAX_LOCALS};

/// Result variable recorded for interrupt frames, which have no real target
const INTERRUPT_MARKER: u8 = 0xFF;
const FLAG_DISCARD: u8 = 0x10;

/// IFhd chunk - identifies the story a save belongs to, plus the resume pc
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IFhdChunk {
    pub release: u16,
    pub serial: [u8; 6],
    pub checksum: u16,
    pub pc: u32,
}

impl IFhdChunk {
    /// Identification taken from an unmodified story image
    pub fn for_story(original: &[u8], pc: u32) -> Self {
        let mut serial = [0u8; 6];
        if let Some(bytes) = original.get(SERIAL..SERIAL + 6) {
            serial.copy_from_slice(bytes);
        }
        IFhdChunk {
            release: word_at(original, RELEASE),
            serial,
            checksum: word_at(original, CHECKSUM),
            pc,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(13);
        bytes.extend_from_slice(&self.release.to_be_bytes());
        bytes.extend_from_slice(&self.serial);
        bytes.extend_from_slice(&self.checksum.to_be_bytes());
        bytes.extend_from_slice(&self.pc.to_be_bytes()[1..]);
        bytes
    }

    pub fn from_bytes(data: &[u8]) -> ZResult<Self> {
        if data.len() < 13 {
            return Err(ZError::InvalidSave(format!(
                "IFhd chunk is {} bytes, expected 13",
                data.len()
            )));
        }
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&data[2..8]);
        Ok(IFhdChunk {
            release: u16::from_be_bytes([data[0], data[1]]),
            serial,
            checksum: u16::from_be_bytes([data[8], data[9]]),
            pc: u32::from_be_bytes([0, data[10], data[11], data[12]]),
        })
    }

    /// Fail unless this save was made by the same story
    pub fn check_matches(&self, story: &IFhdChunk) -> ZResult<()> {
        if self.release != story.release {
            return Err(ZError::SaveMismatch(format!(
                "release {} saved, story is release {}",
                self.release, story.release
            )));
        }
        if self.serial != story.serial {
            return Err(ZError::SaveMismatch(format!(
                "serial {} saved, story is {}",
                String::from_utf8_lossy(&self.serial),
                String::from_utf8_lossy(&story.serial)
            )));
        }
        if self.checksum != story.checksum {
            return Err(ZError::SaveMismatch(format!(
                "checksum {:#06x} saved, story has {:#06x}",
                self.checksum, story.checksum
            )));
        }
        Ok(())
    }
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl Reader<'_> {
    fn bytes(&mut self, n: usize, what: &str) -> ZResult<&[u8]> {
        let slice = self
            .data
            .get(self.offset..self.offset + n)
            .ok_or_else(|| ZError::InvalidSave(format!("Stks chunk truncated in {what}")))?;
        self.offset += n;
        Ok(slice)
    }

    fn byte(&mut self, what: &str) -> ZResult<u8> {
        Ok(self.bytes(1, what)?[0])
    }

    fn word(&mut self, what: &str) -> ZResult<u16> {
        let b = self.bytes(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
}

/// Stks chunk - call frames with the evaluation stack each one owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StksChunk {
    pub frames: Vec<CallFrame>,
    pub stack: Vec<u16>,
}

impl StksChunk {
    /// Encode frames oldest first. `dummy_first` marks a first frame that is
    /// only a holder for the main program's stack (every version but 6).
    pub fn to_bytes(&self, dummy_first: bool) -> Vec<u8> {
        let mut data = Vec::new();
        for (i, frame) in self.frames.iter().enumerate() {
            let stack_end = self
                .frames
                .get(i + 1)
                .map_or(self.stack.len(), |next| next.stack_base);
            let words = self
                .stack
                .get(frame.stack_base.min(stack_end)..stack_end)
                .unwrap_or(&[]);

            data.extend_from_slice(&frame.return_pc.to_be_bytes()[1..]);
            let (flags, result_var) = if i == 0 && dummy_first {
                (0, 0)
            } else {
                match frame.return_target {
                    ReturnTarget::Store(var) => (frame.num_locals, var),
                    ReturnTarget::Discard => (frame.num_locals | FLAG_DISCARD, 0),
                    ReturnTarget::Interrupt => (frame.num_locals | FLAG_DISCARD, INTERRUPT_MARKER),
                }
            };
            data.push(flags);
            data.push(result_var);
            data.push(((1u16 << frame.arg_count) - 1) as u8);
            data.extend_from_slice(&(words.len() as u16).to_be_bytes());
            for local in &frame.locals[..frame.num_locals as usize] {
                data.extend_from_slice(&local.to_be_bytes());
            }
            for word in words {
                data.extend_from_slice(&word.to_be_bytes());
            }
        }
        data
    }

    pub fn from_bytes(data: &[u8], dummy_first: bool) -> ZResult<Self> {
        let mut reader = Reader { data, offset: 0 };
        let mut frames = Vec::new();
        let mut stack = Vec::new();

        while reader.offset < data.len() {
            let pc = reader.bytes(3, "return pc")?;
            let return_pc = u32::from_be_bytes([0, pc[0], pc[1], pc[2]]);
            let flags = reader.byte("flags")?;
            let result_var = reader.byte("result variable")?;
            let args_mask = reader.byte("argument mask")?;
            let eval_count = reader.word("stack count")? as usize;

            let num_locals = flags & 0x0F;
            if num_locals as usize > MAX_LOCALS {
                return Err(ZError::InvalidSave(format!("frame with {num_locals} locals")));
            }
            let mut locals = [0u16; MAX_LOCALS];
            for local in locals.iter_mut().take(num_locals as usize) {
                *local = reader.word("locals")?;
            }

            let return_target = if frames.is_empty() && dummy_first {
                ReturnTarget::Discard
            } else if flags & FLAG_DISCARD == 0 {
                ReturnTarget::Store(result_var)
            } else if result_var == INTERRUPT_MARKER {
                ReturnTarget::Interrupt
            } else {
                ReturnTarget::Discard
            };

            let stack_base = stack.len();
            for _ in 0..eval_count {
                stack.push(reader.word("evaluation stack")?);
            }
            frames.push(CallFrame {
                return_pc,
                return_target,
                num_locals,
                locals,
                arg_count: (args_mask & 0x7F).count_ones() as u8,
                stack_base,
            });
        }

        if frames.is_empty() {
            return Err(ZError::InvalidSave("Stks chunk holds no frames".into()));
        }
        Ok(StksChunk { frames, stack })
    }
}
