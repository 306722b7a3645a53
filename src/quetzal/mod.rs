//! Saved interpreter state
//!
//! A [`Snapshot`] is the in-memory form used for undo. Save files use the
//! Quetzal format: an IFF `IFZS` form holding `IFhd` (story identity and
//! resume pc), `CMem` (dynamic memory XOR-RLE compressed against the
//! original image) and `Stks` (frames and evaluation stack).

pub mod chunks;
pub mod compressed_memory;
pub mod iff;
pub mod store;

pub use store::{MemorySaveStore, SaveStore};

use crate::error::{ZError, ZResult};
use crate::header::{word_at, STATIC_MEMORY};
use crate::vm::{CallFrame, VM};
use chunks::{IFhdChunk, StksChunk};
use compressed_memory::{compress_memory, decompress_memory};
use iff::IffFile;
use log::debug;

/// Complete dynamic state of a running story
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub dynamic_memory: Vec<u8>,
    pub stack: Vec<u16>,
    pub frames: Vec<CallFrame>,
    /// Where execution resumes once the snapshot is restored
    pub pc: u32,
}

impl Snapshot {
    pub fn capture(vm: &VM, pc: u32) -> Snapshot {
        Snapshot {
            dynamic_memory: vm.dynamic_memory().to_vec(),
            stack: vm.stack.clone(),
            frames: vm.call_stack.clone(),
            pc,
        }
    }

    fn validate(&self, vm: &VM) -> ZResult<()> {
        let dynamic = vm.game.static_base() as usize;
        if self.dynamic_memory.len() != dynamic {
            return Err(ZError::SaveMismatch(format!(
                "snapshot holds {} bytes of dynamic memory, story has {dynamic}",
                self.dynamic_memory.len()
            )));
        }
        if self.frames.is_empty() {
            return Err(ZError::InvalidSave("no call frames".into()));
        }
        let mut base = 0;
        for frame in &self.frames {
            if frame.stack_base < base || frame.stack_base > self.stack.len() {
                return Err(ZError::InvalidSave(format!(
                    "frame stack base {} out of order",
                    frame.stack_base
                )));
            }
            base = frame.stack_base;
        }
        if self.pc as usize >= vm.game.memory.len() {
            return Err(ZError::InvalidSave(format!("resume pc {:#07x} outside story", self.pc)));
        }
        Ok(())
    }

    /// Replace the VM's state with this snapshot, or fail leaving it untouched
    pub fn apply(&self, vm: &mut VM) -> ZResult<()> {
        self.validate(vm)?;
        vm.game.memory[..self.dynamic_memory.len()].copy_from_slice(&self.dynamic_memory);
        vm.stack = self.stack.clone();
        vm.call_stack = self.frames.clone();
        vm.pc = self.pc;
        debug!(
            "Applied snapshot: pc {:05x}, {} frames, {} stack words",
            self.pc,
            self.frames.len(),
            self.stack.len()
        );
        Ok(())
    }

    /// Encode as a Quetzal save file
    pub fn to_quetzal(&self, original: &[u8], version: u8) -> Vec<u8> {
        let mut iff = IffFile::new();
        iff.add_chunk(*b"IFhd", IFhdChunk::for_story(original, self.pc).to_bytes());
        iff.add_chunk(*b"CMem", compress_memory(&self.dynamic_memory, original));
        let stks = StksChunk {
            frames: self.frames.clone(),
            stack: self.stack.clone(),
        };
        iff.add_chunk(*b"Stks", stks.to_bytes(version != 6));
        iff.to_bytes()
    }

    /// Decode a Quetzal save file made by the story whose unmodified image is `original`
    pub fn from_quetzal(bytes: &[u8], original: &[u8], version: u8) -> ZResult<Snapshot> {
        let iff = IffFile::from_bytes(bytes)?;
        if iff.form_type != *b"IFZS" {
            return Err(ZError::InvalidSave(format!(
                "form type {} is not IFZS",
                String::from_utf8_lossy(&iff.form_type)
            )));
        }
        let chunk = |tag: &[u8; 4]| iff.find_chunk(tag).map(|c| c.data.as_slice());

        let ifhd = IFhdChunk::from_bytes(
            chunk(b"IFhd").ok_or_else(|| ZError::InvalidSave("missing IFhd chunk".into()))?,
        )?;
        ifhd.check_matches(&IFhdChunk::for_story(original, 0))?;

        let dynamic = word_at(original, STATIC_MEMORY) as usize;
        let dynamic_memory = match (chunk(b"CMem"), chunk(b"UMem")) {
            (Some(cmem), _) => decompress_memory(cmem, original, dynamic)?,
            (None, Some(umem)) if umem.len() == dynamic => umem.to_vec(),
            (None, Some(umem)) => {
                return Err(ZError::InvalidSave(format!(
                    "UMem holds {} bytes, expected {dynamic}",
                    umem.len()
                )))
            }
            (None, None) => return Err(ZError::InvalidSave("no memory chunk".into())),
        };

        let stks = StksChunk::from_bytes(
            chunk(b"Stks").ok_or_else(|| ZError::InvalidSave("missing Stks chunk".into()))?,
            version != 6,
        )?;

        Ok(Snapshot {
            dynamic_memory,
            stack: stks.stack,
            frames: stks.frames,
            pc: ifhd.pc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterpreterConfig;
    use crate::test_utils::StoryBuilder;
    use crate::vm::{Game, ReturnTarget};
    use test_log::test;

    fn vm_with_routine() -> (VM, u32) {
        let mut story = StoryBuilder::new(5);
        let routine = story.routine(3, &[0xB0]);
        let config = InterpreterConfig::default();
        let vm = VM::new(Game::from_memory(story.build(), &config).unwrap(), &config).unwrap();
        (vm, routine)
    }

    #[test]
    fn test_quetzal_round_trip() {
        let (mut vm, routine) = vm_with_routine();
        vm.push(41).unwrap();
        vm.write_byte(0x1000, 0xAA).unwrap();
        vm.call_routine(routine, &[4, 5], ReturnTarget::Store(0x20)).unwrap();
        vm.push(99).unwrap();

        let snapshot = Snapshot::capture(&vm, 0x3001);
        let bytes = snapshot.to_quetzal(&vm.game.original_memory, 5);
        let decoded = Snapshot::from_quetzal(&bytes, &vm.game.original_memory, 5).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_apply_is_atomic() {
        let (mut vm, _) = vm_with_routine();
        let mut snapshot = Snapshot::capture(&vm, vm.pc);
        snapshot.dynamic_memory.pop();
        vm.write_byte(0x1000, 7).unwrap();
        assert!(snapshot.apply(&mut vm).is_err());
        assert_eq!(vm.read_byte(0x1000).unwrap(), 7);
    }

    #[test]
    fn test_other_story_rejected() {
        let (vm, _) = vm_with_routine();
        let bytes = Snapshot::capture(&vm, vm.pc).to_quetzal(&vm.game.original_memory, 5);
        let mut other = vm.game.original_memory.clone();
        other[0x12] = b'9';
        assert!(matches!(
            Snapshot::from_quetzal(&bytes, &other, 5),
            Err(ZError::SaveMismatch(_))
        ));
    }
}
