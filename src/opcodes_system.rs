//! System opcodes: quitting, restarting, saving and randomness
//!
//! A successful `restore` resumes after the `save` that produced the state,
//! with the save reporting 2 (stores, V4+) or taking its branch (V1-3).
//! Storage failures are reported to the story as an unsuccessful save or
//! restore, never as a fault.

use crate::error::ZResult;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::quetzal::store::GAME_SAVE;
use crate::quetzal::Snapshot;
use log::{debug, info, warn};

/// Value `save` reports after the state it wrote has been restored
const RESTORED: u16 = 2;

impl Interpreter {
    /// Handle system-level opcodes
    pub fn execute_system_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        match inst.name() {
            "quit" => {
                info!("Story quit after {} instructions", self.instruction_count());
                Ok(ExecutionResult::Quit)
            }
            "restart" => {
                info!("Restarting story");
                self.restart()?;
                Ok(ExecutionResult::Continue)
            }
            "nop" => Ok(ExecutionResult::Continue),
            "verify" => {
                let header = &self.vm.game.header;
                let actual = header.compute_checksum(&self.vm.game.original_memory);
                debug!("verify: checksum {:04x}, header says {:04x}", actual, header.checksum_file);
                let matches = actual == header.checksum_file;
                self.branch(inst, matches)
            }
            // Stories only ever ask whether the copy is genuine
            "piracy" => self.branch(inst, true),
            "random" => {
                let value = self.rng.random(operands[0] as i16);
                self.store(inst, value)?;
                Ok(ExecutionResult::Continue)
            }

            "save" if !operands.is_empty() => self.save_table(inst, operands),
            "restore" if !operands.is_empty() => self.restore_table(inst, operands),
            "save" => self.save_game(inst),
            "restore" => self.restore_game(inst),
            "save_undo" => self.save_undo(inst),
            "restore_undo" => self.restore_undo(inst),

            _ => Err(self.unknown_opcode(inst)),
        }
    }

    /// Report a save or restore outcome through a store (V4+) or a branch
    fn report(&mut self, inst: &Instruction, success: bool) -> ZResult<ExecutionResult> {
        if self.vm.profile.save_uses_store() {
            self.store(inst, success as u16)?;
            Ok(ExecutionResult::Continue)
        } else {
            self.branch(inst, success)
        }
    }

    /// Resume pc recorded in a save: the instruction's store or branch byte
    fn resume_pc(inst: &Instruction) -> u32 {
        inst.addr + inst.result_offset as u32
    }

    fn save_game(&mut self, inst: &Instruction) -> ZResult<ExecutionResult> {
        let snapshot = Snapshot::capture(&self.vm, Self::resume_pc(inst));
        let bytes = snapshot.to_quetzal(&self.vm.game.original_memory, self.version());
        match self.save_store.write(GAME_SAVE, &bytes) {
            Ok(()) => {
                info!("Saved game ({} bytes)", bytes.len());
                self.report(inst, true)
            }
            Err(e) => {
                warn!("Save failed: {}", e);
                self.report(inst, false)
            }
        }
    }

    fn restore_game(&mut self, inst: &Instruction) -> ZResult<ExecutionResult> {
        let restored = self.save_store.read(GAME_SAVE).and_then(|bytes| {
            let snapshot =
                Snapshot::from_quetzal(&bytes, &self.vm.game.original_memory, self.version())?;
            self.apply_snapshot(&snapshot)
        });
        match restored {
            Ok(()) => {
                info!("Restored game, resuming at {:05x}", self.vm.pc);
                self.resume_after_restore()
            }
            Err(e) => {
                warn!("Restore failed: {}", e);
                self.report(inst, false)
            }
        }
    }

    /// Finish the `save` instruction whose state was just restored
    fn resume_after_restore(&mut self) -> ZResult<ExecutionResult> {
        let pc = self.vm.pc;
        if self.vm.profile.save_uses_store() {
            let var = self.vm.read_byte(pc)?;
            self.vm.pc = pc + 1;
            self.vm.write_variable(var, RESTORED)?;
            return Ok(ExecutionResult::Continue);
        }

        let ((on_true, offset), len) =
            Instruction::decode_branch(&self.vm.game.memory, pc as usize, pc as usize)?;
        let after = pc + len as u32;
        self.vm.pc = after;
        if !on_true {
            return Ok(ExecutionResult::Continue);
        }
        match offset {
            0 => self.do_return(0),
            1 => self.do_return(1),
            _ => {
                self.vm.pc = (after as i64 + offset as i64 - 2) as u32;
                Ok(ExecutionResult::Continue)
            }
        }
    }

    /// Name an auxiliary save: a length-prefixed string, or a default
    fn table_save_name(&self, operands: &[u16]) -> ZResult<String> {
        match operands.get(2) {
            Some(&addr) if addr != 0 => {
                let len = self.vm.read_byte(addr as u32)? as u32;
                let name = (1..=len)
                    .map(|i| self.vm.read_byte(addr as u32 + i).map(char::from))
                    .collect::<ZResult<String>>()?;
                Ok(name.to_lowercase())
            }
            _ => Ok("auxiliary".to_string()),
        }
    }

    /// EXT `save table bytes name`: write part of memory, storing the byte count
    fn save_table(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        let table = operands[0] as u32;
        let count = operands.get(1).copied().unwrap_or(0);
        let name = self.table_save_name(operands)?;
        let bytes = (0..count as u32)
            .map(|i| self.vm.read_byte(table + i))
            .collect::<ZResult<Vec<u8>>>()?;
        let written = match self.save_store.write(&name, &bytes) {
            Ok(()) => count,
            Err(e) => {
                warn!("Saving table '{}' failed: {}", name, e);
                0
            }
        };
        self.store(inst, written)?;
        Ok(ExecutionResult::Continue)
    }

    /// EXT `restore table bytes name`: read back at most `bytes`, storing how many
    fn restore_table(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        let table = operands[0] as u32;
        let count = operands.get(1).copied().unwrap_or(0) as usize;
        let name = self.table_save_name(operands)?;
        let read = match self.save_store.read(&name) {
            Ok(bytes) => {
                let n = bytes.len().min(count);
                for (i, &b) in bytes[..n].iter().enumerate() {
                    self.vm.write_byte(table + i as u32, b)?;
                }
                n as u16
            }
            Err(e) => {
                warn!("Restoring table '{}' failed: {}", name, e);
                0
            }
        };
        self.store(inst, read)?;
        Ok(ExecutionResult::Continue)
    }

    fn save_undo(&mut self, inst: &Instruction) -> ZResult<ExecutionResult> {
        let slots = self.config.undo_slots;
        if slots == 0 {
            // -1: undo is not available
            self.store(inst, 0xFFFF)?;
            return Ok(ExecutionResult::Continue);
        }
        if self.undo.len() >= slots {
            self.undo.pop_front();
        }
        self.undo
            .push_back(Snapshot::capture(&self.vm, Self::resume_pc(inst)));
        debug!("save_undo: {} of {} slots used", self.undo.len(), slots);
        self.store(inst, 1)?;
        Ok(ExecutionResult::Continue)
    }

    fn restore_undo(&mut self, inst: &Instruction) -> ZResult<ExecutionResult> {
        let Some(snapshot) = self.undo.pop_back() else {
            debug!("restore_undo with nothing saved");
            self.store(inst, 0)?;
            return Ok(ExecutionResult::Continue);
        };
        if let Err(e) = self.apply_snapshot(&snapshot) {
            warn!("Undo state rejected: {}", e);
            self.store(inst, 0)?;
            return Ok(ExecutionResult::Continue);
        }
        self.resume_after_restore()
    }

    /// Check if an opcode is a system operation
    pub fn is_system_opcode(name: &str) -> bool {
        matches!(
            name,
            "quit"
                | "restart"
                | "nop"
                | "verify"
                | "piracy"
                | "random"
                | "save"
                | "restore"
                | "save_undo"
                | "restore_undo"
        )
    }
}
