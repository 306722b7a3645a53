//! Memory, variable and stack opcodes
//!
//! `load`, `store`, `inc`, `dec`, `inc_chk`, `dec_chk` and `pull` name their
//! target variable by number. When that number is 0 they work on the top
//! of the stack in place instead of pushing or popping.

use crate::error::ZResult;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Interpreter};
use log::debug;

/// Address of element `index` in a word or byte array, wrapping at 16 bits
fn array_addr(base: u16, index: u16, width: u16) -> u32 {
    base.wrapping_add(index.wrapping_mul(width)) as u32
}

impl Interpreter {
    /// Handle memory access opcodes
    pub fn execute_memory_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        match inst.name() {
            "load" => {
                let value = self.vm.read_variable_indirect(operands[0] as u8)?;
                self.store(inst, value)?;
            }
            "store" => {
                self.vm
                    .write_variable_indirect(operands[0] as u8, operands[1])?;
            }
            "loadw" => {
                let value = self.vm.read_word(array_addr(operands[0], operands[1], 2))?;
                self.store(inst, value)?;
            }
            "loadb" => {
                let value = self.vm.read_byte(array_addr(operands[0], operands[1], 1))?;
                self.store(inst, value as u16)?;
            }
            "storew" => {
                self.vm
                    .write_word(array_addr(operands[0], operands[1], 2), operands[2])?;
            }
            "storeb" => {
                self.vm
                    .write_byte(array_addr(operands[0], operands[1], 1), operands[2] as u8)?;
            }

            "inc" | "dec" => {
                let var = operands[0] as u8;
                let delta: i16 = if inst.name() == "inc" { 1 } else { -1 };
                let value = (self.vm.read_variable_indirect(var)? as i16).wrapping_add(delta);
                self.vm.write_variable_indirect(var, value as u16)?;
            }
            "inc_chk" | "dec_chk" => {
                let var = operands[0] as u8;
                let limit = operands[1] as i16;
                let current = self.vm.read_variable_indirect(var)? as i16;
                let (value, condition) = if inst.name() == "inc_chk" {
                    let value = current.wrapping_add(1);
                    (value, value > limit)
                } else {
                    let value = current.wrapping_sub(1);
                    (value, value < limit)
                };
                self.vm.write_variable_indirect(var, value as u16)?;
                return self.branch(inst, condition);
            }

            "push" => self.vm.push(operands[0])?,
            "pop" => {
                self.vm.pop()?;
            }
            "pull" => {
                if self.version() == 6 {
                    // V6 pulls into the store variable, optionally from a user stack
                    let value = match operands.first() {
                        Some(&stack) => self.pull_user_stack(stack)?,
                        None => self.vm.pop()?,
                    };
                    self.store(inst, value)?;
                } else {
                    let value = self.vm.pop()?;
                    self.vm.write_variable_indirect(operands[0] as u8, value)?;
                }
            }
            "pop_stack" => {
                let count = operands[0];
                match operands.get(1) {
                    Some(&stack) => {
                        let free = self.vm.read_word(stack as u32)?;
                        self.vm.write_word(stack as u32, free.wrapping_add(count))?;
                    }
                    None => {
                        for _ in 0..count {
                            self.vm.pop()?;
                        }
                    }
                }
            }
            "push_stack" => {
                let stack = operands[1] as u32;
                let free = self.vm.read_word(stack)?;
                if free == 0 {
                    return self.branch(inst, false);
                }
                self.vm.write_word(stack + 2 * free as u32, operands[0])?;
                self.vm.write_word(stack, free - 1)?;
                return self.branch(inst, true);
            }

            "copy_table" => self.copy_table(operands[0], operands[1], operands[2] as i16)?,
            "scan_table" => {
                let form = operands.get(3).copied().unwrap_or(0x82);
                let found = self.scan_table(operands[0], operands[1], operands[2], form)?;
                self.store(inst, found as u16)?;
                return self.branch(inst, found != 0);
            }

            _ => return Err(self.unknown_opcode(inst)),
        }
        Ok(ExecutionResult::Continue)
    }

    fn pull_user_stack(&mut self, stack: u16) -> ZResult<u16> {
        let free = self.vm.read_word(stack as u32)?.wrapping_add(1);
        self.vm.write_word(stack as u32, free)?;
        self.vm.read_word(stack as u32 + 2 * free as u32)
    }

    /// `copy_table`: a zero destination clears; a negative size copies
    /// forwards even when the tables overlap
    pub(crate) fn copy_table(&mut self, first: u16, second: u16, size: i16) -> ZResult<()> {
        let len = size.unsigned_abs() as u32;
        let (first, second) = (first as u32, second as u32);
        debug!("copy_table {:04x} -> {:04x} ({})", first, second, size);
        if second == 0 {
            for i in 0..len {
                self.vm.write_byte(first + i, 0)?;
            }
        } else if size < 0 {
            for i in 0..len {
                let byte = self.vm.read_byte(first + i)?;
                self.vm.write_byte(second + i, byte)?;
            }
        } else {
            let bytes = (0..len)
                .map(|i| self.vm.read_byte(first + i))
                .collect::<ZResult<Vec<u8>>>()?;
            for (i, byte) in bytes.into_iter().enumerate() {
                self.vm.write_byte(second + i as u32, byte)?;
            }
        }
        Ok(())
    }

    /// `scan_table`: address of the first matching field, or 0.
    /// Bit 7 of `form` selects words; the low bits give the entry length.
    pub(crate) fn scan_table(&self, value: u16, table: u16, len: u16, form: u16) -> ZResult<u32> {
        let words = form & 0x80 != 0;
        let entry_len = (form & 0x7F) as u32;
        let mut addr = table as u32;
        for _ in 0..len {
            let field = if words {
                self.vm.read_word(addr)?
            } else {
                self.vm.read_byte(addr)? as u16
            };
            if field == value {
                return Ok(addr);
            }
            addr += entry_len;
        }
        Ok(0)
    }

    /// Check if an opcode is a memory operation
    pub fn is_memory_opcode(name: &str) -> bool {
        matches!(
            name,
            "load"
                | "store"
                | "loadw"
                | "loadb"
                | "storew"
                | "storeb"
                | "inc"
                | "dec"
                | "inc_chk"
                | "dec_chk"
                | "push"
                | "pop"
                | "pull"
                | "pop_stack"
                | "push_stack"
                | "copy_table"
                | "scan_table"
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::config::InterpreterConfig;
    use crate::interpreter::{Interpreter, RunState};
    use crate::test_utils::StoryBuilder;
    use test_log::test;

    fn run(story: &StoryBuilder) -> Interpreter {
        let mut zm = Interpreter::new(story.build(), InterpreterConfig::seeded(3)).unwrap();
        assert_eq!(zm.run().unwrap(), RunState::Quit);
        zm
    }

    #[test]
    fn test_indirect_stack_ops_work_in_place() {
        let mut story = StoryBuilder::new(5);
        story.main(&[
            0xE8, 0x7F, 0x05, // push 5
            0xE8, 0x7F, 0x09, // push 9
            0x95, 0x00, // inc [sp]
            0x9E, 0x00, 0x10, // load [sp] -> g00
            0x2D, 0x00, 0x11, // store [sp] g01 (g01 is 0)
            0xE9, 0x7F, 0x12, // pull g02
            0xE9, 0x7F, 0x13, // pull g03
            0xBA,
        ]);
        let zm = run(&story);
        assert_eq!(zm.vm.read_global(0x10).unwrap(), 10);
        assert_eq!(zm.vm.read_global(0x12).unwrap(), 0);
        assert_eq!(zm.vm.read_global(0x13).unwrap(), 5);
    }

    #[test]
    fn test_inc_chk_and_dec_chk_are_signed() {
        let mut story = StoryBuilder::new(3);
        story.global(0x10, 0xFFFF);
        story.main(&[
            // inc_chk g00 0 ?(skip next) ; store g01 1
            0x05, 0x10, 0x00, 0xC5, //
            0x0D, 0x11, 0x01, //
            // dec_chk g00 0 ?(skip next) ; store g02 1
            0x04, 0x10, 0x00, 0xC5, //
            0x0D, 0x12, 0x01, //
            0xBA,
        ]);
        let zm = run(&story);
        assert_eq!(zm.vm.read_global(0x10).unwrap(), 0xFFFF);
        assert_eq!(zm.vm.read_global(0x11).unwrap(), 1);
        assert_eq!(zm.vm.read_global(0x12).unwrap(), 0);
    }

    #[test]
    fn test_copy_table_overlap() {
        let mut story = StoryBuilder::new(5);
        let table = story.table(&[1, 2, 3, 4, 5, 0, 0]);
        let mut zm = Interpreter::new(story.build(), InterpreterConfig::default()).unwrap();
        let t = table as u16;

        zm.copy_table(t, t + 2, 5).unwrap();
        let bytes: Vec<u8> = (0..7).map(|i| zm.vm.read_byte(table + i).unwrap()).collect();
        assert_eq!(bytes, vec![1, 2, 1, 2, 3, 4, 5]);

        zm.copy_table(t, t + 1, -3).unwrap();
        let bytes: Vec<u8> = (0..4).map(|i| zm.vm.read_byte(table + i).unwrap()).collect();
        assert_eq!(bytes, vec![1, 1, 1, 1]);

        zm.copy_table(t, 0, 7).unwrap();
        assert!((0..7).all(|i| zm.vm.read_byte(table + i).unwrap() == 0));
    }

    #[test]
    fn test_scan_table_forms() {
        let mut story = StoryBuilder::new(5);
        let table = story.table(&[0, 1, 0, 2, 0x12, 0x34, 7, 8]);
        let zm = Interpreter::new(story.build(), InterpreterConfig::default()).unwrap();
        let t = table as u16;
        assert_eq!(zm.scan_table(0x1234, t, 4, 0x82).unwrap(), table + 4);
        assert_eq!(zm.scan_table(7, t, 8, 0x01).unwrap(), table + 6);
        assert_eq!(zm.scan_table(2, t, 4, 0x02).unwrap(), 0);
        assert_eq!(zm.scan_table(0x0002, t, 2, 0x82).unwrap(), table + 2);
    }

    #[test]
    fn test_user_stack_v6() {
        let mut story = StoryBuilder::new(6);
        let stack = story.table(&[0, 2, 0, 0, 0, 0]);
        let s = (stack as u16).to_be_bytes();
        story.main(&[
            // push_stack 7 stack ?(skip) ; quit
            0xBE, 0x18, 0x4F, 0x07, s[0], s[1], 0xC3, 0xBA, //
            // pull stack -> g00
            0xE9, 0x3F, s[0], s[1], 0x10, //
            0xBA,
        ]);
        let zm = run(&story);
        assert_eq!(zm.vm.read_global(0x10).unwrap(), 7);
        assert_eq!(zm.vm.read_word(stack).unwrap(), 2);
    }
}
