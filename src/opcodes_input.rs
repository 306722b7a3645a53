//! Input opcodes
//!
//! `sread`/`aread` and `read_char` do not block: they record what the
//! story asked for and hand a [`RunState`](crate::RunState) request back to
//! the host. `tokenise` and `encode_text` run the lexical half of `read`
//! on their own.

use crate::dictionary::tokenise;
use crate::error::ZResult;
use crate::instruction::Instruction;
use crate::interpreter::{CharRequest, ExecutionResult, Interpreter, LineRequest, PendingInput};
use log::debug;

impl Interpreter {
    /// Handle input-related opcodes
    pub fn execute_input_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        let arg = |i: usize| operands.get(i).copied().unwrap_or(0);
        match inst.name() {
            "sread" | "aread" => {
                if self.version() <= 3 {
                    self.update_status_line()?;
                }
                let text = arg(0) as u32;
                let capacity = self.vm.read_byte(text)? as usize;
                // V1-4 keep a byte for the terminating zero
                let max_len = if self.version() <= 4 {
                    capacity.saturating_sub(1)
                } else {
                    capacity
                };
                let request = LineRequest {
                    max_len,
                    timeout_tenths: arg(2),
                    routine: arg(3),
                };
                debug!("{}: text {:04x} parse {:04x} {:?}", inst.name(), text, arg(1), request);
                self.pending = Some(PendingInput::Line {
                    text,
                    parse: arg(1) as u32,
                    store_var: inst.store_var,
                    request,
                });
                Ok(ExecutionResult::NeedLine(request))
            }
            "read_char" => {
                let request = CharRequest {
                    timeout_tenths: arg(1),
                    routine: arg(2),
                };
                self.pending = Some(PendingInput::Char {
                    store_var: inst.store_var,
                    request,
                });
                Ok(ExecutionResult::NeedChar(request))
            }
            "tokenise" => {
                let dictionary = match operands.get(2) {
                    Some(&dict) if dict != 0 => dict as u32,
                    _ => self.vm.game.header.dictionary as u32,
                };
                tokenise(
                    &mut self.vm,
                    &self.codec,
                    arg(0) as u32,
                    arg(1) as u32,
                    dictionary,
                    arg(3) != 0,
                )?;
                Ok(ExecutionResult::Continue)
            }
            "encode_text" => {
                let start = arg(0) as u32 + arg(2) as u32;
                let text = (0..arg(1) as u32)
                    .map(|i| self.vm.read_byte(start + i).map(u16::from))
                    .collect::<ZResult<Vec<u16>>>()?;
                let encoded = self
                    .codec
                    .encode_word(&text, self.vm.profile.dictionary_zchars);
                let dest = arg(3) as u32;
                for (i, &byte) in encoded.iter().enumerate() {
                    self.vm.write_byte(dest + i as u32, byte)?;
                }
                Ok(ExecutionResult::Continue)
            }
            "input_stream" => {
                self.streams.select_input(arg(0));
                Ok(ExecutionResult::Continue)
            }
            _ => Err(self.unknown_opcode(inst)),
        }
    }

    /// Check if an opcode is an input operation
    pub fn is_input_opcode(name: &str) -> bool {
        matches!(
            name,
            "sread" | "aread" | "read_char" | "tokenise" | "encode_text" | "input_stream"
        )
    }
}
