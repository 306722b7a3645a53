//! Calls, returns and jumps

use crate::error::ZResult;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::vm::ReturnTarget;
use log::debug;

impl Interpreter {
    pub fn execute_flow_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        match inst.name() {
            // call / call_vs / call_vs2 / call_1s / call_2s store the result
            "call" | "call_vs" | "call_vs2" | "call_1s" | "call_2s" => {
                let target = ReturnTarget::Store(inst.store_var.unwrap_or(0));
                self.do_call(operands[0], &operands[1..], target)
            }
            "call_1n" | "call_2n" | "call_vn" | "call_vn2" => {
                self.do_call(operands[0], &operands[1..], ReturnTarget::Discard)
            }

            "ret" => self.do_return(operands[0]),
            "rtrue" => self.do_return(1),
            "rfalse" => self.do_return(0),
            "ret_popped" => {
                let value = self.vm.pop()?;
                self.do_return(value)
            }

            // 1OP:0x0C - jump (not a branch: the operand is a signed offset)
            "jump" => {
                let target = self.vm.pc as i64 + operands[0] as i16 as i64 - 2;
                self.vm.pc = target as u32;
                Ok(ExecutionResult::Continue)
            }

            "check_arg_count" => {
                let supplied = self.vm.check_arg_count(operands[0])?;
                self.branch(inst, supplied)
            }

            "catch" => {
                let token = self.vm.catch_token();
                self.store(inst, token)?;
                Ok(ExecutionResult::Continue)
            }
            "throw" => {
                debug!("throw {} to frame {}", operands[0], operands[1]);
                self.vm.unwind_to(operands[1])?;
                self.do_return(operands[0])
            }

            _ => Err(self.unknown_opcode(inst)),
        }
    }

    pub fn is_flow_opcode(name: &str) -> bool {
        matches!(
            name,
            "call"
                | "call_vs"
                | "call_vs2"
                | "call_1s"
                | "call_2s"
                | "call_1n"
                | "call_2n"
                | "call_vn"
                | "call_vn2"
                | "ret"
                | "rtrue"
                | "rfalse"
                | "ret_popped"
                | "jump"
                | "check_arg_count"
                | "catch"
                | "throw"
        )
    }
}
