//! Object tree and property opcodes
//!
//! Reads and attribute operations on object 0 are tolerated (logged, with 0
//! or false as the result). Property operations on object 0, and `get_prop`
//! / `put_prop` / `get_next_prop` on a property the object lacks (with no
//! default to fall back on), fail with `MissingProperty`.

use crate::error::ZResult;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::zobject::ObjectTree;
use log::{debug, warn};

impl Interpreter {
    /// Handle object-related opcodes
    pub fn execute_object_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        let obj = operands[0];
        match inst.name() {
            "get_sibling" => {
                let sibling = self.vm.get_sibling(obj)?;
                self.store(inst, sibling)?;
                self.branch(inst, sibling != 0)
            }
            "get_child" => {
                let child = self.vm.get_child(obj)?;
                self.store(inst, child)?;
                self.branch(inst, child != 0)
            }
            "get_parent" => {
                let parent = self.vm.get_parent(obj)?;
                self.store(inst, parent)?;
                Ok(ExecutionResult::Continue)
            }
            "jin" => {
                let parent = self.vm.get_parent(obj)?;
                self.branch(inst, parent == operands[1])
            }

            "test_attr" => {
                let set = self.vm.test_attribute(obj, operands[1])?;
                self.branch(inst, set)
            }
            "set_attr" => {
                self.vm.set_attribute(obj, operands[1])?;
                Ok(ExecutionResult::Continue)
            }
            "clear_attr" => {
                self.vm.clear_attribute(obj, operands[1])?;
                Ok(ExecutionResult::Continue)
            }

            "insert_obj" => {
                self.vm.insert_object(obj, operands[1])?;
                Ok(ExecutionResult::Continue)
            }
            "remove_obj" => {
                debug!("remove_obj {}", obj);
                self.vm.remove_object(obj)?;
                Ok(ExecutionResult::Continue)
            }

            "get_prop" => {
                let value = self.vm.get_property(obj, operands[1])?;
                self.store(inst, value)?;
                Ok(ExecutionResult::Continue)
            }
            "put_prop" => {
                self.vm.put_property(obj, operands[1], operands[2])?;
                Ok(ExecutionResult::Continue)
            }
            "get_prop_addr" => {
                let addr = self.vm.get_property_addr(obj, operands[1])?;
                self.store(inst, addr as u16)?;
                Ok(ExecutionResult::Continue)
            }
            "get_next_prop" => {
                let next = self.vm.get_next_property(obj, operands[1])?;
                self.store(inst, next)?;
                Ok(ExecutionResult::Continue)
            }
            // The operand is a property data address, not an object
            "get_prop_len" => {
                let len = self.vm.get_property_len(operands[0] as u32)?;
                self.store(inst, len)?;
                Ok(ExecutionResult::Continue)
            }

            "print_obj" => {
                if obj == 0 {
                    warn!("print_obj 0");
                    return Ok(ExecutionResult::Continue);
                }
                if let Some(addr) = self.vm.object_name_addr(obj)? {
                    self.print_string_at(addr)?;
                }
                Ok(ExecutionResult::Continue)
            }

            _ => Err(self.unknown_opcode(inst)),
        }
    }

    /// Check if an opcode is an object operation
    pub fn is_object_opcode(name: &str) -> bool {
        matches!(
            name,
            "get_sibling"
                | "get_child"
                | "get_parent"
                | "jin"
                | "test_attr"
                | "set_attr"
                | "clear_attr"
                | "insert_obj"
                | "remove_obj"
                | "get_prop"
                | "put_prop"
                | "get_prop_addr"
                | "get_next_prop"
                | "get_prop_len"
                | "print_obj"
        )
    }
}
