use crate::error::{ZError, ZResult};
use crate::opcode_tables::{self, OpcodeInfo, OpcodeTable};
use log::trace;
use std::fmt::{Display, Error, Formatter};

/// Operand types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// Large constant (2 bytes)
    LargeConstant,
    /// Small constant (1 byte)
    SmallConstant,
    /// Variable number
    Variable,
    /// Omitted (not present)
    Omitted,
}

impl OperandType {
    /// Parse operand type from 2-bit value
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => OperandType::LargeConstant,
            0b01 => OperandType::SmallConstant,
            0b10 => OperandType::Variable,
            _ => OperandType::Omitted,
        }
    }

    /// Get the size in bytes for this operand type
    pub fn size(&self) -> usize {
        match self {
            OperandType::LargeConstant => 2,
            OperandType::SmallConstant => 1,
            OperandType::Variable => 1,
            OperandType::Omitted => 0,
        }
    }
}

/// Instruction forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionForm {
    Long,
    Short,
    Extended,
    Variable,
}

/// Operand count categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandCount {
    OP0,
    OP1,
    OP2,
    /// Variable number of operands (0-8)
    VAR,
}

/// Where a taken branch goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchTarget {
    ReturnFalse,
    ReturnTrue,
    /// Absolute address of the next instruction when the branch is taken
    Address(u32),
}

/// Branch information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchInfo {
    /// True if branch on true, false if branch on false
    pub on_true: bool,
    /// Raw offset (0 = return false, 1 = return true, otherwise relative jump)
    pub offset: i16,
    pub target: BranchTarget,
}

/// A decoded Z-Machine instruction
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Address of the first opcode byte
    pub addr: u32,
    /// Opcode number within its table (for EXT, the byte after 0xBE)
    pub opcode: u8,
    pub form: InstructionForm,
    pub operand_count: OperandCount,
    pub operand_types: Vec<OperandType>,
    /// Operand values as encoded; variables are not yet resolved
    pub operands: Vec<u16>,
    /// Variable to store result (if applicable)
    pub store_var: Option<u8>,
    /// Branch information (if applicable)
    pub branch: Option<BranchInfo>,
    /// Address of the inline Z-string for `print`/`print_ret`
    pub text_addr: Option<u32>,
    /// Offset from `addr` of the store or branch byte
    pub result_offset: usize,
    /// Total size of instruction in bytes
    pub size: usize,
    pub info: OpcodeInfo,
}

fn byte_at(memory: &[u8], offset: usize, addr: usize, what: &str) -> ZResult<u8> {
    memory.get(offset).copied().ok_or_else(|| ZError::Decode {
        addr: addr as u32,
        reason: format!("{what} runs past end of memory"),
    })
}

impl Instruction {
    /// Decode an instruction from memory at the given address
    pub fn decode(memory: &[u8], addr: usize, version: u8) -> ZResult<Self> {
        let mut offset = addr;
        let opcode_byte = byte_at(memory, offset, addr, "opcode")?;
        offset += 1;

        // Determine instruction form based on top 2 bits
        let form = match opcode_byte >> 6 {
            0b11 => InstructionForm::Variable,
            0b10 if opcode_byte == 0xBE && version >= 5 => InstructionForm::Extended,
            0b10 => InstructionForm::Short,
            _ => InstructionForm::Long,
        };

        let (opcode, operand_count, table) = match form {
            InstructionForm::Long => (opcode_byte & 0x1F, OperandCount::OP2, OpcodeTable::Op2),
            InstructionForm::Short => {
                if (opcode_byte >> 4) & 0x03 == 0x03 {
                    (opcode_byte & 0x0F, OperandCount::OP0, OpcodeTable::Op0)
                } else {
                    (opcode_byte & 0x0F, OperandCount::OP1, OpcodeTable::Op1)
                }
            }
            InstructionForm::Variable => {
                if opcode_byte & 0x20 == 0 {
                    (opcode_byte & 0x1F, OperandCount::OP2, OpcodeTable::Op2)
                } else {
                    (opcode_byte & 0x1F, OperandCount::VAR, OpcodeTable::Var)
                }
            }
            InstructionForm::Extended => {
                let ext_op = byte_at(memory, offset, addr, "extended opcode")?;
                offset += 1;
                (ext_op, OperandCount::VAR, OpcodeTable::Ext)
            }
        };

        let info = opcode_tables::lookup(table, opcode, version).ok_or(ZError::UnknownOpcode {
            form: table.label(),
            opcode,
            version,
        })?;

        let mut operand_types = Vec::with_capacity(4);
        match form {
            InstructionForm::Long => {
                // Long form: 2 operands, types in bits 6 and 5
                for mask in [0x40, 0x20] {
                    operand_types.push(if opcode_byte & mask != 0 {
                        OperandType::Variable
                    } else {
                        OperandType::SmallConstant
                    });
                }
            }
            InstructionForm::Short => {
                let op_type = OperandType::from_bits(opcode_byte >> 4);
                if op_type != OperandType::Omitted {
                    operand_types.push(op_type);
                }
            }
            InstructionForm::Variable | InstructionForm::Extended => {
                // call_vs2 and call_vn2 always carry two type bytes
                let type_byte_count =
                    if table == OpcodeTable::Var && (opcode == 0x0C || opcode == 0x1A) {
                        2
                    } else {
                        1
                    };
                let mut type_bytes = [0xFFu8; 2];
                for slot in type_bytes.iter_mut().take(type_byte_count) {
                    *slot = byte_at(memory, offset, addr, "operand types")?;
                    offset += 1;
                }

                'types: for type_byte in &type_bytes[..type_byte_count] {
                    for i in 0..4 {
                        let op_type = OperandType::from_bits(type_byte >> (6 - i * 2));
                        if op_type == OperandType::Omitted {
                            break 'types;
                        }
                        operand_types.push(op_type);
                    }
                }
            }
        }

        let mut operands = Vec::with_capacity(operand_types.len());
        for op_type in &operand_types {
            match op_type {
                OperandType::LargeConstant => {
                    let hi = byte_at(memory, offset, addr, "large constant")?;
                    let lo = byte_at(memory, offset + 1, addr, "large constant")?;
                    operands.push(((hi as u16) << 8) | lo as u16);
                    offset += 2;
                }
                OperandType::SmallConstant | OperandType::Variable => {
                    operands.push(byte_at(memory, offset, addr, "operand")? as u16);
                    offset += 1;
                }
                OperandType::Omitted => break,
            }
        }

        let result_offset = offset - addr;

        let store_var = if info.stores {
            let var = byte_at(memory, offset, addr, "store variable")?;
            offset += 1;
            Some(var)
        } else {
            None
        };

        let branch = if info.branches {
            let (branch, len) = Self::decode_branch(memory, offset, addr)?;
            offset += len;
            Some(BranchInfo {
                target: match branch.1 {
                    0 => BranchTarget::ReturnFalse,
                    1 => BranchTarget::ReturnTrue,
                    n => BranchTarget::Address((offset as i64 + n as i64 - 2) as u32),
                },
                on_true: branch.0,
                offset: branch.1,
            })
        } else {
            None
        };

        let text_addr = if info.text {
            let start = offset;
            // Inline strings end at the first word with its top bit set
            loop {
                let hi = byte_at(memory, offset, addr, "inline string")?;
                offset += 2;
                if hi & 0x80 != 0 {
                    break;
                }
            }
            Some(start as u32)
        } else {
            None
        };

        let inst = Instruction {
            addr: addr as u32,
            opcode,
            form,
            operand_count,
            operand_types,
            operands,
            store_var,
            branch,
            text_addr,
            result_offset,
            size: offset - addr,
            info,
        };
        trace!("{:05x}: {}", addr, inst);
        Ok(inst)
    }

    /// Decode a branch byte (or two) at `offset`, returning ((on_true, offset), length)
    pub fn decode_branch(memory: &[u8], offset: usize, addr: usize) -> ZResult<((bool, i16), usize)> {
        let first = byte_at(memory, offset, addr, "branch")?;
        let on_true = first & 0x80 != 0;
        if first & 0x40 != 0 {
            // Short form: unsigned 6-bit offset
            Ok(((on_true, (first & 0x3F) as i16), 1))
        } else {
            let second = byte_at(memory, offset + 1, addr, "branch")?;
            let raw = (((first & 0x3F) as u16) << 8) | second as u16;
            // Sign extend 14 bits
            let value = if raw & 0x2000 != 0 {
                (raw | 0xC000) as i16
            } else {
                raw as i16
            };
            Ok(((on_true, value), 2))
        }
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    pub fn table(&self) -> OpcodeTable {
        match (self.form, self.operand_count) {
            (InstructionForm::Extended, _) => OpcodeTable::Ext,
            (_, OperandCount::OP0) => OpcodeTable::Op0,
            (_, OperandCount::OP1) => OpcodeTable::Op1,
            (_, OperandCount::OP2) => OpcodeTable::Op2,
            (_, OperandCount::VAR) => OpcodeTable::Var,
        }
    }

    /// Address of the instruction that follows this one
    pub fn next_pc(&self) -> u32 {
        self.addr + self.size as u32
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.name())?;

        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " ")?;
            } else {
                write!(f, ", ")?;
            }

            match self.operand_types[i] {
                OperandType::Variable => match *op {
                    0 => write!(f, "(SP)")?,
                    1..=15 => write!(f, "L{:02x}", op - 1)?,
                    _ => write!(f, "G{:02x}", op - 16)?,
                },
                _ => write!(f, "#{:04x}", op)?,
            }
        }

        if let Some(var) = self.store_var {
            write!(f, " -> V{:02x}", var)?;
        }

        if let Some(ref branch) = self.branch {
            write!(
                f,
                " [{}] {}",
                if branch.on_true { "TRUE" } else { "FALSE" },
                match branch.target {
                    BranchTarget::ReturnFalse => "RFALSE".to_string(),
                    BranchTarget::ReturnTrue => "RTRUE".to_string(),
                    BranchTarget::Address(a) => format!("{:05x}", a),
                }
            )?;
        }

        Ok(())
    }
}
