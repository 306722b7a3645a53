//! Error types for the Z-Machine interpreter core
//!
//! Every fallible operation in the crate returns [`ZResult`]. Faults raised
//! while an instruction executes are wrapped in [`ExecutionError`] so the
//! embedding caller learns which instruction failed and with what operands.

use thiserror::Error;

/// Crate-wide result alias
pub type ZResult<T> = Result<T, ZError>;

/// Coarse classification of a [`ZError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad header or checksum, rejected at load time
    MalformedImage,
    /// Out-of-bounds memory, stack or call-depth faults
    Memory,
    /// Opcode/form/version combinations that do not exist, or truncated instructions
    UnknownOpcode,
    /// Object-model faults such as missing properties
    Semantic,
    /// Save data that cannot be restored into the running story
    Persistence,
    /// Failures reported by the embedding host (screen, configuration)
    Host,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZError {
    #[error("malformed story image: {0}")]
    MalformedImage(String),

    #[error("checksum mismatch: header declares {expected:#06x}, image sums to {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("memory access out of bounds at {addr:#07x} (image size {size:#07x})")]
    OutOfBounds { addr: u32, size: usize },

    #[error("write to non-dynamic memory at {addr:#07x} (static memory starts at {static_base:#06x})")]
    StaticWrite { addr: u32, static_base: u16 },

    #[error("stack underflow")]
    StackUnderflow,

    #[error("stack overflow (capacity {capacity} words)")]
    StackOverflow { capacity: usize },

    #[error("call depth exceeded limit of {limit} frames")]
    CallDepthExceeded { limit: usize },

    #[error("return from the main routine")]
    ReturnFromMain,

    #[error("local variable {var} read in a routine with {num_locals} locals")]
    InvalidLocal { var: u8, num_locals: u8 },

    #[error("unknown opcode {form} {opcode:#04x} in version {version}")]
    UnknownOpcode {
        form: &'static str,
        opcode: u8,
        version: u8,
    },

    #[error("malformed instruction at {addr:#07x}: {reason}")]
    Decode { addr: u32, reason: String },

    #[error("{name} needs {expected} operands, found {found}")]
    MissingOperand {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid object number {object}")]
    InvalidObject { object: u16 },

    #[error("property {property} not found on object {object}")]
    MissingProperty { object: u16, property: u16 },

    #[error("nested abbreviation in string at {addr:#07x}")]
    NestedAbbreviation { addr: u32 },

    #[error("output stream 3 nested deeper than {depth} tables")]
    StreamNesting { depth: usize },

    #[error("invalid save data: {0}")]
    InvalidSave(String),

    #[error("save data belongs to a different story: {0}")]
    SaveMismatch(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("display error: {0}")]
    Display(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ZError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ZError::MalformedImage(_) | ZError::ChecksumMismatch { .. } => {
                ErrorCategory::MalformedImage
            }
            ZError::OutOfBounds { .. }
            | ZError::StaticWrite { .. }
            | ZError::StackUnderflow
            | ZError::StackOverflow { .. }
            | ZError::CallDepthExceeded { .. }
            | ZError::ReturnFromMain
            | ZError::InvalidLocal { .. }
            | ZError::StreamNesting { .. } => ErrorCategory::Memory,
            ZError::UnknownOpcode { .. }
            | ZError::Decode { .. }
            | ZError::MissingOperand { .. } => ErrorCategory::UnknownOpcode,
            ZError::DivisionByZero
            | ZError::InvalidObject { .. }
            | ZError::MissingProperty { .. }
            | ZError::NestedAbbreviation { .. } => ErrorCategory::Semantic,
            ZError::InvalidSave(_) | ZError::SaveMismatch(_) => ErrorCategory::Persistence,
            ZError::InvalidInput(_) | ZError::Display(_) | ZError::Config(_) => {
                ErrorCategory::Host
            }
        }
    }

    /// True for errors that indicate the image itself is unusable
    pub fn is_fatal_at_load(&self) -> bool {
        self.category() == ErrorCategory::MalformedImage
    }
}

/// A fault raised while executing one instruction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source} at pc {pc:#07x} ({instruction})")]
pub struct ExecutionError {
    /// Address of the offending instruction
    pub pc: u32,
    /// Disassembled instruction, or a placeholder if it could not be decoded
    pub instruction: String,
    /// Raw operand values as encoded in the instruction
    pub operands: Vec<u16>,
    pub source: ZError,
}

impl ExecutionError {
    pub fn new(pc: u32, instruction: impl Into<String>, operands: Vec<u16>, source: ZError) -> Self {
        ExecutionError {
            pc,
            instruction: instruction.into(),
            operands,
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.source.category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_are_distinguishable() {
        let unknown = ZError::UnknownOpcode {
            form: "2OP",
            opcode: 0x1f,
            version: 3,
        };
        let missing = ZError::MissingProperty {
            object: 0,
            property: 7,
        };
        assert_eq!(unknown.category(), ErrorCategory::UnknownOpcode);
        assert_eq!(missing.category(), ErrorCategory::Semantic);
        assert_eq!(ZError::StackUnderflow.category(), ErrorCategory::Memory);
        assert!(ZError::MalformedImage("short".into()).is_fatal_at_load());
    }

    #[test]
    fn test_missing_property_message() {
        let err = ZError::MissingProperty {
            object: 0,
            property: 12,
        };
        assert_eq!(err.to_string(), "property 12 not found on object 0");
    }

    #[test]
    fn test_execution_error_carries_pc() {
        let err = ExecutionError::new(0x1234, "div #0005, #0000 -> V10", vec![5, 0], ZError::DivisionByZero);
        assert_eq!(err.pc, 0x1234);
        assert_eq!(err.category(), ErrorCategory::Semantic);
        assert!(err.to_string().contains("0x01234"));
    }
}
