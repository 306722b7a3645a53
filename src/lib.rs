//! A Z-Machine interpreter core for story files of versions 1 to 8.
//!
//! The host hands [`Interpreter::new`] a story image and drives it with
//! [`Interpreter::run`], answering line and character requests as they come
//! back. Screen output, save storage and timing belong to the host through
//! the [`Screen`] and [`SaveStore`] traits.

pub mod config;
pub mod dictionary;
pub mod display_headless;
pub mod display_trait;
pub mod error;
pub mod header;
pub mod instruction;
pub mod interpreter;
pub mod opcode_tables;
pub mod opcodes_display;
pub mod opcodes_flow;
pub mod opcodes_input;
pub mod opcodes_math;
pub mod opcodes_memory;
pub mod opcodes_object;
pub mod opcodes_system;
pub mod quetzal;
pub mod streams;
pub mod test_utils;
pub mod text;
pub mod version;
pub mod vm;
pub mod zobject;
pub mod zrand;

pub use config::InterpreterConfig;
pub use display_headless::HeadlessScreen;
pub use display_trait::{DisplayError, Screen, StatusLine};
pub use error::{ErrorCategory, ExecutionError, ZError, ZResult};
pub use header::Header;
pub use interpreter::{CharRequest, ExecutionResult, Interpreter, LineRequest, RunState};
pub use quetzal::{MemorySaveStore, SaveStore, Snapshot};
pub use zobject::ObjectTree;
