//! The instruction dispatcher
//!
//! [`Interpreter::run`] fetches, decodes and executes instructions until the
//! story quits or needs input. Input is suspend/resume: `run` hands back a
//! [`RunState`] describing the request and the host answers through
//! [`Interpreter::provide_line`] or [`Interpreter::provide_char`], which
//! carry on running.

use std::collections::VecDeque;

use crate::config::InterpreterConfig;
use crate::dictionary::tokenise;
use crate::display_headless::HeadlessScreen;
use crate::display_trait::{Screen, StatusLine};
use crate::error::{ExecutionError, ZError, ZResult};
use crate::header::{FLAGS1, FLAGS2, FLAGS2_FIXED_PITCH, FLAGS2_TRANSCRIPT};
use crate::instruction::{BranchTarget, Instruction, OperandType};
use crate::quetzal::{MemorySaveStore, SaveStore, Snapshot};
use crate::streams::OutputStreams;
use crate::text::{TextCodec, ZSCII_NEWLINE};
use crate::vm::{Game, ReturnTarget, VM};
use crate::zobject::ObjectTree;
use crate::zrand::ZRand;
use log::{debug, trace, warn};

/// A pending `read`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    /// Characters the text buffer can hold
    pub max_len: usize,
    /// Tenths of a second between calls to the interrupt routine; 0 = untimed
    pub timeout_tenths: u16,
    /// Packed address of the interrupt routine, 0 when there is none
    pub routine: u16,
}

/// A pending `read_char`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRequest {
    pub timeout_tenths: u16,
    pub routine: u16,
}

/// Why `run` stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Quit,
    NeedLine(LineRequest),
    NeedChar(CharRequest),
    /// The configured per-call instruction budget ran out
    InstructionLimit,
}

/// Outcome of a single instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Carry on at `vm.pc`
    Continue,
    Quit,
    NeedLine(LineRequest),
    NeedChar(CharRequest),
    /// An interrupt routine returned this value
    InterruptDone(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingInput {
    Line {
        text: u32,
        parse: u32,
        store_var: Option<u8>,
        request: LineRequest,
    },
    Char {
        store_var: Option<u8>,
        request: CharRequest,
    },
}

impl PendingInput {
    fn state(&self) -> RunState {
        match *self {
            PendingInput::Line { request, .. } => RunState::NeedLine(request),
            PendingInput::Char { request, .. } => RunState::NeedChar(request),
        }
    }

    fn routine(&self) -> u16 {
        match *self {
            PendingInput::Line { request, .. } => request.routine,
            PendingInput::Char { request, .. } => request.routine,
        }
    }
}

/// The main Z-Machine interpreter
pub struct Interpreter {
    /// The VM state
    pub vm: VM,
    pub codec: TextCodec,
    pub(crate) config: InterpreterConfig,
    pub(crate) screen: Box<dyn Screen>,
    pub(crate) streams: OutputStreams,
    pub(crate) rng: ZRand,
    pub(crate) undo: VecDeque<Snapshot>,
    pub(crate) save_store: Box<dyn SaveStore>,
    pub(crate) pending: Option<PendingInput>,
    /// Font selected by `set_font`
    pub(crate) font: u16,
    quit: bool,
    instruction_count: u64,
}

impl Interpreter {
    /// Load a story image with a headless screen and in-memory save storage
    pub fn new(story: Vec<u8>, config: InterpreterConfig) -> ZResult<Self> {
        config.validate()?;
        let game = Game::from_memory(story, &config)?;
        let codec = TextCodec::new(&game.memory, &game.header);
        let vm = VM::new(game, &config)?;
        Ok(Interpreter {
            vm,
            codec,
            rng: ZRand::new(config.random_seed),
            config,
            screen: Box::new(HeadlessScreen::new()),
            streams: OutputStreams::new(),
            undo: VecDeque::new(),
            save_store: Box::new(MemorySaveStore::new()),
            pending: None,
            font: 1,
            quit: false,
            instruction_count: 0,
        })
    }

    pub fn with_screen(mut self, screen: Box<dyn Screen>) -> Self {
        self.screen = screen;
        self
    }

    pub fn with_save_store(mut self, store: Box<dyn SaveStore>) -> Self {
        self.save_store = store;
        self
    }

    pub fn version(&self) -> u8 {
        self.vm.profile.version
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn is_quit(&self) -> bool {
        self.quit
    }

    /// Instructions executed since load
    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Text printed to the screen since the last call
    pub fn take_output(&mut self) -> String {
        self.screen.take_output()
    }

    /// Short name of an object
    pub fn object_name(&self, obj: u16) -> ZResult<String> {
        match self.vm.object_name_addr(obj)? {
            Some(addr) => Ok(self.codec.decode_to_string(&self.vm.game.memory, addr)?.0),
            None => Ok(String::new()),
        }
    }

    /// Capture the complete state, resuming at the current pc
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.vm, self.vm.pc)
    }

    /// Replace the complete state; on failure nothing changes
    pub fn restore_snapshot(&mut self, snapshot: &Snapshot) -> ZResult<()> {
        self.apply_snapshot(snapshot)?;
        self.pending = None;
        self.quit = false;
        Ok(())
    }

    /// The current state as a Quetzal save file
    pub fn save_state(&self) -> Vec<u8> {
        self.snapshot()
            .to_quetzal(&self.vm.game.original_memory, self.version())
    }

    /// Load a Quetzal save file made by this story
    pub fn restore_state(&mut self, bytes: &[u8]) -> ZResult<()> {
        let snapshot =
            Snapshot::from_quetzal(bytes, &self.vm.game.original_memory, self.version())?;
        self.restore_snapshot(&snapshot)
    }

    /// Apply a snapshot, keeping the transcript and fixed-pitch bits and
    /// re-declaring interpreter capabilities over the restored header
    pub(crate) fn apply_snapshot(&mut self, snapshot: &Snapshot) -> ZResult<()> {
        let kept = self.vm.read_word(FLAGS2 as u32)? & (FLAGS2_TRANSCRIPT | FLAGS2_FIXED_PITCH);
        snapshot.apply(&mut self.vm)?;
        crate::header::declare_capabilities(&mut self.vm.game.memory, &self.config);
        let flags2 = self.vm.read_word(FLAGS2 as u32)?;
        self.vm.write_word(
            FLAGS2 as u32,
            (flags2 & !(FLAGS2_TRANSCRIPT | FLAGS2_FIXED_PITCH)) | kept,
        )
    }

    /// Run until the story quits, asks for input or exhausts the instruction budget
    pub fn run(&mut self) -> Result<RunState, ExecutionError> {
        if self.quit {
            return Ok(RunState::Quit);
        }
        if let Some(pending) = &self.pending {
            return Ok(pending.state());
        }

        let mut executed = 0u64;
        loop {
            if let Some(limit) = self.config.instruction_limit {
                if executed >= limit {
                    return Ok(RunState::InstructionLimit);
                }
            }
            executed += 1;
            match self.step()? {
                ExecutionResult::Continue => {}
                ExecutionResult::Quit => {
                    self.quit = true;
                    return Ok(RunState::Quit);
                }
                ExecutionResult::NeedLine(request) => return Ok(RunState::NeedLine(request)),
                ExecutionResult::NeedChar(request) => return Ok(RunState::NeedChar(request)),
                ExecutionResult::InterruptDone(value) => {
                    warn!("interrupt routine returned {} outside timed input", value);
                }
            }
        }
    }

    /// Execute one instruction
    pub fn step(&mut self) -> Result<ExecutionResult, ExecutionError> {
        let pc = self.vm.pc;
        let inst = Instruction::decode(&self.vm.game.memory, pc as usize, self.version())
            .map_err(|e| ExecutionError::new(pc, "(undecodable)", Vec::new(), e))?;
        trace!("{:05x}: {}", pc, inst);

        let operands = self
            .resolve_operands(&inst)
            .map_err(|e| ExecutionError::new(pc, inst.to_string(), inst.operands.clone(), e))?;
        self.vm.pc = inst.next_pc();
        self.instruction_count += 1;

        self.execute_instruction(&inst, &operands)
            .map_err(|e| ExecutionError::new(pc, inst.to_string(), operands, e))
    }

    fn resolve_operands(&mut self, inst: &Instruction) -> ZResult<Vec<u16>> {
        inst.operand_types
            .iter()
            .zip(&inst.operands)
            .map(|(kind, &raw)| match kind {
                OperandType::Variable => self.vm.read_variable(raw as u8),
                _ => Ok(raw),
            })
            .collect()
    }

    pub(crate) fn execute_instruction(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        if operands.len() < inst.info.min_operands {
            return Err(ZError::MissingOperand {
                name: inst.name(),
                expected: inst.info.min_operands,
                found: operands.len(),
            });
        }

        let name = inst.name();
        if Self::is_math_opcode(name) {
            self.execute_math_op(inst, operands)
        } else if Self::is_flow_opcode(name) {
            self.execute_flow_op(inst, operands)
        } else if Self::is_memory_opcode(name) {
            self.execute_memory_op(inst, operands)
        } else if Self::is_object_opcode(name) {
            self.execute_object_op(inst, operands)
        } else if Self::is_display_opcode(name) {
            self.execute_display_op(inst, operands)
        } else if Self::is_input_opcode(name) {
            self.execute_input_op(inst, operands)
        } else if Self::is_system_opcode(name) {
            self.execute_system_op(inst, operands)
        } else {
            Err(self.unknown_opcode(inst))
        }
    }

    pub(crate) fn unknown_opcode(&self, inst: &Instruction) -> ZError {
        ZError::UnknownOpcode {
            form: inst.table().label(),
            opcode: inst.opcode,
            version: self.version(),
        }
    }

    /// Write an instruction's result to its store variable
    pub(crate) fn store(&mut self, inst: &Instruction, value: u16) -> ZResult<()> {
        match inst.store_var {
            Some(var) => self.vm.write_variable(var, value),
            None => Ok(()),
        }
    }

    /// Take the instruction's branch when `condition` matches its polarity
    pub(crate) fn branch(&mut self, inst: &Instruction, condition: bool) -> ZResult<ExecutionResult> {
        match inst.branch {
            Some(branch) if branch.on_true == condition => match branch.target {
                BranchTarget::ReturnFalse => self.do_return(0),
                BranchTarget::ReturnTrue => self.do_return(1),
                BranchTarget::Address(addr) => {
                    self.vm.pc = addr;
                    Ok(ExecutionResult::Continue)
                }
            },
            _ => Ok(ExecutionResult::Continue),
        }
    }

    /// Return from the current routine, routing the value to the caller
    pub(crate) fn do_return(&mut self, value: u16) -> ZResult<ExecutionResult> {
        let frame = self.vm.return_from_routine()?;
        match frame.return_target {
            ReturnTarget::Store(var) => self.vm.write_variable(var, value)?,
            ReturnTarget::Discard => {}
            ReturnTarget::Interrupt => return Ok(ExecutionResult::InterruptDone(value)),
        }
        Ok(ExecutionResult::Continue)
    }

    /// Call a packed routine address; calling address 0 returns false at once
    pub(crate) fn do_call(
        &mut self,
        packed: u16,
        args: &[u16],
        target: ReturnTarget,
    ) -> ZResult<ExecutionResult> {
        if packed == 0 {
            if let ReturnTarget::Store(var) = target {
                self.vm.write_variable(var, 0)?;
            }
            return Ok(ExecutionResult::Continue);
        }
        let addr = self.vm.profile.unpack_routine(packed);
        self.vm.call_routine(addr, args, target)?;
        Ok(ExecutionResult::Continue)
    }

    /// Send ZSCII text to the selected output streams
    pub(crate) fn print_zscii(&mut self, codes: &[u16]) -> ZResult<()> {
        if self.streams.capture(&mut self.vm, codes)? {
            return Ok(());
        }
        let text = self.codec.zscii_to_string(codes);
        if text.is_empty() {
            return Ok(());
        }
        if self.streams.screen_enabled() {
            self.screen.print(&text)?;
        }
        if self.streams.transcript_enabled(&self.vm) {
            self.screen.transcript(&text)?;
        }
        Ok(())
    }

    pub(crate) fn print_str(&mut self, text: &str) -> ZResult<()> {
        let codes: Vec<u16> = text
            .chars()
            .map(|c| self.codec.char_to_zscii(c).unwrap_or(b'?' as u16))
            .collect();
        self.print_zscii(&codes)
    }

    /// Decode and print the Z-string at a byte address
    pub(crate) fn print_string_at(&mut self, addr: u32) -> ZResult<()> {
        let (codes, _) = self.codec.decode(&self.vm.game.memory, addr)?;
        self.print_zscii(&codes)
    }

    /// Build the V1-3 status line from globals 0-2 and hand it to the screen
    pub(crate) fn update_status_line(&mut self) -> ZResult<()> {
        if self.version() > 3 {
            return Ok(());
        }
        let location = self.vm.read_global(0x10)?;
        let status = StatusLine {
            location: self.object_name(location).unwrap_or_default(),
            first: self.vm.read_global(0x11)? as i16,
            second: self.vm.read_global(0x12)?,
            is_time: self.version() == 3 && self.vm.read_byte(FLAGS1 as u32)? & 0x02 != 0,
        };
        self.screen.show_status(&status)?;
        Ok(())
    }

    /// Answer a pending `read` and keep running
    pub fn provide_line(&mut self, line: &str) -> Result<RunState, ExecutionError> {
        let pc = self.vm.pc;
        match self.pending {
            Some(PendingInput::Line {
                text,
                parse,
                store_var,
                request,
            }) => {
                self.pending = None;
                self.complete_read(text, parse, store_var, request.max_len, line, ZSCII_NEWLINE)
                    .map_err(|e| ExecutionError::new(pc, "read", vec![text as u16, parse as u16], e))?;
                self.run()
            }
            _ => Err(ExecutionError::new(
                pc,
                "provide_line",
                Vec::new(),
                ZError::InvalidInput("no line input is pending".into()),
            )),
        }
    }

    /// Answer a pending `read_char` with a host character
    pub fn provide_char(&mut self, ch: char) -> Result<RunState, ExecutionError> {
        let code = self.codec.char_to_zscii(ch).unwrap_or(b'?' as u16);
        self.provide_key(code)
    }

    /// Answer a pending `read_char` with a raw ZSCII key code (cursor keys are 129-132)
    pub fn provide_key(&mut self, code: u16) -> Result<RunState, ExecutionError> {
        let pc = self.vm.pc;
        match self.pending {
            Some(PendingInput::Char { store_var, .. }) => {
                self.pending = None;
                if let Some(var) = store_var {
                    self.vm
                        .write_variable(var, code)
                        .map_err(|e| ExecutionError::new(pc, "read_char", vec![code], e))?;
                }
                self.run()
            }
            _ => Err(ExecutionError::new(
                pc,
                "provide_char",
                Vec::new(),
                ZError::InvalidInput("no character input is pending".into()),
            )),
        }
    }

    /// One timed-input period elapsed with no input: run the interrupt
    /// routine. A true result abandons the read.
    pub fn input_timeout(&mut self) -> Result<RunState, ExecutionError> {
        let pc = self.vm.pc;
        let Some(pending) = self.pending else {
            return Err(ExecutionError::new(
                pc,
                "input_timeout",
                Vec::new(),
                ZError::InvalidInput("no input is pending".into()),
            ));
        };
        let routine = pending.routine();
        if routine == 0 {
            return Ok(pending.state());
        }

        self.pending = None;
        let result = self.run_interrupt(routine);
        if self.quit {
            return Ok(RunState::Quit);
        }
        if result? == 0 {
            self.pending = Some(pending);
            return Ok(pending.state());
        }

        debug!("interrupt routine ended input");
        let finished = match pending {
            PendingInput::Line {
                text,
                parse,
                store_var,
                request,
            } => self.complete_read(text, parse, store_var, request.max_len, "", 0),
            PendingInput::Char { store_var, .. } => match store_var {
                Some(var) => self.vm.write_variable(var, 0),
                None => Ok(()),
            },
        };
        finished.map_err(|e| ExecutionError::new(pc, "input_timeout", Vec::new(), e))?;
        self.run()
    }

    /// Run an interrupt routine to completion inside the current read
    fn run_interrupt(&mut self, routine: u16) -> Result<u16, ExecutionError> {
        let pc = self.vm.pc;
        let depth = self.vm.call_stack.len();
        let stack_len = self.vm.stack.len();
        let addr = self.vm.profile.unpack_routine(routine);
        self.vm
            .call_routine(addr, &[], ReturnTarget::Interrupt)
            .map_err(|e| ExecutionError::new(pc, "interrupt", vec![routine], e))?;

        for _ in 0..self.config.timer_instruction_limit {
            match self.step()? {
                ExecutionResult::Continue => {}
                ExecutionResult::InterruptDone(value) => return Ok(value),
                ExecutionResult::Quit => {
                    self.quit = true;
                    return Ok(1);
                }
                ExecutionResult::NeedLine(_) | ExecutionResult::NeedChar(_) => {
                    self.pending = None;
                    return Err(ExecutionError::new(
                        self.vm.pc,
                        "interrupt",
                        vec![routine],
                        ZError::InvalidInput("interrupt routine asked for input".into()),
                    ));
                }
            }
        }

        warn!(
            "interrupt routine {:05x} exceeded {} instructions, abandoned",
            addr, self.config.timer_instruction_limit
        );
        self.vm.call_stack.truncate(depth);
        self.vm.stack.truncate(stack_len);
        self.vm.pc = pc;
        Ok(0)
    }

    /// Write typed text into a text buffer, tokenise it and store the terminator
    fn complete_read(
        &mut self,
        text: u32,
        parse: u32,
        store_var: Option<u8>,
        max_len: usize,
        line: &str,
        terminator: u16,
    ) -> ZResult<()> {
        let typed = line.trim_end_matches(['\n', '\r']);
        if self.streams.command_script_enabled() {
            self.screen.record_command(typed)?;
        }
        if self.streams.transcript_enabled(&self.vm) {
            self.screen.transcript(&format!("{typed}\n"))?;
        }

        let codes: Vec<u8> = typed
            .to_lowercase()
            .chars()
            .filter_map(|c| self.codec.char_to_zscii(c))
            .filter(|&c| c != ZSCII_NEWLINE && c <= 0xFF)
            .map(|c| c as u8)
            .take(max_len)
            .collect();
        debug!("read {:?}", String::from_utf8_lossy(&codes));

        if self.version() >= 5 {
            self.vm.write_byte(text + 1, codes.len() as u8)?;
            for (i, &c) in codes.iter().enumerate() {
                self.vm.write_byte(text + 2 + i as u32, c)?;
            }
        } else {
            for (i, &c) in codes.iter().enumerate() {
                self.vm.write_byte(text + 1 + i as u32, c)?;
            }
            self.vm.write_byte(text + 1 + codes.len() as u32, 0)?;
        }

        if parse != 0 {
            let dictionary = self.vm.game.header.dictionary as u32;
            tokenise(&mut self.vm, &self.codec, text, parse, dictionary, false)?;
        }
        if let Some(var) = store_var {
            self.vm.write_variable(var, terminator)?;
        }
        Ok(())
    }

    /// Reset to the story's initial state, as the `restart` opcode does
    pub fn restart(&mut self) -> ZResult<()> {
        self.vm.restart(&self.config)?;
        self.streams = OutputStreams::new();
        self.pending = None;
        self.quit = false;
        self.font = 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StoryBuilder;
    use test_log::test;

    fn interpreter(story: &StoryBuilder) -> Interpreter {
        Interpreter::new(story.build(), InterpreterConfig::seeded(1)).unwrap()
    }

    #[test]
    fn test_quit_stops_run() {
        let story = StoryBuilder::new(3);
        let mut zm = interpreter(&story);
        assert_eq!(zm.run().unwrap(), RunState::Quit);
        assert_eq!(zm.run().unwrap(), RunState::Quit);
        assert!(zm.is_quit());
    }

    #[test]
    fn test_print_and_quit() {
        let mut story = StoryBuilder::new(5);
        let mut code = vec![0xB2];
        code.extend(story.encode("Hello"));
        code.extend([0xBB, 0xBA]);
        story.main(&code);
        let mut zm = interpreter(&story);
        assert_eq!(zm.run().unwrap(), RunState::Quit);
        assert_eq!(zm.take_output(), "Hello\n");
    }

    #[test]
    fn test_instruction_limit_yields() {
        let mut story = StoryBuilder::new(5);
        // jump -> itself
        story.main(&[0x8C, 0xFF, 0xFF]);
        let config = InterpreterConfig {
            instruction_limit: Some(50),
            ..Default::default()
        };
        let mut zm = Interpreter::new(story.build(), config).unwrap();
        assert_eq!(zm.run().unwrap(), RunState::InstructionLimit);
        assert_eq!(zm.instruction_count(), 50);
    }

    #[test]
    fn test_fault_reports_pc_and_operands() {
        let mut story = StoryBuilder::new(5);
        // div 1 0 -> sp
        let main = story.main(&[0x17, 0x01, 0x00, 0x00]);
        let mut zm = interpreter(&story);
        let err = zm.run().unwrap_err();
        assert_eq!(err.source, ZError::DivisionByZero);
        assert_eq!(err.pc, main);
        assert_eq!(err.operands, vec![1, 0]);
    }

    #[test]
    fn test_line_input_round_trip() {
        let mut story = StoryBuilder::new(5);
        story.word("lamp");
        let text = story.table(&[20; 24]);
        let parse = story.table(&[4; 20]);
        let t = text.to_be_bytes();
        let p = parse.to_be_bytes();
        // aread text parse -> g00; quit
        story.main(&[0xE4, 0x0F, t[2], t[3], p[2], p[3], 0x10, 0xBA]);
        let mut zm = interpreter(&story);

        let request = match zm.run().unwrap() {
            RunState::NeedLine(request) => request,
            other => panic!("expected a line request, got {:?}", other),
        };
        assert_eq!(request.max_len, 20);
        assert_eq!(request.routine, 0);

        assert_eq!(zm.provide_line("Take LAMP").unwrap(), RunState::Quit);
        assert_eq!(zm.vm.read_byte(text + 1).unwrap(), 9);
        assert_eq!(zm.vm.read_byte(text + 2).unwrap(), b't');
        assert_eq!(zm.vm.read_byte(parse + 1).unwrap(), 2);
        assert_ne!(zm.vm.read_word(parse + 6).unwrap(), 0);
        assert_eq!(zm.vm.read_global(0x10).unwrap(), 13);
    }

    #[test]
    fn test_provide_without_request_is_error() {
        let story = StoryBuilder::new(5);
        let mut zm = interpreter(&story);
        let err = zm.provide_line("look").unwrap_err();
        assert!(matches!(err.source, ZError::InvalidInput(_)));
    }
}
