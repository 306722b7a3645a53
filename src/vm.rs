use crate::config::InterpreterConfig;
use crate::error::{ZError, ZResult};
use crate::header::{self, Header, FLAGS2, FLAGS2_FIXED_PITCH, FLAGS2_TRANSCRIPT};
use crate::version::VersionProfile;
use log::{debug, trace};

/// Maximum number of local variables per routine
pub const MAX_LOCALS: usize = 15;

/// What happens to a routine's return value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnTarget {
    /// Store into the caller's variable
    Store(u8),
    /// Drop it (`call_vn`, `call_2n`, `call_1n`)
    Discard,
    /// Hand it back to the host: the frame is a timed-input interrupt routine
    Interrupt,
}

/// Represents a call frame on the VM call stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    /// Return address (PC to return to)
    pub return_pc: u32,
    pub return_target: ReturnTarget,
    /// Number of local variables in this frame
    pub num_locals: u8,
    /// Local variable values
    pub locals: [u16; MAX_LOCALS],
    /// Arguments actually supplied by the caller
    pub arg_count: u8,
    /// Evaluation stack depth when this routine was called
    pub stack_base: usize,
}

impl CallFrame {
    /// The frame that owns the evaluation stack before any routine is called
    pub fn dummy() -> Self {
        CallFrame {
            return_pc: 0,
            return_target: ReturnTarget::Discard,
            num_locals: 0,
            locals: [0; MAX_LOCALS],
            arg_count: 0,
            stack_base: 0,
        }
    }
}

/// Represents a loaded game with owned memory
#[derive(Debug, Clone)]
pub struct Game {
    /// The live game memory
    pub memory: Vec<u8>,
    /// The parsed header
    pub header: Header,
    /// Untouched image, used by restart, verify and save compression
    pub original_memory: Vec<u8>,
}

impl Game {
    /// Create a new game from memory bytes
    pub fn from_memory(memory: Vec<u8>, config: &InterpreterConfig) -> ZResult<Self> {
        let header = Header::parse(&memory)?;
        if config.strict_checksum {
            header.verify_checksum(&memory)?;
        }
        header::log_summary(&header);

        let original_memory = memory.clone();
        let mut game = Game {
            memory,
            header,
            original_memory,
        };
        header::declare_capabilities(&mut game.memory, config);
        Ok(game)
    }

    pub fn static_base(&self) -> u32 {
        self.header.base_static_mem as u32
    }
}

/// The Z-Machine virtual machine state
#[derive(Debug, Clone)]
pub struct VM {
    /// The game being executed
    pub game: Game,
    pub profile: VersionProfile,
    /// Program counter - current instruction address
    pub pc: u32,
    /// Evaluation stack shared by all frames; each frame owns the part above its base
    pub stack: Vec<u16>,
    /// Call stack for routine invocations
    pub call_stack: Vec<CallFrame>,
    globals_addr: u32,
    stack_capacity: usize,
    max_call_depth: usize,
}

impl VM {
    /// Create a new VM instance with the given game
    pub fn new(game: Game, config: &InterpreterConfig) -> ZResult<Self> {
        let profile = game.header.profile;
        let globals_addr = game.header.global_variables as u32;
        let mut vm = VM {
            game,
            profile,
            pc: 0,
            stack: Vec::with_capacity(256),
            call_stack: Vec::new(),
            globals_addr,
            stack_capacity: config.stack_capacity,
            max_call_depth: config.max_call_depth,
        };
        vm.enter_main()?;
        Ok(vm)
    }

    fn enter_main(&mut self) -> ZResult<()> {
        self.stack.clear();
        self.call_stack.clear();
        let initial_pc = self.game.header.initial_pc;
        if self.profile.starts_with_main_routine() {
            let addr = self.profile.unpack_routine(initial_pc);
            self.call_routine(addr, &[], ReturnTarget::Discard)?;
        } else {
            self.call_stack.push(CallFrame::dummy());
            self.pc = initial_pc as u32;
        }
        Ok(())
    }

    /// Reload dynamic memory from the original image and start over.
    /// Transcript and fixed-pitch bits of flags2 survive.
    pub fn restart(&mut self, config: &InterpreterConfig) -> ZResult<()> {
        let kept = self.read_word(FLAGS2 as u32)? & (FLAGS2_TRANSCRIPT | FLAGS2_FIXED_PITCH);
        let dynamic = self.game.static_base() as usize;
        self.game.memory[..dynamic].copy_from_slice(&self.game.original_memory[..dynamic]);
        header::declare_capabilities(&mut self.game.memory, config);
        let flags2 = self.read_word(FLAGS2 as u32)?;
        self.write_word(FLAGS2 as u32, (flags2 & !(FLAGS2_TRANSCRIPT | FLAGS2_FIXED_PITCH)) | kept)?;
        self.enter_main()?;
        debug!("Restarted at {:05x}", self.pc);
        Ok(())
    }

    fn frame(&self) -> ZResult<&CallFrame> {
        self.call_stack.last().ok_or(ZError::StackUnderflow)
    }

    fn frame_mut(&mut self) -> ZResult<&mut CallFrame> {
        self.call_stack.last_mut().ok_or(ZError::StackUnderflow)
    }

    fn frame_base(&self) -> usize {
        self.call_stack.last().map_or(0, |f| f.stack_base)
    }

    /// Push a value onto the evaluation stack
    pub fn push(&mut self, value: u16) -> ZResult<()> {
        if self.stack.len() >= self.stack_capacity {
            return Err(ZError::StackOverflow {
                capacity: self.stack_capacity,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pop a value from the current frame's part of the evaluation stack
    pub fn pop(&mut self) -> ZResult<u16> {
        if self.stack.len() <= self.frame_base() {
            debug!(
                "Stack underflow at {:05x}, frame depth {}",
                self.pc,
                self.call_stack.len()
            );
            return Err(ZError::StackUnderflow);
        }
        self.stack.pop().ok_or(ZError::StackUnderflow)
    }

    /// Peek at the top of the stack without removing it
    pub fn peek(&self) -> ZResult<u16> {
        if self.stack.len() <= self.frame_base() {
            return Err(ZError::StackUnderflow);
        }
        self.stack.last().copied().ok_or(ZError::StackUnderflow)
    }

    /// Overwrite the top of the stack in place
    pub fn replace_top(&mut self, value: u16) -> ZResult<()> {
        let base = self.frame_base();
        let len = self.stack.len();
        match self.stack.last_mut() {
            Some(top) if len > base => {
                *top = value;
                Ok(())
            }
            _ => Err(ZError::StackUnderflow),
        }
    }

    /// Words on the evaluation stack owned by the current frame
    pub fn frame_stack_depth(&self) -> usize {
        self.stack.len().saturating_sub(self.frame_base())
    }

    fn check_addr(&self, addr: u32) -> ZResult<usize> {
        if (addr as usize) < self.game.memory.len() {
            Ok(addr as usize)
        } else {
            Err(ZError::OutOfBounds {
                addr,
                size: self.game.memory.len(),
            })
        }
    }

    /// Read a byte from memory
    pub fn read_byte(&self, addr: u32) -> ZResult<u8> {
        Ok(self.game.memory[self.check_addr(addr)?])
    }

    /// Read a word (2 bytes, big-endian) from memory
    pub fn read_word(&self, addr: u32) -> ZResult<u16> {
        let high = self.read_byte(addr)? as u16;
        let low = self.read_byte(addr.wrapping_add(1))? as u16;
        Ok((high << 8) | low)
    }

    /// Write a byte to memory (only in dynamic memory)
    pub fn write_byte(&mut self, addr: u32, value: u8) -> ZResult<()> {
        if addr >= self.game.static_base() {
            return Err(ZError::StaticWrite {
                addr,
                static_base: self.game.header.base_static_mem,
            });
        }
        let index = self.check_addr(addr)?;
        self.game.memory[index] = value;
        Ok(())
    }

    /// Write a word to memory (only in dynamic memory)
    pub fn write_word(&mut self, addr: u32, value: u16) -> ZResult<()> {
        // Check the second byte first so a rejected write leaves memory untouched
        if addr.wrapping_add(1) >= self.game.static_base() {
            return Err(ZError::StaticWrite {
                addr,
                static_base: self.game.header.base_static_mem,
            });
        }
        self.write_byte(addr, (value >> 8) as u8)?;
        self.write_byte(addr + 1, (value & 0xFF) as u8)
    }

    /// Read a global variable (0x10-0xFF)
    pub fn read_global(&self, var: u8) -> ZResult<u16> {
        let addr = self.globals_addr + (var.wrapping_sub(0x10) as u32) * 2;
        self.read_word(addr)
    }

    /// Write a global variable (0x10-0xFF)
    pub fn write_global(&mut self, var: u8, value: u16) -> ZResult<()> {
        let addr = self.globals_addr + (var.wrapping_sub(0x10) as u32) * 2;
        self.write_word(addr, value)
    }

    fn local_index(&self, var: u8) -> ZResult<usize> {
        let frame = self.frame()?;
        if var > frame.num_locals {
            return Err(ZError::InvalidLocal {
                var,
                num_locals: frame.num_locals,
            });
        }
        Ok((var - 1) as usize)
    }

    /// Read a variable (0x00 = pop stack, 0x01-0x0F = local, 0x10-0xFF = global)
    pub fn read_variable(&mut self, var: u8) -> ZResult<u16> {
        match var {
            0x00 => self.pop(),
            0x01..=0x0F => {
                let index = self.local_index(var)?;
                Ok(self.frame()?.locals[index])
            }
            _ => self.read_global(var),
        }
    }

    /// Write a variable (0x00 = push stack, 0x01-0x0F = local, 0x10-0xFF = global)
    pub fn write_variable(&mut self, var: u8, value: u16) -> ZResult<()> {
        trace!("V{:02x} <- {:04x}", var, value);
        match var {
            0x00 => self.push(value),
            0x01..=0x0F => {
                let index = self.local_index(var)?;
                self.frame_mut()?.locals[index] = value;
                Ok(())
            }
            _ => self.write_global(var, value),
        }
    }

    /// Read a variable named by an indirect operand: the stack is peeked, not popped
    pub fn read_variable_indirect(&mut self, var: u8) -> ZResult<u16> {
        if var == 0 {
            self.peek()
        } else {
            self.read_variable(var)
        }
    }

    /// Write a variable named by an indirect operand: the stack top is replaced, not pushed.
    /// An empty frame stack gets the value pushed instead.
    pub fn write_variable_indirect(&mut self, var: u8, value: u16) -> ZResult<()> {
        if var == 0 {
            if self.frame_stack_depth() == 0 {
                self.push(value)
            } else {
                self.replace_top(value)
            }
        } else {
            self.write_variable(var, value)
        }
    }

    /// Enter the routine at byte address `addr`.
    ///
    /// The caller must already have set `pc` to the return address. A zero
    /// address is handled by the caller since it involves no frame.
    pub fn call_routine(&mut self, addr: u32, args: &[u16], target: ReturnTarget) -> ZResult<()> {
        if self.call_stack.len() >= self.max_call_depth {
            return Err(ZError::CallDepthExceeded {
                limit: self.max_call_depth,
            });
        }
        let num_locals = self.read_byte(addr)?;
        if num_locals as usize > MAX_LOCALS {
            return Err(ZError::Decode {
                addr,
                reason: format!("routine declares {num_locals} locals"),
            });
        }

        let mut locals = [0u16; MAX_LOCALS];
        let mut body = addr + 1;
        if self.profile.routine_has_local_defaults() {
            for (i, local) in locals.iter_mut().enumerate().take(num_locals as usize) {
                *local = self.read_word(body + (i as u32) * 2)?;
            }
            body += num_locals as u32 * 2;
        }

        let supplied = args.len().min(num_locals as usize);
        locals[..supplied].copy_from_slice(&args[..supplied]);

        debug!(
            "call {:05x} args={:?} locals={} depth={}",
            addr,
            args,
            num_locals,
            self.call_stack.len()
        );
        self.call_stack.push(CallFrame {
            return_pc: self.pc,
            return_target: target,
            num_locals,
            locals,
            arg_count: args.len().min(7) as u8,
            stack_base: self.stack.len(),
        });
        self.pc = body;
        Ok(())
    }

    /// Leave the current routine, discarding its stack, and restore the caller's pc.
    /// Returns the frame that was removed so the caller can route the result.
    pub fn return_from_routine(&mut self) -> ZResult<CallFrame> {
        if self.call_stack.len() <= 1 {
            return Err(ZError::ReturnFromMain);
        }
        let frame = self.call_stack.pop().ok_or(ZError::ReturnFromMain)?;
        self.stack.truncate(frame.stack_base);
        self.pc = frame.return_pc;
        debug!("return to {:05x} depth={}", self.pc, self.call_stack.len());
        Ok(frame)
    }

    /// Whether argument `n` (1-based) was supplied by the caller of the current routine
    pub fn check_arg_count(&self, n: u16) -> ZResult<bool> {
        Ok(n >= 1 && n <= self.frame()?.arg_count as u16)
    }

    /// Token returned by `catch`: the current frame count
    pub fn catch_token(&self) -> u16 {
        self.call_stack.len() as u16
    }

    /// Unwind to the frame identified by a `catch` token, leaving it current
    pub fn unwind_to(&mut self, token: u16) -> ZResult<()> {
        let token = token as usize;
        if token == 0 || token > self.call_stack.len() {
            return Err(ZError::InvalidInput(format!(
                "throw to frame {token} with {} frames active",
                self.call_stack.len()
            )));
        }
        // The frame that called `catch` is returned from by the throw itself
        while self.call_stack.len() > token {
            self.return_from_routine()?;
        }
        Ok(())
    }

    /// Dynamic memory as it stands
    pub fn dynamic_memory(&self) -> &[u8] {
        &self.game.memory[..self.game.static_base() as usize]
    }
}
