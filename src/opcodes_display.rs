//! Text output and screen opcodes
//!
//! Printing goes through the output streams; window, cursor, style and
//! colour operations are forwarded to the host [`Screen`](crate::Screen).
//! Version 6 picture, mouse and window-property opcodes report that the
//! feature is absent.

use crate::error::ZResult;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::text::ZSCII_NEWLINE;
use log::debug;

impl Interpreter {
    /// Handle display and output opcodes
    pub fn execute_display_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        let arg = |i: usize| operands.get(i).copied().unwrap_or(0);
        match inst.name() {
            "print" | "print_ret" => {
                if let Some(addr) = inst.text_addr {
                    self.print_string_at(addr)?;
                }
                if inst.name() == "print_ret" {
                    self.print_zscii(&[ZSCII_NEWLINE])?;
                    return self.do_return(1);
                }
            }
            "new_line" => self.print_zscii(&[ZSCII_NEWLINE])?,
            "print_addr" => self.print_string_at(arg(0) as u32)?,
            "print_paddr" => {
                let addr = self.vm.profile.unpack_string(arg(0));
                self.print_string_at(addr)?;
            }
            "print_char" => self.print_zscii(&[arg(0)])?,
            "print_num" => self.print_str(&(arg(0) as i16).to_string())?,
            "print_unicode" => self.print_unicode(arg(0))?,
            "check_unicode" => {
                let support = self.codec.unicode_support(arg(0));
                self.store(inst, support)?;
            }
            "print_table" => {
                let height = if operands.len() > 2 { arg(2) } else { 1 };
                self.print_table(arg(0) as u32, arg(1), height, arg(3))?;
            }

            "show_status" => self.update_status_line()?,
            "split_window" => self.screen.split_window(arg(0))?,
            "set_window" => self.screen.set_window(arg(0))?,
            "erase_window" => self.screen.erase_window(arg(0) as i16)?,
            "erase_line" => {
                if arg(0) == 1 {
                    self.screen.erase_line()?;
                }
            }
            "set_cursor" => self.screen.set_cursor(arg(0), arg(1))?,
            "get_cursor" => {
                let (line, column) = self.screen.get_cursor()?;
                let array = arg(0) as u32;
                self.vm.write_word(array, line)?;
                self.vm.write_word(array + 2, column)?;
            }
            "set_text_style" => self.screen.set_text_style(arg(0))?,
            "buffer_mode" => self.screen.set_buffer_mode(arg(0) != 0)?,
            "set_colour" => self.screen.set_colour(arg(0), arg(1))?,
            "set_true_colour" => debug!("set_true_colour {:04x} {:04x} ignored", arg(0), arg(1)),
            "set_font" => {
                let previous = self.select_font(arg(0));
                self.store(inst, previous)?;
            }
            "output_stream" => {
                let table = operands.get(1).map(|&t| t as u32);
                self.streams.select(&mut self.vm, arg(0) as i16, table)?;
            }
            "sound_effect" => {
                let number = if operands.is_empty() { 1 } else { arg(0) };
                self.screen.sound_effect(number, arg(1), arg(2))?;
            }

            // Version 6 graphics, mouse and menus: not available
            "picture_data" | "make_menu" => return self.branch(inst, false),
            "get_wind_prop" => self.store(inst, 0)?,
            "read_mouse" => {
                let array = arg(0) as u32;
                for i in 0..4 {
                    self.vm.write_word(array + i * 2, 0)?;
                }
            }
            "draw_picture" | "erase_picture" | "set_margins" | "move_window" | "window_size"
            | "window_style" | "scroll_window" | "mouse_window" | "put_wind_prop"
            | "print_form" | "picture_table" => {
                debug!("{} ignored: no graphics support", inst.name());
            }

            _ => return Err(self.unknown_opcode(inst)),
        }
        Ok(ExecutionResult::Continue)
    }

    /// `set_font`: returns the previous font, or 0 if the request is unavailable
    fn select_font(&mut self, font: u16) -> u16 {
        if font == 0 {
            return self.font;
        }
        if !self.screen.font_available(font) {
            return 0;
        }
        std::mem::replace(&mut self.font, font)
    }

    fn print_unicode(&mut self, code: u16) -> ZResult<()> {
        let ch = char::from_u32(code as u32).unwrap_or('?');
        match self.codec.char_to_zscii(ch) {
            Some(zscii) => self.print_zscii(&[zscii]),
            // Not representable in ZSCII: only the screen can show it
            None if self.streams.memory_depth() == 0 => {
                if self.streams.screen_enabled() {
                    self.screen.print(&ch.to_string())?;
                }
                Ok(())
            }
            None => self.print_zscii(&[b'?' as u16]),
        }
    }

    /// Print a rectangle of ZSCII text, `skip` bytes between rows
    fn print_table(&mut self, addr: u32, width: u16, height: u16, skip: u16) -> ZResult<()> {
        let mut row = addr;
        for line in 0..height {
            if line > 0 {
                self.print_zscii(&[ZSCII_NEWLINE])?;
            }
            let codes = (0..width as u32)
                .map(|i| self.vm.read_byte(row + i).map(u16::from))
                .collect::<ZResult<Vec<u16>>>()?;
            self.print_zscii(&codes)?;
            row += width as u32 + skip as u32;
        }
        Ok(())
    }

    /// Check if an opcode is a display operation
    pub fn is_display_opcode(name: &str) -> bool {
        matches!(
            name,
            "print"
                | "print_ret"
                | "new_line"
                | "print_addr"
                | "print_paddr"
                | "print_char"
                | "print_num"
                | "print_unicode"
                | "check_unicode"
                | "print_table"
                | "show_status"
                | "split_window"
                | "set_window"
                | "erase_window"
                | "erase_line"
                | "set_cursor"
                | "get_cursor"
                | "set_text_style"
                | "buffer_mode"
                | "set_colour"
                | "set_true_colour"
                | "set_font"
                | "output_stream"
                | "sound_effect"
                | "picture_data"
                | "make_menu"
                | "get_wind_prop"
                | "read_mouse"
                | "draw_picture"
                | "erase_picture"
                | "set_margins"
                | "move_window"
                | "window_size"
                | "window_style"
                | "scroll_window"
                | "mouse_window"
                | "put_wind_prop"
                | "print_form"
                | "picture_table"
        )
    }
}
