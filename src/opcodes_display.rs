/// Text output and window opcodes
///
/// Printing goes through `output_text`, which routes to the selected output
/// streams. Window opcodes are passed to the host as `TerminalCommand`s.
use crate::host::TerminalCommand;
use crate::instruction::{Instruction, OperandCount};
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::zmath;
use log::{debug, warn};

impl Interpreter {
    /// Handle display and output opcodes
    pub fn execute_display_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> Result<ExecutionResult, String> {
        match (inst.opcode, &inst.operand_count) {
            // 0OP:0x02 - print
            (0x02, OperandCount::OP0) => {
                let text = self.inline_text(inst)?;
                debug!("print \"{}\"", text);
                self.output_text(&text)?;
                Ok(ExecutionResult::Continue)
            }
            // 0OP:0x03 - print_ret
            (0x03, OperandCount::OP0) => {
                let text = self.inline_text(inst)?;
                debug!("print_ret \"{}\"", text);
                self.output_text(&text)?;
                self.output_text("\n")?;
                self.do_return(1)
            }
            // 0OP:0x0B - new_line
            (0x0B, OperandCount::OP0) => {
                self.output_text("\n")?;
                Ok(ExecutionResult::Continue)
            }
            // 0OP:0x0C - show_status
            (0x0C, OperandCount::OP0) => {
                self.update_status_line()?;
                Ok(ExecutionResult::Continue)
            }

            // 1OP:0x07 - print_addr
            (0x07, OperandCount::OP1) => {
                let addr = Interpreter::operand(operands, 0)? as usize;
                let text = self.decode_text(addr)?;
                debug!("print_addr {:04x} \"{}\"", addr, text);
                self.output_text(&text)?;
                Ok(ExecutionResult::Continue)
            }
            // 1OP:0x0D - print_paddr
            (0x0D, OperandCount::OP1) => {
                let packed = Interpreter::operand(operands, 0)?;
                let addr = self.vm.memory.unpack_string(packed);
                let text = self.decode_text(addr)?;
                debug!("print_paddr {:04x} \"{}\"", packed, text);
                self.output_text(&text)?;
                Ok(ExecutionResult::Continue)
            }

            // VAR:0x05 - print_char
            (0x05, OperandCount::VAR) => {
                let code = Interpreter::operand(operands, 0)?;
                if let Some(c) = self.vm.codec.zscii_to_unicode(code)? {
                    self.output_text(&c.to_string())?;
                }
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x06 - print_num
            (0x06, OperandCount::VAR) => {
                let n = zmath::to_signed(Interpreter::operand(operands, 0)?);
                self.output_text(&n.to_string())?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x0A - split_window
            (0x0A, OperandCount::VAR) => {
                self.require_version(inst, 3)?;
                let lines = Interpreter::operand(operands, 0)?;
                self.terminal(TerminalCommand::SplitWindow(lines))?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x0B - set_window
            (0x0B, OperandCount::VAR) => {
                self.require_version(inst, 3)?;
                let window = Interpreter::operand(operands, 0)?;
                self.terminal(TerminalCommand::SetWindow(window))?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x0D - erase_window
            (0x0D, OperandCount::VAR) => {
                self.require_version(inst, 4)?;
                let window = zmath::to_signed(Interpreter::operand(operands, 0)?);
                self.terminal(TerminalCommand::EraseWindow(window))?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x0F - set_cursor
            (0x0F, OperandCount::VAR) => {
                self.require_version(inst, 4)?;
                let line = Interpreter::operand(operands, 0)?;
                let column = Interpreter::operand(operands, 1)?;
                self.terminal(TerminalCommand::SetCursor { line, column })?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x11 - set_text_style
            (0x11, OperandCount::VAR) => {
                self.require_version(inst, 4)?;
                let style = Interpreter::operand(operands, 0)?;
                self.terminal(TerminalCommand::SetTextStyle(style))?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x12 - buffer_mode
            (0x12, OperandCount::VAR) => {
                self.require_version(inst, 4)?;
                let on = Interpreter::operand(operands, 0)? != 0;
                self.terminal(TerminalCommand::BufferMode(on))?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x15 - sound_effect
            (0x15, OperandCount::VAR) => {
                warn!("sound_effect {:?} ignored", operands);
                Ok(ExecutionResult::Continue)
            }

            _ => Err(format!(
                "Unhandled display opcode 0x{:02x} ({:?})",
                inst.opcode, inst.operand_count
            )),
        }
    }

    /// Decode the string at `addr`, carrying the shift lock in versions 1-2
    pub(crate) fn decode_text(&mut self, addr: usize) -> Result<String, String> {
        let (zs, lock) =
            self.vm
                .codec
                .decode_from(&self.vm.memory, addr, None, self.vm.alphabet)?;
        self.vm.alphabet = lock;
        Ok(zs.text)
    }

    fn inline_text(&mut self, inst: &Instruction) -> Result<String, String> {
        let addr = inst
            .text_addr
            .ok_or_else(|| "Print instruction has no inline text".to_string())?;
        self.decode_text(addr)
    }

    /// Check if an opcode is a display operation
    pub fn is_display_opcode(opcode: u8, operand_count: &OperandCount) -> bool {
        match operand_count {
            OperandCount::OP0 => matches!(opcode, 0x02 | 0x03 | 0x0B | 0x0C),
            OperandCount::OP1 => matches!(opcode, 0x07 | 0x0D),
            OperandCount::VAR => matches!(
                opcode,
                0x05 | 0x06 | 0x0A | 0x0B | 0x0D | 0x0F | 0x11 | 0x12 | 0x15
            ),
            OperandCount::OP2 => false,
        }
    }
}
