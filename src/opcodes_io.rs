/// Input and stream selection opcodes
///
/// `sread`/`aread` and `read_char` suspend the machine. The instruction is
/// fully decoded and the PC already advanced when they do, so the host's
/// `provide_line` or `provide_char` finishes the instruction and execution
/// resumes at the next one.
use crate::host::STREAM_TRANSCRIPT;
use crate::instruction::{Instruction, OperandCount};
use crate::interpreter::{
    ExecutionError, ExecutionResult, Interpreter, PendingRead, Stream3Table, MAX_STREAM3_DEPTH,
};
use crate::text::unicode_to_zscii;
use crate::zmath;
use log::{debug, info, warn};

/// Most words a parse buffer can describe
pub const MAX_PARSED_WORDS: usize = 59;

/// ZSCII code stored by `aread` for a line ended with return
const ZSCII_RETURN: u16 = 13;

impl Interpreter {
    /// Handle input and stream opcodes
    pub fn execute_io_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> Result<ExecutionResult, String> {
        match (inst.opcode, &inst.operand_count) {
            // VAR:0x04 - sread (v1-4) / aread (v5+)
            (0x04, OperandCount::VAR) => self.op_read(inst, operands),
            // VAR:0x16 - read_char
            (0x16, OperandCount::VAR) => {
                self.require_version(inst, 4)?;
                let device = Interpreter::operand(operands, 0)?;
                if device != 1 {
                    return Err(format!("read_char from unexpected device {device}"));
                }
                if operands.len() > 1 {
                    debug!("read_char: timed input ignored");
                }
                self.pending = Some(PendingRead::Char {
                    addr: inst.addr,
                    store_var: inst.store_var,
                });
                Ok(ExecutionResult::WaitForChar)
            }
            // VAR:0x1B - tokenise
            (0x1B, OperandCount::VAR) => {
                self.require_version(inst, 5)?;
                let text_addr = Interpreter::operand(operands, 0)? as usize;
                let parse_addr = Interpreter::operand(operands, 1)? as usize;
                if operands.get(2).copied().unwrap_or(0) != 0 {
                    return Err("tokenise with a custom dictionary is not supported".to_string());
                }
                let skip_unknown = operands.get(3).copied().unwrap_or(0) != 0;
                let len = self.vm.memory.get_byte(text_addr + 1)? as usize;
                let text: String = self
                    .vm
                    .memory
                    .read_bytes(text_addr + 2, len)?
                    .iter()
                    .map(|&b| b as char)
                    .collect();
                debug!("tokenise \"{}\"", text);
                self.tokenise_into(&text, parse_addr, skip_unknown)?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x13 - output_stream
            (0x13, OperandCount::VAR) => {
                self.require_version(inst, 3)?;
                let stream = zmath::to_signed(Interpreter::operand(operands, 0)?);
                self.select_stream(stream, operands.get(1).copied())?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x14 - input_stream
            (0x14, OperandCount::VAR) => {
                self.require_version(inst, 3)?;
                match Interpreter::operand(operands, 0)? {
                    0 => debug!("input_stream: keyboard"),
                    n => warn!("input_stream {} is not supported, keeping the keyboard", n),
                }
                Ok(ExecutionResult::Continue)
            }

            _ => Err(format!(
                "Unhandled I/O opcode 0x{:02x} ({:?})",
                inst.opcode, inst.operand_count
            )),
        }
    }

    fn op_read(&mut self, inst: &Instruction, operands: &[u16]) -> Result<ExecutionResult, String> {
        let version = self.vm.version();
        let text_addr = Interpreter::operand(operands, 0)? as usize;
        let parse_addr = if version >= 5 {
            operands.get(1).copied().unwrap_or(0) as usize
        } else {
            Interpreter::operand(operands, 1)? as usize
        };

        let text_max = self.vm.memory.get_byte(text_addr)?;
        if text_max < 3 {
            return Err(format!(
                "Text buffer at 0x{text_addr:04x} holds only {text_max} bytes"
            ));
        }
        if parse_addr != 0 && self.vm.memory.get_byte(parse_addr)? == 0 {
            return Err(format!("Parse buffer at 0x{parse_addr:04x} holds no words"));
        }
        if operands.len() > 2 {
            debug!("{}: timed input ignored", inst.name(version));
        }

        self.update_status_line()?;
        debug!(
            "{} text 0x{:04x} parse 0x{:04x}: waiting for input",
            inst.name(version),
            text_addr,
            parse_addr
        );
        self.pending = Some(PendingRead::Line {
            addr: inst.addr,
            text_addr,
            text_max,
            parse_addr,
            store_var: inst.store_var,
        });
        Ok(ExecutionResult::WaitForLine)
    }

    /// Complete a pending `sread`/`aread` with the player's line. With
    /// `echo` the line is also printed, as a terminal without local echo
    /// would need.
    pub fn provide_line(&mut self, line: &str, echo: bool) -> Result<(), ExecutionError> {
        let (addr, text_addr, text_max, parse_addr, store_var) = match self.pending {
            Some(PendingRead::Line {
                addr,
                text_addr,
                text_max,
                parse_addr,
                store_var,
            }) => (addr, text_addr, text_max, parse_addr, store_var),
            _ => {
                return Err(ExecutionError {
                    pc: self.vm.pc,
                    opcode: String::from("provide_line"),
                    message: String::from("No line input is pending"),
                })
            }
        };
        self.pending = None;

        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let result = self.store_line(line, echo, text_addr, text_max, parse_addr, store_var);
        result.map_err(|message| {
            let name = if self.vm.version() >= 5 { "aread" } else { "sread" };
            self.halt_with(addr, name, message)
        })
    }

    fn store_line(
        &mut self,
        line: &str,
        echo: bool,
        text_addr: usize,
        text_max: u8,
        parse_addr: usize,
        store_var: Option<u8>,
    ) -> Result<(), String> {
        let version = self.vm.version();
        let max = text_max as usize;
        let capacity = if version < 5 { max.saturating_sub(1) } else { max };

        let typed: String = line.to_lowercase().chars().take(capacity).collect();
        let zscii: Vec<u8> = typed.chars().map(unicode_to_zscii).collect();
        if version < 5 {
            self.vm.memory.write_bytes(text_addr + 1, &zscii)?;
            self.vm.memory.write_byte(text_addr + 1 + zscii.len(), 0)?;
        } else {
            self.vm.memory.write_byte(text_addr + 1, zscii.len() as u8)?;
            self.vm.memory.write_bytes(text_addr + 2, &zscii)?;
        }
        info!("read \"{}\"", typed);

        if echo {
            self.output_text(&format!("{line}\n"))?;
        } else if self.vm.memory.is_transcripting()? {
            self.host
                .output
                .print(STREAM_TRANSCRIPT, &format!("{line}\n"))?;
        }
        self.echo_command(line)?;

        if parse_addr != 0 {
            self.tokenise_into(&typed, parse_addr, false)?;
        }
        if version >= 5 {
            if let Some(var) = store_var {
                self.vm.write_variable(var, ZSCII_RETURN)?;
            }
        }
        Ok(())
    }

    /// Complete a pending `read_char` with one key
    pub fn provide_char(&mut self, c: char) -> Result<(), ExecutionError> {
        let (addr, store_var) = match self.pending {
            Some(PendingRead::Char { addr, store_var }) => (addr, store_var),
            _ => {
                return Err(ExecutionError {
                    pc: self.vm.pc,
                    opcode: String::from("provide_char"),
                    message: String::from("No character input is pending"),
                })
            }
        };
        self.pending = None;

        let code = unicode_to_zscii(c) as u16;
        debug!("read_char {:?} -> {}", c, code);
        if let Some(var) = store_var {
            self.vm
                .write_variable(var, code)
                .map_err(|message| self.halt_with(addr, "read_char", message))?;
        }
        Ok(())
    }

    /// Split `text` into words and describe them in the parse buffer
    fn tokenise_into(
        &mut self,
        text: &str,
        parse_addr: usize,
        skip_unknown: bool,
    ) -> Result<(), String> {
        let max = self.vm.memory.get_byte(parse_addr)? as usize;
        if max == 0 {
            return Err(format!("Parse buffer at 0x{parse_addr:04x} holds no words"));
        }
        let offset = if self.vm.version() < 5 { 1 } else { 2 };
        let tokens = self.vm.dictionary.tokenize(text);
        let count = tokens.len().min(max).min(MAX_PARSED_WORDS);
        if count < tokens.len() {
            warn!("parse buffer full: {} of {} words kept", count, tokens.len());
        }

        self.vm.memory.write_byte(parse_addr + 1, count as u8)?;
        for (i, token) in tokens.iter().take(count).enumerate() {
            let entry = parse_addr + 2 + i * 4;
            let word = self
                .vm
                .dictionary
                .lookup(&self.vm.memory, &self.vm.codec, &token.text)?;
            debug!("word {} \"{}\" -> 0x{:04x}", i, token.text, word);
            if skip_unknown && word == 0 {
                continue;
            }
            self.vm.memory.write_word(entry, word)?;
            self.vm
                .memory
                .write_byte(entry + 2, token.text.chars().count() as u8)?;
            self.vm
                .memory
                .write_byte(entry + 3, (token.start + offset) as u8)?;
        }
        Ok(())
    }

    fn select_stream(&mut self, stream: i16, table: Option<u16>) -> Result<(), String> {
        debug!("output_stream {} {:?}", stream, table);
        match stream {
            0 => {}
            1 => self.streams.screen = true,
            -1 => self.streams.screen = false,
            2 => self.vm.memory.set_transcripting(true)?,
            -2 => self.vm.memory.set_transcripting(false)?,
            3 => {
                let addr = table.ok_or_else(|| "output_stream 3 needs a table".to_string())?;
                if self.streams.tables.len() >= MAX_STREAM3_DEPTH {
                    return Err(format!(
                        "output_stream 3 nested more than {MAX_STREAM3_DEPTH} deep"
                    ));
                }
                self.vm.memory.write_word(addr as usize, 0)?;
                self.streams.tables.push(Stream3Table {
                    addr: addr as usize,
                    count: 0,
                });
            }
            -3 => {
                if self.streams.tables.pop().is_none() {
                    warn!("output_stream -3 with no table selected");
                }
            }
            4 => self.streams.commands = true,
            -4 => self.streams.commands = false,
            n => warn!("output_stream {} is not a stream", n),
        }
        Ok(())
    }

    /// Check if an opcode is an input or stream operation
    pub fn is_io_opcode(opcode: u8, operand_count: &OperandCount) -> bool {
        *operand_count == OperandCount::VAR && matches!(opcode, 0x04 | 0x13 | 0x14 | 0x16 | 0x1B)
    }
}
