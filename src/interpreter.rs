use std::error::Error;
use std::fmt;

use log::{debug, info, warn};

use crate::host::{
    DebugListener, OutputSink, SaveRestore, StatusLine, TerminalCommand, TerminalListener,
    STREAM_COMMANDS, STREAM_SCREEN, STREAM_TRANSCRIPT,
};
use crate::instruction::{Instruction, InstructionForm, OperandCount, OperandType};
use crate::snapshot::Snapshot;
use crate::vm::VM;
use crate::zmath;

/// Deepest nesting of memory output streams
pub const MAX_STREAM3_DEPTH: usize = 16;

/// Result of executing an instruction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecutionResult {
    /// Continue execution normally
    Continue,
    /// Branch taken, PC already updated
    Branched,
    /// Routine called, PC updated
    Called,
    /// Routine returned
    Returned,
    /// Game should quit
    Quit,
    /// Suspended until the host supplies a line
    WaitForLine,
    /// Suspended until the host supplies a key
    WaitForChar,
}

/// What a call to `step` left the machine doing
#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    Running,
    WaitingForLine,
    WaitingForChar,
    Halted,
    Error(ExecutionError),
}

/// A fatal failure, with the instruction that caused it
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionError {
    pub pc: usize,
    pub opcode: String,
    pub message: String,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error at PC 0x{:05x} ({}): {}",
            self.pc, self.opcode, self.message
        )
    }
}

impl Error for ExecutionError {}

/// Operands of a read that is waiting for the host. `addr` is the read
/// instruction, kept for error reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingRead {
    Line {
        addr: usize,
        text_addr: usize,
        /// Text buffer size as read when the instruction ran
        text_max: u8,
        parse_addr: usize,
        store_var: Option<u8>,
    },
    Char {
        addr: usize,
        store_var: Option<u8>,
    },
}

/// A memory table receiving output stream 3
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Stream3Table {
    pub addr: usize,
    pub count: u16,
}

/// Which output streams are selected. The transcript lives in the flags 2
/// header bit so the story can toggle it directly.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutputStreams {
    pub screen: bool,
    pub commands: bool,
    pub tables: Vec<Stream3Table>,
}

impl OutputStreams {
    fn new() -> Self {
        OutputStreams {
            screen: true,
            commands: false,
            tables: Vec::new(),
        }
    }
}

/// Host interfaces installed at construction
pub struct Host {
    pub output: Box<dyn OutputSink>,
    pub status: Box<dyn StatusLine>,
    pub saves: Box<dyn SaveRestore>,
    pub terminal: Box<dyn TerminalListener>,
    pub debugger: Option<Box<dyn DebugListener>>,
}

/// The execution engine, driven one instruction at a time by `step`
pub struct Interpreter {
    /// The VM state
    pub vm: VM,
    pub(crate) host: Host,
    pub(crate) source_name: String,
    pub(crate) pending: Option<PendingRead>,
    pub(crate) streams: OutputStreams,
    halted: bool,
    instruction_count: u64,
}

impl Interpreter {
    pub(crate) fn new(vm: VM, host: Host, source_name: String) -> Self {
        Interpreter {
            vm,
            host,
            source_name,
            pending: None,
            streams: OutputStreams::new(),
            halted: false,
            instruction_count: 0,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn pc(&self) -> usize {
        self.vm.pc
    }

    pub fn frame_pointer(&self) -> usize {
        self.vm.stack.frame_pointer()
    }

    pub fn stack_depth(&self) -> usize {
        self.vm.stack.depth()
    }

    pub fn locals(&self) -> Vec<u16> {
        self.vm.stack.locals().to_vec()
    }

    pub fn globals(&self) -> Result<Vec<u16>, String> {
        self.vm.globals()
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn pending(&self) -> Option<PendingRead> {
        self.pending
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Execute one instruction, or report why none can run
    pub fn step(&mut self) -> StepStatus {
        if self.halted {
            return StepStatus::Halted;
        }
        match self.pending {
            Some(PendingRead::Line { .. }) => return StepStatus::WaitingForLine,
            Some(PendingRead::Char { .. }) => return StepStatus::WaitingForChar,
            None => {}
        }

        let pc = self.vm.pc;
        if let Err(message) = self.check_pc(pc) {
            return self.fail(pc, "?", message);
        }
        let inst = match self.vm.decode_instruction_at(pc) {
            Ok(inst) => inst,
            Err(message) => return self.fail(pc, "?", message),
        };
        self.vm.pc = inst.next_pc();
        self.instruction_count += 1;

        let version = self.vm.version();
        if let Some(debugger) = self.host.debugger.as_mut() {
            debugger.instruction(pc, &inst.format_with_version(version));
        }

        match self.execute_instruction(&inst) {
            Ok(ExecutionResult::Quit) => {
                info!("quit after {} instructions", self.instruction_count);
                self.halted = true;
                StepStatus::Halted
            }
            Ok(ExecutionResult::WaitForLine) => StepStatus::WaitingForLine,
            Ok(ExecutionResult::WaitForChar) => StepStatus::WaitingForChar,
            Ok(_) => StepStatus::Running,
            Err(message) => self.fail(pc, inst.name(version), message),
        }
    }

    /// Step until the machine stops running or `max_steps` have executed
    pub fn run(&mut self, max_steps: usize) -> StepStatus {
        let mut status = StepStatus::Running;
        for _ in 0..max_steps {
            status = self.step();
            if status != StepStatus::Running {
                break;
            }
        }
        status
    }

    fn fail(&mut self, pc: usize, opcode: &str, message: String) -> StepStatus {
        StepStatus::Error(self.halt_with(pc, opcode, message))
    }

    pub(crate) fn halt_with(&mut self, pc: usize, opcode: &str, message: String) -> ExecutionError {
        let error = ExecutionError {
            pc,
            opcode: opcode.to_string(),
            message,
        };
        warn!("{}", error);
        self.halted = true;
        error
    }

    fn check_pc(&self, pc: usize) -> Result<(), String> {
        if pc < self.vm.memory.high_base() {
            return Err(format!(
                "PC 0x{:05x} is below high memory at 0x{:05x}",
                pc,
                self.vm.memory.high_base()
            ));
        }
        if pc >= self.vm.header.len_file {
            return Err(format!(
                "PC 0x{:05x} is past the end of the story (0x{:05x})",
                pc, self.vm.header.len_file
            ));
        }
        Ok(())
    }

    pub fn execute_instruction(&mut self, inst: &Instruction) -> Result<ExecutionResult, String> {
        let operands = self.resolve_operands(inst)?;

        if inst.form == InstructionForm::Extended {
            return Err(format!(
                "Extended opcode 0x{:02x} is not implemented",
                inst.ext_opcode.unwrap_or(0)
            ));
        }

        let count = &inst.operand_count;
        if Interpreter::is_control_opcode(inst.opcode, count, self.vm.version()) {
            self.execute_control_op(inst, &operands)
        } else if Interpreter::is_math_opcode(inst.opcode, count, self.vm.version()) {
            self.execute_math_op(inst, &operands)
        } else if Interpreter::is_memory_opcode(inst.opcode, count) {
            self.execute_memory_op(inst, &operands)
        } else if Interpreter::is_stack_opcode(inst.opcode, count, self.vm.version()) {
            self.execute_stack_op(inst, &operands)
        } else if Interpreter::is_object_opcode(inst.opcode, count) {
            self.execute_object_op(inst, &operands)
        } else if Interpreter::is_display_opcode(inst.opcode, count) {
            self.execute_display_op(inst, &operands)
        } else if Interpreter::is_io_opcode(inst.opcode, count) {
            self.execute_io_op(inst, &operands)
        } else {
            Err(format!(
                "Unimplemented opcode {} ({:?} 0x{:02x})",
                inst.name(self.vm.version()),
                inst.operand_count,
                inst.opcode
            ))
        }
    }

    /// Resolve operand values; variable operands are read, popping for 0
    pub fn resolve_operands(&mut self, inst: &Instruction) -> Result<Vec<u16>, String> {
        let mut values = Vec::with_capacity(inst.operands.len());
        for (op_type, &operand) in inst.operand_types.iter().zip(&inst.operands) {
            let value = match op_type {
                OperandType::Variable => self.vm.read_variable(operand as u8)?,
                _ => operand,
            };
            values.push(value);
        }
        Ok(values)
    }

    /// Fail unless the story is at least `min` version
    pub(crate) fn require_version(&self, inst: &Instruction, min: u8) -> Result<(), String> {
        let version = self.vm.version();
        if version < min {
            return Err(format!(
                "{} is not available in version {}",
                inst.name(version),
                version
            ));
        }
        Ok(())
    }

    pub(crate) fn operand(operands: &[u16], i: usize) -> Result<u16, String> {
        operands
            .get(i)
            .copied()
            .ok_or_else(|| format!("Missing operand {}", i + 1))
    }

    pub(crate) fn store(&mut self, inst: &Instruction, value: u16) -> Result<(), String> {
        if let Some(var) = inst.store_var {
            self.vm.write_variable(var, value)?;
        }
        Ok(())
    }

    pub(crate) fn do_branch(
        &mut self,
        inst: &Instruction,
        condition: bool,
    ) -> Result<ExecutionResult, String> {
        let branch = match inst.branch {
            Some(b) => b,
            None => return Ok(ExecutionResult::Continue),
        };
        if condition != branch.on_true {
            return Ok(ExecutionResult::Continue);
        }
        match branch.offset {
            0 => self.do_return(0),
            1 => self.do_return(1),
            offset => {
                // relative to the address after the branch data
                let target = self.vm.pc as i64 + offset as i64 - 2;
                if target < 0 {
                    return Err(format!("Branch to negative address {target}"));
                }
                self.vm.pc = target as usize;
                Ok(ExecutionResult::Branched)
            }
        }
    }

    pub(crate) fn do_return(&mut self, value: u16) -> Result<ExecutionResult, String> {
        self.vm.return_routine(value)?;
        Ok(ExecutionResult::Returned)
    }

    pub(crate) fn do_call(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
        store: bool,
    ) -> Result<ExecutionResult, String> {
        let routine = Interpreter::operand(operands, 0)?;
        let store_var = if store { inst.store_var } else { None };
        let return_pc = self.vm.pc;
        if self
            .vm
            .call_routine(routine, &operands[1..], store_var, return_pc)?
        {
            Ok(ExecutionResult::Called)
        } else {
            Ok(ExecutionResult::Continue)
        }
    }

    fn is_control_opcode(opcode: u8, operand_count: &OperandCount, version: u8) -> bool {
        match operand_count {
            OperandCount::OP0 => matches!(
                opcode,
                0x00 | 0x01 | 0x04 | 0x05 | 0x06 | 0x07 | 0x08 | 0x0A | 0x0D | 0x0F
            ),
            OperandCount::OP1 => matches!(opcode, 0x00 | 0x0B | 0x0C),
            OperandCount::OP2 => matches!(opcode, 0x01 | 0x02 | 0x03 | 0x07),
            OperandCount::VAR => opcode == 0x1F && version >= 5,
        }
    }

    /// Branches, jumps, returns and the whole-machine opcodes
    fn execute_control_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> Result<ExecutionResult, String> {
        match (inst.opcode, &inst.operand_count) {
            // 0OP:0x00 - rtrue
            (0x00, OperandCount::OP0) => {
                debug!("rtrue");
                self.do_return(1)
            }
            // 0OP:0x01 - rfalse
            (0x01, OperandCount::OP0) => {
                debug!("rfalse");
                self.do_return(0)
            }
            // 0OP:0x04 - nop
            (0x04, OperandCount::OP0) => Ok(ExecutionResult::Continue),
            // 0OP:0x05 - save
            (0x05, OperandCount::OP0) => self.op_save(inst),
            // 0OP:0x06 - restore
            (0x06, OperandCount::OP0) => self.op_restore(inst),
            // 0OP:0x07 - restart
            (0x07, OperandCount::OP0) => {
                self.vm.restart()?;
                self.streams = OutputStreams::new();
                self.pending = None;
                Ok(ExecutionResult::Continue)
            }
            // 0OP:0x08 - ret_popped
            (0x08, OperandCount::OP0) => {
                let value = self.vm.stack.pop()?;
                debug!("ret_popped {}", value);
                self.do_return(value)
            }
            // 0OP:0x0A - quit
            (0x0A, OperandCount::OP0) => Ok(ExecutionResult::Quit),
            // 0OP:0x0D - verify
            (0x0D, OperandCount::OP0) => {
                self.require_version(inst, 3)?;
                let ok = self.vm.verify();
                debug!("verify -> {}", ok);
                self.do_branch(inst, ok)
            }
            // 0OP:0x0F - piracy
            (0x0F, OperandCount::OP0) => {
                self.require_version(inst, 5)?;
                self.do_branch(inst, true)
            }

            // 1OP:0x00 - jz
            (0x00, OperandCount::OP1) => {
                let a = Interpreter::operand(operands, 0)?;
                debug!("jz {}", a);
                self.do_branch(inst, a == 0)
            }
            // 1OP:0x0B - ret
            (0x0B, OperandCount::OP1) => {
                let value = Interpreter::operand(operands, 0)?;
                debug!("ret {}", value);
                self.do_return(value)
            }
            // 1OP:0x0C - jump
            (0x0C, OperandCount::OP1) => {
                let offset = zmath::to_signed(Interpreter::operand(operands, 0)?);
                let target = self.vm.pc as i64 + offset as i64 - 2;
                debug!("jump {:+} -> {:05x}", offset, target);
                if target < 0 {
                    return Err(format!("Jump to negative address {target}"));
                }
                self.vm.pc = target as usize;
                Ok(ExecutionResult::Branched)
            }

            // 2OP:0x01 - je a b c d: a equals any of the rest
            (0x01, OperandCount::OP2) => {
                let a = Interpreter::operand(operands, 0)?;
                if operands.len() < 2 {
                    return Err("je needs at least two operands".to_string());
                }
                let hit = operands[1..].contains(&a);
                debug!("je {} {:?} -> {}", a, &operands[1..], hit);
                self.do_branch(inst, hit)
            }
            // 2OP:0x02 - jl
            (0x02, OperandCount::OP2) => {
                let a = Interpreter::operand(operands, 0)?;
                let b = Interpreter::operand(operands, 1)?;
                debug!("jl {} {}", zmath::to_signed(a), zmath::to_signed(b));
                self.do_branch(inst, zmath::lt(a, b))
            }
            // 2OP:0x03 - jg
            (0x03, OperandCount::OP2) => {
                let a = Interpreter::operand(operands, 0)?;
                let b = Interpreter::operand(operands, 1)?;
                debug!("jg {} {}", zmath::to_signed(a), zmath::to_signed(b));
                self.do_branch(inst, zmath::gt(a, b))
            }
            // 2OP:0x07 - test bitmap flags
            (0x07, OperandCount::OP2) => {
                let bitmap = Interpreter::operand(operands, 0)?;
                let flags = Interpreter::operand(operands, 1)?;
                debug!("test {:04x} {:04x}", bitmap, flags);
                self.do_branch(inst, bitmap & flags == flags)
            }

            // VAR:0x1F - check_arg_count
            (0x1F, OperandCount::VAR) => Err("check_arg_count is not implemented".to_string()),

            _ => Err(format!(
                "Unhandled control opcode 0x{:02x} ({:?})",
                inst.opcode, inst.operand_count
            )),
        }
    }

    fn op_save(&mut self, inst: &Instruction) -> Result<ExecutionResult, String> {
        if self.vm.version() > 4 {
            return Err("0OP save is not valid from version 5".to_string());
        }
        let snapshot = Snapshot::capture(&self.vm, inst.addr, &self.source_name);
        let ok = match self.host.saves.save(&self.source_name, &snapshot) {
            Ok(()) => {
                info!("saved at 0x{:05x}", inst.addr);
                true
            }
            Err(e) => {
                warn!("save failed: {}", e);
                false
            }
        };
        self.report_success(inst, ok)
    }

    fn op_restore(&mut self, inst: &Instruction) -> Result<ExecutionResult, String> {
        if self.vm.version() > 4 {
            return Err("0OP restore is not valid from version 5".to_string());
        }
        let snapshot = match self.host.saves.restore(&self.source_name) {
            Ok(Some(s)) => s,
            Ok(None) => {
                info!("restore: no saved game");
                return self.report_success(inst, false);
            }
            Err(e) => {
                warn!("restore failed: {}", e);
                return self.report_success(inst, false);
            }
        };
        if snapshot.source_name != self.source_name {
            warn!(
                "restore: snapshot belongs to '{}', not '{}'",
                snapshot.source_name, self.source_name
            );
            return self.report_success(inst, false);
        }

        let save_inst = match self.vm.decode_instruction_at(snapshot.pc) {
            Ok(save_inst) => save_inst,
            Err(e) => {
                warn!(
                    "restore: snapshot PC 0x{:05x} does not decode: {}",
                    snapshot.pc, e
                );
                return self.report_success(inst, false);
            }
        };
        if save_inst.name(self.vm.version()) != "save" {
            warn!("restore: snapshot PC 0x{:05x} is not a save", snapshot.pc);
            return self.report_success(inst, false);
        }
        if let Err(e) = snapshot.apply(&mut self.vm) {
            warn!("restore: {}", e);
            return self.report_success(inst, false);
        }
        info!("restored to 0x{:05x}", snapshot.pc);

        // resume as the save instruction reporting success
        self.streams.tables.clear();
        self.vm.pc = save_inst.next_pc();
        self.report_success(&save_inst, true)
    }

    /// Branch (v1-3) or store 1/0 (v4) the outcome of save or restore
    fn report_success(&mut self, inst: &Instruction, ok: bool) -> Result<ExecutionResult, String> {
        if inst.branch.is_some() {
            self.do_branch(inst, ok)
        } else {
            self.store(inst, ok as u16)?;
            Ok(ExecutionResult::Continue)
        }
    }

    // ---- output ----

    /// Send text to every selected stream
    pub(crate) fn output_text(&mut self, text: &str) -> Result<(), String> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(table) = self.streams.tables.last_mut() {
            let mut addr = table.addr + 2 + table.count as usize;
            for c in text.chars() {
                let code = crate::text::unicode_to_zscii(c);
                self.vm.memory.write_byte(addr, code)?;
                addr += 1;
            }
            table.count = table.count.wrapping_add(text.chars().count() as u16);
            let (addr, count) = (table.addr, table.count);
            return self.vm.memory.write_word(addr, count);
        }

        if self.streams.screen {
            self.host.output.print(STREAM_SCREEN, text)?;
        }
        if self.vm.memory.is_transcripting()? {
            self.host.output.print(STREAM_TRANSCRIPT, text)?;
        }
        Ok(())
    }

    pub(crate) fn echo_command(&mut self, line: &str) -> Result<(), String> {
        if self.streams.commands {
            self.host
                .output
                .print(STREAM_COMMANDS, &format!("{line}\n"))?;
        }
        Ok(())
    }

    pub(crate) fn terminal(&mut self, command: TerminalCommand) -> Result<(), String> {
        debug!("terminal {:?}", command);
        self.host.terminal.command(command)?;
        Ok(())
    }

    /// Redraw the status line from globals 0x10-0x12 (versions 1-3)
    pub(crate) fn update_status_line(&mut self) -> Result<(), String> {
        if self.vm.version() > 3 {
            return Ok(());
        }
        let location = self.vm.read_global(0x10)?;
        let name = if location == 0 {
            String::new()
        } else {
            self.vm
                .objects
                .short_name(&self.vm.memory, &self.vm.codec, location)?
        };
        let score = zmath::to_signed(self.vm.read_global(0x11)?);
        let turns = self.vm.read_global(0x12)?;
        let shows_time = self.vm.memory.status_line_shows_time()?;
        self.host
            .status
            .show_status(&name, score, turns, shows_time)?;
        Ok(())
    }

    /// Number of memory streams currently open
    pub fn stream3_depth(&self) -> usize {
        self.streams.tables.len()
    }
}
