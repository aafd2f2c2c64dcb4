/// Memory and variable opcodes
///
/// `load`, `store`, `inc`, `dec`, `inc_chk`, `dec_chk` and `pull` name
/// their target by variable number. When that number is 0 the stack top is
/// read or replaced in place rather than popped or pushed.
use crate::instruction::{Instruction, OperandCount};
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::zmath;
use log::debug;

impl Interpreter {
    /// Handle memory access opcodes
    pub fn execute_memory_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> Result<ExecutionResult, String> {
        let a = Interpreter::operand(operands, 0)?;

        match (inst.opcode, &inst.operand_count) {
            // 1OP:0x05 - inc
            (0x05, OperandCount::OP1) => {
                let var = a as u8;
                let value = zmath::add(self.vm.peek_variable(var)?, 1);
                debug!("inc var{:02x} -> {}", var, value as i16);
                self.vm.set_variable_in_place(var, value)?;
                Ok(ExecutionResult::Continue)
            }
            // 1OP:0x06 - dec
            (0x06, OperandCount::OP1) => {
                let var = a as u8;
                let value = zmath::sub(self.vm.peek_variable(var)?, 1);
                debug!("dec var{:02x} -> {}", var, value as i16);
                self.vm.set_variable_in_place(var, value)?;
                Ok(ExecutionResult::Continue)
            }
            // 1OP:0x0E - load
            (0x0E, OperandCount::OP1) => {
                let value = self.vm.peek_variable(a as u8)?;
                debug!("load var{:02x} = {}", a, value);
                self.store(inst, value)?;
                Ok(ExecutionResult::Continue)
            }

            // 2OP:0x04 - dec_chk
            (0x04, OperandCount::OP2) => {
                let var = a as u8;
                let limit = Interpreter::operand(operands, 1)?;
                let value = zmath::sub(self.vm.peek_variable(var)?, 1);
                self.vm.set_variable_in_place(var, value)?;
                debug!("dec_chk var{:02x} -> {} < {}", var, value as i16, limit as i16);
                self.do_branch(inst, zmath::lt(value, limit))
            }
            // 2OP:0x05 - inc_chk
            (0x05, OperandCount::OP2) => {
                let var = a as u8;
                let limit = Interpreter::operand(operands, 1)?;
                let value = zmath::add(self.vm.peek_variable(var)?, 1);
                self.vm.set_variable_in_place(var, value)?;
                debug!("inc_chk var{:02x} -> {} > {}", var, value as i16, limit as i16);
                self.do_branch(inst, zmath::gt(value, limit))
            }
            // 2OP:0x0D - store
            (0x0D, OperandCount::OP2) => {
                let value = Interpreter::operand(operands, 1)?;
                debug!("store var{:02x} = {}", a, value);
                self.vm.set_variable_in_place(a as u8, value)?;
                Ok(ExecutionResult::Continue)
            }
            // 2OP:0x0F - loadw
            (0x0F, OperandCount::OP2) => {
                let addr = a as usize + 2 * Interpreter::operand(operands, 1)? as usize;
                let value = self.vm.memory.load_word(addr)?;
                debug!("loadw [{:04x}] = {:04x}", addr, value);
                self.store(inst, value)?;
                Ok(ExecutionResult::Continue)
            }
            // 2OP:0x10 - loadb
            (0x10, OperandCount::OP2) => {
                let addr = a as usize + Interpreter::operand(operands, 1)? as usize;
                let value = self.vm.memory.load_byte(addr)?;
                debug!("loadb [{:04x}] = {:02x}", addr, value);
                self.store(inst, value as u16)?;
                Ok(ExecutionResult::Continue)
            }

            // VAR:0x01 - storew
            (0x01, OperandCount::VAR) => {
                let addr = a as usize + 2 * Interpreter::operand(operands, 1)? as usize;
                let value = Interpreter::operand(operands, 2)?;
                debug!("storew [{:04x}] = {:04x}", addr, value);
                self.vm.memory.write_word(addr, value)?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x02 - storeb
            (0x02, OperandCount::VAR) => {
                let addr = a as usize + Interpreter::operand(operands, 1)? as usize;
                let value = Interpreter::operand(operands, 2)?;
                debug!("storeb [{:04x}] = {:02x}", addr, value as u8);
                self.vm.memory.write_byte(addr, value as u8)?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x17 - scan_table
            (0x17, OperandCount::VAR) => {
                self.require_version(inst, 4)?;
                let found = self.scan_table(operands)?;
                self.store(inst, found)?;
                self.do_branch(inst, found != 0)
            }
            // VAR:0x1D - copy_table
            (0x1D, OperandCount::VAR) => Err("copy_table is not implemented".to_string()),

            _ => Err(format!(
                "Unhandled memory opcode 0x{:02x} ({:?})",
                inst.opcode, inst.operand_count
            )),
        }
    }

    /// Address of the first table field equal to `x`, or 0
    fn scan_table(&self, operands: &[u16]) -> Result<u16, String> {
        let x = Interpreter::operand(operands, 0)?;
        let table = Interpreter::operand(operands, 1)? as usize;
        let len = Interpreter::operand(operands, 2)? as usize;
        let form = operands.get(3).copied().unwrap_or(0x82);
        let words = form & 0x80 != 0;
        let stride = (form & 0x7F) as usize;
        if stride == 0 {
            return Err("scan_table entry length is 0".to_string());
        }

        for i in 0..len {
            let addr = table + i * stride;
            let field = if words {
                self.vm.memory.load_word(addr)?
            } else {
                self.vm.memory.load_byte(addr)? as u16
            };
            if field == x {
                debug!("scan_table found {:04x} at {:04x}", x, addr);
                return Ok(addr as u16);
            }
        }
        debug!("scan_table: {:04x} not found", x);
        Ok(0)
    }

    /// Check if an opcode is a memory operation
    pub fn is_memory_opcode(opcode: u8, operand_count: &OperandCount) -> bool {
        match operand_count {
            OperandCount::OP1 => matches!(opcode, 0x05 | 0x06 | 0x0E),
            OperandCount::OP2 => matches!(opcode, 0x04 | 0x05 | 0x0D | 0x0F | 0x10),
            OperandCount::VAR => matches!(opcode, 0x01 | 0x02 | 0x17 | 0x1D),
            OperandCount::OP0 => false,
        }
    }
}
