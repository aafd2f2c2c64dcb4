/// Stack manipulation and routine call opcodes
use crate::instruction::{Instruction, OperandCount};
use crate::interpreter::{ExecutionResult, Interpreter};
use log::debug;

impl Interpreter {
    /// Handle stack and call opcodes
    pub fn execute_stack_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> Result<ExecutionResult, String> {
        match (inst.opcode, &inst.operand_count) {
            // 0OP:0x09 - pop (v1-4) / catch (v5+)
            (0x09, OperandCount::OP0) => {
                if self.vm.version() >= 5 {
                    return Err("catch is not implemented".to_string());
                }
                let value = self.vm.stack.pop()?;
                debug!("pop (discarded {})", value);
                Ok(ExecutionResult::Continue)
            }

            // VAR:0x08 - push
            (0x08, OperandCount::VAR) => {
                let value = Interpreter::operand(operands, 0)?;
                debug!("push {}", value);
                self.vm.stack.push(value)?;
                Ok(ExecutionResult::Continue)
            }
            // VAR:0x09 - pull
            (0x09, OperandCount::VAR) => {
                let var = Interpreter::operand(operands, 0)? as u8;
                let value = self.vm.stack.pop()?;
                debug!("pull -> var{:02x} = {}", var, value);
                self.vm.set_variable_in_place(var, value)?;
                Ok(ExecutionResult::Continue)
            }

            // VAR:0x00 - call / call_vs
            (0x00, OperandCount::VAR) => self.do_call(inst, operands, true),
            // 1OP:0x08 - call_1s
            (0x08, OperandCount::OP1) => {
                self.require_version(inst, 4)?;
                self.do_call(inst, operands, true)
            }
            // 1OP:0x0F - call_1n
            (0x0F, OperandCount::OP1) => {
                self.require_version(inst, 5)?;
                self.do_call(inst, operands, false)
            }
            // 2OP:0x19 - call_2s
            (0x19, OperandCount::OP2) => {
                self.require_version(inst, 4)?;
                self.do_call(inst, operands, true)
            }
            // 2OP:0x1A - call_2n
            (0x1A, OperandCount::OP2) => {
                self.require_version(inst, 5)?;
                self.do_call(inst, operands, false)
            }
            // VAR:0x0C - call_vs2
            (0x0C, OperandCount::VAR) => {
                self.require_version(inst, 4)?;
                self.do_call(inst, operands, true)
            }
            // VAR:0x19 - call_vn, VAR:0x1A - call_vn2
            (0x19, OperandCount::VAR) | (0x1A, OperandCount::VAR) => {
                self.require_version(inst, 5)?;
                self.do_call(inst, operands, false)
            }

            _ => Err(format!(
                "Unhandled stack opcode 0x{:02x} ({:?})",
                inst.opcode, inst.operand_count
            )),
        }
    }

    /// Check if an opcode is a stack or call operation
    pub fn is_stack_opcode(opcode: u8, operand_count: &OperandCount, version: u8) -> bool {
        match operand_count {
            OperandCount::OP0 => opcode == 0x09,
            OperandCount::OP1 => opcode == 0x08 || (opcode == 0x0F && version >= 5),
            OperandCount::OP2 => matches!(opcode, 0x19 | 0x1A),
            OperandCount::VAR => matches!(opcode, 0x00 | 0x08 | 0x09 | 0x0C | 0x19 | 0x1A),
        }
    }
}
