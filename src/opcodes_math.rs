/// Arithmetic and bitwise opcodes
///
/// All arithmetic is signed 16-bit with wraparound. Division and remainder
/// round toward negative infinity and fail on a zero divisor.
use crate::instruction::{Instruction, OperandCount};
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::zmath;
use log::debug;

impl Interpreter {
    /// Handle mathematical and logical opcodes
    pub fn execute_math_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> Result<ExecutionResult, String> {
        let a = Interpreter::operand(operands, 0)?;

        let result = match (inst.opcode, &inst.operand_count) {
            // 1OP:0x0F - not (v1-4)
            (0x0F, OperandCount::OP1) => {
                debug!("not {:04x}", a);
                !a
            }
            // VAR:0x18 - not (v5+)
            (0x18, OperandCount::VAR) => {
                debug!("not {:04x}", a);
                !a
            }
            // VAR:0x07 - random
            (0x07, OperandCount::VAR) => {
                let range = zmath::to_signed(a);
                let value = self.vm.rand.random(range);
                debug!("random {} -> {}", range, value);
                value
            }
            (opcode, OperandCount::OP2) => {
                let b = Interpreter::operand(operands, 1)?;
                match opcode {
                    // 2OP:0x08 - or
                    0x08 => a | b,
                    // 2OP:0x09 - and
                    0x09 => a & b,
                    // 2OP:0x14 - add
                    0x14 => zmath::add(a, b),
                    // 2OP:0x15 - sub
                    0x15 => zmath::sub(a, b),
                    // 2OP:0x16 - mul
                    0x16 => zmath::mul(a, b),
                    // 2OP:0x17 - div
                    0x17 => zmath::div(a, b)?,
                    // 2OP:0x18 - mod
                    0x18 => zmath::rem(a, b)?,
                    _ => {
                        return Err(format!("Unhandled math opcode 2OP:0x{opcode:02x}"));
                    }
                }
            }
            _ => {
                return Err(format!(
                    "Unhandled math opcode 0x{:02x} ({:?})",
                    inst.opcode, inst.operand_count
                ))
            }
        };

        if inst.operand_count == OperandCount::OP2 {
            debug!(
                "{} {} {} -> {}",
                inst.name(self.vm.version()),
                zmath::to_signed(a),
                zmath::to_signed(operands[1]),
                zmath::to_signed(result)
            );
        }
        self.store(inst, result)?;
        Ok(ExecutionResult::Continue)
    }

    /// Check if an opcode is a math operation
    pub fn is_math_opcode(opcode: u8, operand_count: &OperandCount, version: u8) -> bool {
        match operand_count {
            OperandCount::OP1 => opcode == 0x0F && version <= 4,
            OperandCount::OP2 => matches!(opcode, 0x08 | 0x09 | 0x14..=0x18),
            OperandCount::VAR => opcode == 0x07 || (opcode == 0x18 && version >= 5),
            OperandCount::OP0 => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::StepStatus;
    use crate::test_utils::{TestStory, GLOBALS};
    use test_log::test;

    fn run(version: u8, code: &[u8]) -> (crate::interpreter::Interpreter, StepStatus) {
        let (mut interp, _) = TestStory::new(version).code(code).machine();
        let status = interp.run(100);
        (interp, status)
    }

    fn global(interp: &crate::interpreter::Interpreter, var: u8) -> u16 {
        interp.vm.read_global(var).unwrap()
    }

    #[test]
    fn test_signed_arithmetic_wraps() {
        // add #7fff #0001 -> g10 ; sub #0 #1 -> g11 (small constant 0) ; quit
        let code = [
            0xD4, 0x0F, 0x7F, 0xFF, 0x00, 0x01, 0x10, // add (var form, two large)
            0x15, 0x00, 0x01, 0x11, // sub #0 #1
            0xBA,
        ];
        let (interp, status) = run(3, &code);
        assert_eq!(status, StepStatus::Halted);
        assert_eq!(global(&interp, 0x10), 0x8000);
        assert_eq!(global(&interp, 0x11), 0xFFFF);
    }

    #[test]
    fn test_division_floors() {
        // div #-7 #2 -> g10 ; mod #-7 #2 -> g11 ; mul #300 #300 -> g12
        let code = [
            0xD7, 0x0F, 0xFF, 0xF9, 0x00, 0x02, 0x10,
            0xD8, 0x0F, 0xFF, 0xF9, 0x00, 0x02, 0x11,
            0xD6, 0x0F, 0x01, 0x2C, 0x01, 0x2C, 0x12,
            0xBA,
        ];
        let (interp, status) = run(3, &code);
        assert_eq!(status, StepStatus::Halted);
        assert_eq!(global(&interp, 0x10) as i16, -4);
        assert_eq!(global(&interp, 0x11) as i16, 1);
        assert_eq!(global(&interp, 0x12), (300u32 * 300 % 0x10000) as u16);
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        // div #5 #0 -> sp
        let (_, status) = run(3, &[0x17, 0x05, 0x00, 0x00]);
        match status {
            StepStatus::Error(e) => assert_eq!(e.opcode, "div"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_bitwise() {
        // or #0x0f #0xf0 -> g10 ; and #0x3c #0x0f -> g11 ; not g10 -> g12
        let code = [
            0x08, 0x0F, 0xF0, 0x10,
            0x09, 0x3C, 0x0F, 0x11,
            0xAF, 0x10, 0x12,
            0xBA,
        ];
        let (interp, _) = run(3, &code);
        assert_eq!(global(&interp, 0x10), 0xFF);
        assert_eq!(global(&interp, 0x11), 0x0C);
        assert_eq!(global(&interp, 0x12), 0xFF00);
        assert_eq!(interp.vm.memory.get_word(GLOBALS + 4).unwrap(), 0xFF00);
    }

    #[test]
    fn test_var_not_in_v5() {
        // not #0x00ff -> g10 (VAR:0x18)
        let (interp, _) = run(5, &[0xF8, 0x3F, 0x00, 0xFF, 0x10, 0xBA]);
        assert_eq!(global(&interp, 0x10), 0xFF00);
    }

    #[test]
    fn test_random_seeding_and_range() {
        let mut story = Vec::new();
        // random #-5 -> g10 ; random #6 -> g11 (x3) ; random #0 -> g12
        story.extend_from_slice(&[0xE7, 0x3F, 0xFF, 0xFB, 0x10]);
        for _ in 0..3 {
            story.extend_from_slice(&[0xE7, 0x7F, 0x06, 0x11]);
        }
        story.extend_from_slice(&[0xE7, 0x7F, 0x00, 0x12, 0xBA]);
        let (interp, status) = run(3, &story);
        assert_eq!(status, StepStatus::Halted);
        assert_eq!(global(&interp, 0x10), 0);
        let r = global(&interp, 0x11);
        assert!((1..=6).contains(&r), "random out of range: {r}");
        assert_eq!(global(&interp, 0x12), 0);
    }
}
