use crate::memory::MemoryImage;
use crate::opcode_tables;
use crate::zmath::signed_14;
use std::fmt::{Display, Error, Formatter, Write};

/// Operand types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperandType {
    /// Large constant (2 bytes)
    LargeConstant,
    /// Small constant (1 byte)
    SmallConstant,
    /// Variable number
    Variable,
    /// Omitted (not present)
    Omitted,
}

impl OperandType {
    /// Parse operand type from 2-bit value
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => OperandType::LargeConstant,
            0b01 => OperandType::SmallConstant,
            0b10 => OperandType::Variable,
            _ => OperandType::Omitted,
        }
    }

    /// Get the size in bytes for this operand type
    pub fn size(&self) -> usize {
        match self {
            OperandType::LargeConstant => 2,
            OperandType::SmallConstant => 1,
            OperandType::Variable => 1,
            OperandType::Omitted => 0,
        }
    }
}

/// Instruction forms
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstructionForm {
    Long,
    Short,
    Extended,
    Variable,
}

/// Operand count categories
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperandCount {
    /// 0 operands
    OP0,
    /// 1 operand
    OP1,
    /// 2 operands
    OP2,
    /// Variable number of operands (0-8)
    VAR,
}

/// Branch information
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchInfo {
    /// True if branch on true, false if branch on false
    pub on_true: bool,
    /// Branch offset (0-1 = return false/true, otherwise a jump)
    pub offset: i16,
}

/// A decoded Z-Machine instruction
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Address of the first opcode byte
    pub addr: usize,
    /// The opcode number within its operand count
    pub opcode: u8,
    /// Extended opcode for EXT instructions
    pub ext_opcode: Option<u8>,
    /// The instruction form
    pub form: InstructionForm,
    /// Operand count category
    pub operand_count: OperandCount,
    /// Operand types (up to 8)
    pub operand_types: Vec<OperandType>,
    /// Raw operand values; variables are not yet resolved
    pub operands: Vec<u16>,
    /// Variable to store result (if applicable)
    pub store_var: Option<u8>,
    /// Branch information (if applicable)
    pub branch: Option<BranchInfo>,
    /// Address of the inline string for print opcodes
    pub text_addr: Option<usize>,
    /// Total size of instruction in bytes
    pub size: usize,
}

impl Instruction {
    /// Decode an instruction from memory at the given address
    pub fn decode(memory: &MemoryImage, addr: usize, version: u8) -> Result<Self, String> {
        let byte = |at: usize| -> Result<u8, String> {
            memory
                .get_byte(at)
                .map_err(|_| format!("Instruction at 0x{addr:05x} runs past the end of memory"))
        };

        let mut offset = addr;
        let opcode_byte = byte(offset)?;
        offset += 1;

        // Determine instruction form based on top 2 bits
        let form = match opcode_byte >> 6 {
            0b11 => InstructionForm::Variable,
            0b10 if opcode_byte == 0xBE && version >= 5 => InstructionForm::Extended,
            0b10 => InstructionForm::Short,
            _ => InstructionForm::Long,
        };

        // Get the actual opcode and operand count
        let (opcode, ext_opcode, operand_count) = match form {
            InstructionForm::Long => (opcode_byte & 0x1F, None, OperandCount::OP2),
            InstructionForm::Short => {
                let op_count = if (opcode_byte >> 4) & 0x03 == 0x03 {
                    OperandCount::OP0
                } else {
                    OperandCount::OP1
                };
                (opcode_byte & 0x0F, None, op_count)
            }
            InstructionForm::Variable => {
                // bit 5 clear: a 2OP opcode in variable form
                let op_count = if opcode_byte & 0x20 == 0 {
                    OperandCount::OP2
                } else {
                    OperandCount::VAR
                };
                (opcode_byte & 0x1F, None, op_count)
            }
            InstructionForm::Extended => {
                let ext_op = byte(offset)?;
                offset += 1;
                (opcode_byte, Some(ext_op), OperandCount::VAR)
            }
        };

        // Decode operand types
        let mut operand_types = Vec::new();
        match form {
            InstructionForm::Long => {
                for mask in [0x40, 0x20] {
                    operand_types.push(if opcode_byte & mask != 0 {
                        OperandType::Variable
                    } else {
                        OperandType::SmallConstant
                    });
                }
            }
            InstructionForm::Short => {
                let op_type = OperandType::from_bits(opcode_byte >> 4);
                if op_type != OperandType::Omitted {
                    operand_types.push(op_type);
                }
            }
            InstructionForm::Variable | InstructionForm::Extended => {
                let mut type_bytes = vec![byte(offset)?];
                offset += 1;
                if opcode_tables::has_double_type_byte(opcode, operand_count)
                    && form == InstructionForm::Variable
                {
                    type_bytes.push(byte(offset)?);
                    offset += 1;
                }

                'types: for type_byte in type_bytes {
                    for i in 0..4 {
                        let op_type = OperandType::from_bits(type_byte >> (6 - i * 2));
                        if op_type == OperandType::Omitted {
                            break 'types;
                        }
                        operand_types.push(op_type);
                    }
                }
            }
        }

        // Read operand values
        let mut operands = Vec::with_capacity(operand_types.len());
        for op_type in &operand_types {
            match op_type {
                OperandType::LargeConstant => {
                    let value = ((byte(offset)? as u16) << 8) | byte(offset + 1)? as u16;
                    operands.push(value);
                }
                OperandType::SmallConstant | OperandType::Variable => {
                    operands.push(byte(offset)? as u16);
                }
                OperandType::Omitted => break,
            }
            offset += op_type.size();
        }

        let store_var =
            if opcode_tables::stores_result(opcode, ext_opcode, form, operand_count, version) {
                let var = byte(offset)?;
                offset += 1;
                Some(var)
            } else {
                None
            };

        let branch = if opcode_tables::has_branch(opcode, ext_opcode, form, operand_count, version)
        {
            let first_byte = byte(offset)?;
            offset += 1;

            let on_true = (first_byte & 0x80) != 0;
            let offset_val = if (first_byte & 0x40) != 0 {
                // one byte: 6-bit unsigned
                (first_byte & 0x3F) as i16
            } else {
                let second_byte = byte(offset)?;
                offset += 1;
                signed_14((((first_byte & 0x3F) as u16) << 8) | second_byte as u16)
            };

            Some(BranchInfo {
                on_true,
                offset: offset_val,
            })
        } else {
            None
        };

        // Inline text runs until a word with the top bit set
        let text_addr = if opcode_tables::has_text(opcode, ext_opcode, form, operand_count, version)
        {
            let start = offset;
            loop {
                let hi = byte(offset)?;
                byte(offset + 1)?;
                offset += 2;
                if hi & 0x80 != 0 {
                    break;
                }
            }
            Some(start)
        } else {
            None
        };

        Ok(Instruction {
            addr,
            opcode,
            ext_opcode,
            form,
            operand_count,
            operand_types,
            operands,
            store_var,
            branch,
            text_addr,
            size: offset - addr,
        })
    }

    /// Address of the following instruction
    pub fn next_pc(&self) -> usize {
        self.addr + self.size
    }

    /// Get a human-readable name for the instruction
    pub fn name(&self, version: u8) -> &'static str {
        opcode_tables::get_instruction_name(
            self.opcode,
            self.ext_opcode,
            self.form,
            self.operand_count,
            version,
        )
    }

    /// Format the instruction with proper version information
    pub fn format_with_version(&self, version: u8) -> String {
        let mut result = format!("{:05x}: {}", self.addr, self.name(version));
        // writing into a String cannot fail
        let _ = self.write_operands(&mut result);
        result
    }

    fn write_operands<W: Write>(&self, out: &mut W) -> Result<(), Error> {
        for (i, op) in self.operands.iter().enumerate() {
            write!(out, "{}", if i == 0 { " " } else { ", " })?;
            match self.operand_types[i] {
                OperandType::Variable if *op == 0 => write!(out, "sp")?,
                OperandType::Variable if *op < 0x10 => write!(out, "L{:02x}", op - 1)?,
                OperandType::Variable => write!(out, "G{:02x}", op - 0x10)?,
                _ => write!(out, "#{op:04x}")?,
            }
        }

        if let Some(var) = self.store_var {
            write!(out, " -> V{var:02x}")?;
        }

        if let Some(branch) = self.branch {
            write!(out, " [{}", if branch.on_true { "TRUE" } else { "FALSE" })?;
            match branch.offset {
                0 => write!(out, " RFALSE]")?,
                1 => write!(out, " RTRUE]")?,
                n => write!(out, " {n:+}]")?,
            }
        }

        if let Some(addr) = self.text_addr {
            write!(out, " \"@{addr:05x}\"")?;
        }
        Ok(())
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "{:05x}: {:?} {:?} #{:02x}",
            self.addr, self.form, self.operand_count, self.opcode
        )?;
        self.write_operands(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn memory(version: u8, code: &[u8]) -> MemoryImage {
        let mut bytes = vec![0u8; 0x200];
        bytes[0] = version;
        bytes[0x0E] = 0x01;
        bytes[0x100..0x100 + code.len()].copy_from_slice(code);
        MemoryImage::new(bytes).unwrap()
    }

    #[test]
    fn test_operand_type_from_bits() {
        assert_eq!(OperandType::from_bits(0b00), OperandType::LargeConstant);
        assert_eq!(OperandType::from_bits(0b01), OperandType::SmallConstant);
        assert_eq!(OperandType::from_bits(0b10), OperandType::Variable);
        assert_eq!(OperandType::from_bits(0b11), OperandType::Omitted);
    }

    #[test]
    fn test_decode_long_form() {
        // je #34 #78 ?~rfalse
        let mem = memory(3, &[0x01, 0x34, 0x78, 0x00]);
        let inst = Instruction::decode(&mem, 0x100, 3).unwrap();
        assert_eq!(inst.form, InstructionForm::Long);
        assert_eq!(inst.opcode, 0x01);
        assert_eq!(inst.operands, vec![0x34, 0x78]);
        assert_eq!(
            inst.branch,
            Some(BranchInfo {
                on_true: false,
                offset: 0
            })
        );
        assert_eq!(inst.size, 5);
    }

    #[test]
    fn test_long_form_variable_operands() {
        // add L00 G00 -> sp
        let mem = memory(3, &[0x74, 0x01, 0x10, 0x00]);
        let inst = Instruction::decode(&mem, 0x100, 3).unwrap();
        assert_eq!(
            inst.operand_types,
            vec![OperandType::Variable, OperandType::Variable]
        );
        assert_eq!(inst.store_var, Some(0));
        assert_eq!(inst.size, 4);
        assert_eq!(inst.format_with_version(3), "00100: add L00, G00 -> V00");
    }

    #[test]
    fn test_decode_short_form() {
        // jump #34
        let mem = memory(3, &[0x9C, 0x34]);
        let inst = Instruction::decode(&mem, 0x100, 3).unwrap();
        assert_eq!(inst.form, InstructionForm::Short);
        assert_eq!(inst.opcode, 0x0C);
        assert_eq!(inst.operands, vec![0x34]);
        assert_eq!(inst.size, 2);
    }

    #[test]
    fn test_decode_variable_form() {
        // call #1234 L00 L01 L02 -> sp
        let mem = memory(
            3,
            &[0xE0, 0x2A, 0x12, 0x34, 0x01, 0x02, 0x03, 0x00],
        );
        let inst = Instruction::decode(&mem, 0x100, 3).unwrap();
        assert_eq!(inst.form, InstructionForm::Variable);
        assert_eq!(inst.operand_count, OperandCount::VAR);
        assert_eq!(inst.operands, vec![0x1234, 1, 2, 3]);
        assert_eq!(inst.store_var, Some(0x00));
        assert_eq!(inst.size, 8);
    }

    #[test]
    fn test_variable_form_of_two_operand_opcode() {
        // je with three operands in variable form: 0xC1
        let mem = memory(3, &[0xC1, 0x57, 0x05, 0x06, 0x07, 0xC5]);
        let inst = Instruction::decode(&mem, 0x100, 3).unwrap();
        assert_eq!(inst.operand_count, OperandCount::OP2);
        assert_eq!(inst.name(3), "je");
        assert_eq!(inst.operands, vec![5, 6, 7]);
        assert_eq!(inst.branch.unwrap().offset, 5);
        assert!(inst.branch.unwrap().on_true);
    }

    #[test]
    fn test_two_byte_branch_is_signed() {
        // jz #00 with a 14-bit offset of -2
        let mem = memory(3, &[0x90, 0x00, 0x3F, 0xFE]);
        let inst = Instruction::decode(&mem, 0x100, 3).unwrap();
        let branch = inst.branch.unwrap();
        assert!(!branch.on_true);
        assert_eq!(branch.offset, -2);
        assert_eq!(inst.size, 4);
    }

    #[test]
    fn test_short_branch_is_unsigned() {
        let mem = memory(3, &[0x90, 0x00, 0x7F]);
        let inst = Instruction::decode(&mem, 0x100, 3).unwrap();
        assert_eq!(inst.branch.unwrap().offset, 63);
    }

    #[test]
    fn test_double_type_byte() {
        // call_vs2 with five small constants
        let mem = memory(
            5,
            &[0xEC, 0x55, 0x7F, 1, 2, 3, 4, 5, 0x10],
        );
        let inst = Instruction::decode(&mem, 0x100, 5).unwrap();
        assert_eq!(inst.operands, vec![1, 2, 3, 4, 5]);
        assert_eq!(inst.store_var, Some(0x10));
        assert_eq!(inst.size, 9);
    }

    #[test]
    fn test_inline_text_length() {
        // print with two words of text
        let mem = memory(3, &[0xB2, 0x11, 0xAA, 0x94, 0xA5]);
        let inst = Instruction::decode(&mem, 0x100, 3).unwrap();
        assert_eq!(inst.text_addr, Some(0x101));
        assert_eq!(inst.size, 5);
        assert_eq!(inst.next_pc(), 0x105);
    }

    #[test]
    fn test_extended_form_decodes() {
        // log_shift #01 #02 -> sp
        let mem = memory(5, &[0xBE, 0x02, 0x5F, 0x01, 0x02, 0x00]);
        let inst = Instruction::decode(&mem, 0x100, 5).unwrap();
        assert_eq!(inst.form, InstructionForm::Extended);
        assert_eq!(inst.ext_opcode, Some(0x02));
        assert_eq!(inst.name(5), "log_shift");
        assert_eq!(inst.size, 6);

        // the same byte is a short-form 1OP before version 5
        let inst = Instruction::decode(&mem, 0x100, 3).unwrap();
        assert_eq!(inst.form, InstructionForm::Short);
    }

    #[test]
    fn test_truncated_instruction() {
        let mut bytes = vec![0u8; 0x80];
        bytes[0] = 3;
        bytes[0x0E] = 0x00;
        bytes[0x0F] = 0x40;
        bytes[0x7F] = 0xE0;
        let mem = MemoryImage::new(bytes).unwrap();
        assert!(Instruction::decode(&mem, 0x7F, 3).is_err());
    }
}
