use crate::instruction::{InstructionForm, OperandCount};

/// Get the name of an opcode based on its form and value
pub fn get_instruction_name(
    opcode: u8,
    ext_opcode: Option<u8>,
    form: InstructionForm,
    operand_count: OperandCount,
    version: u8,
) -> &'static str {
    if form == InstructionForm::Extended {
        return get_extended_opcode_name(ext_opcode.unwrap_or(0xFF));
    }
    match operand_count {
        OperandCount::OP0 => get_0op_opcode_name(opcode, version),
        OperandCount::OP1 => get_1op_opcode_name(opcode, version),
        OperandCount::OP2 => get_2op_opcode_name(opcode),
        OperandCount::VAR => get_variable_opcode_name(opcode, version),
    }
}

/// Get name for 2OP opcodes (long form, or variable form with bit 5 clear)
fn get_2op_opcode_name(opcode: u8) -> &'static str {
    match opcode {
        0x01 => "je",
        0x02 => "jl",
        0x03 => "jg",
        0x04 => "dec_chk",
        0x05 => "inc_chk",
        0x06 => "jin",
        0x07 => "test",
        0x08 => "or",
        0x09 => "and",
        0x0A => "test_attr",
        0x0B => "set_attr",
        0x0C => "clear_attr",
        0x0D => "store",
        0x0E => "insert_obj",
        0x0F => "loadw",
        0x10 => "loadb",
        0x11 => "get_prop",
        0x12 => "get_prop_addr",
        0x13 => "get_next_prop",
        0x14 => "add",
        0x15 => "sub",
        0x16 => "mul",
        0x17 => "div",
        0x18 => "mod",
        0x19 => "call_2s",
        0x1A => "call_2n",
        0x1B => "set_colour",
        0x1C => "throw",
        _ => "unknown_2op",
    }
}

/// Get name for 1OP opcodes (short form)
fn get_1op_opcode_name(opcode: u8, version: u8) -> &'static str {
    match opcode {
        0x00 => "jz",
        0x01 => "get_sibling",
        0x02 => "get_child",
        0x03 => "get_parent",
        0x04 => "get_prop_len",
        0x05 => "inc",
        0x06 => "dec",
        0x07 => "print_addr",
        0x08 => "call_1s",
        0x09 => "remove_obj",
        0x0A => "print_obj",
        0x0B => "ret",
        0x0C => "jump",
        0x0D => "print_paddr",
        0x0E => "load",
        0x0F if version <= 4 => "not",
        0x0F => "call_1n",
        _ => "unknown_1op",
    }
}

/// Get name for 0OP opcodes (short form)
fn get_0op_opcode_name(opcode: u8, version: u8) -> &'static str {
    match opcode {
        0x00 => "rtrue",
        0x01 => "rfalse",
        0x02 => "print",
        0x03 => "print_ret",
        0x04 => "nop",
        0x05 => "save",
        0x06 => "restore",
        0x07 => "restart",
        0x08 => "ret_popped",
        0x09 if version <= 4 => "pop",
        0x09 => "catch",
        0x0A => "quit",
        0x0B => "new_line",
        0x0C => "show_status",
        0x0D => "verify",
        0x0E => "extended",
        0x0F => "piracy",
        _ => "unknown_0op",
    }
}

/// Get name for VAR opcodes (variable form with bit 5 set)
fn get_variable_opcode_name(opcode: u8, version: u8) -> &'static str {
    match opcode {
        0x00 if version <= 3 => "call",
        0x00 => "call_vs",
        0x01 => "storew",
        0x02 => "storeb",
        0x03 => "put_prop",
        0x04 if version <= 4 => "sread",
        0x04 => "aread",
        0x05 => "print_char",
        0x06 => "print_num",
        0x07 => "random",
        0x08 => "push",
        0x09 => "pull",
        0x0A => "split_window",
        0x0B => "set_window",
        0x0C => "call_vs2",
        0x0D => "erase_window",
        0x0E => "erase_line",
        0x0F => "set_cursor",
        0x10 => "get_cursor",
        0x11 => "set_text_style",
        0x12 => "buffer_mode",
        0x13 => "output_stream",
        0x14 => "input_stream",
        0x15 => "sound_effect",
        0x16 => "read_char",
        0x17 => "scan_table",
        0x18 => "not",
        0x19 => "call_vn",
        0x1A => "call_vn2",
        0x1B => "tokenise",
        0x1C => "encode_text",
        0x1D => "copy_table",
        0x1E => "print_table",
        0x1F => "check_arg_count",
        _ => "unknown_var",
    }
}

/// Get name for extended opcodes (V5+)
fn get_extended_opcode_name(ext_opcode: u8) -> &'static str {
    match ext_opcode {
        0x00 => "save",
        0x01 => "restore",
        0x02 => "log_shift",
        0x03 => "art_shift",
        0x04 => "set_font",
        0x05 => "draw_picture",
        0x06 => "picture_data",
        0x07 => "erase_picture",
        0x08 => "set_margins",
        0x09 => "save_undo",
        0x0A => "restore_undo",
        0x0B => "print_unicode",
        0x0C => "check_unicode",
        0x0D => "set_true_colour",
        0x10 => "move_window",
        0x11 => "window_size",
        0x12 => "window_style",
        0x13 => "get_wind_prop",
        0x14 => "scroll_window",
        0x15 => "pop_stack",
        0x16 => "read_mouse",
        0x17 => "mouse_window",
        0x18 => "push_stack",
        0x19 => "put_wind_prop",
        0x1A => "print_form",
        0x1B => "make_menu",
        0x1C => "picture_table",
        0x1D => "buffer_screen",
        _ => "unknown_ext",
    }
}

/// Check if an instruction stores a result
pub fn stores_result(
    opcode: u8,
    ext_opcode: Option<u8>,
    form: InstructionForm,
    operand_count: OperandCount,
    version: u8,
) -> bool {
    if form == InstructionForm::Extended {
        return matches!(
            ext_opcode,
            Some(0x00..=0x04) | Some(0x09..=0x0A) | Some(0x0C) | Some(0x13) | Some(0x1D)
        );
    }
    match operand_count {
        OperandCount::OP2 => matches!(opcode, 0x08 | 0x09 | 0x0F..=0x19),
        OperandCount::OP1 => match opcode {
            0x01..=0x04 | 0x08 | 0x0E => true,
            0x0F => version <= 4, // not; call_1n from v5
            _ => false,
        },
        OperandCount::OP0 => match opcode {
            0x05 | 0x06 => version == 4, // save/restore
            0x09 => version >= 5,         // catch
            _ => false,
        },
        OperandCount::VAR => match opcode {
            0x00 | 0x07 | 0x0C | 0x16 | 0x17 | 0x18 => true,
            0x04 => version >= 5, // aread
            0x09 => version == 6, // pull
            _ => false,
        },
    }
}

/// Check if an instruction has a branch
pub fn has_branch(
    opcode: u8,
    ext_opcode: Option<u8>,
    form: InstructionForm,
    operand_count: OperandCount,
    version: u8,
) -> bool {
    if form == InstructionForm::Extended {
        return matches!(ext_opcode, Some(0x06) | Some(0x18) | Some(0x1B));
    }
    match operand_count {
        OperandCount::OP2 => matches!(opcode, 0x01..=0x07 | 0x0A),
        OperandCount::OP1 => matches!(opcode, 0x00..=0x02),
        OperandCount::OP0 => match opcode {
            0x05 | 0x06 => version <= 3, // save/restore
            0x0D | 0x0F => true,         // verify, piracy
            _ => false,
        },
        OperandCount::VAR => matches!(opcode, 0x17 | 0x1F), // scan_table, check_arg_count
    }
}

/// Check if an instruction has inline text
pub fn has_text(
    opcode: u8,
    _ext_opcode: Option<u8>,
    form: InstructionForm,
    operand_count: OperandCount,
    _version: u8,
) -> bool {
    form == InstructionForm::Short && operand_count == OperandCount::OP0 && matches!(opcode, 0x02 | 0x03)
}

/// Whether a VAR opcode takes a second operand type byte
pub fn has_double_type_byte(opcode: u8, operand_count: OperandCount) -> bool {
    operand_count == OperandCount::VAR && matches!(opcode, 0x0C | 0x1A)
}
