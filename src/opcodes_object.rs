/// Object tree, attribute and property opcodes
///
/// Reads through object 0 are tolerated with a warning and yield 0 or
/// false; anything that would modify object 0 is fatal.
use crate::instruction::{Instruction, OperandCount};
use crate::interpreter::{ExecutionResult, Interpreter};
use log::{debug, warn};

impl Interpreter {
    /// Handle object system opcodes
    pub fn execute_object_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> Result<ExecutionResult, String> {
        let obj = Interpreter::operand(operands, 0)?;
        let name = inst.name(self.vm.version());

        match (inst.opcode, &inst.operand_count) {
            // 1OP:0x01 - get_sibling
            (0x01, OperandCount::OP1) => {
                let sibling = self.read_link(obj, name, |t, m, o| t.sibling(m, o))?;
                debug!("get_sibling {} -> {}", obj, sibling);
                self.store(inst, sibling)?;
                self.do_branch(inst, sibling != 0)
            }
            // 1OP:0x02 - get_child
            (0x02, OperandCount::OP1) => {
                let child = self.read_link(obj, name, |t, m, o| t.child(m, o))?;
                debug!("get_child {} -> {}", obj, child);
                self.store(inst, child)?;
                self.do_branch(inst, child != 0)
            }
            // 1OP:0x03 - get_parent
            (0x03, OperandCount::OP1) => {
                let parent = self.read_link(obj, name, |t, m, o| t.parent(m, o))?;
                debug!("get_parent {} -> {}", obj, parent);
                self.store(inst, parent)?;
                Ok(ExecutionResult::Continue)
            }
            // 1OP:0x04 - get_prop_len
            (0x04, OperandCount::OP1) => {
                let len = self
                    .vm
                    .objects
                    .property_length(&self.vm.memory, obj as usize)?;
                debug!("get_prop_len {:04x} -> {}", obj, len);
                self.store(inst, len)?;
                Ok(ExecutionResult::Continue)
            }
            // 1OP:0x09 - remove_obj
            (0x09, OperandCount::OP1) => {
                if obj == 0 {
                    warn!("remove_obj 0 ignored");
                    return Ok(ExecutionResult::Continue);
                }
                debug!("remove_obj {}", obj);
                self.vm.objects.remove(&mut self.vm.memory, obj)?;
                Ok(ExecutionResult::Continue)
            }
            // 1OP:0x0A - print_obj
            (0x0A, OperandCount::OP1) => {
                let text = self
                    .vm
                    .objects
                    .short_name(&self.vm.memory, &self.vm.codec, obj)?;
                debug!("print_obj {} \"{}\"", obj, text);
                self.output_text(&text)?;
                Ok(ExecutionResult::Continue)
            }

            // 2OP:0x06 - jin
            (0x06, OperandCount::OP2) => {
                let dest = Interpreter::operand(operands, 1)?;
                let parent = self.read_link(obj, name, |t, m, o| t.parent(m, o))?;
                debug!("jin {} {} (parent {})", obj, dest, parent);
                self.do_branch(inst, parent == dest)
            }
            // 2OP:0x0A - test_attr
            (0x0A, OperandCount::OP2) => {
                let attr = Interpreter::operand(operands, 1)?;
                let set = if obj == 0 {
                    warn!("test_attr on object 0");
                    false
                } else {
                    self.vm
                        .objects
                        .test_attribute(&self.vm.memory, obj, attr)?
                };
                debug!("test_attr {} {} -> {}", obj, attr, set);
                self.do_branch(inst, set)
            }
            // 2OP:0x0B - set_attr
            (0x0B, OperandCount::OP2) => {
                let attr = Interpreter::operand(operands, 1)?;
                debug!("set_attr {} {}", obj, attr);
                self.vm
                    .objects
                    .set_attribute(&mut self.vm.memory, obj, attr, true)?;
                Ok(ExecutionResult::Continue)
            }
            // 2OP:0x0C - clear_attr
            (0x0C, OperandCount::OP2) => {
                let attr = Interpreter::operand(operands, 1)?;
                debug!("clear_attr {} {}", obj, attr);
                self.vm
                    .objects
                    .set_attribute(&mut self.vm.memory, obj, attr, false)?;
                Ok(ExecutionResult::Continue)
            }
            // 2OP:0x0E - insert_obj
            (0x0E, OperandCount::OP2) => {
                let dest = Interpreter::operand(operands, 1)?;
                debug!("insert_obj {} -> {}", obj, dest);
                self.vm.objects.insert(&mut self.vm.memory, obj, dest)?;
                Ok(ExecutionResult::Continue)
            }
            // 2OP:0x11 - get_prop
            (0x11, OperandCount::OP2) => {
                let prop = Interpreter::operand(operands, 1)?;
                let value = self.vm.objects.get_property(&self.vm.memory, obj, prop)?;
                debug!("get_prop {} {} -> {}", obj, prop, value);
                self.store(inst, value)?;
                Ok(ExecutionResult::Continue)
            }
            // 2OP:0x12 - get_prop_addr
            (0x12, OperandCount::OP2) => {
                let prop = Interpreter::operand(operands, 1)?;
                let addr = if obj == 0 {
                    warn!("get_prop_addr on object 0");
                    0
                } else {
                    self.vm
                        .objects
                        .property_address(&self.vm.memory, obj, prop)?
                };
                debug!("get_prop_addr {} {} -> {:04x}", obj, prop, addr);
                self.store(inst, addr)?;
                Ok(ExecutionResult::Continue)
            }
            // 2OP:0x13 - get_next_prop
            (0x13, OperandCount::OP2) => {
                let prop = Interpreter::operand(operands, 1)?;
                let next = self.vm.objects.next_property(&self.vm.memory, obj, prop)?;
                debug!("get_next_prop {} {} -> {}", obj, prop, next);
                self.store(inst, next)?;
                Ok(ExecutionResult::Continue)
            }

            // VAR:0x03 - put_prop
            (0x03, OperandCount::VAR) => {
                let prop = Interpreter::operand(operands, 1)?;
                let value = Interpreter::operand(operands, 2)?;
                debug!("put_prop {} {} = {}", obj, prop, value);
                self.vm
                    .objects
                    .put_property(&mut self.vm.memory, obj, prop, value)?;
                Ok(ExecutionResult::Continue)
            }

            _ => Err(format!(
                "Unhandled object opcode 0x{:02x} ({:?})",
                inst.opcode, inst.operand_count
            )),
        }
    }

    fn read_link<F>(&self, obj: u16, name: &str, link: F) -> Result<u16, String>
    where
        F: Fn(&crate::object::ObjectTable, &crate::memory::MemoryImage, u16) -> Result<u16, String>,
    {
        if obj == 0 {
            warn!("{} on object 0", name);
            return Ok(0);
        }
        link(&self.vm.objects, &self.vm.memory, obj)
    }

    /// Check if an opcode is an object operation
    pub fn is_object_opcode(opcode: u8, operand_count: &OperandCount) -> bool {
        match operand_count {
            OperandCount::OP1 => matches!(opcode, 0x01..=0x04 | 0x09 | 0x0A),
            OperandCount::OP2 => matches!(opcode, 0x06 | 0x0A..=0x0C | 0x0E | 0x11..=0x13),
            OperandCount::VAR => opcode == 0x03,
            OperandCount::OP0 => false,
        }
    }
}
