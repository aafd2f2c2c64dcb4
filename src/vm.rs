use log::{debug, info};

use crate::config::EngineConfig;
use crate::dictionary::Dictionary;
use crate::header::Header;
use crate::instruction::Instruction;
use crate::memory::MemoryImage;
use crate::object::ObjectTable;
use crate::stack::CallStack;
use crate::text::{Alphabet, TextCodec};
use crate::zrand::{RandMode, ZRand};

/// Number of global variables
pub const GLOBAL_COUNT: usize = 240;

/// Maximum number of local variables per routine
pub const MAX_LOCALS: usize = 15;

/// The machine state: memory, stack, program counter and the tables derived
/// from the header at load time
pub struct VM {
    pub memory: MemoryImage,
    pub header: Header,
    pub stack: CallStack,
    /// Program counter, the address of the next instruction
    pub pc: usize,
    pub objects: ObjectTable,
    pub dictionary: Dictionary,
    pub codec: TextCodec,
    /// Shift lock carried between strings in versions 1 and 2
    pub alphabet: Alphabet,
    pub rand: ZRand,
    config: EngineConfig,
}

impl VM {
    /// Validate the image, advertise interpreter capabilities and derive
    /// the object table, dictionary and text codec.
    pub fn new(mut memory: MemoryImage, config: EngineConfig) -> Result<VM, String> {
        memory.init_interpreter_fields(&config)?;
        let header = Header::new(&memory)?;
        let codec = TextCodec::new(&memory)?;
        let objects = ObjectTable::new(&memory, header.object_table_addr);
        let dictionary = Dictionary::new(&memory, &codec, header.dictionary)?;
        let rand = match config.seed {
            Some(seed) => ZRand::new(RandMode::Predictable(seed)),
            None => ZRand::new(RandMode::RandomUniform),
        };
        info!(
            "loaded version {} story, release {} serial {}",
            header.version, header.release, header.serial
        );

        Ok(VM {
            pc: header.initial_pc,
            memory,
            header,
            stack: CallStack::new(),
            objects,
            dictionary,
            codec,
            alphabet: Alphabet::A0,
            rand,
            config,
        })
    }

    pub fn version(&self) -> u8 {
        self.header.version
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn decode_instruction_at(&self, pc: usize) -> Result<Instruction, String> {
        Instruction::decode(&self.memory, pc, self.version())
            .map_err(|e| format!("Decode error at PC 0x{pc:05x}: {e}"))
    }

    fn global_addr(&self, var: u8) -> Result<usize, String> {
        if var < 0x10 {
            return Err(format!("Variable {var} is not a global"));
        }
        Ok(self.header.global_variables + (var as usize - 0x10) * 2)
    }

    pub fn read_global(&self, var: u8) -> Result<u16, String> {
        self.memory.get_word(self.global_addr(var)?)
    }

    pub fn write_global(&mut self, var: u8, value: u16) -> Result<(), String> {
        let addr = self.global_addr(var)?;
        self.memory.write_word(addr, value)
    }

    pub fn globals(&self) -> Result<Vec<u16>, String> {
        (0..GLOBAL_COUNT)
            .map(|i| self.memory.get_word(self.header.global_variables + i * 2))
            .collect()
    }

    /// Read a variable; variable 0 pops the stack
    pub fn read_variable(&mut self, var: u8) -> Result<u16, String> {
        match var {
            0 => self.stack.pop(),
            1..=15 => self.stack.local(var),
            _ => self.read_global(var),
        }
    }

    /// Write a variable; variable 0 pushes onto the stack
    pub fn write_variable(&mut self, var: u8, value: u16) -> Result<(), String> {
        match var {
            0 => self.stack.push(value),
            1..=15 => self.stack.set_local(var, value),
            _ => self.write_global(var, value),
        }
    }

    /// Read a variable named by an indirect operand; the stack top is left in place
    pub fn peek_variable(&self, var: u8) -> Result<u16, String> {
        match var {
            0 => self.stack.peek(),
            1..=15 => self.stack.local(var),
            _ => self.read_global(var),
        }
    }

    /// Write a variable named by an indirect operand; the stack top is replaced
    pub fn set_variable_in_place(&mut self, var: u8, value: u16) -> Result<(), String> {
        match var {
            0 => self.stack.set_top(value),
            1..=15 => self.stack.set_local(var, value),
            _ => self.write_global(var, value),
        }
    }

    /// Enter the routine at packed address `packed`. Calling address 0 does
    /// nothing except store 0. Returns whether a frame was pushed.
    pub fn call_routine(
        &mut self,
        packed: u16,
        args: &[u16],
        store: Option<u8>,
        return_pc: usize,
    ) -> Result<bool, String> {
        if packed == 0 {
            debug!("call to routine 0");
            if let Some(var) = store {
                self.write_variable(var, 0)?;
            }
            self.pc = return_pc;
            return Ok(false);
        }

        let addr = self.memory.unpack_routine(packed);
        let count = self.memory.get_byte(addr)? as usize;
        if count > MAX_LOCALS {
            return Err(format!(
                "Routine at 0x{addr:05x} declares {count} locals"
            ));
        }

        let mut locals = Vec::with_capacity(count);
        let mut body = addr + 1;
        if self.version() < 5 {
            for i in 0..count {
                locals.push(self.memory.get_word(body + i * 2)?);
            }
            body += count * 2;
        } else {
            locals.resize(count, 0);
        }
        for (local, arg) in locals.iter_mut().zip(args) {
            *local = *arg;
        }

        debug!(
            "call 0x{:05x} with {:?} -> {:?}",
            addr,
            args,
            store
        );
        self.stack.push_frame(return_pc, store, &locals)?;
        self.pc = body;
        Ok(true)
    }

    /// Return from the active routine with `value`
    pub fn return_routine(&mut self, value: u16) -> Result<(), String> {
        let ret = self.stack.pop_frame()?;
        debug!("return {} to 0x{:05x}", value, ret.return_addr);
        self.pc = ret.return_addr;
        if let Some(var) = ret.store {
            self.write_variable(var, value)?;
        }
        Ok(())
    }

    /// Restore the pristine image and start over. The transcript and
    /// fixed-pitch bits of flags 2 survive.
    pub fn restart(&mut self) -> Result<(), String> {
        let transcript = self.memory.is_transcripting()?;
        let fixed = if self.version() >= 3 {
            self.memory.is_fixed_pitch_forced()?
        } else {
            false
        };

        self.memory.reset();
        let config = EngineConfig {
            transcript,
            ..self.config.clone()
        };
        self.memory.init_interpreter_fields(&config)?;
        if fixed {
            self.memory.set_fixed_pitch_forced(true)?;
        }
        self.header = Header::new(&self.memory)?;
        self.pc = self.header.initial_pc;
        self.stack = CallStack::new();
        self.alphabet = Alphabet::A0;
        info!("restarted at 0x{:05x}", self.pc);
        Ok(())
    }

    /// Whether the story's checksum matches its contents
    pub fn verify(&self) -> bool {
        self.memory.checksum(self.header.len_file) == self.header.checksum_file
    }
}
