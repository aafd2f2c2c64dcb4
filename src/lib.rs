//! A Z-machine: loads story files for versions 1-5, 7 and 8 and executes
//! them one instruction at a time, talking to its host through the traits
//! in [`host`].

#[macro_use]
extern crate lazy_static;

pub mod builder;
pub mod config;
pub mod console;
pub mod dictionary;
pub mod header;
pub mod host;
pub mod instruction;
pub mod interpreter;
pub mod memory;
pub mod object;
pub mod opcode_tables;
pub mod opcodes_display;
pub mod opcodes_io;
pub mod opcodes_math;
pub mod opcodes_memory;
pub mod opcodes_object;
pub mod opcodes_stack;
pub mod snapshot;
pub mod stack;
pub mod text;
pub mod vm;
pub mod zmath;
pub mod zrand;

#[cfg(test)]
mod test_utils;

pub use builder::MachineBuilder;
pub use interpreter::{ExecutionError, Interpreter, PendingRead, StepStatus};
