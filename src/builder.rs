//! Assembles an interpreter from a story image and host interfaces

use log::info;

use crate::config::EngineConfig;
use crate::host::{
    DebugListener, NullHost, OutputSink, RecordingHost, SaveRestore, StatusLine, TerminalListener,
};
use crate::interpreter::{Host, Interpreter};
use crate::memory::MemoryImage;
use crate::vm::VM;

/// Collects everything an `Interpreter` needs. Host interfaces left unset
/// fall back to `NullHost`.
pub struct MachineBuilder {
    bytes: Vec<u8>,
    source_name: String,
    config: EngineConfig,
    output: Option<Box<dyn OutputSink>>,
    status: Option<Box<dyn StatusLine>>,
    saves: Option<Box<dyn SaveRestore>>,
    terminal: Option<Box<dyn TerminalListener>>,
    debugger: Option<Box<dyn DebugListener>>,
}

impl MachineBuilder {
    pub fn new(bytes: Vec<u8>) -> Self {
        MachineBuilder {
            bytes,
            source_name: String::from("story"),
            config: EngineConfig::default(),
            output: None,
            status: None,
            saves: None,
            terminal: None,
            debugger: None,
        }
    }

    /// Name that keys save snapshots
    pub fn source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn output(mut self, output: impl OutputSink + 'static) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    pub fn status_line(mut self, status: impl StatusLine + 'static) -> Self {
        self.status = Some(Box::new(status));
        self
    }

    pub fn save_restore(mut self, saves: impl SaveRestore + 'static) -> Self {
        self.saves = Some(Box::new(saves));
        self
    }

    pub fn terminal(mut self, terminal: impl TerminalListener + 'static) -> Self {
        self.terminal = Some(Box::new(terminal));
        self
    }

    pub fn debugger(mut self, debugger: impl DebugListener + 'static) -> Self {
        self.debugger = Some(Box::new(debugger));
        self
    }

    /// Route output, status, saves and terminal commands to one recorder
    pub fn recording(self, host: &RecordingHost) -> Self {
        self.output(host.clone())
            .status_line(host.clone())
            .save_restore(host.clone())
            .terminal(host.clone())
    }

    pub fn build(self) -> Result<Interpreter, String> {
        let memory = MemoryImage::new(self.bytes)?;
        if memory.version() == 6 {
            return Err("Version 6 stories are not supported".to_string());
        }
        let vm = VM::new(memory, self.config)?;
        info!("machine ready for '{}'", self.source_name);

        let host = Host {
            output: self.output.unwrap_or_else(|| Box::new(NullHost)),
            status: self.status.unwrap_or_else(|| Box::new(NullHost)),
            saves: self.saves.unwrap_or_else(|| Box::new(NullHost)),
            terminal: self.terminal.unwrap_or_else(|| Box::new(NullHost)),
            debugger: self.debugger,
        };
        Ok(Interpreter::new(vm, host, self.source_name))
    }
}
