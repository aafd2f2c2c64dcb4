//! Interfaces the engine uses to reach its host
//!
//! The engine never renders anything itself. Text, status line updates,
//! window commands and save data all leave through these traits, and the
//! builder installs the no-op implementations for any the host leaves out.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::snapshot::Snapshot;

/// Screen output stream
pub const STREAM_SCREEN: u8 = 1;
/// Transcript stream
pub const STREAM_TRANSCRIPT: u8 = 2;
/// Player command script stream
pub const STREAM_COMMANDS: u8 = 4;

/// Receives text for streams 1, 2 and 4
pub trait OutputSink {
    fn print(&mut self, stream: u8, text: &str) -> Result<(), HostError>;
}

/// Status line for versions 1-3
pub trait StatusLine {
    /// `score` and `turns` are hours and minutes when `shows_time` is set
    fn show_status(
        &mut self,
        location: &str,
        score: i16,
        turns: u16,
        shows_time: bool,
    ) -> Result<(), HostError>;
}

/// Snapshot storage keyed by the story's source name
pub trait SaveRestore {
    fn save(&mut self, key: &str, snapshot: &Snapshot) -> Result<(), HostError>;

    /// `None` when nothing has been saved under `key`
    fn restore(&mut self, key: &str) -> Result<Option<Snapshot>, HostError>;
}

/// Window commands, carried to the host without interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalCommand {
    /// -1 unsplits and clears everything, -2 clears without unsplitting
    EraseWindow(i16),
    SplitWindow(u16),
    SetWindow(u16),
    /// 1-based line and column
    SetCursor { line: u16, column: u16 },
    /// 0 roman, 1 reverse, 2 bold, 4 italic, 8 fixed
    SetTextStyle(u16),
    BufferMode(bool),
}

pub trait TerminalListener {
    fn command(&mut self, command: TerminalCommand) -> Result<(), HostError>;
}

/// Receives one formatted line per executed instruction
pub trait DebugListener {
    fn instruction(&mut self, pc: usize, text: &str);
}

/// Host-side failure
#[derive(Debug, Clone)]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Host error: {}", self.message)
    }
}

impl std::error::Error for HostError {}

impl From<std::io::Error> for HostError {
    fn from(error: std::io::Error) -> Self {
        Self::new(format!("I/O error: {}", error))
    }
}

impl From<String> for HostError {
    fn from(message: String) -> Self {
        HostError::new(message)
    }
}

impl From<HostError> for String {
    fn from(error: HostError) -> String {
        error.message
    }
}

/// Discards everything and never has a save
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl OutputSink for NullHost {
    fn print(&mut self, _stream: u8, _text: &str) -> Result<(), HostError> {
        Ok(())
    }
}

impl StatusLine for NullHost {
    fn show_status(&mut self, _: &str, _: i16, _: u16, _: bool) -> Result<(), HostError> {
        Ok(())
    }
}

impl SaveRestore for NullHost {
    fn save(&mut self, _key: &str, _snapshot: &Snapshot) -> Result<(), HostError> {
        Err(HostError::new("no save storage configured"))
    }

    fn restore(&mut self, _key: &str) -> Result<Option<Snapshot>, HostError> {
        Ok(None)
    }
}

impl TerminalListener for NullHost {
    fn command(&mut self, _command: TerminalCommand) -> Result<(), HostError> {
        Ok(())
    }
}

impl DebugListener for NullHost {
    fn instruction(&mut self, _pc: usize, _text: &str) {}
}

/// Status line contents as last reported
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub location: String,
    pub score: i16,
    pub turns: u16,
}

#[derive(Debug, Default)]
pub struct Recording {
    pub streams: HashMap<u8, String>,
    pub statuses: Vec<StatusReport>,
    pub commands: Vec<TerminalCommand>,
    pub saves: HashMap<String, Snapshot>,
    pub trace: Vec<String>,
}

/// Captures everything the engine sends, for tests and embedding. Clones
/// share the same recording.
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    inner: Rc<RefCell<Recording>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything printed to `stream` so far
    pub fn stream(&self, stream: u8) -> String {
        self.inner
            .borrow()
            .streams
            .get(&stream)
            .cloned()
            .unwrap_or_default()
    }

    /// Screen output so far
    pub fn output(&self) -> String {
        self.stream(STREAM_SCREEN)
    }

    /// Return the screen output and forget it
    pub fn take_output(&self) -> String {
        self.inner
            .borrow_mut()
            .streams
            .remove(&STREAM_SCREEN)
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<StatusReport> {
        self.inner.borrow().statuses.clone()
    }

    pub fn commands(&self) -> Vec<TerminalCommand> {
        self.inner.borrow().commands.clone()
    }

    pub fn saved(&self, key: &str) -> Option<Snapshot> {
        self.inner.borrow().saves.get(key).cloned()
    }

    pub fn trace(&self) -> Vec<String> {
        self.inner.borrow().trace.clone()
    }
}

impl OutputSink for RecordingHost {
    fn print(&mut self, stream: u8, text: &str) -> Result<(), HostError> {
        self.inner
            .borrow_mut()
            .streams
            .entry(stream)
            .or_default()
            .push_str(text);
        Ok(())
    }
}

impl StatusLine for RecordingHost {
    fn show_status(
        &mut self,
        location: &str,
        score: i16,
        turns: u16,
        _shows_time: bool,
    ) -> Result<(), HostError> {
        self.inner.borrow_mut().statuses.push(StatusReport {
            location: location.to_string(),
            score,
            turns,
        });
        Ok(())
    }
}

impl SaveRestore for RecordingHost {
    fn save(&mut self, key: &str, snapshot: &Snapshot) -> Result<(), HostError> {
        self.inner
            .borrow_mut()
            .saves
            .insert(key.to_string(), snapshot.clone());
        Ok(())
    }

    fn restore(&mut self, key: &str) -> Result<Option<Snapshot>, HostError> {
        Ok(self.inner.borrow().saves.get(key).cloned())
    }
}

impl TerminalListener for RecordingHost {
    fn command(&mut self, command: TerminalCommand) -> Result<(), HostError> {
        self.inner.borrow_mut().commands.push(command);
        Ok(())
    }
}

impl DebugListener for RecordingHost {
    fn instruction(&mut self, pc: usize, text: &str) {
        self.inner
            .borrow_mut()
            .trace
            .push(format!("{pc:05x} {text}"));
    }
}
