//! Terminal host for the `zvm` binary
//!
//! Text goes straight to stdout. When stdout is a terminal the version 1-3
//! status line is drawn in reverse video on the top row with crossterm.
//! Saves are written next to the story as `<name>.sav.toml`.

use crossterm::{
    cursor::{MoveTo, RestorePosition, SavePosition},
    event::{self, Event, KeyCode, KeyEventKind},
    execute, queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{self, Clear, ClearType},
};
use log::{debug, info, trace, warn};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::host::{
    DebugListener, HostError, OutputSink, SaveRestore, StatusLine, TerminalCommand, TerminalListener,
    STREAM_COMMANDS, STREAM_SCREEN, STREAM_TRANSCRIPT,
};
use crate::interpreter::{Interpreter, StepStatus};
use crate::snapshot::{SavedGame, Snapshot};

fn is_terminal() -> bool {
    atty::is(atty::Stream::Stdout)
}

/// Screen text to stdout, transcript and command streams to files
pub struct ConsoleOutput {
    transcript: Option<fs::File>,
    commands: Option<fs::File>,
    base: PathBuf,
}

impl ConsoleOutput {
    /// `base` is the story path; stream files are named after it
    pub fn new(base: impl Into<PathBuf>) -> Self {
        ConsoleOutput {
            transcript: None,
            commands: None,
            base: base.into(),
        }
    }

    fn stream_file(slot: &mut Option<fs::File>, path: PathBuf) -> Result<&mut fs::File, HostError> {
        if slot.is_none() {
            info!("opening {}", path.display());
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            *slot = Some(file);
        }
        slot.as_mut()
            .ok_or_else(|| HostError::new(format!("cannot open {}", path.display())))
    }
}

impl OutputSink for ConsoleOutput {
    fn print(&mut self, stream: u8, text: &str) -> Result<(), HostError> {
        match stream {
            STREAM_SCREEN => {
                let mut stdout = io::stdout();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            STREAM_TRANSCRIPT => {
                let path = self.base.with_extension("transcript.txt");
                Self::stream_file(&mut self.transcript, path)?.write_all(text.as_bytes())?;
            }
            STREAM_COMMANDS => {
                let path = self.base.with_extension("commands.txt");
                Self::stream_file(&mut self.commands, path)?.write_all(text.as_bytes())?;
            }
            other => warn!("output to unknown stream {} dropped", other),
        }
        Ok(())
    }
}

/// Reverse-video top line, only drawn on a real terminal
#[derive(Debug, Default)]
pub struct ConsoleStatus;

impl ConsoleStatus {
    fn render(location: &str, score: i16, turns: u16, shows_time: bool, width: usize) -> String {
        let right = if shows_time {
            let hours = score.rem_euclid(24);
            let display_hour = match hours % 12 {
                0 => 12,
                h => h,
            };
            let suffix = if hours < 12 { "AM" } else { "PM" };
            format!("Time: {}:{:02} {}", display_hour, turns % 60, suffix)
        } else {
            format!("Score: {}  Moves: {}", score, turns)
        };
        let left = format!(" {}", location);
        let pad = width.saturating_sub(left.chars().count() + right.chars().count() + 1);
        format!("{}{}{} ", left, " ".repeat(pad), right)
            .chars()
            .take(width)
            .collect()
    }
}

impl StatusLine for ConsoleStatus {
    fn show_status(
        &mut self,
        location: &str,
        score: i16,
        turns: u16,
        shows_time: bool,
    ) -> Result<(), HostError> {
        if !is_terminal() {
            debug!("status: {} {} {}", location, score, turns);
            return Ok(());
        }
        let (width, _) = terminal::size()?;
        let line = Self::render(location, score, turns, shows_time, width as usize);
        let mut stdout = io::stdout();
        queue!(
            stdout,
            SavePosition,
            MoveTo(0, 0),
            SetAttribute(Attribute::Reverse),
            Print(line),
            SetAttribute(Attribute::Reset),
            RestorePosition
        )?;
        stdout.flush()?;
        Ok(())
    }
}

/// Window commands. Only erasing is acted on; the rest are logged.
#[derive(Debug, Default)]
pub struct ConsoleTerminal;

impl TerminalListener for ConsoleTerminal {
    fn command(&mut self, command: TerminalCommand) -> Result<(), HostError> {
        match command {
            TerminalCommand::EraseWindow(-1) | TerminalCommand::EraseWindow(-2)
                if is_terminal() =>
            {
                execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 1))?;
            }
            TerminalCommand::SetTextStyle(style) if is_terminal() => {
                let mut stdout = io::stdout();
                queue!(stdout, SetAttribute(Attribute::Reset))?;
                if style & 1 != 0 {
                    queue!(stdout, SetAttribute(Attribute::Reverse))?;
                }
                if style & 2 != 0 {
                    queue!(stdout, SetAttribute(Attribute::Bold))?;
                }
                if style & 4 != 0 {
                    queue!(stdout, SetAttribute(Attribute::Italic))?;
                }
                stdout.flush()?;
            }
            other => debug!("terminal command {:?}", other),
        }
        Ok(())
    }
}

/// One key from the terminal in raw mode
fn read_key() -> Result<char, String> {
    terminal::enable_raw_mode().map_err(|e| format!("Failed to enable raw mode: {}", e))?;
    let key = loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char(c) => break Ok(c),
                KeyCode::Enter => break Ok('\n'),
                KeyCode::Backspace => break Ok('\u{8}'),
                KeyCode::Esc => break Ok('\u{1b}'),
                _ => {}
            },
            Ok(_) => {}
            Err(e) => break Err(format!("Failed to read key: {}", e)),
        }
    };
    terminal::disable_raw_mode().map_err(|e| format!("Failed to disable raw mode: {}", e))?;
    key
}

/// TOML save files compressed against the pristine dynamic memory
pub struct FileSaves {
    dir: PathBuf,
    pristine: Vec<u8>,
}

impl FileSaves {
    pub fn new(dir: impl Into<PathBuf>, pristine: &[u8]) -> Self {
        FileSaves {
            dir: dir.into(),
            pristine: pristine.to_vec(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.sav.toml", key))
    }
}

impl SaveRestore for FileSaves {
    fn save(&mut self, key: &str, snapshot: &Snapshot) -> Result<(), HostError> {
        let saved = SavedGame::compress(snapshot, &self.pristine)?;
        let path = self.path_for(key);
        fs::write(&path, saved.to_toml()?)?;
        info!("saved {} ({} compressed bytes)", path.display(), saved.cmem.len());
        Ok(())
    }

    fn restore(&mut self, key: &str) -> Result<Option<Snapshot>, HostError> {
        let path = self.path_for(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no save file at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let saved = SavedGame::from_toml(&text)?;
        Ok(Some(saved.expand(&self.pristine)?))
    }
}

/// Writes each executed instruction to the log at trace level
#[derive(Debug, Default)]
pub struct LogTrace;

impl DebugListener for LogTrace {
    fn instruction(&mut self, pc: usize, text: &str) {
        trace!("{:05x}: {}", pc, text);
    }
}

/// Drive the interpreter, feeding it lines from `input`. Keys come from the
/// terminal in raw mode when stdin is a terminal, else from `input` one
/// line at a time. Returns when the story quits, the input ends or a step
/// fails.
pub fn run_console<R: BufRead>(interp: &mut Interpreter, mut input: R) -> Result<(), String> {
    let echo = !atty::is(atty::Stream::Stdin);
    loop {
        match interp.step() {
            StepStatus::Running => {}
            StepStatus::Halted => return Ok(()),
            StepStatus::Error(e) => return Err(e.to_string()),
            StepStatus::WaitingForLine => {
                let mut line = String::new();
                if input.read_line(&mut line).map_err(|e| e.to_string())? == 0 {
                    info!("end of input after {} instructions", interp.instruction_count());
                    return Ok(());
                }
                interp
                    .provide_line(&line, echo)
                    .map_err(|e| e.to_string())?;
            }
            StepStatus::WaitingForChar if !echo => {
                let key = read_key()?;
                interp.provide_char(key).map_err(|e| e.to_string())?;
            }
            StepStatus::WaitingForChar => {
                let mut line = String::new();
                if input.read_line(&mut line).map_err(|e| e.to_string())? == 0 {
                    return Ok(());
                }
                let key = line.chars().next().unwrap_or('\n');
                interp.provide_char(key).map_err(|e| e.to_string())?;
            }
        }
    }
}
