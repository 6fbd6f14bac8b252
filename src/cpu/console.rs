//! Host console used by the trap handler.
//!
//! The execution engine never touches stdin or stdout itself. PRINT_INT,
//! READ_INT and every diagnostic go through a [`Console`] handed to the
//! machine at construction.

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, Write};
use thiserror::Error;

/// A non-fatal event reported while executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Opcode not in the instruction table.
    UnknownOpcode { pc: u32, opcode: u8 },
    /// Function code not in the R-format table.
    UnknownFunct { pc: u32, funct: u8 },
    /// SYSCALL with an unsupported trap number. Halts the machine.
    UnknownTrap { pc: u32, number: u32 },
    /// READ_INT could not obtain an integer.
    BadInput { pc: u32, reason: String },
    /// PRINT_INT could not write its output.
    OutputFailed { pc: u32, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownOpcode { pc, opcode } => {
                write!(f, "unknown opcode {:#04x} at {:#010x}", opcode, pc)
            }
            Diagnostic::UnknownFunct { pc, funct } => {
                write!(f, "unknown R-format funct {:#04x} at {:#010x}", funct, pc)
            }
            Diagnostic::UnknownTrap { pc, number } => {
                write!(f, "unknown trap number {} at {:#010x}, halting", number, pc)
            }
            Diagnostic::BadInput { pc, reason } => {
                write!(f, "READ_INT at {:#010x} failed: {}", pc, reason)
            }
            Diagnostic::OutputFailed { pc, reason } => {
                write!(f, "PRINT_INT at {:#010x} failed: {}", pc, reason)
            }
        }
    }
}

/// Errors a console can report back to the trap handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("end of input")]
    EndOfInput,

    #[error("not a decimal integer: {0:?}")]
    InvalidInteger(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// The host side of the trap interface.
pub trait Console {
    /// Emit a signed decimal integer.
    fn print_int(&mut self, value: i32) -> Result<(), ConsoleError>;

    /// Block until a decimal integer is available.
    fn read_int(&mut self) -> Result<i32, ConsoleError>;

    /// Report a non-fatal event.
    fn diagnostic(&mut self, diag: &Diagnostic) {
        tracing::warn!("{}", diag);
    }
}

/// Parse one line of console input.
pub fn parse_int(line: &str) -> Result<i32, ConsoleError> {
    let trimmed = line.trim();
    trimmed
        .parse::<i32>()
        .or_else(|_| trimmed.parse::<u32>().map(|v| v as i32))
        .map_err(|_| ConsoleError::InvalidInteger(trimmed.to_string()))
}

/// Console wired to the process's stdin and stdout.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn print_int(&mut self, value: i32) -> Result<(), ConsoleError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", value)
            .and_then(|_| out.flush())
            .map_err(|e| ConsoleError::Io(e.to_string()))
    }

    fn read_int(&mut self) -> Result<i32, ConsoleError> {
        let mut line = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| ConsoleError::Io(e.to_string()))?;
        if read == 0 {
            return Err(ConsoleError::EndOfInput);
        }
        parse_int(&line)
    }
}

/// In-memory console: queued input, captured output and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct BufferConsole {
    pub input: VecDeque<i32>,
    pub output: Vec<i32>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// A console that will answer READ_INT with `input`, in order.
    pub fn with_input(input: impl IntoIterator<Item = i32>) -> Self {
        Self {
            input: input.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl Console for BufferConsole {
    fn print_int(&mut self, value: i32) -> Result<(), ConsoleError> {
        self.output.push(value);
        Ok(())
    }

    fn read_int(&mut self) -> Result<i32, ConsoleError> {
        self.input.pop_front().ok_or(ConsoleError::EndOfInput)
    }

    fn diagnostic(&mut self, diag: &Diagnostic) {
        tracing::debug!("{}", diag);
        self.diagnostics.push(diag.clone());
    }
}
