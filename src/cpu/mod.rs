//! CPU emulation for the 32-bit register machine.
//!
//! This module implements the complete architecture:
//! - a flat, bounds-checked byte-addressable memory
//! - 32 general-purpose registers, with r0 wired to zero
//! - a fixed-width 32-bit instruction set with one R-format class
//! - a single SYSCALL trap for console I/O and termination

pub mod console;
pub mod decode;
pub mod execute;
pub mod memory;
pub mod registers;

pub use console::{BufferConsole, Console, ConsoleError, Diagnostic, StdConsole};
pub use decode::{sign_extend, Fields, Funct, Opcode};
pub use execute::{CpuError, Machine, MachineSnapshot, RunOutcome};
pub use memory::{Memory, MemoryError, DEFAULT_MEMORY_SIZE};
pub use registers::{Registers, NUM_REGISTERS, RESULT_REG, TRAP_REG};
