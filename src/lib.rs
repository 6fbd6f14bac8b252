//! # sim32
//!
//! An instruction-set simulator for a small 32-bit register machine.
//!
//! Programs are flat images of fixed-width 32-bit instruction words. The
//! simulator fetches, decodes and executes them against 32 registers and
//! a flat byte-addressable memory, with a single SYSCALL trap for console
//! I/O and termination.

pub mod asm;
pub mod config;
pub mod cpu;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use asm::{assemble, disassemble, load_image, save_image, AssemblerError, ImageError};
pub use config::{ConfigError, MachineConfig};
pub use cpu::{
    BufferConsole, Console, CpuError, Fields, Machine, MachineSnapshot, Memory, MemoryError,
    Registers, RunOutcome, StdConsole,
};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
