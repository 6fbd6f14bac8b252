//! TUI debugger for the simulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register file view
//! - Memory word view
//! - Step/run/breakpoint controls
//! - Disassembly and console output views

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
