//! Assembler, disassembler and program images.
//!
//! This module provides:
//! - Word builders for every instruction
//! - A two-pass assembler (text → instruction words)
//! - A disassembler (instruction words → text)
//! - Flat binary image load/save

pub mod assembler;
pub mod disasm;
pub mod encode;
pub mod image;

pub use assembler::{assemble, assemble_at, AssemblerError};
pub use disasm::{disassemble, disassemble_instruction};
pub use image::{load_image, save_image, ImageError, DEFAULT_LOAD_ADDRESS};
