//! Instruction decoder.
//!
//! Every instruction is a single 32-bit word. Decoding never fails: it
//! slices the word into a fixed set of fields, named by bit position.
//! Which fields an instruction actually uses, and in what role, is decided
//! by its handler in [`crate::cpu::execute`].
//!
//! ```text
//!  31      26 25   21 20   16 15   11 10          0
//! +----------+-------+-------+-------+-------------+
//! |  opcode  |  ra   |  rb   |  rc   |             |  register fields
//! +----------+-------+-------+-------+------+------+
//! |          |       |       |     imm16           |  16-bit immediate
//! |          |       |       |       |offset11|funct|  11-bit offset / funct (5:0)
//! |          |           target26                  |  jump target
//! +----------+-------------------------------------+
//! ```

use serde::{Deserialize, Serialize};

/// Sign-extend the low `bits` bits of `value` to a 32-bit signed value.
///
/// Works for any width from 1 to 32: the sign bit is flipped and then
/// subtracted back out.
#[inline]
pub fn sign_extend(value: u32, bits: u32) -> i32 {
    debug_assert!((1..=32).contains(&bits));
    let value = if bits < 32 { value & ((1u32 << bits) - 1) } else { value };
    let sign = 1u32 << (bits - 1);
    (value ^ sign).wrapping_sub(sign) as i32
}

/// The fields of a decoded instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields {
    /// The undecoded word.
    pub raw: u32,
    /// Bits 31:26.
    pub opcode: u8,
    /// Bits 25:21.
    pub ra: u8,
    /// Bits 20:16.
    pub rb: u8,
    /// Bits 15:11; a register index or a 5-bit immediate.
    pub rc: u8,
    /// Bits 5:0.
    pub funct: u8,
    /// Bits 15:0, sign-extended.
    pub imm16: i32,
    /// Bits 25:0.
    pub target26: u32,
    /// Bits 10:0, sign-extended.
    pub offset11: i32,
}

impl Fields {
    /// Decode a raw instruction word.
    pub fn decode(raw: u32) -> Self {
        Self {
            raw,
            opcode: ((raw >> 26) & 0x3F) as u8,
            ra: ((raw >> 21) & 0x1F) as u8,
            rb: ((raw >> 16) & 0x1F) as u8,
            rc: ((raw >> 11) & 0x1F) as u8,
            funct: (raw & 0x3F) as u8,
            imm16: sign_extend(raw & 0xFFFF, 16),
            target26: raw & 0x03FF_FFFF,
            offset11: sign_extend(raw & 0x7FF, 11),
        }
    }
}

/// Primary opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// R-format class; the instruction is selected by `funct`.
    RFormat,
    /// Saturate to a signed bit width.
    Ssat,
    /// Store a pair of words.
    Stp,
    /// Branch if not equal.
    Bne,
    /// Branch if equal.
    Beq,
    /// Set a single bit.
    Sbit,
    /// Page-local jump.
    J,
    /// Add immediate.
    Addi,
    /// Store word.
    St,
    /// Load word.
    Ld,
}

impl Opcode {
    pub const ALL: [Opcode; 10] = [
        Opcode::RFormat,
        Opcode::Ssat,
        Opcode::Stp,
        Opcode::Bne,
        Opcode::Beq,
        Opcode::Sbit,
        Opcode::J,
        Opcode::Addi,
        Opcode::St,
        Opcode::Ld,
    ];

    /// The 6-bit encoding.
    pub const fn bits(self) -> u8 {
        match self {
            Opcode::RFormat => 0b000000,
            Opcode::Ssat => 0b001101,
            Opcode::Stp => 0b010101,
            Opcode::Bne => 0b011000,
            Opcode::Beq => 0b011010,
            Opcode::Sbit => 0b011100,
            Opcode::J => 0b011111,
            Opcode::Addi => 0b101101,
            Opcode::St => 0b110111,
            Opcode::Ld => 0b111001,
        }
    }

    /// Look up an opcode by its encoding.
    pub fn from_bits(bits: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.bits() == bits)
    }

    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::RFormat => "<r-format>",
            Opcode::Ssat => "ssat",
            Opcode::Stp => "stp",
            Opcode::Bne => "bne",
            Opcode::Beq => "beq",
            Opcode::Sbit => "sbit",
            Opcode::J => "j",
            Opcode::Addi => "addi",
            Opcode::St => "st",
            Opcode::Ld => "ld",
        }
    }
}

/// Function codes under the R-format opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Funct {
    /// Count leading sign bits.
    Cls,
    /// Add registers.
    Add,
    /// Gather bits selected by a mask.
    Bext,
    /// Trap to the host.
    Syscall,
    /// Subtract registers.
    Sub,
}

impl Funct {
    pub const ALL: [Funct; 5] = [Funct::Cls, Funct::Add, Funct::Bext, Funct::Syscall, Funct::Sub];

    /// The 6-bit encoding.
    pub const fn bits(self) -> u8 {
        match self {
            Funct::Cls => 0b001010,
            Funct::Add => 0b010010,
            Funct::Bext => 0b010100,
            Funct::Syscall => 0b101000,
            Funct::Sub => 0b110110,
        }
    }

    /// Look up a function code by its encoding.
    pub fn from_bits(bits: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.bits() == bits)
    }

    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Funct::Cls => "cls",
            Funct::Add => "add",
            Funct::Bext => "bext",
            Funct::Syscall => "syscall",
            Funct::Sub => "sub",
        }
    }
}
