//! Instruction word builders.
//!
//! Three encoding shapes cover the whole instruction set:
//! R (opcode 0, three register fields, funct), I (opcode, two register
//! fields, 16-bit immediate) and J (opcode, 26-bit target). STP, SSAT and
//! SBIT reuse the R-shaped register fields under their own opcode.

use crate::cpu::decode::{Funct, Opcode};

/// A register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg(pub u8);

/// Register operand `r{index}`.
pub const fn reg(index: u8) -> Reg {
    Reg(index & 0x1F)
}

fn fields(opcode: Opcode, ra: Reg, rb: Reg, rc: u8) -> u32 {
    (u32::from(opcode.bits()) << 26)
        | (u32::from(ra.0 & 0x1F) << 21)
        | (u32::from(rb.0 & 0x1F) << 16)
        | (u32::from(rc & 0x1F) << 11)
}

fn r_type(funct: Funct, ra: Reg, rb: Reg, rc: Reg) -> u32 {
    fields(Opcode::RFormat, ra, rb, rc.0) | u32::from(funct.bits())
}

fn i_type(opcode: Opcode, ra: Reg, rb: Reg, imm: i32) -> u32 {
    fields(opcode, ra, rb, 0) | (imm as u32 & 0xFFFF)
}

/// `add rd, rs, rt`: rd = rs + rt.
pub fn add(rd: Reg, rs: Reg, rt: Reg) -> u32 {
    r_type(Funct::Add, rs, rt, rd)
}

/// `sub rd, rs, rt`: rd = rs - rt.
pub fn sub(rd: Reg, rs: Reg, rt: Reg) -> u32 {
    r_type(Funct::Sub, rs, rt, rd)
}

/// `cls rd, rs`
pub fn cls(rd: Reg, rs: Reg) -> u32 {
    r_type(Funct::Cls, rd, rs, Reg(0))
}

/// `bext rd, rs, rmask`
pub fn bext(rd: Reg, rs: Reg, mask: Reg) -> u32 {
    r_type(Funct::Bext, rd, rs, mask)
}

/// `syscall`
pub fn syscall() -> u32 {
    r_type(Funct::Syscall, Reg(0), Reg(0), Reg(0))
}

/// `ssat rd, rs, width`
pub fn ssat(rd: Reg, rs: Reg, width: u8) -> u32 {
    fields(Opcode::Ssat, rd, rs, width)
}

/// `sbit rd, shift`
pub fn sbit(rd: Reg, shift: u8) -> u32 {
    fields(Opcode::Sbit, rd, Reg(0), shift)
}

/// `stp r1, r2, offset(base)`; `offset` is truncated to 11 bits.
pub fn stp(first: Reg, second: Reg, offset: i32, base: Reg) -> u32 {
    fields(Opcode::Stp, base, first, second.0) | (offset as u32 & 0x7FF)
}

/// `addi rt, rs, imm`: rt = rs + imm.
pub fn addi(rt: Reg, rs: Reg, imm: i32) -> u32 {
    i_type(Opcode::Addi, rs, rt, imm)
}

/// `beq rs, rt, offset`; `offset` counts words from the branch itself.
pub fn beq(rs: Reg, rt: Reg, offset: i32) -> u32 {
    i_type(Opcode::Beq, rs, rt, offset)
}

/// `bne rs, rt, offset`; `offset` counts words from the branch itself.
pub fn bne(rs: Reg, rt: Reg, offset: i32) -> u32 {
    i_type(Opcode::Bne, rs, rt, offset)
}

/// `ld rt, offset(base)`
pub fn ld(rt: Reg, offset: i32, base: Reg) -> u32 {
    i_type(Opcode::Ld, base, rt, offset)
}

/// `st rt, offset(base)`
pub fn st(rt: Reg, offset: i32, base: Reg) -> u32 {
    i_type(Opcode::St, base, rt, offset)
}

/// `j target`; `target` is a word index within the current 4 KiB page.
pub fn j(target: u32) -> u32 {
    (u32::from(Opcode::J.bits()) << 26) | (target & 0x03FF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference encodings written out bit by bit.
    #[test]
    fn test_known_encodings() {
        assert_eq!(addi(reg(1), reg(0), 5), 0b10110100000000010000000000000101);
        assert_eq!(add(reg(3), reg(1), reg(2)), 0b00000000001000100001100000010010);
        assert_eq!(sub(reg(3), reg(1), reg(2)), 0b00000000001000100001100000110110);
        assert_eq!(sbit(reg(3), 5), 0b01110000011000000010100000000000);
        assert_eq!(bext(reg(3), reg(1), reg(2)), 0b00000000011000010001000000010100);
        assert_eq!(cls(reg(3), reg(1)), 0b00000000011000010000000000001010);
        assert_eq!(ssat(reg(3), reg(1), 3), 0b00110100011000010001100000000000);
        assert_eq!(st(reg(2), 0, reg(1)), 0b11011100001000100000000000000000);
        assert_eq!(ld(reg(4), 0, reg(3)), 0b11100100011001000000000000000000);
        assert_eq!(beq(reg(1), reg(2), 2), 0b01101000001000100000000000000010);
        assert_eq!(j(2), 0b01111100000000000000000000000010);
        assert_eq!(stp(reg(1), reg(2), 0, reg(4)), 0b01010100100000010001000000000000);
        assert_eq!(syscall(), 0b00000000000000000000000000101000);
    }

    #[test]
    fn test_negative_immediates_are_truncated() {
        assert_eq!(addi(reg(1), reg(1), -1) & 0xFFFF, 0xFFFF);
        assert_eq!(stp(reg(1), reg(2), -1, reg(3)) & 0x7FF, 0x7FF);
        assert_eq!(stp(reg(1), reg(2), -1, reg(3)) >> 11 & 0x1F, 2);
    }
}
