//! Disassembler.
//!
//! Converts instruction words back to the assembler's syntax.

use crate::cpu::decode::{Fields, Funct, Opcode};

/// Disassemble a single instruction word.
pub fn disassemble_instruction(raw: u32) -> String {
    format_fields(&Fields::decode(raw))
}

/// Disassemble consecutive words loaded at `base`.
pub fn disassemble(words: &[u32], base: u32) -> String {
    let mut output = String::new();
    output.push_str("; sim32 disassembly\n");
    output.push_str("; -----------------\n\n");

    for (i, &raw) in words.iter().enumerate() {
        let addr = base.wrapping_add(i as u32 * 4);
        output.push_str(&format!(
            "{:08x}:  {:08x}  {}\n",
            addr,
            raw,
            disassemble_instruction(raw)
        ));
    }

    output
}

/// Format decoded fields as assembly text.
fn format_fields(f: &Fields) -> String {
    let Some(opcode) = Opcode::from_bits(f.opcode) else {
        return unknown(f.raw);
    };

    match opcode {
        Opcode::RFormat => match Funct::from_bits(f.funct) {
            Some(Funct::Cls) => format!("cls r{}, r{}", f.ra, f.rb),
            Some(Funct::Add) => format!("add r{}, r{}, r{}", f.rc, f.ra, f.rb),
            Some(Funct::Sub) => format!("sub r{}, r{}, r{}", f.rc, f.ra, f.rb),
            Some(Funct::Bext) => format!("bext r{}, r{}, r{}", f.ra, f.rb, f.rc),
            Some(Funct::Syscall) => "syscall".to_string(),
            None => unknown(f.raw),
        },
        Opcode::Ssat => format!("ssat r{}, r{}, {}", f.ra, f.rb, f.rc),
        Opcode::Sbit => format!("sbit r{}, {}", f.ra, f.rc),
        Opcode::Stp => format!("stp r{}, r{}, {}(r{})", f.rb, f.rc, f.offset11, f.ra),
        Opcode::Addi => format!("addi r{}, r{}, {}", f.rb, f.ra, f.imm16),
        Opcode::Beq | Opcode::Bne => {
            format!("{} r{}, r{}, {}", opcode.mnemonic(), f.ra, f.rb, f.imm16)
        }
        Opcode::J => format!("j {}", f.target26),
        Opcode::Ld | Opcode::St => {
            format!("{} r{}, {}(r{})", opcode.mnemonic(), f.rb, f.imm16, f.ra)
        }
    }
}

fn unknown(raw: u32) -> String {
    format!(".word {:#010x}", raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::encode::{self, reg};

    #[test]
    fn test_disassemble_r_format() {
        assert_eq!(disassemble_instruction(encode::add(reg(3), reg(1), reg(2))), "add r3, r1, r2");
        assert_eq!(disassemble_instruction(encode::sub(reg(4), reg(2), reg(1))), "sub r4, r2, r1");
        assert_eq!(disassemble_instruction(encode::cls(reg(3), reg(1))), "cls r3, r1");
        assert_eq!(disassemble_instruction(encode::bext(reg(3), reg(1), reg(2))), "bext r3, r1, r2");
        assert_eq!(disassemble_instruction(encode::syscall()), "syscall");
    }

    #[test]
    fn test_disassemble_immediates() {
        assert_eq!(disassemble_instruction(encode::addi(reg(1), reg(0), -5)), "addi r1, r0, -5");
        assert_eq!(disassemble_instruction(encode::ld(reg(4), 8, reg(3))), "ld r4, 8(r3)");
        assert_eq!(disassemble_instruction(encode::st(reg(2), -4, reg(1))), "st r2, -4(r1)");
        assert_eq!(
            disassemble_instruction(encode::stp(reg(1), reg(2), -8, reg(4))),
            "stp r1, r2, -8(r4)"
        );
        assert_eq!(disassemble_instruction(encode::bne(reg(4), reg(1), -5)), "bne r4, r1, -5");
        assert_eq!(disassemble_instruction(encode::j(15)), "j 15");
        assert_eq!(disassemble_instruction(encode::ssat(reg(3), reg(1), 3)), "ssat r3, r1, 3");
        assert_eq!(disassemble_instruction(encode::sbit(reg(3), 5)), "sbit r3, 5");
    }

    #[test]
    fn test_disassemble_unknown() {
        assert_eq!(disassemble_instruction(0xFC00_0000), ".word 0xfc000000");
        assert_eq!(disassemble_instruction(0x0000_0001), ".word 0x00000001");
    }

    #[test]
    fn test_disassemble_listing() {
        let listing = disassemble(&[encode::syscall()], 0x1000);
        assert!(listing.contains("00001000:  00000028  syscall"));
    }
}
