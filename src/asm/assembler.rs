//! Two-pass assembler.
//!
//! Syntax:
//! ```text
//! ; Comment (also `#`)
//! loop:                     ; Define a label
//!     addi r1, r0, 5        ; r1 = r0 + 5
//!     add  r3, r1, r2       ; r3 = r1 + r2
//!     ld   r4, 8(r3)        ; r4 = [r3 + 8]
//!     stp  r1, r2, 0(r4)    ; [r4] = r1, [r4 + 4] = r2
//!     bne  r4, r1, loop     ; branch offsets count from the branch itself
//!     j    done             ; page-local jump
//! done:
//!     syscall
//!
//!     .org 0x1100           ; Advance to an address, zero-filling
//!     .word 42              ; Emit a data word
//! ```

use crate::asm::encode::{self, Reg};
use crate::asm::image::DEFAULT_LOAD_ADDRESS;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code for the default load address.
pub fn assemble(source: &str) -> Result<Vec<u32>, AssemblerError> {
    assemble_at(source, DEFAULT_LOAD_ADDRESS)
}

/// Assemble source code for a program loaded at `origin`.
pub fn assemble_at(source: &str, origin: u32) -> Result<Vec<u32>, AssemblerError> {
    let mut asm = Assembler::new(origin);
    asm.assemble(source)
}

/// One word-sized item collected in the first pass.
#[derive(Debug)]
enum Item {
    /// `.word` directive or `.org` padding.
    Word(String),
    Instruction { mnemonic: String, operands: Vec<String> },
}

#[derive(Debug)]
struct Pending {
    addr: u32,
    line: usize,
    item: Item,
}

/// The assembler state.
struct Assembler {
    /// Address of the next word.
    current_addr: u32,
    /// Symbol table (label -> address).
    symbols: HashMap<String, u32>,
    /// Items in address order, encoded in pass 2.
    items: Vec<Pending>,
}

impl Assembler {
    fn new(origin: u32) -> Self {
        Self {
            current_addr: origin,
            symbols: HashMap::new(),
            items: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u32>, AssemblerError> {
        // Pass 1: collect labels and lay out words
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: encode with every label known
        self.items
            .iter()
            .map(|pending| self.encode(pending))
            .collect()
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let line = match line.find(|c: char| c == ';' || c == '#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        while let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim();
            if !is_identifier(label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label {:?}", label),
                });
            }
            if self.symbols.insert(label.to_string(), self.current_addr).is_some() {
                return Err(AssemblerError::DuplicateLabel {
                    line: line_num,
                    label: label.to_string(),
                });
            }
            line = line[colon_idx + 1..].trim();
        }

        if line.is_empty() {
            return Ok(());
        }

        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, rest)) => (m, rest.trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_lowercase();
        let operands: Vec<String> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(|s| s.trim().to_string()).collect()
        };

        match mnemonic.as_str() {
            ".org" => {
                let [addr] = expect_operands::<1>(&operands, line_num)?;
                let addr = parse_number(addr, line_num)?;
                let target = u32::try_from(addr)
                    .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value: addr })?;
                if target < self.current_addr || (target - self.current_addr) % 4 != 0 {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!(
                            ".org {:#x} must be a word boundary at or after {:#x}",
                            target, self.current_addr
                        ),
                    });
                }
                while self.current_addr < target {
                    self.push(line_num, Item::Word("0".into()));
                }
            }

            ".word" => {
                let [value] = expect_operands::<1>(&operands, line_num)?;
                self.push(line_num, Item::Word(value.to_string()));
            }

            _ => self.push(line_num, Item::Instruction { mnemonic, operands }),
        }

        Ok(())
    }

    fn push(&mut self, line: usize, item: Item) {
        self.items.push(Pending {
            addr: self.current_addr,
            line,
            item,
        });
        self.current_addr = self.current_addr.wrapping_add(4);
    }

    fn encode(&self, pending: &Pending) -> Result<u32, AssemblerError> {
        let line = pending.line;
        match &pending.item {
            Item::Word(value) => {
                let value = self.value(value, line)?;
                check_range(value, i64::from(i32::MIN), i64::from(u32::MAX), line)?;
                Ok(value as u32)
            }
            Item::Instruction { mnemonic, operands } => {
                self.encode_instruction(pending.addr, mnemonic, operands, line)
            }
        }
    }

    fn encode_instruction(
        &self,
        addr: u32,
        mnemonic: &str,
        operands: &[String],
        line: usize,
    ) -> Result<u32, AssemblerError> {
        let word = match mnemonic {
            "add" | "sub" => {
                let [rd, rs, rt] = expect_operands::<3>(operands, line)?;
                let (rd, rs, rt) = (parse_reg(rd, line)?, parse_reg(rs, line)?, parse_reg(rt, line)?);
                if mnemonic == "add" {
                    encode::add(rd, rs, rt)
                } else {
                    encode::sub(rd, rs, rt)
                }
            }

            "cls" => {
                let [rd, rs] = expect_operands::<2>(operands, line)?;
                encode::cls(parse_reg(rd, line)?, parse_reg(rs, line)?)
            }

            "bext" => {
                let [rd, rs, mask] = expect_operands::<3>(operands, line)?;
                encode::bext(parse_reg(rd, line)?, parse_reg(rs, line)?, parse_reg(mask, line)?)
            }

            "syscall" => {
                expect_operands::<0>(operands, line)?;
                encode::syscall()
            }

            "ssat" => {
                let [rd, rs, width] = expect_operands::<3>(operands, line)?;
                let width = check_range(parse_number(width, line)?, 0, 31, line)?;
                encode::ssat(parse_reg(rd, line)?, parse_reg(rs, line)?, width as u8)
            }

            "sbit" => {
                let [rd, shift] = expect_operands::<2>(operands, line)?;
                let shift = check_range(parse_number(shift, line)?, 0, 31, line)?;
                encode::sbit(parse_reg(rd, line)?, shift as u8)
            }

            "addi" => {
                let [rt, rs, imm] = expect_operands::<3>(operands, line)?;
                let imm = check_range(self.value(imm, line)?, -0x8000, 0xFFFF, line)?;
                encode::addi(parse_reg(rt, line)?, parse_reg(rs, line)?, imm as i32)
            }

            "beq" | "bne" => {
                let [rs, rt, target] = expect_operands::<3>(operands, line)?;
                let offset = match self.symbols.get(target.as_str()) {
                    Some(&label) => (i64::from(label) - i64::from(addr)) / 4,
                    None => self.value(target, line)?,
                };
                let offset = check_range(offset, -0x8000, 0x7FFF, line)? as i32;
                let (rs, rt) = (parse_reg(rs, line)?, parse_reg(rt, line)?);
                if mnemonic == "beq" {
                    encode::beq(rs, rt, offset)
                } else {
                    encode::bne(rs, rt, offset)
                }
            }

            "j" => {
                let [target] = expect_operands::<1>(operands, line)?;
                let index = match self.symbols.get(target.as_str()) {
                    Some(&label) => {
                        if label & 0xFFFF_F000 != addr & 0xFFFF_F000 {
                            return Err(AssemblerError::JumpOutOfPage {
                                line,
                                label: target.to_string(),
                            });
                        }
                        (label & 0xFFF) >> 2
                    }
                    None => check_range(self.value(target, line)?, 0, 0x03FF_FFFF, line)? as u32,
                };
                encode::j(index)
            }

            "ld" | "st" => {
                let [rt, mem] = expect_operands::<2>(operands, line)?;
                let (offset, base) = self.parse_mem_operand(mem, line)?;
                let offset = check_range(offset, -0x8000, 0x7FFF, line)? as i32;
                let rt = parse_reg(rt, line)?;
                if mnemonic == "ld" {
                    encode::ld(rt, offset, base)
                } else {
                    encode::st(rt, offset, base)
                }
            }

            "stp" => {
                let [first, second, mem] = expect_operands::<3>(operands, line)?;
                let (offset, base) = self.parse_mem_operand(mem, line)?;
                let offset = check_range(offset, -0x400, 0x3FF, line)? as i32;
                encode::stp(parse_reg(first, line)?, parse_reg(second, line)?, offset, base)
            }

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line,
                    mnemonic: mnemonic.to_string(),
                })
            }
        };

        Ok(word)
    }

    /// Parse `offset(rN)`. An empty offset means 0.
    fn parse_mem_operand(&self, operand: &str, line: usize) -> Result<(i64, Reg), AssemblerError> {
        let syntax_error = || AssemblerError::SyntaxError {
            line,
            message: format!("expected offset(register), found {:?}", operand),
        };

        let open = operand.find('(').ok_or_else(syntax_error)?;
        let inner = operand[open + 1..].strip_suffix(')').ok_or_else(syntax_error)?;
        let offset = operand[..open].trim();
        let offset = if offset.is_empty() { 0 } else { self.value(offset, line)? };

        Ok((offset, parse_reg(inner.trim(), line)?))
    }

    /// A number, or the address of a label.
    fn value(&self, operand: &str, line: usize) -> Result<i64, AssemblerError> {
        if let Some(&addr) = self.symbols.get(operand) {
            return Ok(i64::from(addr));
        }
        if is_identifier(operand) {
            return Err(AssemblerError::UndefinedLabel {
                line,
                label: operand.to_string(),
            });
        }
        parse_number(operand, line)
    }
}

fn expect_operands<const N: usize>(operands: &[String], line: usize) -> Result<[&String; N], AssemblerError> {
    let found: Vec<&String> = operands.iter().collect();
    found.try_into().map_err(|found: Vec<&String>| AssemblerError::SyntaxError {
        line,
        message: format!("expected {} operand(s), found {}", N, found.len()),
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_reg(operand: &str, line: usize) -> Result<Reg, AssemblerError> {
    let lower = operand.to_lowercase();
    if lower == "zero" {
        return Ok(Reg(0));
    }
    lower
        .strip_prefix('r')
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|&n| n < 32)
        .map(Reg)
        .ok_or_else(|| AssemblerError::SyntaxError {
            line,
            message: format!("invalid register {:?}", operand),
        })
}

fn parse_number(operand: &str, line: usize) -> Result<i64, AssemblerError> {
    let operand = operand.trim();
    let (negative, digits) = match operand.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, operand),
    };

    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2)
    } else {
        digits.parse::<i64>()
    };

    parsed
        .map(|v| if negative { -v } else { v })
        .map_err(|_| AssemblerError::SyntaxError {
            line,
            message: format!("invalid number {:?}", operand),
        })
}

fn check_range(value: i64, min: i64, max: i64, line: usize) -> Result<i64, AssemblerError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(AssemblerError::ValueOutOfRange { line, value })
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("jump target on line {line} is outside the current 4 KiB page: {label}")]
    JumpOutOfPage { line: usize, label: String },
}
