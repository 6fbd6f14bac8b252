//! Execution engine.
//!
//! Implements the fetch-decode-execute cycle, the instruction handlers and
//! the SYSCALL trap handler.

use crate::cpu::console::{Console, Diagnostic};
use crate::cpu::decode::{Fields, Funct, Opcode};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{Registers, RESULT_REG, TRAP_REG};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trap numbers understood by SYSCALL.
pub mod trap {
    pub const EXIT: u32 = 0;
    pub const PRINT_INT: u32 = 1;
    /// Reserved, not implemented.
    pub const PRINT_STR: u32 = 2;
    pub const READ_INT: u32 = 3;
    /// Reserved, not implemented.
    pub const READ_STR: u32 = 4;
}

/// How a call to [`Machine::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// The program halted after `steps` instructions.
    Halted { steps: u64 },
    /// The step budget ran out after `steps` instructions.
    StepLimit { steps: u64 },
}

impl RunOutcome {
    /// Instructions retired during the run.
    pub fn steps(&self) -> u64 {
        match *self {
            RunOutcome::Halted { steps } | RunOutcome::StepLimit { steps } => steps,
        }
    }
}

/// Serializable view of the architectural state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub pc: u32,
    pub halted: bool,
    pub steps: u64,
    pub registers: Registers,
}

/// A simulated machine: registers, memory, program counter and halt flag.
pub struct Machine<C: Console> {
    /// General-purpose registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    pc: u32,
    halted: bool,
    branched: bool,
    steps: u64,
    console: C,
}

impl<C: Console> Machine<C> {
    /// Create a machine with `memory_size` bytes of zeroed memory.
    pub fn new(memory_size: usize, console: C) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(memory_size),
            pc: 0,
            halted: false,
            branched: false,
            steps: 0,
            console,
        }
    }

    /// Reset PC, registers and the halt flag. Memory is left untouched.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.pc = 0;
        self.halted = false;
        self.branched = false;
        self.steps = 0;
    }

    /// Copy a program image to `addr` and point the PC at it.
    pub fn load_program(&mut self, addr: u32, words: &[u32]) -> Result<(), MemoryError> {
        self.mem.load_words(addr, words)?;
        self.pc = addr;
        Ok(())
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Instructions retired since construction or the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            pc: self.pc,
            halted: self.halted,
            steps: self.steps,
            registers: self.regs.clone(),
        }
    }

    /// Execute a single instruction.
    ///
    /// Returns the decoded fields of the instruction that ran. A fetch or
    /// data access outside memory is returned as an error and leaves the PC
    /// on the faulting instruction.
    pub fn step(&mut self) -> Result<Fields, CpuError> {
        if self.halted {
            return Err(CpuError::Halted);
        }

        let pc = self.pc;
        let raw = self.mem.read::<u32>(pc)?;
        let fields = Fields::decode(raw);
        tracing::trace!(pc = format_args!("{:#010x}", pc), raw = format_args!("{:#010x}", raw), "step");

        self.branched = false;
        self.execute(pc, &fields)?;

        if !self.branched {
            self.pc = self.pc.wrapping_add(4);
        }
        self.steps += 1;

        Ok(fields)
    }

    /// Run until the machine halts or `max_steps` instructions have run.
    ///
    /// Running out of steps is not an error. Memory faults end the run.
    pub fn run(&mut self, max_steps: u64) -> Result<RunOutcome, CpuError> {
        let mut executed = 0;

        while executed < max_steps {
            if self.halted {
                break;
            }
            self.step()?;
            executed += 1;
        }

        let outcome = if self.halted {
            RunOutcome::Halted { steps: executed }
        } else {
            RunOutcome::StepLimit { steps: executed }
        };
        tracing::debug!(?outcome, pc = format_args!("{:#010x}", self.pc), "run finished");

        Ok(outcome)
    }

    /// Dispatch a decoded instruction to its handler.
    fn execute(&mut self, pc: u32, f: &Fields) -> Result<(), CpuError> {
        let Some(opcode) = Opcode::from_bits(f.opcode) else {
            self.diagnose(Diagnostic::UnknownOpcode { pc, opcode: f.opcode });
            return Ok(());
        };

        match opcode {
            Opcode::RFormat => self.execute_r_format(pc, f)?,

            Opcode::Ssat => {
                let value = self.regs.read_signed(f.rb);
                self.regs.write(f.ra, saturate(value, f.rc) as u32);
            }

            Opcode::Stp => {
                let addr = self.regs.read(f.ra).wrapping_add(f.offset11 as u32);
                self.mem.write(addr, self.regs.read(f.rb))?;
                self.mem.write(addr.wrapping_add(4), self.regs.read(f.rc))?;
            }

            Opcode::Bne => {
                if self.regs.read(f.ra) != self.regs.read(f.rb) {
                    self.branch_relative(pc, f.imm16);
                }
            }

            Opcode::Beq => {
                if self.regs.read(f.ra) == self.regs.read(f.rb) {
                    self.branch_relative(pc, f.imm16);
                }
            }

            Opcode::Sbit => {
                self.regs.write(f.ra, 1u32 << f.rc);
            }

            Opcode::J => {
                let target = (pc & 0xFFFF_F000) | (f.target26 << 2);
                self.redirect(target);
            }

            Opcode::Addi => {
                let value = self.regs.read(f.ra).wrapping_add(f.imm16 as u32);
                self.regs.write(f.rb, value);
            }

            Opcode::St => {
                let addr = self.regs.read(f.ra).wrapping_add(f.imm16 as u32);
                // Misaligned ST is dropped without a fault.
                if addr & 0x3 == 0 {
                    self.mem.write(addr, self.regs.read(f.rb))?;
                } else {
                    tracing::trace!(addr = format_args!("{:#010x}", addr), "misaligned st skipped");
                }
            }

            Opcode::Ld => {
                let addr = self.regs.read(f.ra).wrapping_add(f.imm16 as u32);
                let value = self.mem.read::<u32>(addr)?;
                self.regs.write(f.rb, value);
            }
        }

        Ok(())
    }

    fn execute_r_format(&mut self, pc: u32, f: &Fields) -> Result<(), CpuError> {
        let Some(funct) = Funct::from_bits(f.funct) else {
            self.diagnose(Diagnostic::UnknownFunct { pc, funct: f.funct });
            return Ok(());
        };

        match funct {
            Funct::Cls => {
                let count = count_leading_signs(self.regs.read(f.rb));
                self.regs.write(f.ra, count);
            }

            Funct::Add => {
                let value = self.regs.read(f.ra).wrapping_add(self.regs.read(f.rb));
                self.regs.write(f.rc, value);
            }

            Funct::Bext => {
                let value = bit_extract(self.regs.read(f.rb), self.regs.read(f.rc));
                self.regs.write(f.ra, value);
            }

            Funct::Syscall => self.syscall(pc),

            Funct::Sub => {
                let value = self.regs.read(f.ra).wrapping_sub(self.regs.read(f.rb));
                self.regs.write(f.rc, value);
            }
        }

        Ok(())
    }

    /// Trap handler. The trap number is taken from [`TRAP_REG`].
    fn syscall(&mut self, pc: u32) {
        let number = self.regs.read(TRAP_REG);
        tracing::debug!(number, pc = format_args!("{:#010x}", pc), "syscall");

        match number {
            trap::EXIT => {
                self.halted = true;
            }

            trap::PRINT_INT => {
                let value = self.regs.read_signed(RESULT_REG);
                if let Err(e) = self.console.print_int(value) {
                    self.diagnose(Diagnostic::OutputFailed { pc, reason: e.to_string() });
                }
                self.regs.write(RESULT_REG, 0);
            }

            trap::READ_INT => {
                let value = match self.console.read_int() {
                    Ok(value) => value,
                    Err(e) => {
                        self.diagnose(Diagnostic::BadInput { pc, reason: e.to_string() });
                        0
                    }
                };
                self.regs.write(RESULT_REG, value as u32);
            }

            _ => {
                self.diagnose(Diagnostic::UnknownTrap { pc, number });
                self.halted = true;
            }
        }
    }

    /// Branch relative to the branch instruction itself.
    fn branch_relative(&mut self, pc: u32, word_offset: i32) {
        let target = pc.wrapping_add((word_offset as u32) << 2);
        self.redirect(target);
    }

    fn redirect(&mut self, target: u32) {
        tracing::debug!(
            from = format_args!("{:#010x}", self.pc),
            to = format_args!("{:#010x}", target),
            "redirect"
        );
        self.pc = target;
        self.branched = true;
    }

    fn diagnose(&mut self, diag: Diagnostic) {
        self.console.diagnostic(&diag);
    }
}

impl<C: Console + Default> Default for Machine<C> {
    fn default() -> Self {
        Self::new(crate::cpu::memory::DEFAULT_MEMORY_SIZE, C::default())
    }
}

impl<C: Console> std::fmt::Debug for Machine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("pc", &format_args!("{:#010x}", self.pc))
            .field("halted", &self.halted)
            .field("steps", &self.steps)
            .field("regs", &self.regs)
            .field("mem", &self.mem)
            .finish()
    }
}

/// Clamp `value` into the range of a `width`-bit signed integer.
///
/// A width of 0, or wider than 31 bits, yields 0.
pub fn saturate(value: i32, width: u8) -> i32 {
    if width == 0 || width > 31 {
        return 0;
    }
    let max = (1i32 << (width - 1)) - 1;
    let min = -(1i32 << (width - 1));
    value.clamp(min, max)
}

/// Number of bits, starting at bit 31, equal to the sign bit before the
/// first one that differs. Ranges over 0..=32.
pub fn count_leading_signs(value: u32) -> u32 {
    if value & 0x8000_0000 != 0 {
        value.leading_ones()
    } else {
        value.leading_zeros()
    }
}

/// Gather the bits of `src` selected by `mask` into the low bits of the
/// result, in ascending bit order.
pub fn bit_extract(src: u32, mask: u32) -> u32 {
    let mut result = 0;
    let mut next = 0;
    for bit in 0..32 {
        if mask & (1 << bit) != 0 {
            if src & (1 << bit) != 0 {
                result |= 1 << next;
            }
            next += 1;
        }
    }
    result
}

/// Errors that end execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("machine is halted")]
    Halted,

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::encode::{self, reg};
    use crate::cpu::console::BufferConsole;
    use proptest::prelude::*;

    const BASE: u32 = 0x1000;

    fn machine_with(program: &[u32]) -> Machine<BufferConsole> {
        machine_with_input(program, std::iter::empty())
    }

    fn machine_with_input(
        program: &[u32],
        input: impl IntoIterator<Item = i32>,
    ) -> Machine<BufferConsole> {
        let mut m = Machine::new(64 * 1024, BufferConsole::with_input(input));
        m.load_program(BASE, program).unwrap();
        m
    }

    fn exit() -> [u32; 2] {
        [encode::addi(reg(8), reg(0), 0), encode::syscall()]
    }

    fn with_exit(body: &[u32]) -> Vec<u32> {
        let mut program = body.to_vec();
        program.extend_from_slice(&exit());
        program
    }

    #[test]
    fn test_addi_add_sub() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 5),
            encode::addi(reg(2), reg(0), 3),
            encode::add(reg(3), reg(1), reg(2)),
            encode::sub(reg(4), reg(1), reg(2)),
        ]));

        let outcome = m.run(100).unwrap();

        assert_eq!(outcome, RunOutcome::Halted { steps: 6 });
        assert_eq!(m.regs.read(3), 8);
        assert_eq!(m.regs.read(4), 2);
    }

    #[test]
    fn test_arithmetic_wraps() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), -1),
            encode::addi(reg(2), reg(1), 1),
            encode::sub(reg(3), reg(0), reg(1)),
            encode::add(reg(4), reg(1), reg(1)),
        ]));

        m.run(100).unwrap();

        assert_eq!(m.regs.read(1), 0xFFFF_FFFF);
        assert_eq!(m.regs.read(2), 0);
        assert_eq!(m.regs.read(3), 1);
        assert_eq!(m.regs.read(4), 0xFFFF_FFFE);
    }

    #[test]
    fn test_beq_skips_one() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 5),
            encode::addi(reg(2), reg(0), 5),
            encode::beq(reg(1), reg(2), 2),
            encode::addi(reg(3), reg(0), 0),
            encode::addi(reg(3), reg(0), 15),
        ]));

        m.run(100).unwrap();

        assert!(m.is_halted());
        assert_eq!(m.regs.read(3), 15);
    }

    #[test]
    fn test_bne_not_taken_falls_through() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 3),
            encode::bne(reg(1), reg(1), 2),
            encode::addi(reg(3), reg(0), 4),
        ]));

        m.run(100).unwrap();

        assert_eq!(m.regs.read(3), 4);
    }

    #[test]
    fn test_backward_branch_loop() {
        // r1 counts down from 3; r2 counts iterations.
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 3),
            encode::addi(reg(2), reg(2), 1),
            encode::addi(reg(1), reg(1), -1),
            encode::bne(reg(1), reg(0), -2),
        ]));

        m.run(100).unwrap();

        assert_eq!(m.regs.read(2), 3);
    }

    #[test]
    fn test_jump_skips_instruction() {
        let mut m = machine_with(&[
            encode::j(2),
            encode::addi(reg(3), reg(0), 7),
            encode::addi(reg(3), reg(3), 42),
            encode::addi(reg(8), reg(0), 0),
            encode::syscall(),
        ]);

        m.run(100).unwrap();

        assert!(m.is_halted());
        assert_eq!(m.regs.read(3), 42);
    }

    #[test]
    fn test_jump_stays_in_page() {
        let mut m = Machine::new(0x4000, BufferConsole::new());
        m.load_program(0x2FFC, &[encode::j(1)]).unwrap();

        m.step().unwrap();

        assert_eq!(m.pc(), 0x2004);
    }

    #[test]
    fn test_sbit() {
        let mut m = machine_with(&with_exit(&[encode::sbit(reg(3), 5), encode::sbit(reg(4), 31)]));
        m.run(100).unwrap();
        assert_eq!(m.regs.read(3), 32);
        assert_eq!(m.regs.read(4), 0x8000_0000);
    }

    #[test]
    fn test_bext_program() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 0xEA),
            encode::addi(reg(2), reg(0), 0x34),
            encode::bext(reg(3), reg(1), reg(2)),
        ]));
        m.run(100).unwrap();
        assert_eq!(m.regs.read(3), 4);
    }

    #[test]
    fn test_cls_program() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 0xF0),
            encode::cls(reg(3), reg(1)),
        ]));
        m.run(100).unwrap();
        assert_eq!(m.regs.read(3), 24);
    }

    #[test]
    fn test_ssat_program() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 31),
            encode::ssat(reg(3), reg(1), 3),
            encode::addi(reg(2), reg(0), -5),
            encode::ssat(reg(4), reg(2), 3),
        ]));
        m.run(100).unwrap();
        assert_eq!(m.regs.read(3), 3);
        assert_eq!(m.regs.read_signed(4), -4);
    }

    #[test]
    fn test_st_ld_roundtrip() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 0x20),
            encode::addi(reg(2), reg(0), 42),
            encode::st(reg(2), 0, reg(1)),
            encode::addi(reg(5), reg(0), 0x10),
            encode::ld(reg(3), 0x10, reg(5)),
        ]));

        m.run(100).unwrap();

        assert_eq!(m.mem.read::<u32>(0x20).unwrap(), 42);
        assert_eq!(m.regs.read(3), 42);
    }

    #[test]
    fn test_misaligned_st_is_skipped() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 0x22),
            encode::addi(reg(2), reg(0), 99),
            encode::st(reg(2), 0, reg(1)),
            encode::addi(reg(4), reg(0), 1),
        ]));

        let outcome = m.run(100).unwrap();

        assert_eq!(outcome, RunOutcome::Halted { steps: 6 });
        assert_eq!(m.mem.read::<u32>(0x20).unwrap(), 0);
        assert_eq!(m.mem.read::<u32>(0x24).unwrap(), 0);
        assert_eq!(m.regs.read(4), 1);
        assert!(m.console().diagnostics.is_empty());
    }

    #[test]
    fn test_stp_ld_roundtrip() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 0x2A),
            encode::addi(reg(2), reg(0), 0x1F),
            encode::addi(reg(4), reg(0), 0x800),
            encode::stp(reg(1), reg(2), 0, reg(4)),
            encode::ld(reg(3), 0, reg(4)),
            encode::ld(reg(5), 4, reg(4)),
        ]));

        m.run(100).unwrap();

        assert_eq!(m.regs.read(3), 0x2A);
        assert_eq!(m.regs.read(5), 0x1F);
    }

    #[test]
    fn test_stp_negative_offset_and_no_alignment_check() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 7),
            encode::addi(reg(4), reg(0), 0x803),
            encode::stp(reg(1), reg(1), -2, reg(4)),
        ]));

        m.run(100).unwrap();

        assert_eq!(m.mem.read::<u32>(0x801).unwrap(), 7);
        assert_eq!(m.mem.read::<u32>(0x805).unwrap(), 7);
    }

    #[test]
    fn test_zero_register_destinations() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 9),
            encode::addi(reg(0), reg(1), 5),
            encode::add(reg(0), reg(1), reg(1)),
            encode::sbit(reg(0), 3),
            encode::cls(reg(0), reg(1)),
            encode::ld(reg(0), 0, reg(0)),
        ]));

        m.run(100).unwrap();

        assert_eq!(m.regs.read(0), 0);
    }

    #[test]
    fn test_unknown_opcode_continues() {
        let mut m = machine_with(&with_exit(&[0xFC00_0000, encode::addi(reg(3), reg(0), 1)]));

        let outcome = m.run(100).unwrap();

        assert_eq!(outcome, RunOutcome::Halted { steps: 4 });
        assert_eq!(m.regs.read(3), 1);
        assert_eq!(
            m.console().diagnostics,
            vec![Diagnostic::UnknownOpcode { pc: BASE, opcode: 0x3F }]
        );
    }

    #[test]
    fn test_unknown_funct_continues() {
        let mut m = machine_with(&with_exit(&[0x0000_0001, encode::addi(reg(3), reg(0), 1)]));

        m.run(100).unwrap();

        assert!(m.is_halted());
        assert_eq!(m.regs.read(3), 1);
        assert_eq!(
            m.console().diagnostics,
            vec![Diagnostic::UnknownFunct { pc: BASE, funct: 1 }]
        );
    }

    #[test]
    fn test_unknown_trap_halts() {
        let mut m = machine_with(&[
            encode::addi(reg(8), reg(0), 2),
            encode::syscall(),
            encode::addi(reg(3), reg(0), 1),
        ]);

        let outcome = m.run(100).unwrap();

        assert_eq!(outcome, RunOutcome::Halted { steps: 2 });
        assert_eq!(m.regs.read(3), 0);
        assert_eq!(
            m.console().diagnostics,
            vec![Diagnostic::UnknownTrap { pc: BASE + 4, number: 2 }]
        );
    }

    #[test]
    fn test_print_int_clears_result_register() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(8), reg(0), 1),
            encode::addi(reg(3), reg(0), -7),
            encode::syscall(),
        ]));

        m.run(100).unwrap();

        assert_eq!(m.console().output, vec![-7]);
        assert_eq!(m.regs.read(3), 0);
    }

    #[test]
    fn test_read_int() {
        let mut m = machine_with_input(
            &with_exit(&[encode::addi(reg(8), reg(0), 3), encode::syscall()]),
            [1234],
        );

        m.run(100).unwrap();

        assert_eq!(m.regs.read(3), 1234);
    }

    #[test]
    fn test_read_int_without_input_yields_zero() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(3), reg(0), 5),
            encode::addi(reg(8), reg(0), 3),
            encode::syscall(),
        ]));

        m.run(100).unwrap();

        assert!(m.is_halted());
        assert_eq!(m.regs.read(3), 0);
        assert!(matches!(
            m.console().diagnostics.as_slice(),
            [Diagnostic::BadInput { .. }]
        ));
    }

    #[test]
    fn test_step_limit_truncates() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), 1),
            encode::addi(reg(2), reg(0), 2),
            encode::addi(reg(3), reg(0), 3),
        ]));

        let outcome = m.run(2).unwrap();

        assert_eq!(outcome, RunOutcome::StepLimit { steps: 2 });
        assert!(!m.is_halted());
        assert_eq!(m.regs.read(2), 2);
        assert_eq!(m.regs.read(3), 0);
        assert_eq!(m.pc(), BASE + 8);
    }

    #[test]
    fn test_fetch_out_of_bounds_faults() {
        let mut m = Machine::new(16, BufferConsole::new());
        m.set_pc(16);

        assert_eq!(
            m.run(10),
            Err(CpuError::Memory(MemoryError::OutOfBounds { addr: 16, size: 4, capacity: 16 }))
        );
        assert_eq!(m.pc(), 16);
    }

    #[test]
    fn test_load_out_of_bounds_faults() {
        let mut m = machine_with(&with_exit(&[
            encode::addi(reg(1), reg(0), -4),
            encode::ld(reg(2), 0, reg(1)),
        ]));

        let err = m.run(100).unwrap_err();

        assert!(matches!(
            err,
            CpuError::Memory(MemoryError::OutOfBounds { addr: 0xFFFF_FFFC, size: 4, .. })
        ));
        assert_eq!(m.pc(), BASE + 4);
    }

    #[test]
    fn test_stp_second_word_out_of_bounds_faults() {
        let mut m = Machine::new(0x2000, BufferConsole::new());
        m.load_program(0x1000, &with_exit(&[
            encode::addi(reg(4), reg(0), 0x1FFC),
            encode::stp(reg(1), reg(1), 0, reg(4)),
        ]))
        .unwrap();

        assert!(m.run(10).is_err());
    }

    #[test]
    fn test_step_after_halt() {
        let mut m = machine_with(&exit());
        m.run(10).unwrap();

        assert_eq!(m.step(), Err(CpuError::Halted));
        assert_eq!(m.run(10), Ok(RunOutcome::Halted { steps: 0 }));
    }

    #[test]
    fn test_reset_keeps_memory() {
        let mut m = machine_with(&with_exit(&[encode::addi(reg(1), reg(0), 1)]));
        m.run(10).unwrap();

        m.reset();

        assert_eq!(m.pc(), 0);
        assert!(!m.is_halted());
        assert_eq!(m.regs.read(1), 0);
        assert_eq!(m.steps(), 0);
        assert_eq!(m.mem.read::<u32>(BASE).unwrap(), encode::addi(reg(1), reg(0), 1));
    }

    #[test]
    fn test_snapshot() {
        let mut m = machine_with(&with_exit(&[encode::addi(reg(7), reg(0), 70)]));
        m.run(10).unwrap();

        let snap = m.snapshot();
        assert!(snap.halted);
        assert_eq!(snap.steps, 3);
        assert_eq!(snap.registers.read(7), 70);
    }

    #[test]
    fn test_saturate() {
        assert_eq!(saturate(31, 3), 3);
        assert_eq!(saturate(-5, 3), -4);
        assert_eq!(saturate(2, 3), 2);
        assert_eq!(saturate(i32::MIN, 31), -(1 << 30));
        assert_eq!(saturate(12345, 0), 0);
        assert_eq!(saturate(12345, 32), 0);
        assert_eq!(saturate(-1, 1), -1);
        assert_eq!(saturate(1, 1), 0);
    }

    #[test]
    fn test_count_leading_signs() {
        assert_eq!(count_leading_signs(0), 32);
        assert_eq!(count_leading_signs(0xFFFF_FFFF), 32);
        assert_eq!(count_leading_signs(0x7FFF_FFFF), 1);
        assert_eq!(count_leading_signs(0x8000_0000), 1);
        assert_eq!(count_leading_signs(0xF0), 24);
    }

    #[test]
    fn test_bit_extract() {
        assert_eq!(bit_extract(0xEA, 0x34), 0b100);
        assert_eq!(bit_extract(0xFFFF_FFFF, 0), 0);
        assert_eq!(bit_extract(0x8000_0001, 0x8000_0001), 0b11);
    }

    #[test]
    fn test_fibonacci_demo() {
        let program = crate::asm::assemble(include_str!("../../demos/fibonacci.asm")).unwrap();
        for (n, expected) in [(0, 0), (1, 1), (2, 1), (10, 55), (20, 6765)] {
            let mut m = machine_with_input(&program, [n]);
            let outcome = m.run(1000).unwrap();
            assert!(matches!(outcome, RunOutcome::Halted { .. }));
            assert_eq!(m.console().output, vec![expected]);
        }
    }

    proptest! {
        #[test]
        fn prop_cls_in_range(value: u32) {
            let count = count_leading_signs(value);
            prop_assert!((1..=32).contains(&count));
        }

        #[test]
        fn prop_bext_zero_mask(src: u32) {
            prop_assert_eq!(bit_extract(src, 0), 0);
        }

        #[test]
        fn prop_bext_full_mask_is_identity(src: u32) {
            prop_assert_eq!(bit_extract(src, u32::MAX), src);
        }

        #[test]
        fn prop_ssat_within_width(value: i32, width in 1u8..=31) {
            let result = saturate(value, width);
            let bound = 1i64 << (width - 1);
            prop_assert!(i64::from(result) >= -bound && i64::from(result) < bound);
        }

        #[test]
        fn prop_zero_register_stays_zero(raw in any::<u32>().prop_filter(
            "skip syscalls",
            |raw| !(*raw >> 26 == 0 && *raw & 0x3F == u32::from(Funct::Syscall.bits())),
        )) {
            let mut m = Machine::new(0x1000, BufferConsole::new());
            m.mem.write::<u32>(0, raw).unwrap();
            let _ = m.step();
            prop_assert_eq!(m.regs.read(0), 0);
        }
    }
}
