//! General-purpose register file.
//!
//! 32 registers of 32 bits each. Register 0 is hard-wired to zero:
//! reads always return 0 and writes are discarded.

use serde::{Deserialize, Serialize};

/// Number of general-purpose registers.
pub const NUM_REGISTERS: usize = 32;

/// Register holding the trap number for SYSCALL.
pub const TRAP_REG: u8 = 8;

/// Register used by PRINT_INT and READ_INT.
pub const RESULT_REG: u8 = 3;

/// The register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    gpr: [u32; NUM_REGISTERS],
}

impl Registers {
    /// Create a register file with every register zeroed.
    pub fn new() -> Self {
        Self {
            gpr: [0; NUM_REGISTERS],
        }
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.gpr = [0; NUM_REGISTERS];
    }

    /// Read a register. Only the low five bits of `index` are used.
    #[inline]
    pub fn read(&self, index: u8) -> u32 {
        self.gpr[(index & 0x1F) as usize]
    }

    /// Write a register. Writes to register 0 are discarded.
    #[inline]
    pub fn write(&mut self, index: u8, value: u32) {
        let index = (index & 0x1F) as usize;
        if index != 0 {
            self.gpr[index] = value;
        }
    }

    /// Read a register as a signed value.
    #[inline]
    pub fn read_signed(&self, index: u8) -> i32 {
        self.read(index) as i32
    }

    /// Snapshot of all 32 registers.
    pub fn as_array(&self) -> [u32; NUM_REGISTERS] {
        self.gpr
    }

    /// Registers holding a non-zero value, in index order.
    pub fn non_zero(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.gpr
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0)
            .map(|(i, &v)| (i as u8, v))
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_read_write() {
        let mut regs = Registers::new();
        regs.write(5, 0xCAFE);
        assert_eq!(regs.read(5), 0xCAFE);
        assert_eq!(regs.read(6), 0);
    }

    #[test]
    fn test_zero_register_is_hardwired() {
        let mut regs = Registers::new();
        regs.write(0, 123);
        assert_eq!(regs.read(0), 0);
    }

    #[test]
    fn test_read_signed() {
        let mut regs = Registers::new();
        regs.write(1, 0xFFFF_FFFB);
        assert_eq!(regs.read_signed(1), -5);
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers::new();
        regs.write(31, 1);
        regs.reset();
        assert_eq!(regs.as_array(), [0; NUM_REGISTERS]);
    }

    #[test]
    fn test_non_zero() {
        let mut regs = Registers::new();
        regs.write(2, 9);
        regs.write(7, 1);
        assert_eq!(regs.non_zero().collect::<Vec<_>>(), vec![(2, 9), (7, 1)]);
    }

    proptest! {
        #[test]
        fn prop_zero_register_ignores_writes(value: u32) {
            let mut regs = Registers::new();
            regs.write(0, value);
            prop_assert_eq!(regs.read(0), 0);
        }
    }
}
