//! Flat byte-addressable memory.
//!
//! Memory is a fixed-capacity, zero-initialized byte store. Multi-byte
//! values are assembled byte by byte in little-endian order, so the
//! simulator behaves the same on every host. Memory only checks bounds;
//! alignment rules belong to the instructions that need them.

use thiserror::Error;

/// Default memory capacity: 64 KiB.
pub const DEFAULT_MEMORY_SIZE: usize = 64 * 1024;

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u32 {}
}

/// A value that can be moved in and out of memory.
///
/// Implemented for `u8` and `u32`, the two access widths of the architecture.
pub trait MemValue: Copy + sealed::Sealed {
    /// Width of the access in bytes.
    const SIZE: usize;

    fn from_le_slice(bytes: &[u8]) -> Self;
    fn write_le_slice(self, bytes: &mut [u8]);
}

impl MemValue for u8 {
    const SIZE: usize = 1;

    fn from_le_slice(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write_le_slice(self, bytes: &mut [u8]) {
        bytes[0] = self;
    }
}

impl MemValue for u32 {
    const SIZE: usize = 4;

    fn from_le_slice(bytes: &[u8]) -> Self {
        bytes
            .iter()
            .enumerate()
            .fold(0, |word, (i, &b)| word | (u32::from(b) << (8 * i)))
    }

    fn write_le_slice(self, bytes: &mut [u8]) {
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (self >> (8 * i)) as u8;
        }
    }
}

/// Simulated main memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Create a zeroed memory of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
        }
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Read a value of type `T` at `addr`.
    #[inline]
    pub fn read<T: MemValue>(&self, addr: u32) -> Result<T, MemoryError> {
        let range = self.checked_range(addr, T::SIZE)?;
        Ok(T::from_le_slice(&self.bytes[range]))
    }

    /// Write a value of type `T` at `addr`.
    #[inline]
    pub fn write<T: MemValue>(&mut self, addr: u32, value: T) -> Result<(), MemoryError> {
        let range = self.checked_range(addr, T::SIZE)?;
        value.write_le_slice(&mut self.bytes[range]);
        Ok(())
    }

    /// Bounds check for an access of `size` bytes at `addr`.
    fn checked_range(&self, addr: u32, size: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let start = addr as usize;
        match start.checked_add(size) {
            Some(end) if end <= self.bytes.len() => Ok(start..end),
            _ => Err(MemoryError::OutOfBounds {
                addr,
                size,
                capacity: self.bytes.len(),
            }),
        }
    }

    /// Load a program image of consecutive words starting at `addr`.
    pub fn load_words(&mut self, addr: u32, words: &[u32]) -> Result<(), MemoryError> {
        let needed = words.len() * 4;
        let available = self.bytes.len().saturating_sub(addr as usize);
        if needed > available {
            return Err(MemoryError::ProgramTooLarge {
                size: needed,
                available,
            });
        }

        for (i, &word) in words.iter().enumerate() {
            self.write(addr + (i as u32) * 4, word)?;
        }

        Ok(())
    }

    /// Words from `start` onward, stopping at `count` words or the end of memory.
    pub fn dump_words(&self, start: u32, count: usize) -> Vec<(u32, u32)> {
        (0..count as u32)
            .map_while(|i| {
                let addr = start.checked_add(i * 4)?;
                self.read::<u32>(addr).ok().map(|word| (addr, word))
            })
            .collect()
    }

    /// Zero every byte.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.bytes.iter().filter(|&&b| b != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_bytes", &non_zero)
            .field("capacity", &self.bytes.len())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Access runs past the end of memory.
    #[error("memory bounds violation: {size}-byte access at {addr:#010x} (capacity {capacity:#x})")]
    OutOfBounds { addr: u32, size: usize, capacity: usize },

    /// Program image does not fit at the requested address.
    #[error("program size {size} bytes exceeds available space {available} bytes")]
    ProgramTooLarge { size: usize, available: usize },
}
