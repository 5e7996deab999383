//! Quack memory subsystem.
//!
//! A flat byte-addressable memory of 4096 bytes, partitioned into four
//! fixed regions: code, data, memory-mapped I/O, and a downward-growing
//! stack. All accesses are bounds-checked; 16-bit words are little-endian.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Total number of addressable bytes.
pub const MEM_SIZE: usize = 4096;

/// Code region: program text is loaded here starting at address 0.
pub const CODE_START: u16 = 0x0000;
pub const CODE_END: u16 = 0x07FF;

/// Data region.
pub const DATA_START: u16 = 0x0800;
pub const DATA_END: u16 = 0x0BDF;

/// Memory-mapped I/O window. Reads and writes inside this window are
/// intercepted by the I/O device and never touch the backing array.
pub const IO_START: u16 = 0x0BE0;
pub const IO_END: u16 = 0x0BFF;

/// Stack region. The stack grows downward from one past `STACK_END`.
pub const STACK_START: u16 = 0x0C00;
pub const STACK_END: u16 = 0x0FFF;

/// Initial stack pointer: one past the top of the stack region.
pub const SP_INIT: u16 = STACK_END + 1;

/// Quack main memory: a bounds-checked byte array.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Create a new memory of the standard size, zero-filled.
    pub fn new() -> Self {
        Self::with_size(MEM_SIZE)
    }

    /// Create a memory with an explicit size.
    pub fn with_size(size: usize) -> Self {
        Self { bytes: vec![0; size] }
    }

    /// Number of addressable bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Read one byte.
    pub fn read8(&self, addr: u16) -> Result<u8, MemoryError> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or(MemoryError::OutOfBounds { addr })
    }

    /// Write one byte.
    pub fn write8(&mut self, addr: u16, value: u8) -> Result<(), MemoryError> {
        match self.bytes.get_mut(addr as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(MemoryError::OutOfBounds { addr }),
        }
    }

    /// Read a 16-bit little-endian word (low byte at `addr`).
    ///
    /// Both bytes must be in bounds; a word that would spill past the end
    /// of memory is rejected whole.
    pub fn read16(&self, addr: u16) -> Result<u16, MemoryError> {
        let hi_idx = addr as usize + 1;
        if hi_idx >= self.bytes.len() {
            return Err(MemoryError::OutOfBounds { addr });
        }
        let lo = self.bytes[addr as usize];
        let hi = self.bytes[hi_idx];
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Write a 16-bit little-endian word. No partial write on a bounds
    /// violation.
    pub fn write16(&mut self, addr: u16, value: u16) -> Result<(), MemoryError> {
        let hi_idx = addr as usize + 1;
        if hi_idx >= self.bytes.len() {
            return Err(MemoryError::OutOfBounds { addr });
        }
        let [lo, hi] = value.to_le_bytes();
        self.bytes[addr as usize] = lo;
        self.bytes[hi_idx] = hi;
        Ok(())
    }

    /// Reset all bytes to zero.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Load a program image at address 0.
    pub fn load_program(&mut self, image: &[u8]) -> Result<(), MemoryError> {
        if image.len() > self.bytes.len() {
            return Err(MemoryError::ProgramTooLarge {
                size: image.len(),
                capacity: self.bytes.len(),
            });
        }
        self.bytes[..image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Dump a range of memory (for debugging views).
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u8)> {
        let start = start as usize;
        let end = (start + count).min(self.bytes.len());
        (start..end).map(|a| (a as u16, self.bytes[a])).collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.bytes.iter().filter(|&&b| b != 0).count();
        f.debug_struct("Memory")
            .field("non_zero_bytes", &non_zero)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Access (or the high byte of a word access) falls outside memory.
    #[error("memory access out of bounds at 0x{addr:04X}")]
    OutOfBounds { addr: u16 },

    /// Program image does not fit in memory.
    #[error("program size {size} exceeds memory capacity {capacity}")]
    ProgramTooLarge { size: usize, capacity: usize },
}
