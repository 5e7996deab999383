//! Program loader for `.duck` images.
//!
//! A `.duck` file is a flat sequence of raw instruction/data bytes, loaded
//! verbatim into memory starting at address 0. There is no header and no
//! relocation; the file length just must not exceed memory.

use crate::cpu::memory::MEM_SIZE;
use crate::cpu::decode::{Instruction, encode};
use std::path::Path;
use thiserror::Error;

/// A program image ready to be loaded at address 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// The raw bytes, exactly as they will appear in memory.
    pub bytes: Vec<u8>,
}

impl Program {
    /// Wrap raw bytes as a program image.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, LoaderError> {
        if bytes.len() > MEM_SIZE {
            return Err(LoaderError::TooLarge {
                size: bytes.len(),
                capacity: MEM_SIZE,
            });
        }
        Ok(Self { bytes })
    }

    /// Build an image from a sequence of instructions.
    pub fn from_instructions(instrs: &[Instruction]) -> Result<Self, LoaderError> {
        Self::from_bytes(instrs.iter().flat_map(encode).collect())
    }

    /// Image length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of 4-byte instruction slots the image occupies.
    pub fn instruction_slots(&self) -> usize {
        self.bytes.len().div_ceil(4)
    }
}

/// Load a `.duck` program from disk.
pub fn load_duck<P: AsRef<Path>>(path: P) -> Result<Program, LoaderError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| LoaderError::Io(e.to_string()))?;
    Program::from_bytes(bytes)
}

/// Save a program image to disk.
pub fn save_duck<P: AsRef<Path>>(path: P, program: &Program) -> Result<(), LoaderError> {
    std::fs::write(path.as_ref(), &program.bytes)
        .map_err(|e| LoaderError::Io(e.to_string()))
}

/// Errors that can occur while loading a program file.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("program size {size} exceeds memory capacity {capacity}")]
    TooLarge { size: usize, capacity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::Reg;

    #[test]
    fn test_from_instructions_packs_four_bytes_each() {
        let program = Program::from_instructions(&[
            Instruction::Irmovw { dst: Reg::new(0).unwrap(), imm: 1 },
            Instruction::Halt,
        ])
        .unwrap();

        assert_eq!(program.len(), 8);
        assert_eq!(program.instruction_slots(), 2);
    }

    #[test]
    fn test_oversized_image_rejected() {
        let err = Program::from_bytes(vec![0; MEM_SIZE + 1]).unwrap_err();
        assert!(matches!(err, LoaderError::TooLarge { .. }));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(
            load_duck("/nonexistent/nowhere.duck"),
            Err(LoaderError::Io(_))
        ));
    }
}
