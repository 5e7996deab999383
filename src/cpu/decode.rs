//! Instruction decoder for the Quack machine.
//!
//! Every instruction is exactly 4 bytes:
//!
//! ```text
//! byte0: opcode
//! byte1: ra       (register operand, 0..=3)
//! byte2: b2       (second register operand, or low byte of imm16)
//! byte3: b3       (8-bit immediate, or high byte of imm16)
//! ```
//!
//! Decoding produces a closed [`Instruction`] enum; each variant is handled
//! by exactly one execution arm, so an instruction can never bleed into the
//! effects of another. Unknown opcodes and out-of-range register operands
//! are decode errors, never silently skipped.

use crate::cpu::registers::Reg;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A raw, undecoded 4-byte instruction as fetched from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInstr {
    pub op: u8,
    pub ra: u8,
    pub b2: u8,
    pub b3: u8,
}

impl RawInstr {
    /// Assemble from the four bytes at the program counter.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            op: bytes[0],
            ra: bytes[1],
            b2: bytes[2],
            b3: bytes[3],
        }
    }

    /// The combined 16-bit immediate (b2 = low byte, b3 = high byte).
    pub fn imm16(&self) -> u16 {
        u16::from_le_bytes([self.b2, self.b3])
    }
}

/// Opcode byte values.
struct Opcode;

impl Opcode {
    // Data movement
    const RRMOVW: u8 = 0x01;
    const IRMOVB: u8 = 0x02;
    const MRMOVW: u8 = 0x03;
    const RMMOVW: u8 = 0x04;
    const IRMOVW: u8 = 0x05;

    // Byte loads/stores
    const MRMOVB: u8 = 0x06;
    const RMMOVB: u8 = 0x07;
    const MRMOVBR: u8 = 0x08;
    const RMMOVBR: u8 = 0x09;

    // ALU
    const ADDW: u8 = 0x10;
    const SUBW: u8 = 0x11;
    const CMPW: u8 = 0x15;

    // Control flow
    const JMP: u8 = 0x20;
    const JE: u8 = 0x21;
    const JNE: u8 = 0x22;
    const HALT: u8 = 0x23;

    // Stack / procedures
    const PUSHW: u8 = 0x30;
    const POPW: u8 = 0x31;
    const CALL: u8 = 0x32;
    const RET: u8 = 0x33;
}

/// Decoded Quack instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Data Movement ====================

    /// rrmovw: R[dst] := R[src]. Sets ZF from the moved value.
    Rrmovw { src: Reg, dst: Reg },

    /// irmovb: R[dst] := imm8 (zero-extended). Sets ZF.
    Irmovb { dst: Reg, imm: u8 },

    /// irmovw: R[dst] := imm16. Sets ZF.
    Irmovw { dst: Reg, imm: u16 },

    /// mrmovw: R[dst] := mem16[addr]. Flags unchanged.
    Mrmovw { dst: Reg, addr: u16 },

    /// rmmovw: mem16[addr] := R[src]. Flags unchanged.
    Rmmovw { src: Reg, addr: u16 },

    /// mrmovb: R[dst] := mem8[addr] (zero-extended). Flags unchanged.
    Mrmovb { dst: Reg, addr: u16 },

    /// rmmovb: mem8[addr] := low byte of R[src]. Flags unchanged.
    Rmmovb { src: Reg, addr: u16 },

    /// mrmovbr: R[dst] := mem8[R[base]] (zero-extended). Flags unchanged.
    Mrmovbr { dst: Reg, base: Reg },

    /// rmmovbr: mem8[R[base]] := low byte of R[src]. Flags unchanged.
    Rmmovbr { src: Reg, base: Reg },

    // ==================== ALU ====================

    /// addw: R[dst] := R[dst] + R[src], wrapping mod 2^16. Sets ZF.
    Addw { src: Reg, dst: Reg },

    /// subw: R[dst] := R[dst] - R[src], wrapping mod 2^16. Sets ZF.
    Subw { src: Reg, dst: Reg },

    /// cmpw: ZF := (R[a] == R[b]). Registers unchanged.
    Cmpw { a: Reg, b: Reg },

    // ==================== Control Flow ====================

    /// jmp: PC := target.
    Jmp { target: u16 },

    /// je: PC := target if ZF is set, else fall through.
    Je { target: u16 },

    /// jne: PC := target if ZF is clear, else fall through.
    Jne { target: u16 },

    /// halt: stop execution. PC is left pointing at the halt instruction.
    Halt,

    // ==================== Stack / Procedures ====================

    /// pushw: SP := SP - 2; mem16[SP] := R[src].
    Pushw { src: Reg },

    /// popw: R[dst] := mem16[SP]; SP := SP + 2. Clears ZF.
    Popw { dst: Reg },

    /// call: push the return address (next instruction), PC := target.
    Call { target: u16 },

    /// ret: PC := mem16[SP]; SP := SP + 2.
    Ret,
}

/// Decode a raw 4-byte instruction.
///
/// Register operands are validated here; execution never sees an
/// out-of-range index.
pub fn decode(raw: RawInstr) -> Result<Instruction, DecodeError> {
    let reg = |idx: u8| Reg::new(idx).ok_or(DecodeError::InvalidRegister(idx));

    let instr = match raw.op {
        Opcode::RRMOVW => Instruction::Rrmovw { src: reg(raw.ra)?, dst: reg(raw.b2)? },
        Opcode::IRMOVB => Instruction::Irmovb { dst: reg(raw.ra)?, imm: raw.b3 },
        Opcode::IRMOVW => Instruction::Irmovw { dst: reg(raw.ra)?, imm: raw.imm16() },
        Opcode::MRMOVW => Instruction::Mrmovw { dst: reg(raw.ra)?, addr: raw.imm16() },
        Opcode::RMMOVW => Instruction::Rmmovw { src: reg(raw.ra)?, addr: raw.imm16() },
        Opcode::MRMOVB => Instruction::Mrmovb { dst: reg(raw.ra)?, addr: raw.imm16() },
        Opcode::RMMOVB => Instruction::Rmmovb { src: reg(raw.ra)?, addr: raw.imm16() },
        Opcode::MRMOVBR => Instruction::Mrmovbr { dst: reg(raw.ra)?, base: reg(raw.b2)? },
        Opcode::RMMOVBR => Instruction::Rmmovbr { src: reg(raw.ra)?, base: reg(raw.b2)? },
        Opcode::ADDW => Instruction::Addw { src: reg(raw.ra)?, dst: reg(raw.b2)? },
        Opcode::SUBW => Instruction::Subw { src: reg(raw.ra)?, dst: reg(raw.b2)? },
        Opcode::CMPW => Instruction::Cmpw { a: reg(raw.ra)?, b: reg(raw.b2)? },
        Opcode::JMP => Instruction::Jmp { target: raw.imm16() },
        Opcode::JE => Instruction::Je { target: raw.imm16() },
        Opcode::JNE => Instruction::Jne { target: raw.imm16() },
        Opcode::HALT => Instruction::Halt,
        Opcode::PUSHW => Instruction::Pushw { src: reg(raw.ra)? },
        Opcode::POPW => Instruction::Popw { dst: reg(raw.ra)? },
        Opcode::CALL => Instruction::Call { target: raw.imm16() },
        Opcode::RET => Instruction::Ret,
        op => return Err(DecodeError::InvalidOpcode(op)),
    };

    Ok(instr)
}

/// Encode an instruction back to its 4-byte form.
///
/// Used by tests and tools to build program images.
pub fn encode(instr: &Instruction) -> [u8; 4] {
    let r = |reg: Reg| reg.index() as u8;
    let imm = |v: u16| v.to_le_bytes();

    match *instr {
        Instruction::Rrmovw { src, dst } => [Opcode::RRMOVW, r(src), r(dst), 0],
        Instruction::Irmovb { dst, imm } => [Opcode::IRMOVB, r(dst), 0, imm],
        Instruction::Irmovw { dst, imm: v } => {
            let [lo, hi] = imm(v);
            [Opcode::IRMOVW, r(dst), lo, hi]
        }
        Instruction::Mrmovw { dst, addr } => {
            let [lo, hi] = imm(addr);
            [Opcode::MRMOVW, r(dst), lo, hi]
        }
        Instruction::Rmmovw { src, addr } => {
            let [lo, hi] = imm(addr);
            [Opcode::RMMOVW, r(src), lo, hi]
        }
        Instruction::Mrmovb { dst, addr } => {
            let [lo, hi] = imm(addr);
            [Opcode::MRMOVB, r(dst), lo, hi]
        }
        Instruction::Rmmovb { src, addr } => {
            let [lo, hi] = imm(addr);
            [Opcode::RMMOVB, r(src), lo, hi]
        }
        Instruction::Mrmovbr { dst, base } => [Opcode::MRMOVBR, r(dst), r(base), 0],
        Instruction::Rmmovbr { src, base } => [Opcode::RMMOVBR, r(src), r(base), 0],
        Instruction::Addw { src, dst } => [Opcode::ADDW, r(src), r(dst), 0],
        Instruction::Subw { src, dst } => [Opcode::SUBW, r(src), r(dst), 0],
        Instruction::Cmpw { a, b } => [Opcode::CMPW, r(a), r(b), 0],
        Instruction::Jmp { target } => {
            let [lo, hi] = imm(target);
            [Opcode::JMP, 0, lo, hi]
        }
        Instruction::Je { target } => {
            let [lo, hi] = imm(target);
            [Opcode::JE, 0, lo, hi]
        }
        Instruction::Jne { target } => {
            let [lo, hi] = imm(target);
            [Opcode::JNE, 0, lo, hi]
        }
        Instruction::Halt => [Opcode::HALT, 0, 0, 0],
        Instruction::Pushw { src } => [Opcode::PUSHW, r(src), 0, 0],
        Instruction::Popw { dst } => [Opcode::POPW, r(dst), 0, 0],
        Instruction::Call { target } => {
            let [lo, hi] = imm(target);
            [Opcode::CALL, 0, lo, hi]
        }
        Instruction::Ret => [Opcode::RET, 0, 0, 0],
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Instruction::Rrmovw { src, dst } => write!(f, "rrmovw  {src}, {dst}"),
            Instruction::Irmovb { dst, imm } => write!(f, "irmovb  {dst}, 0x{imm:02X}"),
            Instruction::Irmovw { dst, imm } => write!(f, "irmovw  {dst}, 0x{imm:04X}"),
            Instruction::Mrmovw { dst, addr } => write!(f, "mrmovw  {dst}, [0x{addr:04X}]"),
            Instruction::Rmmovw { src, addr } => write!(f, "rmmovw  [0x{addr:04X}], {src}"),
            Instruction::Mrmovb { dst, addr } => write!(f, "mrmovb  {dst}, [0x{addr:04X}]"),
            Instruction::Rmmovb { src, addr } => write!(f, "rmmovb  [0x{addr:04X}], {src}"),
            Instruction::Mrmovbr { dst, base } => write!(f, "mrmovbr {dst}, [{base}]"),
            Instruction::Rmmovbr { src, base } => write!(f, "rmmovbr [{base}], {src}"),
            Instruction::Addw { src, dst } => write!(f, "addw    {src}, {dst}"),
            Instruction::Subw { src, dst } => write!(f, "subw    {src}, {dst}"),
            Instruction::Cmpw { a, b } => write!(f, "cmpw    {a}, {b}"),
            Instruction::Jmp { target } => write!(f, "jmp     0x{target:04X}"),
            Instruction::Je { target } => write!(f, "je      0x{target:04X}"),
            Instruction::Jne { target } => write!(f, "jne     0x{target:04X}"),
            Instruction::Halt => write!(f, "halt"),
            Instruction::Pushw { src } => write!(f, "pushw   {src}"),
            Instruction::Popw { dst } => write!(f, "popw    {dst}"),
            Instruction::Call { target } => write!(f, "call    0x{target:04X}"),
            Instruction::Ret => write!(f, "ret"),
        }
    }
}

/// Disassemble a program image, one line per 4-byte slot.
///
/// Slots that do not decode (data, padding) are shown as raw bytes.
pub fn disassemble(image: &[u8]) -> String {
    let mut out = String::new();

    for (i, chunk) in image.chunks(4).enumerate() {
        let addr = i * 4;
        let mut bytes = [0u8; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);

        let line = match decode(RawInstr::from_bytes(bytes)) {
            Ok(instr) => format!("0x{addr:04X}: {instr}"),
            Err(_) => format!(
                "0x{addr:04X}: .byte {}",
                chunk.iter().map(|b| format!("0x{b:02X}")).collect::<Vec<_>>().join(", ")
            ),
        };
        out.push_str(&line);
        out.push('\n');
    }

    out
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode 0x{0:02X}")]
    InvalidOpcode(u8),

    #[error("invalid register index {0} (valid: 0..=3)")]
    InvalidRegister(u8),
}
